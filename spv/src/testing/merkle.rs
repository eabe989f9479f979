//! A small in-memory merkle tree built the way bitcoin builds them.

use bitcoin::hashes::sha256d;
use bitcoin::hashes::Hash as _;
use bitcoin::hashes::HashEngine as _;
use bitcoin::TxMerkleNode;
use bitcoin::Txid;

/// Every level of a bitcoin transaction merkle tree, leaves first.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    /// Build the tree over the given transaction IDs.
    ///
    /// Levels with an odd number of nodes pair their last node with
    /// itself.
    ///
    /// # Panics
    ///
    /// Panics if `leaves` is empty.
    pub fn new(leaves: &[Txid]) -> Self {
        assert!(!leaves.is_empty(), "a merkle tree needs at least one leaf");

        let mut levels = vec![leaves.iter().map(|txid| txid.to_byte_array()).collect::<Vec<_>>()];
        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let next = level
                .chunks(2)
                .map(|pair| {
                    let left = pair[0];
                    let right = pair.get(1).copied().unwrap_or(left);
                    let mut engine = sha256d::Hash::engine();
                    engine.input(&left);
                    engine.input(&right);
                    sha256d::Hash::from_engine(engine).to_byte_array()
                })
                .collect();
            levels.push(next);
        }
        Self { levels }
    }

    /// The merkle root.
    pub fn root(&self) -> TxMerkleNode {
        let root = self.levels.last().and_then(|level| level.first()).copied();
        TxMerkleNode::from_byte_array(root.unwrap_or_default())
    }

    /// The concatenated sibling hashes proving inclusion of the leaf at
    /// `index`.
    pub fn proof(&self, index: usize) -> Vec<u8> {
        let depth = self.levels.len() - 1;
        let mut position = index;
        let mut proof = Vec::with_capacity(depth * 32);

        for level in &self.levels[..depth] {
            let sibling = level.get(position ^ 1).unwrap_or(&level[position]);
            proof.extend_from_slice(sibling);
            position >>= 1;
        }
        proof
    }
}
