//! Mining of synthetic header chains.

use bitcoin::block::Header;
use bitcoin::block::Version;
use bitcoin::consensus;
use bitcoin::hashes::Hash as _;
use bitcoin::BlockHash;
use bitcoin::CompactTarget;
use bitcoin::TxMerkleNode;

/// The easiest target that can be encoded, as used on regtest. Roughly
/// every other nonce satisfies it.
pub const EASY_BITS: u32 = 0x207f_ffff;

/// Mine `count` linked headers at [`EASY_BITS`]. The first header commits
/// to `merkle_root`; the rest commit to the zero hash.
pub fn mine_chain(merkle_root: TxMerkleNode, count: usize) -> Vec<Header> {
    let mut headers: Vec<Header> = Vec::with_capacity(count);
    let mut prev_blockhash = BlockHash::all_zeros();

    for index in 0..count {
        let merkle_root = if index == 0 { merkle_root } else { TxMerkleNode::all_zeros() };
        let mut header = Header {
            version: Version::from_consensus(0x2000_0000),
            prev_blockhash,
            merkle_root,
            time: 1_700_000_000 + 600 * index as u32,
            bits: CompactTarget::from_consensus(EASY_BITS),
            nonce: 0,
        };
        while header.validate_pow(header.target()).is_err() {
            header.nonce += 1;
        }
        prev_blockhash = header.block_hash();
        headers.push(header);
    }
    headers
}

/// Concatenate the consensus encoding of the headers.
pub fn serialize_headers(headers: &[Header]) -> Vec<u8> {
    headers.iter().flat_map(|header| consensus::serialize(header)).collect()
}
