//! Module for testing utilities.
//!
//! These builders produce evidence that verifies, so that tests can then
//! break exactly one part of it.

use bitcoin::consensus;
use bitcoin::hashes::Hash as _;
use bitcoin::Transaction;
use bitcoin::Txid;

use crate::proof::TxInclusionProof;

pub mod fixtures;
pub mod headers;
pub mod merkle;

/// Build an inclusion proof for `tx`, placed at `tx_index` in a block of
/// `block_size` transactions and buried under a chain of `header_count`
/// headers mined at [`headers::EASY_BITS`].
///
/// The other transactions in the block are filler IDs. The chain declares
/// zero difficulty, so it satisfies a relay that reports zero for both
/// epochs.
///
/// # Panics
///
/// Panics if `tx_index` is not below `block_size`.
pub fn confirm_transaction(
    tx: &Transaction,
    tx_index: usize,
    block_size: usize,
    header_count: usize,
) -> TxInclusionProof {
    assert!(tx_index < block_size, "the transaction must be inside the block");

    let version = tx.version.0.to_le_bytes();
    let tx_input_vector = consensus::serialize(&tx.input);
    let tx_output_vector = consensus::serialize(&tx.output);
    let tx_locktime = tx.lock_time.to_consensus_u32().to_le_bytes();

    let txid = crate::btc_utils::hash_transaction(version, &tx_input_vector, &tx_output_vector, tx_locktime);
    let leaves: Vec<Txid> = (0..block_size)
        .map(|index| match index == tx_index {
            true => txid,
            false => Txid::from_byte_array([index as u8 ^ 0xa5; 32]),
        })
        .collect();
    let tree = merkle::MerkleTree::new(&leaves);
    let chain = headers::mine_chain(tree.root(), header_count);

    TxInclusionProof {
        version,
        tx_input_vector,
        tx_output_vector,
        tx_locktime,
        merkle_proof: tree.proof(tx_index),
        tx_index_in_block: tx_index as u64,
        bitcoin_headers: headers::serialize_headers(&chain),
    }
}
