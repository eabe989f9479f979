//! Pure functions over the raw byte sequences that make up SPV evidence.
//!
//! Nothing in this module holds state. Every function either returns a
//! value derived from its inputs or reports why the inputs are not what
//! they claim to be.

use bitcoin::block::Header;
use bitcoin::consensus;
use bitcoin::hashes::sha256d;
use bitcoin::hashes::Hash as _;
use bitcoin::hashes::HashEngine as _;
use bitcoin::params::Params;
use bitcoin::BlockHash;
use bitcoin::CompactTarget;
use bitcoin::OutPoint;
use bitcoin::Target;
use bitcoin::TxIn;
use bitcoin::TxMerkleNode;
use bitcoin::TxOut;
use bitcoin::Txid;
use bitcoin::Work;

use crate::error::Error;
use crate::error::HeaderChainError;
use crate::error::MalformedVector;
use crate::HEADER_LENGTH;
use crate::MERKLE_NODE_LENGTH;

/// The deepest Merkle proof a `u64` transaction index can address.
const MAX_MERKLE_DEPTH: usize = u64::BITS as usize;

/// What a successfully validated header chain amounts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSummary {
    /// The number of headers in the chain.
    pub header_count: usize,
    /// The sum of the difficulty declared by each header.
    pub accumulated_difficulty: u128,
    /// The sum of the work represented by each header's target.
    pub accumulated_work: Work,
    /// The hash of the last header in the chain.
    pub tip: BlockHash,
}

/// Decode a compact-size prefixed vector of transaction inputs.
///
/// The vector must declare at least one input and must be consumed
/// exactly, so both truncation and trailing bytes are rejected.
pub fn parse_input_vector(vector: &[u8]) -> Result<Vec<TxIn>, MalformedVector> {
    let inputs: Vec<TxIn> = consensus::deserialize(vector)
        .map_err(|err| MalformedVector::Decode("input vector", err))?;

    if inputs.is_empty() {
        return Err(MalformedVector::Empty("input vector"));
    }
    Ok(inputs)
}

/// Decode a compact-size prefixed vector of transaction outputs.
///
/// Same rules as [`parse_input_vector`].
pub fn parse_output_vector(vector: &[u8]) -> Result<Vec<TxOut>, MalformedVector> {
    let outputs: Vec<TxOut> = consensus::deserialize(vector)
        .map_err(|err| MalformedVector::Decode("output vector", err))?;

    if outputs.is_empty() {
        return Err(MalformedVector::Empty("output vector"));
    }
    Ok(outputs)
}

/// Return the output at the given index of an encoded output vector.
pub fn extract_output_at_index(vector: &[u8], index: usize) -> Result<TxOut, MalformedVector> {
    let mut outputs = parse_output_vector(vector)?;
    let count = outputs.len();
    if index >= count {
        return Err(MalformedVector::IndexOutOfRange { index, count });
    }
    Ok(outputs.swap_remove(index))
}

/// Return the outpoint spent by the input at the given index of an
/// encoded input vector.
pub fn extract_outpoint(vector: &[u8], index: usize) -> Result<OutPoint, MalformedVector> {
    let inputs = parse_input_vector(vector)?;
    inputs
        .get(index)
        .map(|input| input.previous_output)
        .ok_or(MalformedVector::IndexOutOfRange { index, count: inputs.len() })
}

/// Compute the transaction ID of a transaction given its legacy
/// serialization split into its four parts.
///
/// The hash is taken over the exact concatenation of the given bytes, so
/// callers must pass the vectors exactly as they appear on the wire,
/// length prefixes included, and without witness data.
pub fn hash_transaction(version: [u8; 4], inputs: &[u8], outputs: &[u8], locktime: [u8; 4]) -> Txid {
    let mut engine = Txid::engine();
    engine.input(&version);
    engine.input(inputs);
    engine.input(outputs);
    engine.input(&locktime);
    Txid::from_engine(engine)
}

/// Check that `proof` connects `txid` to `merkle_root`.
///
/// The proof is the concatenation of the 32-byte sibling hashes from the
/// leaf level up, excluding both the leaf and the root. At each level the
/// corresponding bit of `tx_index` says whether the running hash is the
/// right child (bit set) or the left child (bit clear).
///
/// This never panics and never errors: any malformed input simply fails
/// verification. That includes a proof whose length is not a multiple of
/// 32, a proof deeper than the 64 bits of `tx_index`, and an index with
/// bits set above the depth of the proof. An empty
/// proof is valid only for a block holding a single transaction.
pub fn verify_merkle_proof(txid: Txid, proof: &[u8], merkle_root: TxMerkleNode, tx_index: u64) -> bool {
    if proof.len() % MERKLE_NODE_LENGTH != 0 {
        return false;
    }

    let depth = proof.len() / MERKLE_NODE_LENGTH;
    // Every level consumes one bit of the index.
    if depth > MAX_MERKLE_DEPTH {
        return false;
    }
    if tx_index.checked_shr(depth as u32).unwrap_or(0) != 0 {
        return false;
    }

    let mut current = txid.to_byte_array();
    for (level, sibling) in proof.chunks_exact(MERKLE_NODE_LENGTH).enumerate() {
        let mut engine = sha256d::Hash::engine();
        if (tx_index >> level) & 1 == 1 {
            engine.input(sibling);
            engine.input(&current);
        } else {
            engine.input(&current);
            engine.input(sibling);
        }
        current = sha256d::Hash::from_engine(engine).to_byte_array();
    }

    current == merkle_root.to_byte_array()
}

/// Split a concatenation of 80-byte records into block headers.
pub fn parse_headers(bytes: &[u8]) -> Result<Vec<Header>, MalformedVector> {
    if bytes.is_empty() || bytes.len() % HEADER_LENGTH != 0 {
        return Err(MalformedVector::HeaderLength(bytes.len()));
    }

    bytes
        .chunks_exact(HEADER_LENGTH)
        .map(|chunk| {
            consensus::deserialize(chunk).map_err(|err| MalformedVector::Decode("block header", err))
        })
        .collect()
}

/// Convert a target into the usual difficulty measure.
///
/// This is the mainnet maximum attainable target divided by the given
/// target, truncated to an integer, so a difficulty of one corresponds to
/// the target in the genesis block. A zero target has no meaningful
/// difficulty and maps to zero.
pub fn calculate_difficulty(target: Target) -> u128 {
    if target == Target::ZERO {
        return 0;
    }
    target.difficulty(Params::MAINNET)
}

/// The difficulty that a header declares through its compact target.
pub fn extract_difficulty(header: &Header) -> u128 {
    calculate_difficulty(header.target())
}

/// The expected amount of work needed to find a block hash at or below
/// the given target.
pub fn work_from_target(target: Target) -> Work {
    target.to_work()
}

/// Compute the compact target of the next difficulty epoch.
///
/// The timestamps are those of the first and last blocks of the epoch
/// that is ending. The timespan between them is clamped to between a
/// quarter and four times the two week target.
pub fn retarget(previous_bits: CompactTarget, first_timestamp: u32, last_timestamp: u32) -> CompactTarget {
    let timespan = last_timestamp.saturating_sub(first_timestamp);
    CompactTarget::from_next_work_required(previous_bits, u64::from(timespan), Params::MAINNET)
}

/// Check that `new_bits` is exactly what the retarget rules produce.
pub fn is_valid_retarget(
    previous_bits: CompactTarget,
    first_timestamp: u32,
    last_timestamp: u32,
    new_bits: CompactTarget,
) -> bool {
    retarget(previous_bits, first_timestamp, last_timestamp) == new_bits
}

/// Validate a chain of headers against the epoch difficulties tracked by
/// a relay.
///
/// Every header must satisfy the proof-of-work target it encodes, every
/// header after the first must commit to the hash of its predecessor, and
/// the difficulty each header declares must be the one in force for its
/// epoch. The chain may start in either the previous or the current epoch
/// and may move from the previous to the current epoch at most once.
pub fn validate_header_chain(
    headers: &[Header],
    previous_difficulty: u128,
    current_difficulty: u128,
) -> Result<ChainSummary, Error> {
    let Some(first) = headers.first() else {
        return Err(MalformedVector::HeaderLength(0).into());
    };

    let mut in_current_epoch = false;
    let mut accumulated_difficulty: u128 = 0;
    let mut accumulated_work = Work::from_be_bytes([0; 32]);
    let mut previous_hash: Option<BlockHash> = None;

    for (index, header) in headers.iter().enumerate() {
        let target = header.target();
        if target == Target::ZERO {
            return Err(HeaderChainError::InsufficientWork { index }.into());
        }
        let hash = header
            .validate_pow(target)
            .map_err(|_| HeaderChainError::InsufficientWork { index })?;

        if let Some(expected) = previous_hash {
            if header.prev_blockhash != expected {
                return Err(HeaderChainError::BrokenChain { index, expected }.into());
            }
        }

        let declared = calculate_difficulty(target);
        in_current_epoch = check_epoch_difficulty(
            index,
            declared,
            in_current_epoch,
            previous_difficulty,
            current_difficulty,
        )?;

        accumulated_difficulty = accumulated_difficulty.saturating_add(declared);
        accumulated_work = accumulated_work + work_from_target(target);
        previous_hash = Some(hash);
    }

    let summary = ChainSummary {
        header_count: headers.len(),
        accumulated_difficulty,
        accumulated_work,
        tip: previous_hash.unwrap_or_else(|| first.block_hash()),
    };

    tracing::debug!(
        header_count = summary.header_count,
        accumulated_difficulty = summary.accumulated_difficulty,
        tip = %summary.tip,
        "validated header chain"
    );

    Ok(summary)
}

/// Check the difficulty declared by the header at `index` and return
/// whether the chain is in the current epoch after it.
fn check_epoch_difficulty(
    index: usize,
    declared: u128,
    in_current_epoch: bool,
    previous_difficulty: u128,
    current_difficulty: u128,
) -> Result<bool, HeaderChainError> {
    if declared == current_difficulty {
        return Ok(true);
    }
    if in_current_epoch {
        let expected = current_difficulty;
        return Err(HeaderChainError::DifficultyMismatch { index, declared, expected });
    }
    if declared != previous_difficulty {
        let expected = previous_difficulty;
        return Err(HeaderChainError::DifficultyMismatch { index, declared, expected });
    }
    Ok(false)
}
