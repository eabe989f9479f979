//! Top-level error type for the spv library
//!

use bitcoin::BlockHash;
use bitcoin::Txid;

/// Errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A binary-encoded proof component could not be parsed.
    #[error("malformed vector: {0}")]
    MalformedVector(#[from] MalformedVector),
    /// The header chain failed one of its consensus or policy checks.
    #[error("invalid header chain: {0}")]
    HeaderChain(#[from] HeaderChainError),
    /// The merkle proof does not connect the transaction to the merkle
    /// root committed to by the first header.
    #[error("merkle proof does not prove inclusion of transaction {0}")]
    InvalidMerkleProof(Txid),
}

/// The ways in which the binary encoding of proof evidence can be
/// malformed. Any of these means that the submitted bytes are not what
/// they claim to be, so nothing derived from them may be trusted.
#[derive(Debug, thiserror::Error)]
pub enum MalformedVector {
    /// The length prefix of a transaction input or output vector is
    /// inconsistent with its actual length, or one of its entries is
    /// truncated.
    #[error("could not decode the {0}: {1}")]
    Decode(&'static str, #[source] bitcoin::consensus::encode::Error),
    /// The vector decoded fine but declares zero entries.
    #[error("the {0} declares zero entries")]
    Empty(&'static str),
    /// The requested entry is past the end of the vector.
    #[error("index {index} is out of range for a vector with {count} entries")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The number of entries that were actually parsed.
        count: usize,
    },
    /// Header chains are concatenations of 80-byte records.
    #[error("header vector length {0} is not a positive multiple of 80")]
    HeaderLength(usize),
}

/// The header chain verification failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HeaderChainError {
    /// The hash of the header at this position is not below the target
    /// that the header itself encodes.
    #[error("header {index} does not satisfy its own proof-of-work target")]
    InsufficientWork {
        /// Position of the offending header in the chain.
        index: usize,
    },
    /// The difficulty declared by the header is neither the previous nor
    /// the current epoch difficulty, or the chain moves from the current
    /// epoch back to the previous one.
    #[error("header {index} declares difficulty {declared}, expected {expected}")]
    DifficultyMismatch {
        /// Position of the offending header in the chain.
        index: usize,
        /// The difficulty encoded in the header.
        declared: u128,
        /// The difficulty that was in force for this header.
        expected: u128,
    },
    /// The header at this position does not commit to the hash of the
    /// header that precedes it.
    #[error("header {index} does not link to the previous header {expected}")]
    BrokenChain {
        /// Position of the offending header in the chain.
        index: usize,
        /// The hash of the preceding header.
        expected: BlockHash,
    },
    /// Every header is valid but together they do not represent enough
    /// confirmations.
    #[error("accumulated difficulty {observed} is below the required {required}")]
    InsufficientAccumulatedDifficulty {
        /// Difficulty that the policy requires.
        required: u128,
        /// Difficulty summed over the submitted headers.
        observed: u128,
    },
}
