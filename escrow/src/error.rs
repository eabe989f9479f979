//! Top-level error type for the escrow library
//!

use bitcoin::OutPoint;
use bitcoin::ScriptBuf;
use bitcoin::Txid;
use spv::error::HeaderChainError;
use spv::error::MalformedVector;

use crate::registry::ContractAddress;
use crate::state::DepositState;

/// Errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operation is not legal in the deposit's current state.
    #[error("{operation} is not allowed while the deposit is in state {state}")]
    IllegalStateTransition {
        /// The name of the rejected operation.
        operation: &'static str,
        /// The state the deposit was in.
        state: DepositState,
    },
    /// The funding proof was rejected.
    #[error("funding proof is invalid: {0}")]
    FundingProofInvalid(#[source] FundingProofError),
    /// The redemption proof was rejected.
    #[error("redemption proof is invalid: {0}")]
    RedemptionProofInvalid(#[source] RedemptionProofError),
    /// The fee attached to a deposit creation request is below the
    /// custody service's quoted cost.
    #[error("insufficient value for new custody group creation: got {provided}, need {required}")]
    InsufficientFee {
        /// The fee that was attached.
        provided: u64,
        /// The fee quoted by the custody service.
        required: u64,
    },
    /// The requested lot size is not one of the configured lot sizes.
    #[error("lot size {0} is not supported")]
    UnsupportedLotSize(u64),
    /// There is no deposit at the given address.
    #[error("no deposit exists at address {0}")]
    UnknownDeposit(ContractAddress),
    /// A new instance would have replaced an existing one.
    #[error("an instance already exists at address {0}")]
    AddressCollision(ContractAddress),
    /// The public key reported by the custody service is not a point on
    /// the secp256k1 curve.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(#[source] secp256k1::Error),
    /// The signature did not parse or did not verify.
    #[error("invalid signature: {0}")]
    InvalidSignature(#[source] secp256k1::Error),
    /// The redemption request breaks one of the redemption rules.
    #[error("invalid redemption request: {0}")]
    InvalidRedemptionRequest(&'static str),
    /// Could not compute the sighash of the redemption transaction.
    #[error("could not compute the redemption sighash: {0}")]
    RedemptionSighash(#[source] bitcoin::sighash::P2wpkhError),
    /// The fraud proof shows a signature over a digest that the deposit
    /// approved, so it is not evidence of fraud.
    #[error("the signed digest {0} was approved by the deposit")]
    DigestWasApproved(String),
    /// The collateralization check that gates the operation did not pass.
    #[error("collateralization of {collateralization}% does not satisfy the {threshold}% threshold")]
    CollateralCheckFailed {
        /// The current collateralization in percent.
        collateralization: u128,
        /// The threshold that the operation compares against.
        threshold: u32,
    },
    /// The custody service rejected a request.
    #[error("custody service error: {0}")]
    Custody(String),
    /// The claim ledger rejected a request.
    #[error("claim ledger error: {0}")]
    Ledger(String),
    /// An error when reading the configuration.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    /// An error when reading a file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// An error when (de)serializing JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Hex decoding failed.
    #[error("hex decoding error: {0}")]
    Hex(#[from] hex::FromHexError),
    /// An SPV primitive rejected its input.
    #[error("spv error: {0}")]
    Spv(#[from] spv::Error),
}

/// The reasons a funding proof can be rejected.
#[derive(Debug, thiserror::Error)]
pub enum FundingProofError {
    /// The funding output does not pay to the custody group's key.
    #[error("funding output pays to {actual} instead of {expected}")]
    ScriptMismatch {
        /// The script derived from the signer's public key.
        expected: ScriptBuf,
        /// The script of the funding output.
        actual: ScriptBuf,
    },
    /// The funding output is worth less than the lot size.
    #[error("funding output value {value} is below the lot size {lot_size}")]
    ValueBelowLotSize {
        /// The value of the funding output in satoshis.
        value: u64,
        /// The deposit's lot size in satoshis.
        lot_size: u64,
    },
    /// The transaction is not included in the first header's block.
    #[error("merkle proof does not prove inclusion of {0}")]
    MerkleProof(Txid),
    /// The header chain failed verification.
    #[error("header chain rejected: {0}")]
    HeaderChain(#[source] HeaderChainError),
    /// Some part of the proof is not validly encoded.
    #[error("malformed proof: {0}")]
    Malformed(#[source] MalformedVector),
}

/// The reasons a redemption proof can be rejected.
#[derive(Debug, thiserror::Error)]
pub enum RedemptionProofError {
    /// The redemption transaction must spend exactly one input.
    #[error("redemption transaction has {0} inputs, expected exactly one")]
    InputCount(usize),
    /// The redemption transaction does not spend the funding output.
    #[error("redemption transaction spends {actual} instead of {expected}")]
    WrongOutpoint {
        /// The deposit's funding outpoint.
        expected: OutPoint,
        /// The outpoint that is actually spent.
        actual: OutPoint,
    },
    /// Output 0 does not pay to the redeemer's script.
    #[error("redemption output pays to {actual} instead of {expected}")]
    ScriptMismatch {
        /// The redeemer's script.
        expected: ScriptBuf,
        /// The script of output 0.
        actual: ScriptBuf,
    },
    /// Output 0 pays less than the requested amount.
    #[error("redemption output value {value} is below the requested {requested}")]
    ValueBelowRequested {
        /// The value of output 0 in satoshis.
        value: u64,
        /// The value requested by the redeemer.
        requested: u64,
    },
    /// The transaction is not included in the first header's block.
    #[error("merkle proof does not prove inclusion of {0}")]
    MerkleProof(Txid),
    /// The header chain failed verification.
    #[error("header chain rejected: {0}")]
    HeaderChain(#[source] HeaderChainError),
    /// Some part of the proof is not validly encoded.
    #[error("malformed proof: {0}")]
    Malformed(#[source] MalformedVector),
}

impl From<spv::Error> for FundingProofError {
    fn from(err: spv::Error) -> Self {
        match err {
            spv::Error::MalformedVector(err) => FundingProofError::Malformed(err),
            spv::Error::HeaderChain(err) => FundingProofError::HeaderChain(err),
            spv::Error::InvalidMerkleProof(txid) => FundingProofError::MerkleProof(txid),
        }
    }
}

impl From<spv::Error> for RedemptionProofError {
    fn from(err: spv::Error) -> Self {
        match err {
            spv::Error::MalformedVector(err) => RedemptionProofError::Malformed(err),
            spv::Error::HeaderChain(err) => RedemptionProofError::HeaderChain(err),
            spv::Error::InvalidMerkleProof(txid) => RedemptionProofError::MerkleProof(txid),
        }
    }
}
