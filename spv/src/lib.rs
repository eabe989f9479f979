#![deny(missing_docs)]

//! # SPV proof verification
//!
//! This library validates evidence that a bitcoin transaction was
//! included in a sufficiently confirmed block, without access to the full
//! chain. The evidence is made up of the raw transaction fields, a merkle
//! inclusion proof and a chain of block headers, and it is checked against
//! the epoch difficulties tracked by an external header relay.

pub mod btc_utils;
pub mod error;
pub mod proof;
pub mod relay;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use crate::error::Error;

/// The length of a serialized bitcoin block header.
pub const HEADER_LENGTH: usize = 80;

/// The length of a single node in a merkle inclusion proof.
pub const MERKLE_NODE_LENGTH: usize = 32;
