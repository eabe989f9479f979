//! The interface to the external custody service.
//!
//! A custody service runs the multi-party groups that hold the keys
//! controlling deposited bitcoin. Deposits never wait on it: every call
//! returns straight away, and anything that the service has not produced
//! yet comes back as [`CustodyResponse::NotReady`].

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;

/// Identifies the custody group that serves one deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CustodyHandle(pub u64);

impl std::fmt::Display for CustodyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "custody-group-{}", self.0)
    }
}

/// The answer to a request for something the custody group produces
/// asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustodyResponse<T> {
    /// The value is available.
    Ready(T),
    /// The custody group has not produced the value yet. Ask again later.
    NotReady,
}

/// The affine coordinates of a custody group's public key.
pub type PublicKeyCoordinates = ([u8; 32], [u8; 32]);

/// The custody service as seen from a deposit.
pub trait CustodyService {
    /// The fee, in the execution environment's native unit, that opening
    /// a new custody group costs.
    fn open_fee(&self) -> u64;

    /// Ask for a new custody group to back `lot_size` satoshis, paying
    /// `fee` for it. The whole fee is forwarded.
    fn request_signer(&self, lot_size: u64, fee: u64) -> Result<CustodyHandle, Error>;

    /// The group's public key, once key generation has finished.
    fn public_key(&self, handle: CustodyHandle) -> Result<CustodyResponse<PublicKeyCoordinates>, Error>;

    /// Ask the group to sign `digest`. Asking again for the same digest
    /// is how callers poll for the signature, which is a 64-byte compact
    /// ECDSA signature.
    fn request_signature(&self, handle: CustodyHandle, digest: [u8; 32]) -> Result<CustodyResponse<[u8; 64]>, Error>;

    /// The value of the bonds that the group put up, in the same unit
    /// as the price feed.
    fn bonded_value(&self, handle: CustodyHandle) -> Result<u128, Error>;
}
