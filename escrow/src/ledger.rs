//! The interface to the claim token ledger.

use crate::error::Error;
use crate::registry::ContractAddress;

/// The ledger that accounts for the claim tokens backed by deposits.
///
/// Deposits only notify the ledger. All token accounting happens on the
/// other side of this trait.
pub trait ClaimLedger {
    /// The deposit became active, so `amount` satoshis worth of claims
    /// can be minted.
    fn mint(&self, deposit: ContractAddress, amount: u64) -> Result<(), Error>;

    /// The deposit was redeemed, so `amount` satoshis worth of claims
    /// must be burned.
    fn burn(&self, deposit: ContractAddress, amount: u64) -> Result<(), Error>;

    /// The funded deposit was liquidated, and the claims it backed must
    /// be settled against the custody group's bonds.
    fn settle_liquidation(&self, deposit: ContractAddress, amount: u64) -> Result<(), Error>;
}
