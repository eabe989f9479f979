//! Context module for the escrow system.
//!
//! A [`Context`] bundles everything an operation needs from outside the
//! deposit itself: configuration, the collaborator services, a clock and a
//! sink for events.

use spv::relay::DifficultyRelay;

use crate::config::Settings;
use crate::custody::CustodyService;
use crate::events::Event;
use crate::ledger::ClaimLedger;
use crate::price::PriceFeed;

/// Context trait for every lifecycle operation.
///
/// Collaborators take `&self`; implementations that record state use
/// interior mutability.
pub trait Context {
    /// Get the current configuration.
    fn config(&self) -> &Settings;
    /// Get a handle to the custody service.
    fn custody(&self) -> &impl CustodyService;
    /// Get a handle to the header relay.
    fn relay(&self) -> &impl DifficultyRelay;
    /// Get a handle to the claim ledger.
    fn ledger(&self) -> &impl ClaimLedger;
    /// Get a handle to the price feed.
    fn price_feed(&self) -> &impl PriceFeed;
    /// Record an event.
    fn emit(&self, event: Event);
    /// The current time, in seconds since the unix epoch.
    fn now(&self) -> u64;
}
