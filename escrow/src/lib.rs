#![deny(missing_docs)]

//! # Bitcoin-backed deposit escrow
//!
//! Each [`deposit::Deposit`] tracks one escrow of bitcoin held by an
//! external custody group, from the moment the custody group is asked for
//! a signing key until the bitcoin is either redeemed or liquidated. Every
//! transition is gated by evidence that can be checked independently,
//! such as an SPV proof of the funding transaction or a signature from the
//! custody group's key.
//!
//! Deposits are created by the [`factory::DepositFactory`] and live in a
//! [`registry::DepositRegistry`], where each one owns its state outright.

pub mod config;
pub mod context;
pub mod custody;
pub mod deposit;
pub mod error;
pub mod events;
pub mod factory;
pub mod housekeeping;
pub mod keys;
pub mod ledger;
pub mod logging;
pub mod price;
pub mod registry;
pub mod state;
pub mod timeouts;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
