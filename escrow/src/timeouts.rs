//! Deadlines of the deposit lifecycle.
//!
//! Nothing here runs on a timer. [`expired_transition`] is a pure function
//! of the deposit's state, its recorded timestamps and the current time,
//! and deposits call it only when somebody asks them to check.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::config::DepositConfig;
use crate::state::DepositState;

/// The timestamps, in seconds since the unix epoch, that start the clocks
/// of the deadlines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timers {
    /// When the deposit was initialized.
    pub created_at: Option<u64>,
    /// When the custody group was requested.
    pub signing_group_requested_at: Option<u64>,
    /// When the custody group's key was registered, which starts the
    /// funding clock.
    pub funding_proof_started_at: Option<u64>,
    /// When the funding proof was accepted.
    pub funded_at: Option<u64>,
    /// When the current courtesy call started.
    pub courtesy_call_initiated_at: Option<u64>,
    /// When the redemption was requested. Both redemption deadlines count
    /// from here.
    pub withdrawal_requested_at: Option<u64>,
}

/// The state a deposit moves to if the deadline of its current state has
/// passed at time `now`, or `None` if it has not.
///
/// A deadline passes strictly after `start + timeout`. States without a
/// deadline, and states whose clock never started, never time out.
pub fn expired_transition(
    state: DepositState,
    timers: &Timers,
    config: &DepositConfig,
    now: u64,
) -> Option<DepositState> {
    let (started_at, timeout, next) = deadline(state, timers, config)?;
    let deadline = started_at?.saturating_add(timeout.as_secs());
    (now > deadline).then_some(next)
}

/// Whether the state has a deadline at all.
pub fn has_deadline(state: DepositState) -> bool {
    matches!(
        state,
        DepositState::AwaitingSignerSetup
            | DepositState::AwaitingBtcFundingProof
            | DepositState::CourtesyCall
            | DepositState::AwaitingWithdrawalSignature
            | DepositState::AwaitingWithdrawalProof
    )
}

fn deadline(
    state: DepositState,
    timers: &Timers,
    config: &DepositConfig,
) -> Option<(Option<u64>, Duration, DepositState)> {
    let deadline = match state {
        DepositState::AwaitingSignerSetup => (
            timers.signing_group_requested_at,
            config.signing_group_formation_timeout,
            DepositState::FailedSetup,
        ),
        DepositState::AwaitingBtcFundingProof => (
            timers.funding_proof_started_at,
            config.funding_proof_timeout,
            DepositState::FundingTimedOut,
        ),
        DepositState::CourtesyCall => (
            timers.courtesy_call_initiated_at,
            config.courtesy_call_timeout,
            DepositState::Liquidated,
        ),
        DepositState::AwaitingWithdrawalSignature => (
            timers.withdrawal_requested_at,
            config.redemption_signature_timeout,
            DepositState::Liquidated,
        ),
        DepositState::AwaitingWithdrawalProof => (
            timers.withdrawal_requested_at,
            config.redemption_proof_timeout,
            DepositState::Liquidated,
        ),
        _ => return None,
    };
    Some(deadline)
}
