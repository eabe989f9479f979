//! The deposit lifecycle states and the table of legal transitions.

use serde::Deserialize;
use serde::Serialize;

/// The lifecycle state of a deposit.
///
/// The happy path runs from [`DepositState::Start`] to
/// [`DepositState::Redeemed`]. [`DepositState::FailedSetup`],
/// [`DepositState::FundingTimedOut`] and [`DepositState::Liquidated`] are
/// the failure terminals.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositState {
    /// Not yet initialized. Only a template stays here.
    Start,
    /// Waiting for the custody group to produce a public key.
    AwaitingSignerSetup,
    /// Waiting for proof that bitcoin was sent to the custody group.
    AwaitingBtcFundingProof,
    /// The custody group failed to form or was caught signing something
    /// it should not have during setup.
    FailedSetup,
    /// No funding proof arrived in time.
    FundingTimedOut,
    /// Funded and backing minted claim tokens.
    Active,
    /// Funded, but collateralization dropped below the courtesy
    /// threshold. Redemption is still possible.
    CourtesyCall,
    /// A redemption was requested and the custody group has to sign the
    /// redemption transaction.
    AwaitingWithdrawalSignature,
    /// The redemption transaction is signed and must be confirmed on
    /// bitcoin.
    AwaitingWithdrawalProof,
    /// The bitcoin was returned to the redeemer.
    Redeemed,
    /// The custody group misbehaved or the deposit became too
    /// undercollateralized.
    Liquidated,
}

impl DepositState {
    /// The position of the state along the lifecycle.
    ///
    /// [`DepositState::Active`] and [`DepositState::CourtesyCall`] share a
    /// rank. The failure terminals have no rank since they can be entered
    /// from several points of the lifecycle.
    pub fn rank(&self) -> Option<u8> {
        match self {
            DepositState::Start => Some(0),
            DepositState::AwaitingSignerSetup => Some(1),
            DepositState::AwaitingBtcFundingProof => Some(2),
            DepositState::Active | DepositState::CourtesyCall => Some(3),
            DepositState::AwaitingWithdrawalSignature => Some(4),
            DepositState::AwaitingWithdrawalProof => Some(5),
            DepositState::Redeemed => Some(6),
            DepositState::FailedSetup | DepositState::FundingTimedOut | DepositState::Liquidated => None,
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DepositState::Redeemed
                | DepositState::FailedSetup
                | DepositState::FundingTimedOut
                | DepositState::Liquidated
        )
    }

    /// Whether this is one of the failure terminals.
    pub fn is_failure(&self) -> bool {
        self.is_terminal() && self.rank().is_none()
    }

    /// Whether the deposit holds a confirmed funding output in this state.
    pub fn is_funded(&self) -> bool {
        matches!(
            self,
            DepositState::Active
                | DepositState::CourtesyCall
                | DepositState::AwaitingWithdrawalSignature
                | DepositState::AwaitingWithdrawalProof
        )
    }

    /// Whether the transition table allows moving from this state to
    /// `next`.
    pub fn can_transition_to(&self, next: DepositState) -> bool {
        use DepositState::*;

        matches!(
            (self, next),
            (Start, AwaitingSignerSetup)
                | (AwaitingSignerSetup, AwaitingBtcFundingProof)
                | (AwaitingSignerSetup, FailedSetup)
                | (AwaitingBtcFundingProof, Active)
                | (AwaitingBtcFundingProof, FundingTimedOut)
                | (AwaitingBtcFundingProof, FailedSetup)
                | (Active, CourtesyCall)
                | (Active, AwaitingWithdrawalSignature)
                | (Active, Liquidated)
                | (CourtesyCall, Active)
                | (CourtesyCall, AwaitingWithdrawalSignature)
                | (CourtesyCall, Liquidated)
                | (AwaitingWithdrawalSignature, AwaitingWithdrawalProof)
                | (AwaitingWithdrawalSignature, Liquidated)
                | (AwaitingWithdrawalProof, Redeemed)
                | (AwaitingWithdrawalProof, Liquidated)
        )
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator as _;
    use test_case::test_case;

    use super::*;

    #[test]
    fn transitions_never_move_backward() {
        for from in DepositState::iter() {
            for to in DepositState::iter().filter(|to| from.can_transition_to(*to)) {
                match (from.rank(), to.rank()) {
                    (Some(old), Some(new)) => assert!(new >= old, "{from} -> {to}"),
                    (Some(_), None) => assert!(to.is_failure()),
                    (None, _) => panic!("{from} is terminal but can move to {to}"),
                }
            }
        }
    }

    #[test]
    fn terminal_states_have_no_successors() {
        for from in DepositState::iter().filter(DepositState::is_terminal) {
            assert!(DepositState::iter().all(|to| !from.can_transition_to(to)));
        }
    }

    #[test]
    fn equal_rank_moves_are_only_the_courtesy_call() {
        for from in DepositState::iter() {
            for to in DepositState::iter().filter(|to| from.can_transition_to(*to)) {
                if from.rank().is_some() && from.rank() == to.rank() {
                    assert!(matches!(
                        (from, to),
                        (DepositState::Active, DepositState::CourtesyCall)
                            | (DepositState::CourtesyCall, DepositState::Active)
                    ));
                }
            }
        }
    }

    #[test_case(DepositState::AwaitingBtcFundingProof, "AWAITING_BTC_FUNDING_PROOF")]
    #[test_case(DepositState::CourtesyCall, "COURTESY_CALL")]
    fn display_matches_serde(state: DepositState, expected: &str) {
        assert_eq!(state.to_string(), expected);
        assert_eq!(serde_json::to_string(&state).unwrap(), format!("\"{expected}\""));
    }
}
