//! A single escrow and the operations of its lifecycle.
//!
//! Every operation follows the same shape. It first checks that the
//! deposit's state allows it, then validates its evidence and talks to
//! the collaborators, and only then records the outcome and moves the
//! state. An operation that returns an error leaves the deposit exactly
//! as it found it.

use std::collections::BTreeMap;

use bitcoin::OutPoint;
use bitcoin::Txid;
use serde::Serialize;

use crate::context::Context;
use crate::custody::CustodyHandle;
use crate::custody::CustodyResponse;
use crate::custody::CustodyService as _;
use crate::error::Error;
use crate::events::Event;
use crate::keys::PublicKey;
use crate::ledger::ClaimLedger as _;
use crate::registry::ContractAddress;
use crate::state::DepositState;
use crate::timeouts;
use crate::timeouts::Timers;

mod funding;
mod liquidation;
mod redemption;

pub use funding::validate_funding_proof;
pub use funding::FundingProof;
pub use funding::ValidatedFunding;
pub use redemption::redemption_sighash;
pub use redemption::unsigned_redemption_transaction;
pub use redemption::validate_redemption_proof;
pub use redemption::RedemptionRequest;

/// The outcome of an operation that polls the custody service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The custody service delivered, and the deposit moved to the given
    /// state.
    Advanced(DepositState),
    /// The custody service has nothing yet. The deposit did not change.
    NotReady,
}

/// The outcome of [`Deposit::notify_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutCheck {
    /// The deadline had passed and the deposit moved.
    Transitioned {
        /// The state whose deadline passed.
        from: DepositState,
        /// The state the deposit moved to.
        to: DepositState,
    },
    /// The current state has a deadline, but it has not passed yet.
    NotElapsed,
    /// The current state has no deadline.
    NoDeadline,
}

/// The confirmed funding output of a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FundingRecord {
    /// The funding transaction.
    pub txid: Txid,
    /// The output that holds the deposited bitcoin.
    pub outpoint: OutPoint,
    /// The value of the funding output in satoshis.
    pub utxo_value: u64,
}

/// One escrow of bitcoin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    address: ContractAddress,
    state: DepositState,
    lot_size_sats: u64,
    custody: Option<CustodyHandle>,
    signer_pubkey: Option<PublicKey>,
    funding: Option<FundingRecord>,
    redemption: Option<RedemptionRequest>,
    /// Digests the deposit asked its custody group to sign, with the time
    /// of approval.
    approved_digests: BTreeMap<[u8; 32], u64>,
    timers: Timers,
}

impl Deposit {
    /// An uninitialized deposit at `address`.
    pub fn new(address: ContractAddress) -> Self {
        Self {
            address,
            state: DepositState::Start,
            lot_size_sats: 0,
            custody: None,
            signer_pubkey: None,
            funding: None,
            redemption: None,
            approved_digests: BTreeMap::new(),
            timers: Timers::default(),
        }
    }

    /// The address of the deposit.
    pub fn address(&self) -> ContractAddress {
        self.address
    }

    /// The current lifecycle state.
    pub fn state(&self) -> DepositState {
        self.state
    }

    /// The lot size in satoshis. Zero until the deposit is initialized.
    pub fn lot_size(&self) -> u64 {
        self.lot_size_sats
    }

    /// The custody group serving this deposit.
    pub fn custody_handle(&self) -> Option<CustodyHandle> {
        self.custody
    }

    /// The custody group's public key, once it was published.
    pub fn signer_pubkey(&self) -> Option<PublicKey> {
        self.signer_pubkey
    }

    /// The funding output, once it was proven.
    pub fn funding(&self) -> Option<&FundingRecord> {
        self.funding.as_ref()
    }

    /// The pending or completed redemption.
    pub fn redemption(&self) -> Option<&RedemptionRequest> {
        self.redemption.as_ref()
    }

    /// The timestamps that drive the deadlines.
    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// Whether the deposit ever asked its custody group to sign `digest`.
    pub fn is_digest_approved(&self, digest: &[u8; 32]) -> bool {
        self.approved_digests.contains_key(digest)
    }

    /// Initialize the deposit: check the lot size and fee, and ask the
    /// custody service for a custody group, forwarding the whole fee.
    #[tracing::instrument(skip_all, fields(deposit_address = %self.address, lot_size = lot_size, fee = fee))]
    pub fn initialize<C: Context>(&mut self, ctx: &C, lot_size: u64, fee: u64) -> Result<(), Error> {
        self.ensure_transition("initialize", DepositState::AwaitingSignerSetup)?;
        check_creation_request(ctx, lot_size, fee)?;

        let handle = ctx.custody().request_signer(lot_size, fee)?;
        tracing::debug!(%handle, "requested a custody group");

        let now = ctx.now();
        self.lot_size_sats = lot_size;
        self.custody = Some(handle);
        self.timers.created_at = Some(now);
        self.timers.signing_group_requested_at = Some(now);
        self.transition(ctx, DepositState::AwaitingSignerSetup);
        Ok(())
    }

    /// Fetch the custody group's public key and start waiting for the
    /// funding transaction.
    #[tracing::instrument(skip_all, fields(deposit_address = %self.address))]
    pub fn retrieve_signer_pubkey<C: Context>(&mut self, ctx: &C) -> Result<Progress, Error> {
        const OPERATION: &str = "retrieve_signer_pubkey";
        self.ensure_transition(OPERATION, DepositState::AwaitingBtcFundingProof)?;
        let handle = self.require_custody(OPERATION)?;

        let (x, y) = match ctx.custody().public_key(handle)? {
            CustodyResponse::Ready(coordinates) => coordinates,
            CustodyResponse::NotReady => {
                tracing::debug!(%handle, "custody group has not published a key yet");
                return Ok(Progress::NotReady);
            }
        };
        let signer_pubkey = PublicKey::from_coordinates(&x, &y)?;

        self.signer_pubkey = Some(signer_pubkey);
        self.timers.funding_proof_started_at = Some(ctx.now());
        ctx.emit(Event::RegisteredPubkey {
            deposit_address: self.address,
            signing_group_pubkey_x: hex::encode(x),
            signing_group_pubkey_y: hex::encode(y),
        });
        self.transition(ctx, DepositState::AwaitingBtcFundingProof);
        Ok(Progress::Advanced(self.state))
    }

    /// Apply the deadline of the current state if it has passed.
    ///
    /// Anyone may call this at any time. Nothing happens unless the
    /// deadline has passed.
    #[tracing::instrument(skip_all, fields(deposit_address = %self.address))]
    pub fn notify_timeout<C: Context>(&mut self, ctx: &C) -> Result<TimeoutCheck, Error> {
        if !timeouts::has_deadline(self.state) {
            return Ok(TimeoutCheck::NoDeadline);
        }

        let from = self.state;
        let Some(to) = timeouts::expired_transition(from, &self.timers, &ctx.config().deposit, ctx.now()) else {
            return Ok(TimeoutCheck::NotElapsed);
        };

        tracing::info!(%from, %to, "deadline passed");
        if to == DepositState::Liquidated {
            self.liquidate(ctx)?;
        } else {
            self.transition(ctx, to);
        }
        Ok(TimeoutCheck::Transitioned { from, to })
    }

    fn ensure_transition(&self, operation: &'static str, next: DepositState) -> Result<(), Error> {
        if self.state.can_transition_to(next) {
            return Ok(());
        }
        Err(self.illegal(operation))
    }

    fn ensure_state(&self, operation: &'static str, allowed: &[DepositState]) -> Result<(), Error> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(self.illegal(operation))
    }

    fn illegal(&self, operation: &'static str) -> Error {
        Error::IllegalStateTransition { operation, state: self.state }
    }

    fn require_custody(&self, operation: &'static str) -> Result<CustodyHandle, Error> {
        self.custody.ok_or_else(|| self.illegal(operation))
    }

    fn require_signer_pubkey(&self, operation: &'static str) -> Result<PublicKey, Error> {
        self.signer_pubkey.ok_or_else(|| self.illegal(operation))
    }

    fn require_funding(&self, operation: &'static str) -> Result<FundingRecord, Error> {
        self.funding.ok_or_else(|| self.illegal(operation))
    }

    /// Settle the claims of a funded deposit and move it to
    /// [`DepositState::Liquidated`].
    fn liquidate<C: Context>(&mut self, ctx: &C) -> Result<(), Error> {
        if self.state.is_funded() {
            ctx.ledger().settle_liquidation(self.address, self.lot_size_sats)?;
        }
        self.transition(ctx, DepositState::Liquidated);
        Ok(())
    }

    fn transition<C: Context>(&mut self, ctx: &C, new_state: DepositState) {
        let old_state = self.state;
        debug_assert!(old_state.can_transition_to(new_state));

        self.state = new_state;
        tracing::info!(
            deposit_address = %self.address,
            %old_state,
            %new_state,
            "deposit changed state"
        );
        ctx.emit(Event::StateTransition {
            deposit_address: self.address,
            old_state,
            new_state,
        });
    }
}

/// Check the lot size and fee of a request for a new deposit.
pub(crate) fn check_creation_request<C: Context>(ctx: &C, lot_size: u64, fee: u64) -> Result<(), Error> {
    if !ctx.config().deposit.is_allowed_lot_size(lot_size) {
        return Err(Error::UnsupportedLotSize(lot_size));
    }

    let required = ctx.custody().open_fee();
    if fee < required {
        return Err(Error::InsufficientFee { provided: fee, required });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::testing;
    use crate::testing::TestContext;
    use crate::testing::LOT_SIZE;

    #[test]
    fn new_deposits_start_empty() {
        let deposit = Deposit::new(ContractAddress::new([1; 20]));
        assert_eq!(deposit.state(), DepositState::Start);
        assert_eq!(deposit.lot_size(), 0);
        assert!(deposit.custody_handle().is_none());
        assert!(deposit.funding().is_none());
        assert_eq!(deposit.timers(), &Timers::default());
    }

    #[test]
    fn initialize_requests_a_custody_group() {
        let ctx = TestContext::new();
        ctx.set_time(1_000);
        let mut deposit = Deposit::new(ContractAddress::new([1; 20]));

        deposit.initialize(&ctx, LOT_SIZE, testing::OPEN_FEE).unwrap();

        assert_eq!(deposit.state(), DepositState::AwaitingSignerSetup);
        assert_eq!(deposit.lot_size(), LOT_SIZE);
        assert_eq!(deposit.timers().signing_group_requested_at, Some(1_000));
        assert_eq!(ctx.custody.fees_received(), vec![testing::OPEN_FEE]);
        assert_eq!(
            ctx.transitions_of(deposit.address()),
            vec![(DepositState::Start, DepositState::AwaitingSignerSetup)]
        );
    }

    #[test_case(LOT_SIZE + 1, testing::OPEN_FEE; "unsupported lot size")]
    #[test_case(LOT_SIZE, testing::OPEN_FEE - 1; "fee below quote")]
    fn rejected_initialization_changes_nothing(lot_size: u64, fee: u64) {
        let ctx = TestContext::new();
        let mut deposit = Deposit::new(ContractAddress::new([1; 20]));
        let before = deposit.clone();

        assert!(deposit.initialize(&ctx, lot_size, fee).is_err());
        assert_eq!(deposit, before);
        assert!(ctx.custody.groups().is_empty());
        assert!(ctx.events().is_empty());
    }

    #[test]
    fn initialize_twice_is_illegal() {
        let ctx = TestContext::new();
        let mut deposit = testing::initialized_deposit(&ctx, ContractAddress::new([1; 20]));

        let err = deposit.initialize(&ctx, LOT_SIZE, testing::OPEN_FEE).unwrap_err();
        assert!(matches!(
            err,
            Error::IllegalStateTransition {
                operation: "initialize",
                state: DepositState::AwaitingSignerSetup,
            }
        ));
    }

    #[test]
    fn signer_pubkey_is_polled_until_published() {
        let ctx = TestContext::new();
        let mut deposit = testing::initialized_deposit(&ctx, ContractAddress::new([1; 20]));

        assert_eq!(deposit.retrieve_signer_pubkey(&ctx).unwrap(), Progress::NotReady);
        assert_eq!(deposit.state(), DepositState::AwaitingSignerSetup);

        let secret_key = testing::signer_secret_key();
        ctx.custody.publish_secret_key(secret_key);
        ctx.set_time(5_000);
        assert_eq!(
            deposit.retrieve_signer_pubkey(&ctx).unwrap(),
            Progress::Advanced(DepositState::AwaitingBtcFundingProof)
        );

        let expected = PublicKey::from(&secret_key.public_key(secp256k1::SECP256K1));
        assert_eq!(deposit.signer_pubkey(), Some(expected));
        assert_eq!(deposit.timers().funding_proof_started_at, Some(5_000));

        let (x, y) = expected.coordinates();
        assert!(ctx.events().contains(&Event::RegisteredPubkey {
            deposit_address: deposit.address(),
            signing_group_pubkey_x: hex::encode(x),
            signing_group_pubkey_y: hex::encode(y),
        }));
    }

    #[test]
    fn keys_off_the_curve_are_rejected() {
        let ctx = TestContext::new();
        let mut deposit = testing::initialized_deposit(&ctx, ContractAddress::new([1; 20]));
        ctx.custody.publish_coordinates([0; 32], [0; 32]);

        let err = deposit.retrieve_signer_pubkey(&ctx).unwrap_err();
        assert!(matches!(err, Error::InvalidPublicKey(_)));
        assert_eq!(deposit.state(), DepositState::AwaitingSignerSetup);
        assert!(deposit.signer_pubkey().is_none());
    }

    #[test]
    fn timeouts_without_a_deadline_do_nothing() {
        let ctx = TestContext::new();
        let mut deposit = Deposit::new(ContractAddress::new([1; 20]));
        assert_eq!(deposit.notify_timeout(&ctx).unwrap(), TimeoutCheck::NoDeadline);

        let (mut deposit, _) = testing::funded_deposit(&ctx);
        ctx.advance_clock(u64::from(u32::MAX));
        assert_eq!(deposit.notify_timeout(&ctx).unwrap(), TimeoutCheck::NoDeadline);
        assert_eq!(deposit.state(), DepositState::Active);
    }

    #[test]
    fn signer_setup_times_out() {
        let ctx = TestContext::new();
        let mut deposit = testing::initialized_deposit(&ctx, ContractAddress::new([1; 20]));
        let timeout = ctx.config.deposit.signing_group_formation_timeout.as_secs();

        ctx.advance_clock(timeout);
        assert_eq!(deposit.notify_timeout(&ctx).unwrap(), TimeoutCheck::NotElapsed);

        ctx.advance_clock(1);
        assert_eq!(
            deposit.notify_timeout(&ctx).unwrap(),
            TimeoutCheck::Transitioned {
                from: DepositState::AwaitingSignerSetup,
                to: DepositState::FailedSetup,
            }
        );
        assert_eq!(deposit.state(), DepositState::FailedSetup);
        assert!(ctx.ledger.entries().is_empty());
    }
}
