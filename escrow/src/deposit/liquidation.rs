//! Collateral monitoring and fraud proofs.

use bitcoin::hashes::sha256d;
use bitcoin::hashes::Hash as _;

use super::Deposit;
use crate::context::Context;
use crate::custody::CustodyService as _;
use crate::error::Error;
use crate::events::Event;
use crate::price;
use crate::price::PriceFeed as _;
use crate::state::DepositState;

impl Deposit {
    /// The value of the custody group's bonds as a percentage of the
    /// value of the lot, at the current price.
    pub fn collateralization_percent<C: Context>(&self, ctx: &C) -> Result<u128, Error> {
        let handle = self.require_custody("collateralization_percent")?;
        let bonded_value = ctx.custody().bonded_value(handle)?;
        let satoshi_price = ctx.price_feed().satoshi_price()?;
        Ok(price::collateralization_percent(bonded_value, self.lot_size_sats, satoshi_price))
    }

    /// Start a courtesy call on an active deposit whose collateralization
    /// dropped below the undercollateralized threshold.
    #[tracing::instrument(skip_all, fields(deposit_address = %self.address))]
    pub fn notify_courtesy_call<C: Context>(&mut self, ctx: &C) -> Result<(), Error> {
        const OPERATION: &str = "notify_courtesy_call";
        self.ensure_state(OPERATION, &[DepositState::Active])?;
        self.ensure_transition(OPERATION, DepositState::CourtesyCall)?;

        let threshold = ctx.config().collateral.undercollateralized_threshold_percent;
        let collateralization = self.collateralization_percent(ctx)?;
        if collateralization >= u128::from(threshold) {
            return Err(Error::CollateralCheckFailed { collateralization, threshold });
        }

        tracing::info!(collateralization, threshold, "courtesy call started");
        self.timers.courtesy_call_initiated_at = Some(ctx.now());
        self.transition(ctx, DepositState::CourtesyCall);
        Ok(())
    }

    /// End the courtesy call once collateralization recovered to the
    /// undercollateralized threshold.
    #[tracing::instrument(skip_all, fields(deposit_address = %self.address))]
    pub fn exit_courtesy_call<C: Context>(&mut self, ctx: &C) -> Result<(), Error> {
        const OPERATION: &str = "exit_courtesy_call";
        self.ensure_state(OPERATION, &[DepositState::CourtesyCall])?;

        let threshold = ctx.config().collateral.undercollateralized_threshold_percent;
        let collateralization = self.collateralization_percent(ctx)?;
        if collateralization < u128::from(threshold) {
            return Err(Error::CollateralCheckFailed { collateralization, threshold });
        }

        tracing::info!(collateralization, threshold, "courtesy call ended");
        self.timers.courtesy_call_initiated_at = None;
        self.transition(ctx, DepositState::Active);
        Ok(())
    }

    /// Liquidate a deposit whose collateralization dropped below the
    /// severely undercollateralized threshold.
    #[tracing::instrument(skip_all, fields(deposit_address = %self.address))]
    pub fn notify_undercollateralized_liquidation<C: Context>(&mut self, ctx: &C) -> Result<(), Error> {
        const OPERATION: &str = "notify_undercollateralized_liquidation";
        self.ensure_state(OPERATION, &[DepositState::Active, DepositState::CourtesyCall])?;

        let threshold = ctx.config().collateral.severely_undercollateralized_threshold_percent;
        let collateralization = self.collateralization_percent(ctx)?;
        if collateralization >= u128::from(threshold) {
            return Err(Error::CollateralCheckFailed { collateralization, threshold });
        }

        tracing::warn!(collateralization, threshold, "liquidating undercollateralized deposit");
        self.liquidate(ctx)
    }

    /// Accept proof that the custody group signed something the deposit
    /// never approved.
    ///
    /// The signed digest is the double SHA-256 of `preimage`. During setup
    /// the deposit fails; once funded it is liquidated.
    #[tracing::instrument(skip_all, fields(deposit_address = %self.address))]
    pub fn provide_ecdsa_fraud_proof<C: Context>(
        &mut self,
        ctx: &C,
        signature: &[u8; 64],
        preimage: &[u8],
    ) -> Result<(), Error> {
        const OPERATION: &str = "provide_ecdsa_fraud_proof";
        let next = match self.state {
            DepositState::AwaitingBtcFundingProof => DepositState::FailedSetup,
            state if state.is_funded() => DepositState::Liquidated,
            _ => return Err(self.illegal(OPERATION)),
        };
        let signer_pubkey = self.require_signer_pubkey(OPERATION)?;

        let digest = sha256d::Hash::hash(preimage).to_byte_array();
        signer_pubkey.verify_digest(&digest, signature)?;
        if self.is_digest_approved(&digest) {
            return Err(Error::DigestWasApproved(hex::encode(digest)));
        }

        tracing::warn!(digest = %hex::encode(digest), "custody group signed an unapproved digest");
        if next == DepositState::Liquidated {
            self.liquidate(ctx)?;
        } else {
            self.transition(ctx, next);
        }
        ctx.emit(Event::FraudDetected {
            deposit_address: self.address,
            digest: hex::encode(digest),
        });
        Ok(())
    }
}
