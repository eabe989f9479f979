//! Returning the deposited bitcoin to a redeemer.
//!
//! A redemption runs in three steps. The redeemer names an output, and
//! the deposit approves the sighash of the transaction that pays it. The
//! custody group then signs that sighash. Finally anyone proves that the
//! signed transaction confirmed, which burns the deposit's claims.

use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash as _;
use bitcoin::sighash::EcdsaSighashType;
use bitcoin::sighash::SighashCache;
use bitcoin::transaction::Version;
use bitcoin::Amount;
use bitcoin::OutPoint;
use bitcoin::Script;
use bitcoin::ScriptBuf;
use bitcoin::Sequence;
use bitcoin::Transaction;
use bitcoin::TxIn;
use bitcoin::TxOut;
use bitcoin::Txid;
use bitcoin::Witness;
use spv::btc_utils;
use spv::proof::TxInclusionProof;
use spv::relay::RelayVerifier;

use super::Deposit;
use super::FundingRecord;
use super::Progress;
use crate::context::Context;
use crate::custody::CustodyResponse;
use crate::custody::CustodyService as _;
use crate::error::Error;
use crate::error::RedemptionProofError;
use crate::events::Event;
use crate::ledger::ClaimLedger as _;
use crate::state::DepositState;

/// A redemption the deposit approved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionRequest {
    /// The value paid to the redeemer in satoshis.
    pub output_value: u64,
    /// The script that the redeemer is paid to.
    pub redeemer_output_script: ScriptBuf,
    /// The sighash of the redemption transaction.
    pub digest: [u8; 32],
    /// When the redemption was requested.
    pub requested_at: u64,
    /// The custody group's signature over `digest`, once accepted.
    pub signature: Option<[u8; 64]>,
}

/// The unsigned transaction that spends the funding output to a single
/// output paying `output_value` to `redeemer_output_script`.
pub fn unsigned_redemption_transaction(
    funding_outpoint: OutPoint,
    output_value: u64,
    redeemer_output_script: &Script,
) -> Transaction {
    Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: funding_outpoint,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ZERO,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(output_value),
            script_pubkey: redeemer_output_script.to_owned(),
        }],
    }
}

/// The BIP-143 sighash, with `SIGHASH_ALL`, that the custody group must
/// sign to spend the funding output to the redeemer.
pub fn redemption_sighash(
    funding: &FundingRecord,
    signer_script: &Script,
    output_value: u64,
    redeemer_output_script: &Script,
) -> Result<[u8; 32], Error> {
    let tx = unsigned_redemption_transaction(funding.outpoint, output_value, redeemer_output_script);
    let sighash = SighashCache::new(&tx)
        .p2wpkh_signature_hash(0, signer_script, Amount::from_sat(funding.utxo_value), EcdsaSighashType::All)
        .map_err(Error::RedemptionSighash)?;
    Ok(sighash.to_byte_array())
}

/// Check that `proof` shows a confirmed transaction that spends exactly
/// the funding outpoint and pays the requested output.
pub fn validate_redemption_proof(
    proof: &TxInclusionProof,
    funding_outpoint: OutPoint,
    request: &RedemptionRequest,
    verifier: &RelayVerifier,
) -> Result<Txid, RedemptionProofError> {
    let inputs = btc_utils::parse_input_vector(&proof.tx_input_vector).map_err(RedemptionProofError::Malformed)?;
    if inputs.len() != 1 {
        return Err(RedemptionProofError::InputCount(inputs.len()));
    }
    let spent = inputs[0].previous_output;
    if spent != funding_outpoint {
        return Err(RedemptionProofError::WrongOutpoint {
            expected: funding_outpoint,
            actual: spent,
        });
    }

    let output =
        btc_utils::extract_output_at_index(&proof.tx_output_vector, 0).map_err(RedemptionProofError::Malformed)?;
    if output.script_pubkey != request.redeemer_output_script {
        return Err(RedemptionProofError::ScriptMismatch {
            expected: request.redeemer_output_script.clone(),
            actual: output.script_pubkey,
        });
    }
    let value = output.value.to_sat();
    if value < request.output_value {
        return Err(RedemptionProofError::ValueBelowRequested {
            value,
            requested: request.output_value,
        });
    }

    Ok(proof.verify(verifier)?.txid)
}

fn is_standard_output_script(script: &Script) -> bool {
    script.is_p2pkh() || script.is_p2sh() || script.is_p2wpkh() || script.is_p2wsh()
}

impl Deposit {
    /// Approve a redemption paying `output_value` satoshis to
    /// `redeemer_output_script`, and ask the custody group to sign it.
    ///
    /// If the custody group signs straight away the deposit moves on to
    /// `AwaitingWithdrawalProof` in the same call. Otherwise callers poll
    /// with [`Deposit::retrieve_redemption_signature`]. Returns the
    /// approved digest.
    #[tracing::instrument(skip_all, fields(deposit_address = %self.address, output_value = output_value))]
    pub fn request_redemption<C: Context>(
        &mut self,
        ctx: &C,
        output_value: u64,
        redeemer_output_script: ScriptBuf,
    ) -> Result<[u8; 32], Error> {
        const OPERATION: &str = "request_redemption";
        self.ensure_transition(OPERATION, DepositState::AwaitingWithdrawalSignature)?;
        let funding = self.require_funding(OPERATION)?;
        let signer_pubkey = self.require_signer_pubkey(OPERATION)?;
        let handle = self.require_custody(OPERATION)?;

        if !is_standard_output_script(&redeemer_output_script) {
            return Err(Error::InvalidRedemptionRequest(
                "the redeemer output script is not a standard output type",
            ));
        }
        if output_value == 0 {
            return Err(Error::InvalidRedemptionRequest("the output value must be positive"));
        }
        let fee = funding.utxo_value.checked_sub(output_value).ok_or(Error::InvalidRedemptionRequest(
            "the output value exceeds the funding output",
        ))?;
        if fee < ctx.config().deposit.min_redemption_fee {
            return Err(Error::InvalidRedemptionRequest(
                "the redemption leaves less than the minimum fee",
            ));
        }

        let digest = redemption_sighash(
            &funding,
            &signer_pubkey.signer_script(),
            output_value,
            &redeemer_output_script,
        )?;
        let response = ctx.custody().request_signature(handle, digest)?;

        let now = ctx.now();
        tracing::info!(digest = %hex::encode(digest), fee, "redemption approved");
        self.approved_digests.insert(digest, now);
        self.redemption = Some(RedemptionRequest {
            output_value,
            redeemer_output_script: redeemer_output_script.clone(),
            digest,
            requested_at: now,
            signature: None,
        });
        self.timers.withdrawal_requested_at = Some(now);
        ctx.emit(Event::RedemptionRequested {
            deposit_address: self.address,
            output_value,
            redeemer_output_script,
            digest: hex::encode(digest),
        });
        self.transition(ctx, DepositState::AwaitingWithdrawalSignature);

        // The request stands even when an immediate answer is unusable; a
        // valid signature can still be polled for or provided.
        if let CustodyResponse::Ready(signature) = response {
            if let Err(error) = self.accept_redemption_signature(ctx, &signature, OPERATION) {
                tracing::warn!(%error, "custody group answered with an unusable signature");
            }
        }
        Ok(digest)
    }

    /// Poll the custody group for its signature over the approved digest.
    #[tracing::instrument(skip_all, fields(deposit_address = %self.address))]
    pub fn retrieve_redemption_signature<C: Context>(&mut self, ctx: &C) -> Result<Progress, Error> {
        const OPERATION: &str = "retrieve_redemption_signature";
        self.ensure_transition(OPERATION, DepositState::AwaitingWithdrawalProof)?;
        let handle = self.require_custody(OPERATION)?;
        let digest = self.redemption.as_ref().map(|request| request.digest).ok_or_else(|| self.illegal(OPERATION))?;

        match ctx.custody().request_signature(handle, digest)? {
            CustodyResponse::Ready(signature) => {
                self.accept_redemption_signature(ctx, &signature, OPERATION)?;
                Ok(Progress::Advanced(self.state))
            }
            CustodyResponse::NotReady => {
                tracing::debug!(%handle, "custody group has not signed yet");
                Ok(Progress::NotReady)
            }
        }
    }

    /// Accept the custody group's signature over the approved digest,
    /// delivered by anyone.
    #[tracing::instrument(skip_all, fields(deposit_address = %self.address))]
    pub fn provide_redemption_signature<C: Context>(&mut self, ctx: &C, signature: &[u8; 64]) -> Result<(), Error> {
        const OPERATION: &str = "provide_redemption_signature";
        self.ensure_transition(OPERATION, DepositState::AwaitingWithdrawalProof)?;
        self.accept_redemption_signature(ctx, signature, OPERATION)
    }

    /// Accept proof that the redemption transaction confirmed, burn the
    /// deposit's claims and close the deposit.
    #[tracing::instrument(skip_all, fields(deposit_address = %self.address))]
    pub fn provide_redemption_proof<C: Context>(&mut self, ctx: &C, proof: &TxInclusionProof) -> Result<(), Error> {
        const OPERATION: &str = "provide_redemption_proof";
        self.ensure_transition(OPERATION, DepositState::Redeemed)?;
        let funding = self.require_funding(OPERATION)?;
        let request = self.redemption.as_ref().ok_or_else(|| self.illegal(OPERATION))?;

        let verifier = RelayVerifier::new(ctx.relay(), ctx.config().deposit.tx_proof_difficulty_factor);
        let txid = validate_redemption_proof(proof, funding.outpoint, request, &verifier).map_err(|error| {
            tracing::warn!(%error, "rejected redemption proof");
            Error::RedemptionProofInvalid(error)
        })?;

        ctx.ledger().burn(self.address, self.lot_size_sats)?;

        tracing::info!(%txid, "redemption transaction proven");
        ctx.emit(Event::Redeemed { deposit_address: self.address, txid });
        self.transition(ctx, DepositState::Redeemed);
        Ok(())
    }

    fn accept_redemption_signature<C: Context>(
        &mut self,
        ctx: &C,
        signature: &[u8; 64],
        operation: &'static str,
    ) -> Result<(), Error> {
        let signer_pubkey = self.require_signer_pubkey(operation)?;
        let digest = self.redemption.as_ref().map(|request| request.digest).ok_or_else(|| self.illegal(operation))?;
        signer_pubkey.verify_digest(&digest, signature)?;

        if let Some(request) = self.redemption.as_mut() {
            request.signature = Some(*signature);
        }
        ctx.emit(Event::GotRedemptionSignature {
            deposit_address: self.address,
            digest: hex::encode(digest),
        });
        self.transition(ctx, DepositState::AwaitingWithdrawalProof);
        Ok(())
    }
}
