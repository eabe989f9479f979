//! Proof that the depositor sent bitcoin to the custody group.

use bitcoin::OutPoint;
use bitcoin::Script;
use bitcoin::Txid;
use serde::Deserialize;
use serde::Serialize;
use spv::btc_utils;
use spv::btc_utils::ChainSummary;
use spv::proof::TxInclusionProof;
use spv::relay::RelayVerifier;

use super::Deposit;
use super::FundingRecord;
use crate::context::Context;
use crate::error::Error;
use crate::error::FundingProofError;
use crate::events::Event;
use crate::ledger::ClaimLedger as _;
use crate::state::DepositState;

/// An inclusion proof of a funding transaction, together with the index
/// of the output that pays the custody group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingProof {
    /// The funding transaction and the evidence of its confirmation.
    #[serde(flatten)]
    pub transaction: TxInclusionProof,
    /// The index of the output that pays the custody group.
    pub funding_output_index: u32,
}

impl FundingProof {
    /// Assemble a funding proof from its parts.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        version: [u8; 4],
        tx_input_vector: Vec<u8>,
        tx_output_vector: Vec<u8>,
        tx_locktime: [u8; 4],
        funding_output_index: u32,
        merkle_proof: Vec<u8>,
        tx_index_in_block: u64,
        bitcoin_headers: Vec<u8>,
    ) -> Self {
        Self {
            transaction: TxInclusionProof {
                version,
                tx_input_vector,
                tx_output_vector,
                tx_locktime,
                merkle_proof,
                tx_index_in_block,
                bitcoin_headers,
            },
            funding_output_index,
        }
    }
}

/// A funding proof that passed every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedFunding {
    /// The funding transaction.
    pub txid: Txid,
    /// The funding output.
    pub outpoint: OutPoint,
    /// The value of the funding output in satoshis.
    pub utxo_value: u64,
    /// The header chain that confirms the transaction.
    pub chain: ChainSummary,
}

/// Check a funding proof without touching any deposit.
///
/// The funding output must pay at least `lot_size` satoshis and, when
/// `expected_script` is given, must pay to exactly that script. The
/// transaction must then be included in the first header, and the header
/// chain must satisfy `verifier`.
pub fn validate_funding_proof(
    proof: &FundingProof,
    expected_script: Option<&Script>,
    lot_size: u64,
    verifier: &RelayVerifier,
) -> Result<ValidatedFunding, FundingProofError> {
    let tx = &proof.transaction;
    btc_utils::parse_input_vector(&tx.tx_input_vector).map_err(FundingProofError::Malformed)?;

    let output = btc_utils::extract_output_at_index(&tx.tx_output_vector, proof.funding_output_index as usize)
        .map_err(FundingProofError::Malformed)?;

    if let Some(expected) = expected_script {
        if output.script_pubkey.as_script() != expected {
            return Err(FundingProofError::ScriptMismatch {
                expected: expected.to_owned(),
                actual: output.script_pubkey,
            });
        }
    }

    let utxo_value = output.value.to_sat();
    if utxo_value < lot_size {
        return Err(FundingProofError::ValueBelowLotSize { value: utxo_value, lot_size });
    }

    let verified = tx.verify(verifier)?;
    Ok(ValidatedFunding {
        txid: verified.txid,
        outpoint: OutPoint::new(verified.txid, proof.funding_output_index),
        utxo_value,
        chain: verified.chain,
    })
}

impl Deposit {
    /// Accept proof that the funding transaction confirmed, mint the
    /// deposit's claims and activate the deposit.
    #[tracing::instrument(skip_all, fields(deposit_address = %self.address))]
    pub fn provide_btc_funding_proof<C: Context>(&mut self, ctx: &C, proof: &FundingProof) -> Result<(), Error> {
        const OPERATION: &str = "provide_btc_funding_proof";
        self.ensure_transition(OPERATION, DepositState::Active)?;
        let signer_pubkey = self.require_signer_pubkey(OPERATION)?;

        let verifier = RelayVerifier::new(ctx.relay(), ctx.config().deposit.tx_proof_difficulty_factor);
        let signer_script = signer_pubkey.signer_script();
        let funding = validate_funding_proof(proof, Some(&signer_script), self.lot_size_sats, &verifier)
            .map_err(|error| {
                tracing::warn!(%error, "rejected funding proof");
                Error::FundingProofInvalid(error)
            })?;

        ctx.ledger().mint(self.address, self.lot_size_sats)?;

        tracing::info!(
            txid = %funding.txid,
            utxo_value = funding.utxo_value,
            confirmations = funding.chain.header_count,
            "funding transaction proven"
        );
        self.funding = Some(FundingRecord {
            txid: funding.txid,
            outpoint: funding.outpoint,
            utxo_value: funding.utxo_value,
        });
        self.timers.funded_at = Some(ctx.now());
        ctx.emit(Event::Funded {
            deposit_address: self.address,
            txid: funding.txid,
            outpoint: funding.outpoint,
            utxo_value: funding.utxo_value,
        });
        self.transition(ctx, DepositState::Active);
        Ok(())
    }
}
