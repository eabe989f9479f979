//! Module with testing utility functions.

#![allow(clippy::unwrap_in_result, clippy::unwrap_used, clippy::expect_used)]

pub mod context;
pub mod custody;

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
use bitcoin::WPubkeyHash;
use bitcoin::Witness;
use secp256k1::SecretKey;
use spv::proof::TxInclusionProof;
use spv::testing::fixtures;

use crate::deposit;
use crate::deposit::Deposit;
use crate::deposit::FundingProof;
use crate::deposit::FundingRecord;
use crate::registry::ContractAddress;

pub use context::LedgerEntry;
pub use context::LedgerOperation;
pub use context::TestContext;

/// The fee that the test custody service quotes for a new group.
pub const OPEN_FEE: u64 = 123_456;

/// A lot size that the default configuration allows, 1 BTC.
pub const LOT_SIZE: u64 = 100_000_000;

/// The key that the test custody service publishes in most tests.
pub fn signer_secret_key() -> SecretKey {
    SecretKey::from_slice(&[0x11; 32]).unwrap()
}

/// A P2WPKH script that redemptions pay to.
pub fn redeemer_script() -> ScriptBuf {
    ScriptBuf::new_p2wpkh(&WPubkeyHash::from_byte_array([0x33; 20]))
}

/// A deposit at `address` that requested its custody group.
pub fn initialized_deposit(ctx: &TestContext, address: ContractAddress) -> Deposit {
    let mut deposit = Deposit::new(address);
    deposit.initialize(ctx, LOT_SIZE, OPEN_FEE).unwrap();
    deposit
}

/// An active deposit of [`LOT_SIZE`], funded with a synthetic
/// transaction that pays exactly the lot size. The custody service holds
/// the returned key.
pub fn funded_deposit(ctx: &TestContext) -> (Deposit, SecretKey) {
    let secret_key = signer_secret_key();
    let mut deposit = initialized_deposit(ctx, ContractAddress::new([0xd0; 20]));
    ctx.custody.publish_secret_key(secret_key);
    deposit.retrieve_signer_pubkey(ctx).unwrap();

    let script = deposit.signer_pubkey().unwrap().signer_script();
    let tx = funding_transaction(&script, LOT_SIZE);
    deposit.provide_btc_funding_proof(ctx, &funding_proof(&tx, 0)).unwrap();
    (deposit, secret_key)
}

/// A transaction with one input whose output 0 pays `value` satoshis to
/// `script`.
pub fn funding_transaction(script: &Script, value: u64) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::new(Txid::from_byte_array([0x77; 32]), 2),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(value),
            script_pubkey: script.to_owned(),
        }],
    }
}

/// An inclusion proof for `tx` with six confirmations on a synthetic
/// chain.
pub fn inclusion_proof(tx: &Transaction) -> TxInclusionProof {
    spv::testing::confirm_transaction(tx, 3, 7, 6)
}

/// A funding proof for `tx` with six confirmations on a synthetic chain.
pub fn funding_proof(tx: &Transaction, funding_output_index: u32) -> FundingProof {
    FundingProof {
        transaction: inclusion_proof(tx),
        funding_output_index,
    }
}

/// The mainnet funding proof fixture, pointing at output 0.
pub fn mainnet_funding_proof() -> FundingProof {
    FundingProof {
        transaction: fixtures::mainnet_funding_proof(),
        funding_output_index: 0,
    }
}

/// The coordinates of the key that the mainnet fixture pays to.
pub fn mainnet_signer_coordinates() -> ([u8; 32], [u8; 32]) {
    let x = hex::decode(fixtures::SIGNER_PUBKEY_X).unwrap();
    let y = hex::decode(fixtures::SIGNER_PUBKEY_Y).unwrap();
    (x.try_into().unwrap(), y.try_into().unwrap())
}

/// The BIP-143 preimage whose double SHA-256 is the redemption sighash.
pub fn redemption_preimage(
    funding: &FundingRecord,
    signer_script: &Script,
    output_value: u64,
    redeemer_output_script: &Script,
) -> Vec<u8> {
    let tx = deposit::unsigned_redemption_transaction(funding.outpoint, output_value, redeemer_output_script);
    let script_code = signer_script.p2wpkh_script_code().unwrap();

    let mut preimage = Vec::new();
    SighashCache::new(&tx)
        .segwit_v0_encode_signing_data_to(
            &mut preimage,
            0,
            &script_code,
            Amount::from_sat(funding.utxo_value),
            EcdsaSighashType::All,
        )
        .unwrap();
    preimage
}
