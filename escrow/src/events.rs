//! The events that deposits and the factory emit.

use bitcoin::OutPoint;
use bitcoin::ScriptBuf;
use bitcoin::Txid;
use serde::Serialize;

use crate::registry::ContractAddress;
use crate::state::DepositState;

/// Observable outcomes of lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// The factory created and initialized a new deposit.
    DepositCloneCreated {
        /// Address of the new deposit.
        deposit_address: ContractAddress,
    },
    /// A deposit moved from one state to another.
    StateTransition {
        /// Address of the deposit.
        deposit_address: ContractAddress,
        /// The state before the transition.
        old_state: DepositState,
        /// The state after the transition.
        new_state: DepositState,
    },
    /// The custody group's public key was recorded.
    RegisteredPubkey {
        /// Address of the deposit.
        deposit_address: ContractAddress,
        /// Hex-encoded x-coordinate.
        signing_group_pubkey_x: String,
        /// Hex-encoded y-coordinate.
        signing_group_pubkey_y: String,
    },
    /// The funding transaction was proven.
    Funded {
        /// Address of the deposit.
        deposit_address: ContractAddress,
        /// ID of the funding transaction.
        txid: Txid,
        /// The funding output.
        outpoint: OutPoint,
        /// Value of the funding output in satoshis.
        utxo_value: u64,
    },
    /// A redemption was requested.
    RedemptionRequested {
        /// Address of the deposit.
        deposit_address: ContractAddress,
        /// The value paid to the redeemer in satoshis.
        output_value: u64,
        /// The script that the redeemer is paid to.
        redeemer_output_script: ScriptBuf,
        /// The sighash the custody group must sign, hex encoded.
        digest: String,
    },
    /// The custody group's signature over the redemption digest was
    /// accepted.
    GotRedemptionSignature {
        /// Address of the deposit.
        deposit_address: ContractAddress,
        /// The signed digest, hex encoded.
        digest: String,
    },
    /// The redemption transaction was proven.
    Redeemed {
        /// Address of the deposit.
        deposit_address: ContractAddress,
        /// ID of the redemption transaction.
        txid: Txid,
    },
    /// The custody group signed a digest that the deposit never approved.
    FraudDetected {
        /// Address of the deposit.
        deposit_address: ContractAddress,
        /// The fraudulently signed digest, hex encoded.
        digest: String,
    },
}
