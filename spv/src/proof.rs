//! The evidence that a transaction was confirmed on the bitcoin chain.

use bitcoin::Txid;
use serde::Deserialize;
use serde::Serialize;

use crate::btc_utils;
use crate::btc_utils::ChainSummary;
use crate::error::Error;
use crate::relay::RelayVerifier;

/// A transaction split into its legacy serialization fields, along with a
/// merkle proof of its inclusion in the first of a chain of headers.
///
/// Byte fields are hex encoded when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInclusionProof {
    /// The 4-byte little-endian transaction version.
    #[serde(with = "hex_bytes")]
    pub version: [u8; 4],
    /// The compact-size prefixed vector of inputs, without witness data.
    #[serde(with = "hex_bytes")]
    pub tx_input_vector: Vec<u8>,
    /// The compact-size prefixed vector of outputs.
    #[serde(with = "hex_bytes")]
    pub tx_output_vector: Vec<u8>,
    /// The 4-byte little-endian lock time.
    #[serde(with = "hex_bytes")]
    pub tx_locktime: [u8; 4],
    /// The sibling hashes from the transaction up to the merkle root.
    #[serde(with = "hex_bytes")]
    pub merkle_proof: Vec<u8>,
    /// The position of the transaction in its block.
    pub tx_index_in_block: u64,
    /// Concatenated 80-byte headers, starting with the block that holds
    /// the transaction.
    #[serde(with = "hex_bytes")]
    pub bitcoin_headers: Vec<u8>,
}

/// The outcome of a successful [`TxInclusionProof::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedInclusion {
    /// The ID of the proven transaction.
    pub txid: Txid,
    /// The header chain that confirms it.
    pub chain: ChainSummary,
}

impl TxInclusionProof {
    /// The ID of the transaction described by this proof.
    pub fn txid(&self) -> Txid {
        btc_utils::hash_transaction(
            self.version,
            &self.tx_input_vector,
            &self.tx_output_vector,
            self.tx_locktime,
        )
    }

    /// Check that the transaction is included in the first header and
    /// that the header chain satisfies the verifier's policy.
    pub fn verify(&self, verifier: &RelayVerifier) -> Result<VerifiedInclusion, Error> {
        let headers = btc_utils::parse_headers(&self.bitcoin_headers)?;
        let txid = self.txid();
        let merkle_root = headers[0].merkle_root;

        if !btc_utils::verify_merkle_proof(txid, &self.merkle_proof, merkle_root, self.tx_index_in_block) {
            tracing::debug!(%txid, %merkle_root, "merkle proof rejected");
            return Err(Error::InvalidMerkleProof(txid));
        }

        let chain = verifier.evaluate(&self.bitcoin_headers)?;
        Ok(VerifiedInclusion { txid, chain })
    }
}

/// Serde helpers for byte fields encoded as hex strings.
pub mod hex_bytes {
    use serde::de::Error as _;
    use serde::Deserialize as _;
    use serde::Deserializer;
    use serde::Serializer;

    /// Serialize bytes as a lowercase hex string.
    pub fn serialize<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    /// Deserialize bytes from a hex string, rejecting strings that decode
    /// to the wrong length for the target type.
    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: TryFrom<Vec<u8>>,
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(encoded.trim_start_matches("0x")).map_err(D::Error::custom)?;
        let length = bytes.len();
        T::try_from(bytes).map_err(|_| D::Error::custom(format!("unexpected byte length {length}")))
    }
}
