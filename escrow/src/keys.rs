//! The public key of a custody group, as reported by the custody service.
//!
//! Custody services report keys as raw x- and y-coordinates. Deposits need
//! the key in two forms: the P2WPKH script that the funding output must
//! pay to, and a verifier for ECDSA signatures over digests the deposit
//! approved.

use bitcoin::CompressedPublicKey;
use bitcoin::ScriptBuf;
use secp256k1::ecdsa::Signature;
use secp256k1::Message;
use secp256k1::SECP256K1;

use crate::error::Error;

/// The public key type for the secp256k1 elliptic curve.
#[derive(Copy, Clone, Debug, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct PublicKey(secp256k1::PublicKey);

impl From<&secp256k1::PublicKey> for PublicKey {
    fn from(value: &secp256k1::PublicKey) -> Self {
        Self(*value)
    }
}

impl From<&PublicKey> for secp256k1::PublicKey {
    fn from(value: &PublicKey) -> Self {
        value.0
    }
}

impl PublicKey {
    /// Build the key from its affine coordinates.
    ///
    /// This fails if the coordinates are not a point on the curve.
    pub fn from_coordinates(x: &[u8; 32], y: &[u8; 32]) -> Result<Self, Error> {
        let mut uncompressed = [0u8; 65];
        uncompressed[0] = 0x04;
        uncompressed[1..33].copy_from_slice(x);
        uncompressed[33..].copy_from_slice(y);

        secp256k1::PublicKey::from_slice(&uncompressed)
            .map(Self)
            .map_err(Error::InvalidPublicKey)
    }

    /// The affine x- and y-coordinates of the key.
    pub fn coordinates(&self) -> ([u8; 32], [u8; 32]) {
        let full_key: [u8; 65] = self.0.serialize_uncompressed();

        let mut x_part = [0; 32];
        let mut y_part = [0; 32];
        x_part.copy_from_slice(&full_key[1..33]);
        y_part.copy_from_slice(&full_key[33..]);
        (x_part, y_part)
    }

    /// The P2WPKH script locked to this key.
    pub fn signer_script(&self) -> ScriptBuf {
        let wpkh = CompressedPublicKey(self.0).wpubkey_hash();
        ScriptBuf::new_p2wpkh(&wpkh)
    }

    /// Verify a 64-byte compact ECDSA signature over `digest`.
    ///
    /// Signatures with a high S value are normalized first, since they
    /// are equally valid as far as the curve math is concerned.
    pub fn verify_digest(&self, digest: &[u8; 32], signature: &[u8; 64]) -> Result<(), Error> {
        let mut signature = Signature::from_compact(signature).map_err(Error::InvalidSignature)?;
        signature.normalize_s();

        let msg = Message::from_digest(*digest);
        SECP256K1
            .verify_ecdsa(&msg, &signature, &self.0)
            .map_err(Error::InvalidSignature)
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
