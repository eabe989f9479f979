//! The arena that owns every deposit's state.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest as _;
use sha2::Sha256;

use crate::deposit::Deposit;
use crate::error::Error;

/// The address that identifies a deposit, a factory or a template.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContractAddress([u8; 20]);

impl ContractAddress {
    /// Wrap raw address bytes.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// The raw address bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Derive the address of the `nonce`-th instance created by `creator`.
    ///
    /// This is the last 20 bytes of `sha256(creator || nonce)`, with the
    /// nonce big-endian encoded.
    pub fn derive(creator: &ContractAddress, nonce: u64) -> Self {
        let digest = Sha256::new_with_prefix(creator.0)
            .chain_update(nonce.to_be_bytes())
            .finalize();

        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Self(bytes)
    }
}

impl std::fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for ContractAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContractAddress({self})")
    }
}

impl std::str::FromStr for ContractAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(s.trim_start_matches("0x"), &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for ContractAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContractAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(serde::de::Error::custom)
    }
}

/// Every deposit instance, keyed by address.
///
/// Each entry is an independent record. Operations look up one entry and
/// mutate only that entry, so no instance can observe another.
#[derive(Debug, Default)]
pub struct DepositRegistry {
    deposits: HashMap<ContractAddress, Deposit>,
}

impl DepositRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an instance exists at the address.
    pub fn contains(&self, address: &ContractAddress) -> bool {
        self.deposits.contains_key(address)
    }

    /// The deposit at the address.
    pub fn get(&self, address: &ContractAddress) -> Result<&Deposit, Error> {
        self.deposits
            .get(address)
            .ok_or(Error::UnknownDeposit(*address))
    }

    /// The deposit at the address, for lifecycle operations.
    pub fn get_mut(&mut self, address: &ContractAddress) -> Result<&mut Deposit, Error> {
        self.deposits
            .get_mut(address)
            .ok_or(Error::UnknownDeposit(*address))
    }

    /// Add a deposit. An existing deposit at the same address is never
    /// replaced; the rejected deposit is handed back instead.
    pub fn insert(&mut self, deposit: Deposit) -> Result<(), Box<Deposit>> {
        let address = deposit.address();
        if self.deposits.contains_key(&address) {
            return Err(Box::new(deposit));
        }
        self.deposits.insert(address, deposit);
        Ok(())
    }

    /// The addresses of every instance, in no particular order.
    pub fn addresses(&self) -> impl Iterator<Item = ContractAddress> + '_ {
        self.deposits.keys().copied()
    }

    /// Every instance, in no particular order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Deposit> + '_ {
        self.deposits.values_mut()
    }

    /// The number of instances, templates included.
    pub fn len(&self) -> usize {
        self.deposits.len()
    }

    /// Whether the registry holds no instances.
    pub fn is_empty(&self) -> bool {
        self.deposits.is_empty()
    }
}
