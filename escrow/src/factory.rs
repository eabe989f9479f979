//! Creation of new deposits.
//!
//! The factory owns no deposit state. Each deposit it creates is a fresh
//! record in the [`DepositRegistry`], and the template is just one more
//! record that clones never read from.

use crate::context::Context;
use crate::deposit;
use crate::deposit::Deposit;
use crate::error::Error;
use crate::events::Event;
use crate::registry::ContractAddress;
use crate::registry::DepositRegistry;

/// Creates deposits at derived addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositFactory {
    address: ContractAddress,
    template: ContractAddress,
    nonce: u64,
}

impl DepositFactory {
    /// A factory at `address`. Its template deposit is registered right
    /// away, uninitialized.
    pub fn new(address: ContractAddress, registry: &mut DepositRegistry) -> Result<Self, Error> {
        let mut factory = Self { address, template: address, nonce: 0 };

        let (nonce, template) = factory.next_free_address(registry);
        registry
            .insert(Deposit::new(template))
            .map_err(|rejected| Error::AddressCollision(rejected.address()))?;

        factory.template = template;
        factory.nonce = nonce + 1;
        tracing::debug!(factory_address = %address, template_address = %template, "registered deposit template");
        Ok(factory)
    }

    /// The address of the factory.
    pub fn address(&self) -> ContractAddress {
        self.address
    }

    /// The address of the template deposit.
    pub fn template_address(&self) -> ContractAddress {
        self.template
    }

    /// Create and initialize a deposit for `lot_size` satoshis, paying
    /// `fee` for its custody group.
    ///
    /// The lot size and fee are checked before anything is created, and
    /// a rejected request leaves the registry untouched.
    #[tracing::instrument(skip_all, fields(factory_address = %self.address, lot_size = lot_size, fee = fee))]
    pub fn create_deposit<C: Context>(
        &mut self,
        ctx: &C,
        registry: &mut DepositRegistry,
        lot_size: u64,
        fee: u64,
    ) -> Result<ContractAddress, Error> {
        if let Err(error) = deposit::check_creation_request(ctx, lot_size, fee) {
            tracing::warn!(%error, "rejected deposit creation");
            return Err(error);
        }

        let (nonce, address) = self.next_free_address(registry);
        let mut clone = Deposit::new(address);
        clone.initialize(ctx, lot_size, fee)?;
        registry
            .insert(clone)
            .map_err(|rejected| Error::AddressCollision(rejected.address()))?;
        self.nonce = nonce + 1;

        tracing::info!(deposit_address = %address, "created deposit clone");
        ctx.emit(Event::DepositCloneCreated { deposit_address: address });
        Ok(address)
    }

    fn next_free_address(&self, registry: &DepositRegistry) -> (u64, ContractAddress) {
        let mut nonce = self.nonce;
        loop {
            let address = ContractAddress::derive(&self.address, nonce);
            if !registry.contains(&address) {
                return (nonce, address);
            }
            nonce = nonce.wrapping_add(1);
        }
    }
}
