//! Test Context implementation

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use spv::relay::DifficultyRelay;

use crate::config::Settings;
use crate::context::Context;
use crate::error::Error;
use crate::events::Event;
use crate::ledger::ClaimLedger;
use crate::price::PriceFeed;
use crate::registry::ContractAddress;
use crate::state::DepositState;
use crate::testing::custody::TestCustody;
use crate::testing::OPEN_FEE;

/// A [`Context`] with in-memory collaborators.
///
/// Every collaborator is a public field, so tests can change its behavior
/// between operations.
pub struct TestContext {
    /// The settings, loaded from the default configuration file.
    pub config: Settings,
    /// The custody service.
    pub custody: TestCustody,
    /// The difficulty relay.
    pub relay: StaticRelay,
    /// The claim ledger.
    pub ledger: TestLedger,
    /// The price feed.
    pub price_feed: FixedPriceFeed,
    events: Mutex<Vec<Event>>,
    clock: AtomicU64,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// Create a new test context with the default settings.
    pub fn new() -> Self {
        Self::with_settings(Settings::new_from_default_config().unwrap())
    }

    /// Create a new test context with the given settings.
    pub fn with_settings(config: Settings) -> Self {
        Self {
            config,
            custody: TestCustody::new(OPEN_FEE),
            relay: StaticRelay::new(0, 0),
            ledger: TestLedger::default(),
            price_feed: FixedPriceFeed::new(1),
            events: Mutex::new(Vec::new()),
            clock: AtomicU64::new(1_700_000_000),
        }
    }

    /// Set the clock.
    pub fn set_time(&self, now: u64) {
        self.clock.store(now, Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance_clock(&self, seconds: u64) {
        self.clock.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Every event emitted so far, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// The state transitions of one deposit, oldest first.
    pub fn transitions_of(&self, address: ContractAddress) -> Vec<(DepositState, DepositState)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::StateTransition { deposit_address, old_state, new_state } if deposit_address == address => {
                    Some((old_state, new_state))
                }
                _ => None,
            })
            .collect()
    }
}

impl Context for TestContext {
    fn config(&self) -> &Settings {
        &self.config
    }

    fn custody(&self) -> &impl crate::custody::CustodyService {
        &self.custody
    }

    fn relay(&self) -> &impl DifficultyRelay {
        &self.relay
    }

    fn ledger(&self) -> &impl ClaimLedger {
        &self.ledger
    }

    fn price_feed(&self) -> &impl PriceFeed {
        &self.price_feed
    }

    fn emit(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn now(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }
}

/// A relay that reports whatever difficulties it was last given.
#[derive(Debug)]
pub struct StaticRelay {
    difficulties: Mutex<(u128, u128)>,
}

impl StaticRelay {
    /// A relay reporting the given epoch difficulties.
    pub fn new(previous: u128, current: u128) -> Self {
        Self { difficulties: Mutex::new((previous, current)) }
    }

    /// Change the reported difficulties.
    pub fn set(&self, previous: u128, current: u128) {
        *self.difficulties.lock().unwrap() = (previous, current);
    }
}

impl DifficultyRelay for StaticRelay {
    fn current_epoch_difficulty(&self) -> u128 {
        self.difficulties.lock().unwrap().1
    }

    fn previous_epoch_difficulty(&self) -> u128 {
        self.difficulties.lock().unwrap().0
    }
}

/// The kind of a ledger notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOperation {
    /// [`ClaimLedger::mint`]
    Mint,
    /// [`ClaimLedger::burn`]
    Burn,
    /// [`ClaimLedger::settle_liquidation`]
    SettleLiquidation,
}

/// One ledger notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    /// What the deposit asked for.
    pub operation: LedgerOperation,
    /// The deposit that asked.
    pub deposit: ContractAddress,
    /// The amount in satoshis.
    pub amount: u64,
}

/// A ledger that records every notification.
#[derive(Debug, Default)]
pub struct TestLedger {
    entries: Mutex<Vec<LedgerEntry>>,
    failure: Mutex<Option<String>>,
}

impl TestLedger {
    /// Every accepted notification, oldest first.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Reject the next notification with the given message.
    pub fn fail_next(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    fn record(&self, operation: LedgerOperation, deposit: ContractAddress, amount: u64) -> Result<(), Error> {
        if let Some(message) = self.failure.lock().unwrap().take() {
            return Err(Error::Ledger(message));
        }
        self.entries.lock().unwrap().push(LedgerEntry { operation, deposit, amount });
        Ok(())
    }
}

impl ClaimLedger for TestLedger {
    fn mint(&self, deposit: ContractAddress, amount: u64) -> Result<(), Error> {
        self.record(LedgerOperation::Mint, deposit, amount)
    }

    fn burn(&self, deposit: ContractAddress, amount: u64) -> Result<(), Error> {
        self.record(LedgerOperation::Burn, deposit, amount)
    }

    fn settle_liquidation(&self, deposit: ContractAddress, amount: u64) -> Result<(), Error> {
        self.record(LedgerOperation::SettleLiquidation, deposit, amount)
    }
}

/// A price feed that reports a settable price.
#[derive(Debug)]
pub struct FixedPriceFeed {
    price: AtomicU64,
}

impl FixedPriceFeed {
    /// A feed reporting `price` per satoshi.
    pub fn new(price: u64) -> Self {
        Self { price: AtomicU64::new(price) }
    }

    /// Change the reported price.
    pub fn set_price(&self, price: u64) {
        self.price.store(price, Ordering::SeqCst);
    }
}

impl PriceFeed for FixedPriceFeed {
    fn satoshi_price(&self) -> Result<u128, Error> {
        Ok(u128::from(self.price.load(Ordering::SeqCst)))
    }
}
