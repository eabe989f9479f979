//! Configuration management for the escrow system
use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use config::FileFormat;
use config::Source;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::config::error::EscrowConfigError;
use crate::config::serialization::duration_seconds_deserializer;

mod error;
mod serialization;

/// The checked-in configuration file with the default values.
pub const DEFAULT_CONFIG: &str = include_str!("default.toml");

/// Trait for validating configuration values.
trait Validatable {
    /// Validate the configuration values.
    fn validate(&self, cfg: &Settings) -> Result<(), ConfigError>;
}

/// Top-level configuration for the escrow system
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Deposit lifecycle policy
    pub deposit: DepositConfig,
    /// Collateralization policy
    pub collateral: CollateralConfig,
}

/// Policy that governs the deposit lifecycle.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DepositConfig {
    /// The number of blocks' worth of epoch difficulty that a funding or
    /// redemption proof must accumulate.
    pub tx_proof_difficulty_factor: u64,
    /// How long the custody group has to publish its public key.
    #[serde(deserialize_with = "duration_seconds_deserializer")]
    pub signing_group_formation_timeout: Duration,
    /// How long the depositor has to prove the funding transaction after
    /// the public key is published.
    #[serde(deserialize_with = "duration_seconds_deserializer")]
    pub funding_proof_timeout: Duration,
    /// How long the custody group has to sign a requested redemption.
    #[serde(deserialize_with = "duration_seconds_deserializer")]
    pub redemption_signature_timeout: Duration,
    /// How long after the redemption request the redemption transaction
    /// must be proven.
    #[serde(deserialize_with = "duration_seconds_deserializer")]
    pub redemption_proof_timeout: Duration,
    /// How long a deposit may remain under courtesy call.
    #[serde(deserialize_with = "duration_seconds_deserializer")]
    pub courtesy_call_timeout: Duration,
    /// The minimum number of satoshis that a redemption must leave for
    /// bitcoin transaction fees.
    pub min_redemption_fee: u64,
    /// The lot sizes, in satoshis, that new deposits may request.
    pub allowed_lot_sizes: Vec<u64>,
}

impl DepositConfig {
    /// Whether new deposits may request this lot size.
    pub fn is_allowed_lot_size(&self, lot_size: u64) -> bool {
        self.allowed_lot_sizes.contains(&lot_size)
    }
}

impl Validatable for DepositConfig {
    fn validate(&self, _: &Settings) -> Result<(), ConfigError> {
        let timeouts = [
            ("signing_group_formation_timeout", self.signing_group_formation_timeout),
            ("funding_proof_timeout", self.funding_proof_timeout),
            ("redemption_signature_timeout", self.redemption_signature_timeout),
            ("redemption_proof_timeout", self.redemption_proof_timeout),
            ("courtesy_call_timeout", self.courtesy_call_timeout),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, timeout)| timeout.is_zero()) {
            return Err(ConfigError::Message(
                EscrowConfigError::ZeroTimeout(*name).to_string(),
            ));
        }

        if self.tx_proof_difficulty_factor == 0 {
            return Err(ConfigError::Message(
                EscrowConfigError::ZeroDifficultyFactor.to_string(),
            ));
        }

        if self.allowed_lot_sizes.is_empty() {
            return Err(ConfigError::Message(EscrowConfigError::NoLotSizes.to_string()));
        }

        if self.allowed_lot_sizes.contains(&0) {
            return Err(ConfigError::Message(EscrowConfigError::ZeroLotSize.to_string()));
        }

        Ok(())
    }
}

/// Collateralization thresholds, in percent of the deposited bitcoin's
/// value.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CollateralConfig {
    /// Below this, anyone may start a courtesy call.
    pub undercollateralized_threshold_percent: u32,
    /// Below this, anyone may liquidate the deposit.
    pub severely_undercollateralized_threshold_percent: u32,
}

impl Validatable for CollateralConfig {
    fn validate(&self, _: &Settings) -> Result<(), ConfigError> {
        let courtesy = self.undercollateralized_threshold_percent;
        let severe = self.severely_undercollateralized_threshold_percent;
        if severe >= courtesy {
            return Err(ConfigError::Message(
                EscrowConfigError::ThresholdOrder { courtesy, severe }.to_string(),
            ));
        }

        Ok(())
    }
}

impl Settings {
    /// Initializing the global config first with default values and then with
    /// provided/overwritten environment variables. The explicit separator with
    /// double underscores is needed to correctly parse the nested config structure.
    ///
    /// The environment variables are prefixed with `ESCROW_` and the nested
    /// fields are separated with double underscores. For example, the path
    /// `deposit.min_redemption_fee` is parsed as following:
    ///
    /// ```text
    /// ESCROW_DEPOSIT__MIN_REDEMPTION_FEE
    /// ^^^^^^ ^^^^^^^  ^^^^^^^^^^^^^^^^^^
    ///    │  ^   │   ^^        │
    ///    │  │   │   ││        └ The `min_redemption_fee` field of the `deposit` object
    ///    │  │   │   └ separator("__")
    ///    │  │   └ The `deposit` field of the root object (`Settings`)
    ///    │  └ prefix_separator("_")
    ///    └ with_prefix("ESCROW")
    /// ```
    pub fn new(config_path: Option<impl AsRef<Path>>) -> Result<Self, ConfigError> {
        Self::new_with_environment(config_path, Self::environment())
    }

    /// Load the settings from the checked-in default configuration file
    /// alone. The environment is not consulted.
    pub fn new_from_default_config() -> Result<Self, ConfigError> {
        Self::load(Some(File::from_str(DEFAULT_CONFIG, FileFormat::Toml)), None)
    }

    /// The environment source. Lists are comma separated.
    fn environment() -> Environment {
        Environment::with_prefix("ESCROW")
            .separator("__")
            .list_separator(",")
            .try_parsing(true)
            .with_list_parse_key("deposit.allowed_lot_sizes")
            .prefix_separator("_")
    }

    fn new_with_environment(
        config_path: Option<impl AsRef<Path>>,
        env: Environment,
    ) -> Result<Self, ConfigError> {
        let file = config_path.map(|path| File::from(path.as_ref()));
        Self::load(file, Some(env))
    }

    fn load<S>(file: Option<S>, env: Option<Environment>) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let mut cfg_builder = Config::builder();

        cfg_builder = cfg_builder.set_default("deposit.tx_proof_difficulty_factor", 6)?;
        cfg_builder = cfg_builder.set_default("deposit.signing_group_formation_timeout", 10_800)?;
        cfg_builder = cfg_builder.set_default("deposit.funding_proof_timeout", 10_800)?;
        cfg_builder = cfg_builder.set_default("deposit.redemption_signature_timeout", 7_200)?;
        cfg_builder = cfg_builder.set_default("deposit.redemption_proof_timeout", 21_600)?;
        cfg_builder = cfg_builder.set_default("deposit.courtesy_call_timeout", 21_600)?;
        cfg_builder = cfg_builder.set_default("deposit.min_redemption_fee", 2_000)?;
        cfg_builder = cfg_builder.set_default(
            "deposit.allowed_lot_sizes",
            vec![1_000_000u64, 10_000_000, 20_000_000, 50_000_000, 100_000_000],
        )?;
        cfg_builder = cfg_builder.set_default("collateral.undercollateralized_threshold_percent", 125)?;
        cfg_builder =
            cfg_builder.set_default("collateral.severely_undercollateralized_threshold_percent", 110)?;

        if let Some(file) = file {
            cfg_builder = cfg_builder.add_source(file);
        }
        if let Some(env) = env {
            cfg_builder = cfg_builder.add_source(env);
        }

        let cfg = cfg_builder.build()?;

        let settings: Settings = cfg.try_deserialize()?;

        settings.validate()?;

        Ok(settings)
    }

    /// Perform validation on the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.deposit.validate(self)?;
        self.collateral.validate(self)?;

        Ok(())
    }
}
