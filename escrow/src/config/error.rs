/// Configuration error variants.
#[derive(Debug, thiserror::Error)]
pub enum EscrowConfigError {
    /// A timeout of zero would let any deposit be timed out in the same
    /// call that starts the clock.
    #[error("[deposit.{0}] The timeout must be greater than zero")]
    ZeroTimeout(&'static str),

    /// Proofs must carry at least one header's worth of difficulty.
    #[error("[deposit.tx_proof_difficulty_factor] The difficulty factor must be greater than zero")]
    ZeroDifficultyFactor,

    /// At least one lot size must be allowed.
    #[error("[deposit.allowed_lot_sizes] At least one lot size must be provided")]
    NoLotSizes,

    /// Lots must hold some bitcoin.
    #[error("[deposit.allowed_lot_sizes] Lot sizes must be greater than zero")]
    ZeroLotSize,

    /// The liquidation threshold must be strictly below the courtesy call
    /// threshold.
    #[error(
        "[collateral] The severely undercollateralized threshold ({severe}%) must be below \
         the undercollateralized threshold ({courtesy}%)"
    )]
    ThresholdOrder {
        /// The courtesy call threshold.
        courtesy: u32,
        /// The liquidation threshold.
        severe: u32,
    },
}
