//! Confirmation policy on top of header chain validation.

use crate::btc_utils;
use crate::btc_utils::ChainSummary;
use crate::error::Error;
use crate::error::HeaderChainError;

/// A source of the epoch difficulties of the bitcoin chain, such as an
/// on-chain header relay.
pub trait DifficultyRelay {
    /// The difficulty of the current retarget epoch.
    fn current_epoch_difficulty(&self) -> u128;
    /// The difficulty of the epoch before the current one.
    fn previous_epoch_difficulty(&self) -> u128;
}

/// Checks that a header chain carries enough proof-of-work to treat the
/// transactions in its first block as confirmed.
///
/// The verifier holds a snapshot of the relay's difficulties, taken when
/// it is built, so every check within one call sees the same values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayVerifier {
    current_difficulty: u128,
    previous_difficulty: u128,
    difficulty_factor: u64,
}

impl RelayVerifier {
    /// Snapshot the relay's difficulties.
    ///
    /// `difficulty_factor` is the number of blocks' worth of epoch
    /// difficulty that a proof must accumulate.
    pub fn new<R>(relay: &R, difficulty_factor: u64) -> Self
    where
        R: DifficultyRelay + ?Sized,
    {
        Self {
            current_difficulty: relay.current_epoch_difficulty(),
            previous_difficulty: relay.previous_epoch_difficulty(),
            difficulty_factor,
        }
    }

    /// Build a verifier from known difficulties.
    pub fn from_difficulties(previous: u128, current: u128, difficulty_factor: u64) -> Self {
        Self {
            current_difficulty: current,
            previous_difficulty: previous,
            difficulty_factor,
        }
    }

    /// The difficulty of the current epoch.
    pub fn current_difficulty(&self) -> u128 {
        self.current_difficulty
    }

    /// The difficulty of the previous epoch.
    pub fn previous_difficulty(&self) -> u128 {
        self.previous_difficulty
    }

    /// The number of blocks' worth of difficulty a proof must carry.
    pub fn difficulty_factor(&self) -> u64 {
        self.difficulty_factor
    }

    /// Validate the concatenated headers and check that their accumulated
    /// difficulty reaches the policy threshold.
    ///
    /// The threshold is the difficulty of the epoch that the first header
    /// belongs to, multiplied by the difficulty factor.
    pub fn evaluate(&self, headers: &[u8]) -> Result<ChainSummary, Error> {
        let headers = btc_utils::parse_headers(headers)?;
        let summary = btc_utils::validate_header_chain(
            &headers,
            self.previous_difficulty,
            self.current_difficulty,
        )?;

        let first_difficulty = headers
            .first()
            .map(btc_utils::extract_difficulty)
            .unwrap_or_default();
        let epoch_difficulty = if first_difficulty == self.current_difficulty {
            self.current_difficulty
        } else {
            self.previous_difficulty
        };
        let required = epoch_difficulty.saturating_mul(u128::from(self.difficulty_factor));

        if summary.accumulated_difficulty < required {
            tracing::debug!(
                required,
                observed = summary.accumulated_difficulty,
                "header chain does not carry enough difficulty"
            );
            let observed = summary.accumulated_difficulty;
            return Err(HeaderChainError::InsufficientAccumulatedDifficulty { required, observed }.into());
        }

        Ok(summary)
    }
}
