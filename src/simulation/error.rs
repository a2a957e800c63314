//! Configuration errors raised before any path is simulated

use thiserror::Error;

/// Result type alias for configuration checks.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// A simulation config that violates one of its bounds.
///
/// Validation runs once, before the ensemble starts. No partial run is
/// attempted when any of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Win rate is NaN or outside [0, 1].
    #[error("win rate must be within [0, 1], got {0}")]
    WinRate(f64),

    /// A tick, value or capital field that must be strictly positive.
    #[error("{field} must be > 0, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    /// Commission cannot be negative.
    #[error("commission per contract must be >= 0, got {0}")]
    NegativeCommission(f64),

    /// Contract bounds are inconsistent.
    #[error("contract bounds require max >= initial >= 1, got initial={initial} max={max}")]
    ContractBounds { initial: u32, max: u32 },

    /// Safe mode parameters out of range.
    #[error("safe mode requires after_losses >= 1 and reduction in 1..=99%, got after={after_losses} reduction={reduction_pct}%")]
    SafeMode { after_losses: u32, reduction_pct: u32 },
}

impl ConfigError {
    pub(crate) fn non_positive(field: &'static str, value: f64) -> Self {
        Self::NonPositive { field, value }
    }
}
