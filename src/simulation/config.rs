//! Configuration for the recovery-sizing Monte Carlo

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, Result};

/// Reduce position size once a losing run gets long enough
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeMode {
    /// Consecutive losses before the reduction kicks in
    pub after_losses: u32,
    /// Percentage cut applied to the sized contracts (1..=99)
    pub reduction_pct: u32,
}

impl SafeMode {
    /// Apply the reduction to an already capped contract count.
    ///
    /// Never drops below one contract.
    pub fn apply(&self, contracts: u32, consecutive_losses: u32) -> u32 {
        if consecutive_losses < self.after_losses {
            return contracts;
        }
        let keep = 1.0 - self.reduction_pct as f64 / 100.0;
        let reduced = ((contracts as f64 * keep).floor() as u32).max(1);
        contracts.min(reduced)
    }
}

/// Immutable inputs for one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Probability that a single trade hits take-profit
    pub win_rate: f64,

    /// Stop-loss distance in ticks
    pub stop_loss_ticks: f64,

    /// Take-profit distance in ticks
    pub take_profit_ticks: f64,

    /// Commission per contract per side, in currency
    pub commission_per_contract: f64,

    /// Currency value of one tick for one contract (MES = $1.25)
    pub tick_value: f64,

    /// Contracts traded when no loss is being recovered
    pub initial_contracts: u32,

    /// Hard cap on contracts for a recovery trade
    pub max_contracts: u32,

    /// Starting capital for every path
    pub initial_capital: f64,

    /// Maximum number of trades per path
    pub trades_per_path: usize,

    /// Number of independent paths in the ensemble
    pub path_count: usize,

    /// Master seed; path `i` draws from stream `i` of this seed
    pub seed: u64,

    /// Equity curves retained for plotting (first K paths)
    pub sample_curves: usize,

    /// Optional size reduction after a run of losses
    pub safe_mode: Option<SafeMode>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::recovery_reference()
    }
}

impl SimulationConfig {
    /// Recovery sizing on MES: 19 tick stop, 25 tick target, 4 contracts max
    pub fn recovery_reference() -> Self {
        Self {
            win_rate: 0.53,
            stop_loss_ticks: 19.0,
            take_profit_ticks: 25.0,
            commission_per_contract: 1.50,
            tick_value: 1.25,
            initial_contracts: 1,
            max_contracts: 4,
            initial_capital: 500.0,
            trades_per_path: 5000,
            path_count: 1000,
            seed: 42,
            sample_curves: 20,
            safe_mode: None,
        }
    }

    /// Flat single-contract sizing: one loss is paid back by one win
    pub fn flat_reference() -> Self {
        Self {
            win_rate: 0.60,
            stop_loss_ticks: 15.0,
            take_profit_ticks: 20.0,
            initial_contracts: 1,
            max_contracts: 1,
            initial_capital: 600.0,
            trades_per_path: 500,
            path_count: 10_000,
            ..Self::recovery_reference()
        }
    }

    /// Check every bound. Call once before running anything.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.win_rate) {
            return Err(ConfigError::WinRate(self.win_rate));
        }

        for (field, value) in [
            ("stop_loss_ticks", self.stop_loss_ticks),
            ("take_profit_ticks", self.take_profit_ticks),
            ("tick_value", self.tick_value),
            ("initial_capital", self.initial_capital),
        ] {
            // Negated comparison so NaN is rejected too
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigError::non_positive(field, value));
            }
        }

        if !(self.commission_per_contract >= 0.0) || !self.commission_per_contract.is_finite() {
            return Err(ConfigError::NegativeCommission(self.commission_per_contract));
        }

        if self.initial_contracts < 1 || self.max_contracts < self.initial_contracts {
            return Err(ConfigError::ContractBounds {
                initial: self.initial_contracts,
                max: self.max_contracts,
            });
        }

        if let Some(safe) = self.safe_mode {
            if safe.after_losses < 1 || !(1..=99).contains(&safe.reduction_pct) {
                return Err(ConfigError::SafeMode {
                    after_losses: safe.after_losses,
                    reduction_pct: safe.reduction_pct,
                });
            }
        }

        Ok(())
    }

    /// Currency P&L of one winning contract, round-trip commission included
    pub fn win_value_per_contract(&self) -> f64 {
        self.take_profit_ticks * self.tick_value - 2.0 * self.commission_per_contract
    }

    /// Currency P&L of one losing contract (negative), round-trip commission included
    pub fn loss_value_per_contract(&self) -> f64 {
        -self.stop_loss_ticks * self.tick_value - 2.0 * self.commission_per_contract
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_configs_are_valid() {
        assert!(SimulationConfig::recovery_reference().validate().is_ok());
        assert!(SimulationConfig::flat_reference().validate().is_ok());
        assert_eq!(SimulationConfig::default(), SimulationConfig::recovery_reference());
    }

    #[test]
    fn test_win_rate_bounds() {
        let mut config = SimulationConfig::default();

        config.win_rate = 1.2;
        assert_eq!(config.validate(), Err(ConfigError::WinRate(1.2)));

        config.win_rate = -0.1;
        assert!(config.validate().is_err());

        config.win_rate = f64::NAN;
        assert!(config.validate().is_err());

        // Degenerate endpoints are allowed
        config.win_rate = 0.0;
        assert!(config.validate().is_ok());
        config.win_rate = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_positive_fields() {
        let mut config = SimulationConfig::default();
        config.tick_value = 0.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive { field: "tick_value", value: 0.0 })
        );

        let mut config = SimulationConfig::default();
        config.stop_loss_ticks = -3.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive { field: "stop_loss_ticks", .. })
        ));

        let mut config = SimulationConfig::default();
        config.commission_per_contract = -0.5;
        assert_eq!(config.validate(), Err(ConfigError::NegativeCommission(-0.5)));

        let mut config = SimulationConfig::default();
        config.commission_per_contract = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_contract_bounds() {
        let mut config = SimulationConfig::default();
        config.initial_contracts = 3;
        config.max_contracts = 2;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ContractBounds { initial: 3, max: 2 })
        );

        config.initial_contracts = 0;
        assert!(config.validate().is_err());

        config.initial_contracts = 2;
        config.max_contracts = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_safe_mode_bounds() {
        let mut config = SimulationConfig::default();
        config.safe_mode = Some(SafeMode { after_losses: 0, reduction_pct: 50 });
        assert!(config.validate().is_err());

        config.safe_mode = Some(SafeMode { after_losses: 3, reduction_pct: 100 });
        assert!(config.validate().is_err());

        config.safe_mode = Some(SafeMode { after_losses: 3, reduction_pct: 50 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_safe_mode_apply() {
        let safe = SafeMode { after_losses: 3, reduction_pct: 50 };
        assert_eq!(safe.apply(4, 2), 4); // not yet active
        assert_eq!(safe.apply(4, 3), 2);
        assert_eq!(safe.apply(3, 5), 1); // floor(1.5)
        assert_eq!(safe.apply(1, 10), 1); // never below one
    }

    #[test]
    fn test_per_contract_values() {
        let config = SimulationConfig::default();
        assert_eq!(config.win_value_per_contract(), 25.0 * 1.25 - 3.0);
        assert_eq!(config.loss_value_per_contract(), -(19.0 * 1.25) - 3.0);
    }
}
