//! Trade tallies, profit factor and distribution summaries

use serde::{Serialize, Serializer};
use std::fmt;

/// Gross wins over gross losses.
///
/// `Undefined` when nothing was lost. Kept separate from the float so
/// comparisons against it fail loudly instead of propagating NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProfitFactor {
    Finite(f64),
    Undefined,
}

impl ProfitFactor {
    /// `|sum_wins / sum_losses|`, or `Undefined` when `sum_losses == 0`
    pub fn from_sums(sum_wins: f64, sum_losses: f64) -> Self {
        if sum_losses == 0.0 {
            ProfitFactor::Undefined
        } else {
            ProfitFactor::Finite((sum_wins / sum_losses).abs())
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            ProfitFactor::Finite(v) => Some(v),
            ProfitFactor::Undefined => None,
        }
    }

    pub fn is_undefined(self) -> bool {
        self == ProfitFactor::Undefined
    }
}

impl fmt::Display for ProfitFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfitFactor::Finite(v) => write!(f, "{:.2}", v),
            ProfitFactor::Undefined => write!(f, "undefined"),
        }
    }
}

impl Serialize for ProfitFactor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ProfitFactor::Finite(v) => serializer.serialize_f64(*v),
            ProfitFactor::Undefined => serializer.serialize_str("undefined"),
        }
    }
}

/// Trade counters and P&L sums
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TradeTally {
    pub total: u64,
    pub wins: u64,
    pub losses: u64,
    /// Summed P&L of winning trades
    pub sum_wins: f64,
    /// Summed P&L of losing trades (negative)
    pub sum_losses: f64,
}

impl TradeTally {
    pub fn record_win(&mut self, pnl: f64) {
        self.total += 1;
        self.wins += 1;
        self.sum_wins += pnl;
    }

    pub fn record_loss(&mut self, pnl: f64) {
        self.total += 1;
        self.losses += 1;
        self.sum_losses += pnl;
    }

    pub fn add(&mut self, other: &TradeTally) {
        self.total += other.total;
        self.wins += other.wins;
        self.losses += other.losses;
        self.sum_wins += other.sum_wins;
        self.sum_losses += other.sum_losses;
    }

    /// Mean P&L per trade, 0 with no trades
    pub fn expectancy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.sum_wins + self.sum_losses) / self.total as f64
        }
    }

    pub fn profit_factor(&self) -> ProfitFactor {
        ProfitFactor::from_sums(self.sum_wins, self.sum_losses)
    }

    pub fn avg_win(&self) -> f64 {
        if self.wins == 0 {
            0.0
        } else {
            self.sum_wins / self.wins as f64
        }
    }

    /// Mean loss size as a positive number
    pub fn avg_loss(&self) -> f64 {
        if self.losses == 0 {
            0.0
        } else {
            self.sum_losses.abs() / self.losses as f64
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.wins as f64 / self.total as f64
        }
    }
}

/// Shape of a sample of values
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Distribution {
    pub mean: f64,
    pub median: f64,
    /// Population variance
    pub variance: f64,
    pub std_dev: f64,
    /// 25th percentile
    pub q1: f64,
    /// 75th percentile
    pub q3: f64,
    pub min: f64,
    pub max: f64,
}

impl Distribution {
    /// Summarize `values`; all zeros for an empty slice.
    ///
    /// Values are sorted first, so the result does not depend on input order.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Self {
            mean,
            median: percentile(&sorted, 0.5),
            variance,
            std_dev: variance.sqrt(),
            q1: percentile(&sorted, 0.25),
            q3: percentile(&sorted, 0.75),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        }
    }
}

/// Linear-interpolated percentile of an ascending slice, `p` in [0, 1]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
