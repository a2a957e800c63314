//! Losing streak and drawdown bookkeeping for a single path

use serde::Serialize;

/// A closed run of consecutive losing trades
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LosingStreak {
    /// Consecutive losses in the run (>= 1)
    pub length: u32,
    /// Largest position used during the run
    pub peak_contracts: u32,
    /// Contracts summed over every losing trade of the run
    pub contracts_lost: u64,
    /// Stop-loss ticks lost over the run (stop ticks x contracts)
    pub total_tick_loss: f64,
}

/// Tracks the open streak and the closed ones for one path.
///
/// At most one streak is open at a time.
#[derive(Debug, Default)]
pub struct StreakTracker {
    open: Option<LosingStreak>,
    closed: Vec<LosingStreak>,
}

impl StreakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the open streak, starting one if needed
    pub fn record_loss(&mut self, contracts: u32, stop_loss_ticks: f64) {
        let streak = self.open.get_or_insert(LosingStreak {
            length: 0,
            peak_contracts: 0,
            contracts_lost: 0,
            total_tick_loss: 0.0,
        });
        streak.length += 1;
        streak.peak_contracts = streak.peak_contracts.max(contracts);
        streak.contracts_lost += contracts as u64;
        streak.total_tick_loss += stop_loss_ticks * contracts as f64;
    }

    /// A win ends the open streak, if any
    pub fn record_win(&mut self) {
        self.close();
    }

    /// Length of the currently open streak (0 when none)
    pub fn open_length(&self) -> u32 {
        self.open.map_or(0, |s| s.length)
    }

    /// Close any open streak and hand back the full list
    pub fn finish(mut self) -> Vec<LosingStreak> {
        self.close();
        self.closed
    }

    fn close(&mut self) {
        if let Some(streak) = self.open.take() {
            self.closed.push(streak);
        }
    }
}

/// Largest peak-to-trough decline of an equity curve.
///
/// `max_i(running_max_i - equity_i)` with `running_max_i = max(equity_0..=i)`.
/// Returns 0 for an empty or monotonically rising curve.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &value in equity {
        peak = peak.max(value);
        worst = worst.max(peak - value);
    }
    worst
}
