//! Loss-recovery position sizing
//!
//! After a loss the next trade is sized so that a take-profit pays back
//! everything lost since the last win, plus the commission of the
//! recovering trade itself. The size is capped at `max_contracts`; when the
//! cap binds the policy accepts partial recovery.

use serde::Serialize;

use super::config::SimulationConfig;

/// Recovery bookkeeping carried from one trade to the next within a path
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PolicyState {
    /// Stop-loss ticks lost since the last win (ticks x contracts)
    pub cumulative_loss_ticks: f64,
    /// Currency lost since the last win, commissions included
    pub cumulative_loss_value: f64,
    /// Losing trades in a row since the last win
    pub consecutive_losses: u32,
    /// Contracts for the next trade
    pub next_contracts: u32,
}

impl PolicyState {
    /// Fresh state: nothing to recover, trade the initial size
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            cumulative_loss_ticks: 0.0,
            cumulative_loss_value: 0.0,
            consecutive_losses: 0,
            next_contracts: config.initial_contracts,
        }
    }

    /// A win pays back the run; go back to the initial size
    pub fn record_win(&mut self, config: &SimulationConfig) {
        *self = Self::new(config);
    }

    /// Add a losing trade and resize for recovery.
    ///
    /// `loss_value` is the trade's currency loss (stop plus commissions),
    /// taken as an absolute value.
    pub fn record_loss(&mut self, contracts: u32, loss_value: f64, config: &SimulationConfig) {
        self.cumulative_loss_ticks += config.stop_loss_ticks * contracts as f64;
        self.cumulative_loss_value += loss_value.abs();
        self.consecutive_losses += 1;
        self.next_contracts = next_contracts(self, config);
    }
}

/// Contracts required to recover `state` on the next win.
///
/// Pure: depends only on the accumulated loss and the config.
pub fn next_contracts(state: &PolicyState, config: &SimulationConfig) -> u32 {
    if state.cumulative_loss_value == 0.0 {
        return config.initial_contracts;
    }

    let initial = config.initial_contracts as f64;

    // The recovering trade's own commission is folded into the target
    let recovery_ticks = (state.cumulative_loss_value
        + initial * config.commission_per_contract * config.tick_value)
        / config.tick_value;
    let needed = (recovery_ticks / config.take_profit_ticks).ceil();

    // Clamp in f64 first so a huge target cannot overflow the cast
    let capped = needed.max(initial).min(config.max_contracts as f64) as u32;

    match config.safe_mode {
        Some(safe) => safe.apply(capped, state.consecutive_losses),
        None => capped,
    }
}
