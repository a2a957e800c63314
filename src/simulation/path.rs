//! Single-path trade simulation
//!
//! One path is a strictly sequential run of trades: each trade's size comes
//! from the recovery policy, which depends on every outcome before it.

use rand::Rng;
use serde::Serialize;
use tracing::debug;

use super::config::SimulationConfig;
use super::metrics::{ProfitFactor, TradeTally};
use super::outcome::{draw_outcome, Outcome};
use super::sizing::PolicyState;
use super::tracker::{max_drawdown, LosingStreak, StreakTracker};

/// Lifecycle of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PathState {
    Running,
    /// Capital fell to or below zero; no further trades
    Ruined,
    /// Reached `trades_per_path`
    Completed,
}

/// One executed trade, as seen by a path observer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeRecord {
    /// 1-based trade number within the path
    pub trade: usize,
    pub contracts: u32,
    pub outcome: Outcome,
    /// Currency P&L including round-trip commission
    pub pnl: f64,
    /// Capital after the trade
    pub capital: f64,
    /// Policy state after the trade was booked
    pub policy: PolicyState,
}

/// Everything one path produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathResult {
    /// Stream index the path was drawn from
    pub index: u64,
    pub terminal: PathState,
    pub final_capital: f64,
    /// Starting capital followed by the capital after each trade
    pub equity_curve: Vec<f64>,
    pub losing_streaks: Vec<LosingStreak>,
    pub max_drawdown: f64,
    pub trades: TradeTally,
    pub expectancy: f64,
    pub profit_factor: ProfitFactor,
}

impl PathResult {
    pub fn trades_executed(&self) -> usize {
        self.trades.total as usize
    }

    pub fn is_ruined(&self) -> bool {
        self.terminal == PathState::Ruined
    }
}

/// Currency P&L of one trade with `contracts`, round-trip commission included
pub fn trade_pnl(config: &SimulationConfig, outcome: Outcome, contracts: u32) -> f64 {
    let contracts = contracts as f64;
    let gross = match outcome {
        Outcome::Win => config.take_profit_ticks * config.tick_value * contracts,
        Outcome::Loss => -config.stop_loss_ticks * config.tick_value * contracts,
    };
    gross - 2.0 * config.commission_per_contract * contracts
}

/// Simulate one path
pub fn simulate_path<R: Rng + ?Sized>(
    config: &SimulationConfig,
    index: u64,
    rng: &mut R,
) -> PathResult {
    simulate_path_with(config, index, rng, |_| {})
}

/// Simulate one path, handing every executed trade to `observe`
pub fn simulate_path_with<R, F>(
    config: &SimulationConfig,
    index: u64,
    rng: &mut R,
    mut observe: F,
) -> PathResult
where
    R: Rng + ?Sized,
    F: FnMut(&TradeRecord),
{
    let mut capital = config.initial_capital;
    let mut equity_curve = Vec::with_capacity(config.trades_per_path + 1);
    equity_curve.push(capital);

    let mut policy = PolicyState::new(config);
    let mut streaks = StreakTracker::new();
    let mut trades = TradeTally::default();

    let mut state = if config.trades_per_path == 0 {
        PathState::Completed
    } else {
        PathState::Running
    };

    while state == PathState::Running {
        let contracts = policy.next_contracts;
        let outcome = draw_outcome(config.win_rate, rng);
        let pnl = trade_pnl(config, outcome, contracts);

        capital += pnl;
        equity_curve.push(capital);

        match outcome {
            Outcome::Win => {
                streaks.record_win();
                policy.record_win(config);
                trades.record_win(pnl);
            }
            Outcome::Loss => {
                policy.record_loss(contracts, pnl, config);
                streaks.record_loss(contracts, config.stop_loss_ticks);
                trades.record_loss(pnl);
            }
        }

        observe(&TradeRecord {
            trade: trades.total as usize,
            contracts,
            outcome,
            pnl,
            capital,
            policy,
        });

        if capital <= 0.0 {
            debug!(path = index, trade = trades.total, capital, "path ruined");
            state = PathState::Ruined;
        } else if trades.total as usize >= config.trades_per_path {
            state = PathState::Completed;
        }
    }

    PathResult {
        index,
        terminal: state,
        final_capital: capital,
        max_drawdown: max_drawdown(&equity_curve),
        equity_curve,
        losing_streaks: streaks.finish(),
        expectancy: trades.expectancy(),
        profit_factor: trades.profit_factor(),
        trades,
    }
}
