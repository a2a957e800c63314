//! Monte Carlo engine for loss-recovery position sizing
//!
//! - Outcome draws from per-path seeded streams
//! - Recovery sizing policy with a contract cap and optional safe mode
//! - Single-path simulation with streak and drawdown tracking
//! - Parallel ensemble reduction into an `EnsembleReport`

pub mod config;
pub mod ensemble;
pub mod error;
pub mod metrics;
pub mod outcome;
pub mod path;
pub mod sizing;
pub mod tracker;

// Re-export commonly used types
pub use config::{SafeMode, SimulationConfig};
pub use ensemble::{
    reduce, run_ensemble, AggregateTrades, DrawdownStats, EnsembleAccumulator, EnsembleReport,
    EquitySample, StreakStats,
};
pub use error::ConfigError;
pub use metrics::{Distribution, ProfitFactor, TradeTally};
pub use outcome::{draw_outcome, path_rng, Outcome};
pub use path::{simulate_path, simulate_path_with, trade_pnl, PathResult, PathState, TradeRecord};
pub use sizing::{next_contracts, PolicyState};
pub use tracker::{max_drawdown, LosingStreak, StreakTracker};
