//! Ensemble runs and reduction into a report
//!
//! Paths run in parallel with rayon, each on its own ChaCha stream. Workers
//! fold results into `EnsembleAccumulator`s which merge in any order.
//! Floating-point sums are only taken in `finish`, over summaries sorted by
//! path index, so the report is bit-identical however the work was split.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info};

use super::config::SimulationConfig;
use super::error::Result;
use super::metrics::{Distribution, ProfitFactor, TradeTally};
use super::outcome::path_rng;
use super::path::{simulate_path, PathResult};

const PROGRESS_EVERY: usize = 1000;

/// Occurrence statistics for one losing-streak length
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreakStats {
    pub length: u32,
    pub count: u64,
    pub mean_peak_contracts: f64,
    pub min_peak_contracts: u32,
    pub max_peak_contracts: u32,
    pub mean_tick_loss: f64,
}

/// Max drawdown across the ensemble
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DrawdownStats {
    /// Mean of per-path max drawdowns
    pub mean: f64,
    /// Worst per-path max drawdown
    pub max: f64,
}

/// Aggregate trade statistics over every path
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateTrades {
    pub total_trades: u64,
    pub total_wins: u64,
    pub total_losses: u64,
    pub sum_wins: f64,
    pub sum_losses: f64,
    pub expectancy: f64,
    pub profit_factor: ProfitFactor,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub observed_win_rate: f64,
}

impl From<&TradeTally> for AggregateTrades {
    fn from(tally: &TradeTally) -> Self {
        Self {
            total_trades: tally.total,
            total_wins: tally.wins,
            total_losses: tally.losses,
            sum_wins: tally.sum_wins,
            sum_losses: tally.sum_losses,
            expectancy: tally.expectancy(),
            profit_factor: tally.profit_factor(),
            avg_win: tally.avg_win(),
            avg_loss: tally.avg_loss(),
            observed_win_rate: tally.win_rate(),
        }
    }
}

/// Equity curve kept for plotting only
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquitySample {
    pub path_index: u64,
    pub equity: Vec<f64>,
}

/// Ensemble statistics handed to reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleReport {
    pub path_count: usize,
    pub initial_capital: f64,
    /// Streak table ordered by length
    pub streaks: Vec<StreakStats>,
    pub drawdown: DrawdownStats,
    pub ruin_count: usize,
    pub ruin_rate: f64,
    /// Paths that ended below the starting capital
    pub below_initial_count: usize,
    pub below_initial_rate: f64,
    pub trades: AggregateTrades,
    pub final_capital: Distribution,
    /// First `sample_curves` paths by index; not used in any statistic
    pub sample_curves: Vec<EquitySample>,
}

impl EnsembleReport {
    pub fn streak(&self, length: u32) -> Option<&StreakStats> {
        self.streaks.iter().find(|s| s.length == length)
    }

    pub fn longest_streak(&self) -> u32 {
        self.streaks.last().map_or(0, |s| s.length)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct StreakBucket {
    count: u64,
    peak_sum: u64,
    peak_min: u32,
    peak_max: u32,
    contracts_lost: u64,
}

impl StreakBucket {
    fn merge(&mut self, other: &StreakBucket) {
        if self.count == 0 {
            *self = *other;
            return;
        }
        if other.count == 0 {
            return;
        }
        self.count += other.count;
        self.peak_sum += other.peak_sum;
        self.peak_min = self.peak_min.min(other.peak_min);
        self.peak_max = self.peak_max.max(other.peak_max);
        self.contracts_lost += other.contracts_lost;
    }
}

#[derive(Debug, Clone, Copy)]
struct PathSummary {
    index: u64,
    final_capital: f64,
    max_drawdown: f64,
    ruined: bool,
    trades: TradeTally,
}

/// Partial ensemble: push paths, merge partials, finish into a report.
///
/// Keeps one compact summary per path (no equity curve), so memory grows
/// linearly with the path count.
#[derive(Debug, Clone)]
pub struct EnsembleAccumulator {
    initial_capital: f64,
    stop_loss_ticks: f64,
    sample_limit: usize,
    summaries: Vec<PathSummary>,
    streaks: BTreeMap<u32, StreakBucket>,
    samples: Vec<EquitySample>,
}

impl EnsembleAccumulator {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            initial_capital: config.initial_capital,
            stop_loss_ticks: config.stop_loss_ticks,
            sample_limit: config.sample_curves,
            summaries: Vec::new(),
            streaks: BTreeMap::new(),
            samples: Vec::new(),
        }
    }

    /// Fold one path in. The path is consumed; only its curve may be kept.
    pub fn push(&mut self, result: PathResult) {
        for streak in &result.losing_streaks {
            let one = StreakBucket {
                count: 1,
                peak_sum: streak.peak_contracts as u64,
                peak_min: streak.peak_contracts,
                peak_max: streak.peak_contracts,
                contracts_lost: streak.contracts_lost,
            };
            self.streaks.entry(streak.length).or_default().merge(&one);
        }

        self.summaries.push(PathSummary {
            index: result.index,
            final_capital: result.final_capital,
            max_drawdown: result.max_drawdown,
            ruined: result.is_ruined(),
            trades: result.trades,
        });

        if (result.index as usize) < self.sample_limit {
            self.samples.push(EquitySample {
                path_index: result.index,
                equity: result.equity_curve,
            });
        }
    }

    /// Combine two partials. Order of merging does not affect `finish`.
    pub fn merge(mut self, other: EnsembleAccumulator) -> Self {
        self.summaries.extend(other.summaries);
        for (length, bucket) in other.streaks {
            self.streaks.entry(length).or_default().merge(&bucket);
        }
        self.samples.extend(other.samples);
        self
    }

    pub fn paths(&self) -> usize {
        self.summaries.len()
    }

    pub fn finish(mut self) -> EnsembleReport {
        self.summaries.sort_by(|a, b| {
            a.index
                .cmp(&b.index)
                .then(a.final_capital.total_cmp(&b.final_capital))
                .then(a.max_drawdown.total_cmp(&b.max_drawdown))
        });
        self.samples.sort_by(|a, b| a.path_index.cmp(&b.path_index));

        let path_count = self.summaries.len();
        let rate = |n: usize| {
            if path_count == 0 {
                0.0
            } else {
                n as f64 / path_count as f64
            }
        };

        let mut trades = TradeTally::default();
        let mut dd_sum = 0.0;
        let mut dd_max = 0.0_f64;
        let mut ruin_count = 0;
        let mut below_initial_count = 0;
        let mut finals = Vec::with_capacity(path_count);

        for summary in &self.summaries {
            trades.add(&summary.trades);
            dd_sum += summary.max_drawdown;
            dd_max = dd_max.max(summary.max_drawdown);
            if summary.ruined {
                ruin_count += 1;
            }
            if summary.final_capital < self.initial_capital {
                below_initial_count += 1;
            }
            finals.push(summary.final_capital);
        }

        let drawdown = DrawdownStats {
            mean: if path_count == 0 { 0.0 } else { dd_sum / path_count as f64 },
            max: dd_max,
        };

        let streaks = self
            .streaks
            .iter()
            .filter(|(_, b)| b.count > 0)
            .map(|(&length, b)| StreakStats {
                length,
                count: b.count,
                mean_peak_contracts: b.peak_sum as f64 / b.count as f64,
                min_peak_contracts: b.peak_min,
                max_peak_contracts: b.peak_max,
                mean_tick_loss: self.stop_loss_ticks * b.contracts_lost as f64 / b.count as f64,
            })
            .collect();

        EnsembleReport {
            path_count,
            initial_capital: self.initial_capital,
            streaks,
            drawdown,
            ruin_count,
            ruin_rate: rate(ruin_count),
            below_initial_count,
            below_initial_rate: rate(below_initial_count),
            trades: AggregateTrades::from(&trades),
            final_capital: Distribution::from_values(&finals),
            sample_curves: self.samples,
        }
    }
}

/// Reduce already simulated paths into a report
pub fn reduce<I>(config: &SimulationConfig, results: I) -> EnsembleReport
where
    I: IntoIterator<Item = PathResult>,
{
    let mut acc = EnsembleAccumulator::new(config);
    for result in results {
        acc.push(result);
    }
    acc.finish()
}

/// Validate `config`, run `path_count` paths in parallel and reduce them
pub fn run_ensemble(config: &SimulationConfig) -> Result<EnsembleReport> {
    config.validate()?;
    debug!("Config validated");

    let total = config.path_count;
    info!(
        paths = total,
        trades_per_path = config.trades_per_path,
        seed = config.seed,
        workers = rayon::current_num_threads(),
        "Running ensemble"
    );

    let completed = AtomicUsize::new(0);
    let start = Instant::now();

    let acc = (0..total as u64)
        .into_par_iter()
        .fold(
            || EnsembleAccumulator::new(config),
            |mut acc, index| {
                let mut rng = path_rng(config.seed, index);
                acc.push(simulate_path(config, index, &mut rng));

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % PROGRESS_EVERY == 0 {
                    let elapsed = start.elapsed().as_secs_f64();
                    debug!("[{}/{}] {:.0} paths/s", done, total, done as f64 / elapsed);
                }
                acc
            },
        )
        .reduce(|| EnsembleAccumulator::new(config), EnsembleAccumulator::merge);

    let report = acc.finish();

    let elapsed = start.elapsed().as_secs_f64();
    let rate = if elapsed > 0.0 { report.path_count as f64 / elapsed } else { 0.0 };
    info!(
        "Ensemble complete: {} paths in {:.2}s ({:.0} paths/s), ruin rate {:.2}%",
        report.path_count,
        elapsed,
        rate,
        report.ruin_rate * 100.0
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::error::ConfigError;
    use crate::simulation::path::PathState;
    use approx::assert_relative_eq;
    use rand::seq::SliceRandom;

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            trades_per_path: 300,
            path_count: 200,
            sample_curves: 5,
            ..SimulationConfig::recovery_reference()
        }
    }

    fn simulate_all(config: &SimulationConfig) -> Vec<PathResult> {
        (0..config.path_count as u64)
            .map(|i| simulate_path(config, i, &mut path_rng(config.seed, i)))
            .collect()
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let config = small_config();
        let parallel = run_ensemble(&config).unwrap();
        let sequential = reduce(&config, simulate_all(&config));
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_reduction_is_order_independent() {
        let config = small_config();
        let results = simulate_all(&config);
        let expected = reduce(&config, results.clone());

        let mut rng = path_rng(123, 0);
        for _ in 0..5 {
            let mut shuffled = results.clone();
            shuffled.shuffle(&mut rng);
            assert_eq!(reduce(&config, shuffled), expected);
        }
    }

    #[test]
    fn test_merge_of_partitions() {
        let config = small_config();
        let results = simulate_all(&config);
        let expected = reduce(&config, results.clone());

        let mut left = EnsembleAccumulator::new(&config);
        let mut right = EnsembleAccumulator::new(&config);
        for (i, r) in results.into_iter().enumerate() {
            if i % 3 == 0 {
                left.push(r);
            } else {
                right.push(r);
            }
        }
        assert_eq!(left.paths() + right.paths(), config.path_count);
        let merged = right.merge(left);
        assert_eq!(merged.paths(), config.path_count);
        assert_eq!(merged.finish(), expected);
    }

    #[test]
    fn test_report_matches_paths() {
        let config = small_config();
        let results = simulate_all(&config);
        let report = reduce(&config, results.clone());

        let ruined = results.iter().filter(|r| r.terminal == PathState::Ruined).count();
        let below = results.iter().filter(|r| r.final_capital < config.initial_capital).count();
        let trades: u64 = results.iter().map(|r| r.trades.total).sum();
        let streak_count: usize = results.iter().map(|r| r.losing_streaks.len()).sum();
        let dd_max = results.iter().map(|r| r.max_drawdown).fold(0.0, f64::max);

        assert_eq!(report.path_count, config.path_count);
        assert_eq!(report.ruin_count, ruined);
        assert_relative_eq!(report.ruin_rate, ruined as f64 / config.path_count as f64);
        assert_eq!(report.below_initial_count, below);
        assert_eq!(report.trades.total_trades, trades);
        assert_eq!(report.trades.total_wins + report.trades.total_losses, trades);
        assert_eq!(report.drawdown.max, dd_max);
        assert!(report.drawdown.mean <= report.drawdown.max);
        assert_eq!(
            report.streaks.iter().map(|s| s.count as usize).sum::<usize>(),
            streak_count
        );
        assert!(report.streaks.windows(2).all(|w| w[0].length < w[1].length));
        assert!(report.final_capital.min <= report.final_capital.median);
        assert!(report.final_capital.median <= report.final_capital.max);
    }

    #[test]
    fn test_streak_table_values() {
        let config = small_config();
        let results = simulate_all(&config);
        let report = reduce(&config, results.clone());

        let ones: Vec<_> = results
            .iter()
            .flat_map(|r| r.losing_streaks.iter())
            .filter(|s| s.length == 1)
            .collect();
        let stats = report.streak(1).unwrap();
        assert_eq!(stats.count, ones.len() as u64);
        // A single loss is always taken at the initial size
        assert_eq!(stats.min_peak_contracts, 1);
        assert_eq!(stats.max_peak_contracts, 1);
        assert_eq!(stats.mean_tick_loss, 19.0);

        for s in &report.streaks {
            assert!(s.min_peak_contracts <= s.max_peak_contracts);
            assert!(s.max_peak_contracts <= config.max_contracts);
            assert!(s.mean_peak_contracts >= s.min_peak_contracts as f64);
            assert!(s.mean_peak_contracts <= s.max_peak_contracts as f64);
        }
    }

    #[test]
    fn test_sample_curves() {
        let config = small_config();
        let report = run_ensemble(&config).unwrap();
        let indices: Vec<u64> = report.sample_curves.iter().map(|s| s.path_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert!(report.sample_curves.iter().all(|s| s.equity[0] == config.initial_capital));
    }

    #[test]
    fn test_always_win_ensemble() {
        let config = SimulationConfig {
            win_rate: 1.0,
            ..small_config()
        };
        let report = run_ensemble(&config).unwrap();
        assert_eq!(report.trades.total_losses, 0);
        assert_eq!(report.ruin_count, 0);
        assert_eq!(report.ruin_rate, 0.0);
        assert!(report.trades.profit_factor.is_undefined());
        assert!(report.streaks.is_empty());
        assert_eq!(report.drawdown.max, 0.0);
    }

    #[test]
    fn test_always_lose_ensemble() {
        let config = SimulationConfig {
            win_rate: 0.0,
            trades_per_path: 10_000,
            path_count: 50,
            ..SimulationConfig::recovery_reference()
        };
        let report = run_ensemble(&config).unwrap();
        assert_eq!(report.ruin_count, 50);
        assert_eq!(report.ruin_rate, 1.0);
        assert_eq!(report.below_initial_rate, 1.0);
        assert_eq!(report.trades.total_trades, 50 * 7);
        assert_eq!(report.streaks.len(), 1);
        assert_eq!(report.streak(7).map(|s| s.count), Some(50));
        assert_eq!(report.longest_streak(), 7);
    }

    #[test]
    fn test_degenerate_ensembles_report_zeros() {
        let config = SimulationConfig {
            path_count: 0,
            ..small_config()
        };
        let report = run_ensemble(&config).unwrap();
        assert_eq!(report.path_count, 0);
        assert_eq!(report.ruin_rate, 0.0);
        assert_eq!(report.trades.expectancy, 0.0);
        assert_eq!(report.drawdown, DrawdownStats::default());
        assert_eq!(report.final_capital, Distribution::default());

        let config = SimulationConfig {
            trades_per_path: 0,
            ..small_config()
        };
        let report = run_ensemble(&config).unwrap();
        assert_eq!(report.trades.total_trades, 0);
        assert_eq!(report.trades.expectancy, 0.0);
        assert!(report.trades.profit_factor.is_undefined());
        assert_eq!(report.below_initial_count, 0);
        assert_eq!(report.final_capital.mean, config.initial_capital);
    }

    #[test]
    fn test_invalid_config_runs_nothing() {
        let config = SimulationConfig {
            initial_contracts: 5,
            max_contracts: 2,
            ..small_config()
        };
        assert_eq!(
            run_ensemble(&config),
            Err(ConfigError::ContractBounds { initial: 5, max: 2 })
        );
    }
}
