use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use recovery_montecarlo::report;
use recovery_montecarlo::simulation::{
    path_rng, run_ensemble, simulate_path_with, SafeMode, SimulationConfig,
};

#[derive(Parser, Debug)]
#[command(name = "recovery-mc")]
#[command(about = "Monte Carlo risk profile of loss-recovery position sizing")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Print verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full ensemble and report distribution statistics
    Run {
        #[command(flatten)]
        sim: SimArgs,

        /// Write the full report as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Write the losing streak table as CSV
        #[arg(long)]
        streaks_csv: Option<PathBuf>,
    },

    /// Trace a single path trade by trade
    Path {
        #[command(flatten)]
        sim: SimArgs,

        /// Path index (selects the random stream under the seed)
        #[arg(long, default_value = "0")]
        index: u64,

        /// Print at most this many trades
        #[arg(long, default_value = "50")]
        limit: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    /// Recovery sizing, 19/25 ticks, 4 contracts max
    Recovery,
    /// Flat single-contract sizing, 15/20 ticks
    Flat,
}

#[derive(ClapArgs, Debug)]
struct SimArgs {
    /// Base configuration
    #[arg(long, value_enum, default_value = "recovery", env = "RECOVERY_MC_PRESET")]
    preset: Preset,

    /// Probability of hitting take-profit
    #[arg(long, env = "RECOVERY_MC_WIN_RATE")]
    win_rate: Option<f64>,

    /// Stop loss in ticks
    #[arg(long, env = "RECOVERY_MC_STOP_LOSS")]
    stop_loss: Option<f64>,

    /// Take profit in ticks
    #[arg(long, env = "RECOVERY_MC_TAKE_PROFIT")]
    take_profit: Option<f64>,

    /// Commission per contract per side
    #[arg(long, env = "RECOVERY_MC_COMMISSION")]
    commission: Option<f64>,

    /// Currency value of one tick (MES = 1.25)
    #[arg(long, env = "RECOVERY_MC_TICK_VALUE")]
    tick_value: Option<f64>,

    /// Contracts when nothing is being recovered
    #[arg(long, env = "RECOVERY_MC_INITIAL_CONTRACTS")]
    initial_contracts: Option<u32>,

    /// Maximum contracts for a recovery trade
    #[arg(long, env = "RECOVERY_MC_MAX_CONTRACTS")]
    max_contracts: Option<u32>,

    /// Starting capital
    #[arg(long, env = "RECOVERY_MC_CAPITAL")]
    capital: Option<f64>,

    /// Trades per path
    #[arg(long, env = "RECOVERY_MC_TRADES")]
    trades: Option<usize>,

    /// Number of paths
    #[arg(long, env = "RECOVERY_MC_PATHS")]
    paths: Option<usize>,

    /// Master seed
    #[arg(long, env = "RECOVERY_MC_SEED")]
    seed: Option<u64>,

    /// Equity curves kept in the JSON report
    #[arg(long)]
    sample_curves: Option<usize>,

    /// Enable safe mode after this many consecutive losses
    #[arg(long, requires = "safe_reduction")]
    safe_after: Option<u32>,

    /// Safe mode size reduction in percent
    #[arg(long, requires = "safe_after")]
    safe_reduction: Option<u32>,
}

impl SimArgs {
    fn to_config(&self) -> SimulationConfig {
        let mut config = match self.preset {
            Preset::Recovery => SimulationConfig::recovery_reference(),
            Preset::Flat => SimulationConfig::flat_reference(),
        };

        if let Some(v) = self.win_rate {
            config.win_rate = v;
        }
        if let Some(v) = self.stop_loss {
            config.stop_loss_ticks = v;
        }
        if let Some(v) = self.take_profit {
            config.take_profit_ticks = v;
        }
        if let Some(v) = self.commission {
            config.commission_per_contract = v;
        }
        if let Some(v) = self.tick_value {
            config.tick_value = v;
        }
        if let Some(v) = self.initial_contracts {
            config.initial_contracts = v;
        }
        if let Some(v) = self.max_contracts {
            config.max_contracts = v;
        }
        if let Some(v) = self.capital {
            config.initial_capital = v;
        }
        if let Some(v) = self.trades {
            config.trades_per_path = v;
        }
        if let Some(v) = self.paths {
            config.path_count = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.sample_curves {
            config.sample_curves = v;
        }
        if let (Some(after_losses), Some(reduction_pct)) = (self.safe_after, self.safe_reduction) {
            config.safe_mode = Some(SafeMode { after_losses, reduction_pct });
        }

        config
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("recovery_montecarlo={}", default_level))),
        )
        .init();

    match args.command {
        Commands::Run { sim, json, streaks_csv } => {
            run(sim.to_config(), json, streaks_csv)?;
        }
        Commands::Path { sim, index, limit } => {
            trace_path(sim.to_config(), index, limit)?;
        }
    }

    Ok(())
}

fn run(config: SimulationConfig, json: Option<PathBuf>, streaks_csv: Option<PathBuf>) -> Result<()> {
    info!("=== ENSEMBLE MODE ===");

    let report = run_ensemble(&config)?;
    println!("{}", report::render_text(&config, &report));

    if let Some(path) = json {
        report::write_json(&path, &report)?;
        info!("Wrote report to {:?}", path);
    }

    if let Some(path) = streaks_csv {
        report::write_streaks_csv(&path, &report)?;
        info!("Wrote {} streak rows to {:?}", report.streaks.len(), path);
    }

    Ok(())
}

fn trace_path(config: SimulationConfig, index: u64, limit: usize) -> Result<()> {
    info!("=== PATH MODE ===");
    config.validate()?;

    println!(
        "{:>6} | {:>9} | {:>4} | {:>10} | {:>10} | {:>12}",
        "Trade", "Contracts", "Res", "P&L", "Capital", "Loss to recover"
    );
    println!("{}", "-".repeat(70));

    let mut rng = path_rng(config.seed, index);
    let result = simulate_path_with(&config, index, &mut rng, |t| {
        if t.trade <= limit {
            println!(
                "{:>6} | {:>9} | {:>4} | {:>10.2} | {:>10.2} | {:>12.2}",
                t.trade,
                t.contracts,
                if t.outcome.is_win() { "W" } else { "L" },
                t.pnl,
                t.capital,
                t.policy.cumulative_loss_value
            );
        }
    });

    println!();
    println!("Terminal state: {:?}", result.terminal);
    println!("Trades:         {} ({} W / {} L)", result.trades.total, result.trades.wins, result.trades.losses);
    println!("Final capital:  ${:.2}", result.final_capital);
    println!("Max drawdown:   ${:.2}", result.max_drawdown);
    println!("Longest streak: {}", result.losing_streaks.iter().map(|s| s.length).max().unwrap_or(0));
    println!("Expectancy:     ${:.2}", result.expectancy);
    println!("Profit factor:  {}", result.profit_factor);

    Ok(())
}
