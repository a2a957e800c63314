//! Text, CSV and JSON output for ensemble reports

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::Path;

use crate::simulation::{EnsembleReport, SimulationConfig};

/// Render the full text report
pub fn render_text(config: &SimulationConfig, report: &EnsembleReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_text(&mut out, config, report);
    out
}

fn write_text(
    out: &mut String,
    config: &SimulationConfig,
    report: &EnsembleReport,
) -> std::fmt::Result {
    let rule = "=".repeat(90);

    writeln!(out, "\n{}", rule)?;
    writeln!(out, "CONFIG")?;
    writeln!(out, "{}", rule)?;
    writeln!(out, "Win Rate: {:.1}%", config.win_rate * 100.0)?;
    writeln!(
        out,
        "SL: {} ticks | TP: {} ticks | Tick value: ${:.2} | Commission: ${:.2}/side",
        config.stop_loss_ticks, config.take_profit_ticks, config.tick_value, config.commission_per_contract
    )?;
    writeln!(
        out,
        "Contracts: {} initial, {} max | Capital: ${:.2}",
        config.initial_contracts, config.max_contracts, config.initial_capital
    )?;
    if let Some(safe) = config.safe_mode {
        writeln!(
            out,
            "Safe mode: -{}% after {} consecutive losses",
            safe.reduction_pct, safe.after_losses
        )?;
    }
    writeln!(
        out,
        "Paths: {} x {} trades (seed {})",
        report.path_count, config.trades_per_path, config.seed
    )?;

    writeln!(out, "\nLOSING STREAKS")?;
    writeln!(out, "{}", rule)?;
    writeln!(
        out,
        "{:<10} | {:<10} | {:<13} | {:<13} | {:<13} | {:<15}",
        "Length", "Count", "Contracts Avg", "Contracts Max", "Contracts Min", "Tick Loss Avg"
    )?;
    writeln!(out, "{}", "-".repeat(90))?;
    for s in &report.streaks {
        writeln!(
            out,
            "{:<10} | {:<10} | {:<13.1} | {:<13} | {:<13} | {:>15.1}",
            s.length,
            s.count,
            s.mean_peak_contracts,
            s.max_peak_contracts,
            s.min_peak_contracts,
            s.mean_tick_loss
        )?;
    }

    writeln!(out, "\nDRAWDOWN")?;
    writeln!(out, "{}", rule)?;
    writeln!(out, "Mean max drawdown:  ${:.2}", report.drawdown.mean)?;
    writeln!(out, "Worst max drawdown: ${:.2}", report.drawdown.max)?;
    writeln!(out, "Longest losing streak: {}", report.longest_streak())?;

    writeln!(out, "\nRUIN & LOSING PATHS")?;
    writeln!(out, "{}", rule)?;
    writeln!(
        out,
        "Ruined (capital <= 0):   {} of {} ({:.2}%)",
        report.ruin_count,
        report.path_count,
        report.ruin_rate * 100.0
    )?;
    writeln!(
        out,
        "Below initial capital:   {} of {} ({:.2}%)",
        report.below_initial_count,
        report.path_count,
        report.below_initial_rate * 100.0
    )?;

    let t = &report.trades;
    writeln!(out, "\nTRADES")?;
    writeln!(out, "{}", rule)?;
    writeln!(out, "Total trades:  {}", t.total_trades)?;
    writeln!(
        out,
        "Winners:       {} ({:.1}%)",
        t.total_wins,
        t.observed_win_rate * 100.0
    )?;
    writeln!(out, "Losers:        {}", t.total_losses)?;
    writeln!(out, "Avg win:       ${:.2}", t.avg_win)?;
    writeln!(out, "Avg loss:      ${:.2}", t.avg_loss)?;
    writeln!(out, "Expectancy:    ${:.2} per trade", t.expectancy)?;
    writeln!(out, "Profit factor: {}", t.profit_factor)?;

    let f = &report.final_capital;
    writeln!(out, "\nFINAL CAPITAL")?;
    writeln!(out, "{}", rule)?;
    writeln!(out, "Mean:    ${:.2}", f.mean)?;
    writeln!(out, "Median:  ${:.2}", f.median)?;
    writeln!(out, "Std dev: ${:.2}", f.std_dev)?;
    writeln!(out, "Q1 / Q3: ${:.2} / ${:.2}", f.q1, f.q3)?;
    writeln!(out, "Min:     ${:.2}", f.min)?;
    writeln!(out, "Max:     ${:.2}", f.max)?;

    Ok(())
}

/// Write the streak table as CSV
pub fn write_streaks_csv(path: &Path, report: &EnsembleReport) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    for row in &report.streaks {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the whole report as pretty JSON
pub fn write_json(path: &Path, report: &EnsembleReport) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .with_context(|| format!("Failed to write report to {:?}", path))?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush report to {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::run_ensemble;

    fn small_report() -> (SimulationConfig, EnsembleReport) {
        let config = SimulationConfig {
            trades_per_path: 200,
            path_count: 50,
            sample_curves: 2,
            ..SimulationConfig::recovery_reference()
        };
        let report = run_ensemble(&config).unwrap();
        (config, report)
    }

    #[test]
    fn test_text_report_sections() {
        let (config, report) = small_report();
        let text = render_text(&config, &report);
        for section in ["LOSING STREAKS", "DRAWDOWN", "RUIN & LOSING PATHS", "TRADES", "FINAL CAPITAL"] {
            assert!(text.contains(section), "missing {}", section);
        }
        assert!(text.contains("Paths: 50 x 200 trades"));
        assert!(text.contains(&format!("Longest losing streak: {}", report.longest_streak())));
    }

    #[test]
    fn test_undefined_profit_factor_in_text_and_json() {
        let config = SimulationConfig {
            win_rate: 1.0,
            trades_per_path: 10,
            path_count: 3,
            ..SimulationConfig::recovery_reference()
        };
        let report = run_ensemble(&config).unwrap();
        assert!(render_text(&config, &report).contains("Profit factor: undefined"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["trades"]["profit_factor"], "undefined");
    }

    #[test]
    fn test_file_writers() {
        let (_, report) = small_report();
        let dir = std::env::temp_dir().join(format!("recovery-mc-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let csv_path = dir.join("streaks.csv");
        write_streaks_csv(&csv_path, &report).unwrap();
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "length,count,mean_peak_contracts,min_peak_contracts,max_peak_contracts,mean_tick_loss"
        );
        assert_eq!(lines.count(), report.streaks.len());

        let json_path = dir.join("report.json");
        write_json(&json_path, &report).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(value["path_count"], 50);
        assert_eq!(value["sample_curves"].as_array().unwrap().len(), 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_json_write_error_is_reported() {
        // Small enough to sit in the buffer until the final flush
        let config = SimulationConfig {
            trades_per_path: 5,
            path_count: 2,
            sample_curves: 0,
            ..SimulationConfig::recovery_reference()
        };
        let report = run_ensemble(&config).unwrap();
        assert!(write_json(Path::new("/dev/full"), &report).is_err());
    }
}
