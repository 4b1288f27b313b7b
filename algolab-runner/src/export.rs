//! Reporting and export: JSON, CSV, Markdown and plain-text artifacts.
//!
//! - **JSON**: full report round-trip with schema versioning
//! - **CSV**: closed-trade tape and equity curve for external tools
//! - **Markdown**: human-readable single-run summary
//! - **Text**: sweep leaderboard (see [`Leaderboard::render_text`])
//!
//! Persisted reports carry a `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};

use algolab_core::domain::{ClosedTrade, EquityPoint};
use anyhow::{bail, Context, Result};

use crate::leaderboard::Leaderboard;
use crate::result::{BacktestReport, SCHEMA_VERSION};
use crate::sweep::SweepResults;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestReport` to pretty JSON.
pub fn export_json(report: &BacktestReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize BacktestReport to JSON")
}

/// Deserialize a `BacktestReport` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestReport> {
    let report: BacktestReport =
        serde_json::from_str(json).context("failed to deserialize BacktestReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

/// Serialize every sweep outcome (status, timing and report) to pretty JSON.
pub fn export_sweep_json(results: &SweepResults) -> Result<String> {
    serde_json::to_string_pretty(results).context("failed to serialize sweep results to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export closed trades as CSV.
///
/// Columns: symbol, side, entry_bar, entry_time, entry_price, exit_bar,
/// exit_time, exit_price, quantity, pnl, bars_held, exit_reason
pub fn export_trades_csv(trades: &[ClosedTrade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "symbol",
        "side",
        "entry_bar",
        "entry_time",
        "entry_price",
        "exit_bar",
        "exit_time",
        "exit_price",
        "quantity",
        "pnl",
        "bars_held",
        "exit_reason",
    ])?;

    for t in trades {
        wtr.write_record([
            t.symbol.clone(),
            format!("{:?}", t.side).to_uppercase(),
            t.entry_bar.to_string(),
            t.entry_time.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.6}", t.entry_price),
            t.exit_bar.to_string(),
            t.exit_time.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.6}", t.exit_price),
            format!("{:.6}", t.quantity),
            format!("{:.2}", t.pnl),
            t.bars_held.to_string(),
            t.exit_reason.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export an equity curve as CSV with timestamp and equity columns.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity"])?;
    for p in equity_curve {
        wtr.write_record([
            &p.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            &format!("{:.2}", p.equity),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single run.
///
/// Creates `{symbol}_{strategy}_{hash}/` under `output_dir` containing:
/// - `report.json`: the full `BacktestReport`
/// - `trades.csv`: closed-trade tape
/// - `equity.csv`: bar-by-bar equity curve
/// - `summary.md`: Markdown summary
///
/// The directory name derives from the variant's full hash, so re-running the
/// same variant overwrites its artifacts. Returns the created directory.
pub fn save_artifacts(report: &BacktestReport, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "{}_{}_{}",
        report.symbol,
        report.strategy,
        report.full_hash.short()
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    write_file(&run_dir.join("report.json"), &export_json(report)?)?;
    write_file(
        &run_dir.join("trades.csv"),
        &export_trades_csv(&report.closed_trades)?,
    )?;
    write_file(
        &run_dir.join("equity.csv"),
        &export_equity_csv(&report.equity_curve)?,
    )?;
    write_file(&run_dir.join("summary.md"), &generate_report(report))?;

    Ok(run_dir)
}

/// Load a `BacktestReport` from an artifact directory's report.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

/// Write the sweep outcomes (`sweep.json`) and the ranked table (`leaderboard.txt`).
pub fn save_sweep(results: &SweepResults, leaderboard: &Leaderboard, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    write_file(&output_dir.join("sweep.json"), &export_sweep_json(results)?)?;
    write_file(&output_dir.join("leaderboard.txt"), &leaderboard.render_text())?;
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

// ─── Markdown report ────────────────────────────────────────────────

/// Generate a Markdown summary for a single run.
pub fn generate_report(report: &BacktestReport) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Symbol | {} |\n", report.symbol));
    md.push_str(&format!("| Strategy | {} |\n", report.label()));
    if let (Some(first), Some(last)) = (report.first_bar, report.last_bar) {
        md.push_str(&format!("| Period | {first} to {last} |\n"));
    }
    md.push_str(&format!(
        "| Initial Capital | {:.2} |\n",
        report.initial_capital
    ));
    md.push_str(&format!(
        "| Bars | {} ({} warmup) |\n",
        report.bar_count, report.warmup_bars
    ));
    md.push_str(&format!("| Entries | {} |\n", report.entries));
    md.push_str(&format!("| Variant Hash | {} |\n", report.full_hash.short()));
    if let Some(hash) = &report.dataset_hash {
        md.push_str(&format!("| Dataset Hash | {} |\n", hash.short()));
    }
    md.push('\n');

    if let Some(err) = &report.error {
        md.push_str("## Error\n\n");
        md.push_str(&format!("{err}\n"));
        return md;
    }

    let m = &report.metrics;
    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return_pct));
    md.push_str(&format!("| CAGR | {:.2}% |\n", m.cagr_pct));
    md.push_str(&format!("| Sharpe | {:.3} |\n", m.sharpe));
    md.push_str(&format!("| Sortino | {:.3} |\n", m.sortino));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", m.max_drawdown_pct));
    md.push_str(&format!("| Trades | {} |\n", m.trade_count));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", m.win_rate * 100.0));
    md.push_str(&format!("| Profit Factor | {:.2} |\n", m.profit_factor));
    md.push_str(&format!("| Net P&L | {:.2} |\n", m.net_pnl));
    md.push_str(&format!("| Avg Win / Avg Loss | {:.2} / {:.2} |\n", m.avg_win, m.avg_loss));
    md.push_str(&format!("| Expectancy | {:.2} |\n", m.expectancy));
    md.push_str(&format!(
        "| Max Consecutive Losses | {} |\n",
        m.max_consecutive_losses
    ));
    md.push_str(&format!("| Exposure | {:.1}% |\n", m.exposure * 100.0));
    md.push('\n');

    if let Some(pos) = &report.open_position {
        md.push_str("## Open Position\n\n");
        md.push_str(&format!(
            "{:?} {} @ {:.2} since bar {} (qty {}, stop {})\n\n",
            pos.side,
            pos.symbol,
            pos.entry_price,
            pos.entry_bar,
            pos.quantity,
            pos.stop_loss
                .map_or_else(|| "none".to_string(), |s| format!("{s:.2}"))
        ));
    }

    md
}
