//! AlgoLab CLI: run, sweep, and synthetic-data commands.
//!
//! Commands:
//! - `run`: execute one backtest from a TOML config file
//! - `sweep`: grid-search the config's `[sweep]` parameters and print a leaderboard
//! - `synth`: write a seeded synthetic OHLCV series as CSV
//!
//! Logging goes to stderr through `tracing`; set `RUST_LOG` to adjust (default `info`).

use std::path::{Path, PathBuf};

use algolab_core::data::{write_bars, CsvProvider, HistoryRequest, PriceHistoryProvider, SyntheticProvider};
use algolab_core::domain::Interval;
use algolab_runner::export::{generate_report, save_artifacts, save_sweep};
use algolab_runner::{
    run_backtest, sweep_from_config, BacktestConfig, BacktestReport, DataSource, FitnessMetric,
    Leaderboard,
};
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "algolab", about = "AlgoLab CLI: bar-by-bar backtesting and parameter sweeps")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the config's `[data]` section.
#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Read `{EXCHANGE}_{SYMBOL}_{interval}.csv` files from this directory.
    #[arg(long, conflicts_with = "seed")]
    data_dir: Option<PathBuf>,

    /// Use a seeded synthetic series instead of files.
    #[arg(long)]
    seed: Option<u64>,
}

impl DataArgs {
    fn apply(&self, config: &mut BacktestConfig) {
        if let Some(dir) = &self.data_dir {
            config.data = Some(DataSource::Csv { dir: dir.clone() });
        } else if let Some(seed) = self.seed {
            config.data = Some(DataSource::Synthetic {
                seed,
                start_price: None,
                volatility: None,
                drift: None,
            });
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a single backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        #[command(flatten)]
        data: DataArgs,

        /// Directory for report.json, trades.csv, equity.csv and summary.md.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Print the full report as JSON instead of the Markdown summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run every combination of the config's `[sweep].grid` and rank them.
    Sweep {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        #[command(flatten)]
        data: DataArgs,

        /// Rows to keep (overrides `[sweep].top`).
        #[arg(long)]
        top: Option<usize>,

        /// Ranking metric (overrides `[sweep].rank_by`), e.g. sharpe, profit_factor, max_drawdown.
        #[arg(long)]
        rank_by: Option<FitnessMetric>,

        /// Run variants one at a time.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Directory for sweep.json and leaderboard.txt.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Write a seeded synthetic OHLCV series as CSV.
    Synth {
        #[arg(long)]
        symbol: String,

        #[arg(long, default_value = "NSE")]
        exchange: String,

        /// Bar interval, e.g. 1m, 5m, 15m, 1h, D.
        #[arg(long, default_value = "5m")]
        interval: Interval,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: NaiveDate,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: NaiveDate,

        #[arg(long)]
        seed: u64,

        #[arg(long, default_value_t = 100.0)]
        start_price: f64,

        /// Maximum absolute per-bar return.
        #[arg(long, default_value_t = 0.01)]
        volatility: f64,

        /// Output directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data,
            output_dir,
            json,
        } => run_cmd(config, data, output_dir, json),
        Commands::Sweep {
            config,
            data,
            top,
            rank_by,
            sequential,
            output_dir,
        } => sweep_cmd(config, data, top, rank_by, sequential, output_dir),
        Commands::Synth {
            symbol,
            exchange,
            interval,
            start,
            end,
            seed,
            start_price,
            volatility,
            out_dir,
        } => {
            let provider = SyntheticProvider::new(seed)
                .with_start_price(start_price)
                .with_volatility(volatility);
            let request = HistoryRequest::new(symbol, exchange, interval, start, end);
            synth_cmd(&provider, &request, out_dir)
        }
    }
}

fn load_config(path: &Path, data: &DataArgs) -> Result<BacktestConfig> {
    let mut config = BacktestConfig::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    data.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn provider_for(config: &BacktestConfig) -> Result<Box<dyn PriceHistoryProvider>> {
    match config.provider() {
        Some(p) => Ok(p),
        None => bail!("no data source: add a [data] section or pass --data-dir / --seed"),
    }
}

fn run_cmd(
    config_path: PathBuf,
    data: DataArgs,
    output_dir: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let config = load_config(&config_path, &data)?;
    let provider = provider_for(&config)?;
    info!(request = %config.history_request(), provider = provider.name(), "running backtest");

    let report = run_backtest(&config, provider.as_ref());

    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", generate_report(&report));
    }

    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&report, &dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }

    fail_on_error(&report)
}

fn fail_on_error(report: &BacktestReport) -> Result<()> {
    match &report.error {
        Some(err) => bail!("backtest failed: {err}"),
        None => Ok(()),
    }
}

fn sweep_cmd(
    config_path: PathBuf,
    data: DataArgs,
    top: Option<usize>,
    rank_by: Option<FitnessMetric>,
    sequential: bool,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(&config_path, &data)?;
    let sweep = config.sweep.get_or_insert_with(Default::default);
    if let Some(n) = top {
        sweep.top = n;
    }
    if let Some(metric) = rank_by {
        sweep.rank_by = metric;
    }
    if sequential {
        sweep.parallel = false;
    }
    let (top, metric) = (sweep.top, sweep.rank_by);
    config.validate()?;

    let provider = provider_for(&config)?;
    let results = sweep_from_config(&config, provider.as_ref())?;
    let leaderboard = Leaderboard::from_sweep(config.backtest.symbol.clone(), &results, top, metric);

    print!("{}", leaderboard.render_text());

    if let Some(dir) = output_dir {
        save_sweep(&results, &leaderboard, &dir)?;
        println!("Sweep saved to: {}", dir.display());
    }
    if results.completed().count() == 0 && !results.is_empty() {
        bail!("every variant failed");
    }
    Ok(())
}

fn synth_cmd(
    provider: &SyntheticProvider,
    request: &HistoryRequest,
    out_dir: PathBuf,
) -> Result<()> {
    request.validate()?;
    let bars = provider.history(request)?;
    let csv = CsvProvider::new(out_dir);
    let path = csv.path_for(&request.exchange, &request.symbol, request.interval);
    std::fs::create_dir_all(csv.data_dir())
        .with_context(|| format!("creating {}", csv.data_dir().display()))?;
    write_bars(&path, &bars)?;
    info!(request = %request, bars = bars.len(), path = %path.display(), "synthetic series written");
    println!("Wrote {} bars to {}", bars.len(), path.display());
    Ok(())
}
