//! Backtest runner: wires together provider, signal function, engine, and metrics.
//!
//! Entry points:
//! - `run_backtest()`: fetches bars for a config from a provider, then runs. Used by the CLI.
//! - `run_variant()`: pre-loaded bars + a variant (strategy name, params, engine config).
//!   Used by sweeps so each variant skips the fetch.
//! - `run_with_signal()`: pre-loaded bars + an explicit signal function, for callers
//!   plugging in their own `SignalFunction` or `FnSignal`.
//!
//! None of them return `Err`: every failure is recorded in the report.

use thiserror::Error;
use tracing::{debug, info};

use algolab_core::components::{build_signal, FactoryError, SignalError, SignalFunction};
use algolab_core::data::{HistoryRequest, PriceHistoryProvider, ProviderError};
use algolab_core::domain::{equity_values, Bar};
use algolab_core::engine::{self, BacktestError};
use algolab_core::fingerprint::{dataset_hash, VariantSpec};

use crate::config::{BacktestConfig, ConfigError};
use crate::metrics::PerformanceMetrics;
use crate::result::{BacktestReport, FailureKind};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Factory(#[from] FactoryError),
    #[error(transparent)]
    Backtest(#[from] BacktestError),
}

impl RunError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RunError::Config(_) | RunError::Factory(_) => FailureKind::Configuration,
            RunError::Provider(_) => FailureKind::Provider,
            RunError::Backtest(e) => backtest_failure_kind(e),
        }
    }
}

fn backtest_failure_kind(e: &BacktestError) -> FailureKind {
    match e {
        BacktestError::Data(_) => FailureKind::Data,
        BacktestError::Signal(SignalError::Failed { .. }) | BacktestError::Tracker(_) => {
            FailureKind::Signal
        }
        BacktestError::Signal(SignalError::InvalidParam { .. })
        | BacktestError::InvalidConfig(_) => FailureKind::Configuration,
    }
}

/// Run the config's base variant over bars fetched from `provider`.
pub fn run_backtest(config: &BacktestConfig, provider: &dyn PriceHistoryProvider) -> BacktestReport {
    run_variant_from_provider(
        &config.variant(),
        &config.history_request(),
        provider,
        config.bars_per_year(),
    )
}

/// Fetch bars for `request`, then run `variant` over them.
pub fn run_variant_from_provider(
    variant: &VariantSpec,
    request: &HistoryRequest,
    provider: &dyn PriceHistoryProvider,
    bars_per_year: f64,
) -> BacktestReport {
    match fetch_bars(provider, request) {
        Ok(bars) => run_variant(variant, &bars, bars_per_year),
        Err(e) => {
            info!(request = %request, provider = provider.name(), error = %e, "history fetch failed");
            BacktestReport::empty(variant, bars_per_year).fail(e.kind(), e.to_string())
        }
    }
}

/// Validate `request` and load its bars. An empty range is `Ok(vec![])`.
pub fn fetch_bars(
    provider: &dyn PriceHistoryProvider,
    request: &HistoryRequest,
) -> Result<Vec<Bar>, RunError> {
    request.validate()?;
    let bars = provider.history(request)?;
    debug!(request = %request, provider = provider.name(), bars = bars.len(), "history loaded");
    Ok(bars)
}

/// Run a variant with pre-loaded bars, without I/O.
pub fn run_variant(variant: &VariantSpec, bars: &[Bar], bars_per_year: f64) -> BacktestReport {
    match build_signal(&variant.strategy) {
        Ok(signal) => run_with_signal(signal.as_ref(), variant, bars, bars_per_year),
        Err(e) => {
            let err = RunError::from(e);
            BacktestReport::empty(variant, bars_per_year).fail(err.kind(), err.to_string())
        }
    }
}

/// Run an explicit signal function with pre-loaded bars.
///
/// `variant.strategy` only labels the report; the engine calls `signal`.
pub fn run_with_signal(
    signal: &dyn SignalFunction,
    variant: &VariantSpec,
    bars: &[Bar],
    bars_per_year: f64,
) -> BacktestReport {
    let mut report = BacktestReport::empty(variant, bars_per_year);
    if !bars.is_empty() {
        report.dataset_hash = Some(dataset_hash(bars));
        report.first_bar = bars.first().map(|b| b.timestamp);
        report.last_bar = bars.last().map(|b| b.timestamp);
    }
    report.bar_count = bars.len();

    let result = match engine::run(bars, signal, &variant.params, &variant.engine) {
        Ok(result) => result,
        Err(e) => {
            info!(variant = %report.label(), error = %e, "backtest failed");
            return report.fail(backtest_failure_kind(&e), e.to_string());
        }
    };

    let equity = equity_values(&result.equity_curve);
    report.metrics = PerformanceMetrics::compute(
        &equity,
        &result.closed_trades,
        variant.engine.initial_capital,
        result.bars_in_position,
        bars_per_year,
    );
    report.warmup_bars = result.warmup_bars;
    report.entries = result.entries;
    report.closed_trades = result.closed_trades;
    report.equity_curve = result.equity_curve;
    report.open_position = result.open_position;

    info!(
        variant = %report.label(),
        symbol = %report.symbol,
        bars = report.bar_count,
        trades = report.metrics.trade_count,
        return_pct = report.metrics.total_return_pct,
        sharpe = report.metrics.sharpe,
        open = report.open_position.is_some(),
        "backtest complete"
    );
    report
}
