//! Backtest report: the serializable outcome of one run.
//!
//! A report is produced for every run, including failed ones: failures carry
//! an `error` message and an empty trade log instead of propagating.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use algolab_core::components::ParamOverrides;
use algolab_core::domain::{ClosedTrade, EquityPoint, Position};
use algolab_core::fingerprint::{ConfigHash, DatasetHash, FullHash, VariantSpec};

use crate::metrics::PerformanceMetrics;

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Which stage a failed run stopped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Empty, malformed or too-short price series.
    Data,
    /// Unknown strategy, bad parameter, or invalid engine settings.
    Configuration,
    /// The price-history provider could not serve the request.
    Provider,
    /// The signal function failed or emitted an unusable signal.
    Signal,
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub strategy: String,
    pub params: ParamOverrides,
    pub symbol: String,
    pub config_hash: ConfigHash,
    pub full_hash: FullHash,
    /// Absent when no bars were loaded.
    pub dataset_hash: Option<DatasetHash>,
    pub initial_capital: f64,
    pub bars_per_year: f64,
    pub first_bar: Option<NaiveDateTime>,
    pub last_bar: Option<NaiveDateTime>,
    pub bar_count: usize,
    pub warmup_bars: usize,
    pub entries: usize,
    pub metrics: PerformanceMetrics,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    /// Position still open after the last bar, reported apart from closed trades.
    pub open_position: Option<Position>,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestReport {
    /// An empty report for `variant`, before any bars are processed.
    pub fn empty(variant: &VariantSpec, bars_per_year: f64) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            strategy: variant.strategy.clone(),
            params: variant.params.clone(),
            symbol: variant.engine.symbol.clone(),
            config_hash: variant.config_hash(),
            full_hash: variant.full_hash(),
            dataset_hash: None,
            initial_capital: variant.engine.initial_capital,
            bars_per_year,
            first_bar: None,
            last_bar: None,
            bar_count: 0,
            warmup_bars: 0,
            entries: 0,
            metrics: PerformanceMetrics::default(),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
            open_position: None,
            error: None,
            failure: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Record a failure, discarding any partial output.
    pub fn fail(mut self, kind: FailureKind, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self.failure = Some(kind);
        self.metrics = PerformanceMetrics::default();
        self.closed_trades.clear();
        self.equity_curve.clear();
        self.open_position = None;
        self.entries = 0;
        self
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_capital, |p| p.equity)
    }

    /// `"ema_crossover(fast=9,slow=21)"`
    pub fn label(&self) -> String {
        format!("{}({})", self.strategy, self.params.label())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
