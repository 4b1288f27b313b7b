//! TOML backtest configuration.
//!
//! ```toml
//! [backtest]
//! symbol = "SBIN"
//! exchange = "NSE"
//! interval = "5m"
//! start_date = "2024-01-01"
//! end_date = "2024-03-31"
//! initial_capital = 100000.0
//!
//! [exits]
//! time_stop_bars = 30
//!
//! [strategy]
//! name = "ema_crossover"
//! params = { fast = 9, slow = 21 }
//!
//! [data]
//! source = "synthetic"
//! seed = 42
//!
//! [sweep]
//! grid = { fast = [5, 9, 13], slow = [21, 34] }
//! rank_by = "sharpe"
//! ```
//!
//! Dates are quoted strings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use algolab_core::components::{build_signal, FactoryError, ParamOverrides, ParamValue};
use algolab_core::data::{CsvProvider, HistoryRequest, PriceHistoryProvider, SyntheticProvider};
use algolab_core::domain::Interval;
use algolab_core::engine::{BacktestError, EngineConfig};
use algolab_core::fingerprint::VariantSpec;
use algolab_core::position_management::ExitRules;

use crate::fitness::FitnessMetric;

/// Errors from loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    UnknownStrategy(#[from] FactoryError),
}

impl From<BacktestError> for ConfigError {
    fn from(e: BacktestError) -> Self {
        ConfigError::Invalid(e.to_string())
    }
}

/// Top-level configuration for a single run or a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    #[serde(default)]
    pub exits: ExitRules,
    pub strategy: StrategySection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    pub symbol: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default = "default_interval")]
    pub interval: Interval,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default = "default_window_bars")]
    pub window_bars: usize,
    /// Overrides the interval-derived annualization factor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bars_per_year: Option<f64>,
    #[serde(default)]
    pub flatten_at_end: bool,
}

fn default_exchange() -> String {
    "NSE".to_string()
}

fn default_interval() -> Interval {
    Interval::Daily
}

fn default_initial_capital() -> f64 {
    100_000.0
}

fn default_quantity() -> f64 {
    1.0
}

fn default_window_bars() -> usize {
    200
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySection {
    pub name: String,
    #[serde(default)]
    pub params: ParamOverrides,
}

/// Where bars come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DataSource {
    /// Directory of `{EXCHANGE}_{SYMBOL}_{interval}.csv` files.
    Csv { dir: PathBuf },
    Synthetic {
        seed: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_price: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        volatility: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        drift: Option<f64>,
    },
}

impl DataSource {
    /// Build the provider this source describes.
    pub fn provider(&self) -> Box<dyn PriceHistoryProvider> {
        match self {
            DataSource::Csv { dir } => Box::new(CsvProvider::new(dir.clone())),
            DataSource::Synthetic {
                seed,
                start_price,
                volatility,
                drift,
            } => {
                let mut p = SyntheticProvider::new(*seed);
                if let Some(price) = start_price {
                    p = p.with_start_price(*price);
                }
                if let Some(vol) = volatility {
                    p = p.with_volatility(*vol);
                }
                if let Some(d) = drift {
                    p = p.with_drift(*d);
                }
                Box::new(p)
            }
        }
    }
}

/// Parameter grid and ranking options for `sweep`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSection {
    /// Parameter name → candidate values. Combined as a cartesian product on
    /// top of `[strategy].params`.
    #[serde(default)]
    pub grid: BTreeMap<String, Vec<ParamValue>>,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default = "default_top")]
    pub top: usize,
    #[serde(default)]
    pub rank_by: FitnessMetric,
    /// Variants slower than this are reported as skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_budget_ms: Option<u64>,
}

fn default_parallel() -> bool {
    true
}

fn default_top() -> usize {
    10
}

impl Default for SweepSection {
    fn default() -> Self {
        Self {
            grid: BTreeMap::new(),
            parallel: default_parallel(),
            top: default_top(),
            rank_by: FitnessMetric::default(),
            time_budget_ms: None,
        }
    }
}

impl BacktestConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BacktestConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Check ranges and names. Parameter values of the base strategy are
    /// bound once here so typos surface before any data is loaded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bt = &self.backtest;
        if bt.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("backtest.symbol is empty".into()));
        }
        if bt.exchange.trim().is_empty() {
            return Err(ConfigError::Invalid("backtest.exchange is empty".into()));
        }
        if bt.start_date > bt.end_date {
            return Err(ConfigError::Invalid(format!(
                "backtest.start_date {} is after end_date {}",
                bt.start_date, bt.end_date
            )));
        }
        if let Some(bpy) = bt.bars_per_year {
            if !(bpy.is_finite() && bpy > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "backtest.bars_per_year must be > 0, got {bpy}"
                )));
            }
        }
        self.engine_config().validate()?;

        let signal = build_signal(&self.strategy.name)?;
        signal
            .warmup_bars(&self.strategy.params)
            .map_err(|e| ConfigError::Invalid(format!("strategy.params: {e}")))?;

        if let Some(DataSource::Synthetic {
            start_price,
            volatility,
            ..
        }) = &self.data
        {
            if start_price.is_some_and(|p| !(p.is_finite() && p > 0.0)) {
                return Err(ConfigError::Invalid("data.start_price must be > 0".into()));
            }
            if volatility.is_some_and(|v| !(v > 0.0 && v < 0.5)) {
                return Err(ConfigError::Invalid(
                    "data.volatility must be in (0, 0.5)".into(),
                ));
            }
        }

        if let Some(sweep) = &self.sweep {
            if sweep.top == 0 {
                return Err(ConfigError::Invalid("sweep.top must be >= 1".into()));
            }
            if let Some((name, _)) = sweep.grid.iter().find(|(_, values)| values.is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "sweep.grid.{name} has no values"
                )));
            }
            if sweep.time_budget_ms == Some(0) {
                return Err(ConfigError::Invalid(
                    "sweep.time_budget_ms must be >= 1".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        let bt = &self.backtest;
        EngineConfig {
            symbol: bt.symbol.clone(),
            initial_capital: bt.initial_capital,
            quantity: bt.quantity,
            window_bars: bt.window_bars,
            exits: self.exits.clone(),
            flatten_at_end: bt.flatten_at_end,
        }
    }

    pub fn history_request(&self) -> HistoryRequest {
        let bt = &self.backtest;
        HistoryRequest::new(
            bt.symbol.clone(),
            bt.exchange.clone(),
            bt.interval,
            bt.start_date,
            bt.end_date,
        )
    }

    /// Annualization factor: the explicit override or the interval's default.
    pub fn bars_per_year(&self) -> f64 {
        self.backtest
            .bars_per_year
            .unwrap_or_else(|| self.backtest.interval.bars_per_year())
    }

    /// The base variant: strategy, its configured params, and the engine config.
    pub fn variant(&self) -> VariantSpec {
        self.variant_with(self.strategy.params.clone())
    }

    pub fn variant_with(&self, params: ParamOverrides) -> VariantSpec {
        VariantSpec {
            strategy: self.strategy.name.clone(),
            params,
            engine: self.engine_config(),
        }
    }

    /// Provider for the configured `[data]` section, or `None` if absent.
    pub fn provider(&self) -> Option<Box<dyn PriceHistoryProvider>> {
        self.data.as_ref().map(DataSource::provider)
    }
}
