//! Engine configuration, run result, and error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::signal::SignalError;
use crate::domain::{BarError, ClosedTrade, EquityPoint, Position};
use crate::position_management::{ExitRules, TrackerError};

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub symbol: String,
    pub initial_capital: f64,
    /// Quantity used when a signal does not size itself.
    pub quantity: f64,
    /// Bars handed to the signal function; raised to its warmup if shorter.
    pub window_bars: usize,
    pub exits: ExitRules,
    /// Close a position still open after the last bar at its close (`MANUAL`).
    pub flatten_at_end: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "UNKNOWN".to_string(),
            initial_capital: 100_000.0,
            quantity: 1.0,
            window_bars: 200,
            exits: ExitRules::default(),
            flatten_at_end: false,
        }
    }
}

impl EngineConfig {
    pub fn new(symbol: impl Into<String>, initial_capital: f64) -> Self {
        Self {
            symbol: symbol.into(),
            initial_capital,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        let bad = |msg: String| Err(BacktestError::InvalidConfig(msg));
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return bad(format!(
                "initial_capital must be > 0, got {}",
                self.initial_capital
            ));
        }
        if !(self.quantity.is_finite() && self.quantity > 0.0) {
            return bad(format!("quantity must be > 0, got {}", self.quantity));
        }
        if self.window_bars == 0 {
            return bad("window_bars must be >= 1".into());
        }
        let exits = &self.exits;
        if exits.time_stop_bars == Some(0) {
            return bad("time_stop_bars must be >= 1".into());
        }
        if exits.breakeven_trigger_r.is_some_and(|r| !(r.is_finite() && r > 0.0)) {
            return bad("breakeven_trigger_r must be > 0".into());
        }
        if !exits.breakeven_offset_r.is_finite() || exits.breakeven_offset_r < 0.0 {
            return bad("breakeven_offset_r must be >= 0".into());
        }
        if exits.trailing_atr_mult.is_some_and(|m| !(m.is_finite() && m > 0.0)) {
            return bad("trailing_atr_mult must be > 0".into());
        }
        if exits.atr_period == 0 {
            return bad("atr_period must be >= 1".into());
        }
        Ok(())
    }
}

/// Everything a single run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub closed_trades: Vec<ClosedTrade>,
    /// One point per bar, marked to market at the bar's close.
    pub equity_curve: Vec<EquityPoint>,
    /// Position still open after the last bar (unless flattened).
    pub open_position: Option<Position>,
    pub warmup_bars: usize,
    pub bars_processed: usize,
    /// Bars that ended with a position open.
    pub bars_in_position: usize,
    /// Non-`NONE` signals that opened a position.
    pub entries: usize,
}

impl RunResult {
    pub fn final_equity(&self) -> Option<f64> {
        self.equity_curve.last().map(|p| p.equity)
    }
}

/// Why a run could not complete.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("data error: {0}")]
    Data(#[from] BarError),

    #[error("signal error: {0}")]
    Signal(#[from] SignalError),

    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
}

impl BacktestError {
    /// Configuration problems (bad parameters, bad config) as opposed to data.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BacktestError::Signal(SignalError::InvalidParam { .. }) | BacktestError::InvalidConfig(_)
        )
    }
}
