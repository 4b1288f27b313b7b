//! Signal functions: trailing price window + parameters → trading intent.
//!
//! Signals are portfolio-agnostic: they receive a borrowed window of bars
//! ending at "now" and the run's parameter overrides, never tracker or
//! position state. A signal is created once per bar and is read-only after.

pub mod ema_crossover;
pub mod macd_trend;
pub mod rsi_reversion;
pub mod vwap_reversion;

pub use ema_crossover::EmaCrossover;
pub use macd_trend::MacdTrend;
pub use rsi_reversion::RsiReversion;
pub use vwap_reversion::VwapReversion;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{PriceWindow, Side};

use super::params::ParamOverrides;

/// Directional intent of a signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
    #[default]
    None,
}

impl Direction {
    /// Position side this direction opens, if any.
    pub fn side(&self) -> Option<Side> {
        match self {
            Direction::Long => Some(Side::Long),
            Direction::Short => Some(Side::Short),
            Direction::None => None,
        }
    }
}

/// The output of a signal function for one bar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    /// Take-profit levels, nearest first.
    pub targets: Vec<f64>,
    /// Overrides the run's default quantity when set.
    pub quantity: Option<f64>,
    pub rationale: Option<String>,
    /// Free-form conviction score; not interpreted by the engine.
    pub confidence: Option<f64>,
    /// Indicator readings that led to the decision.
    pub features: BTreeMap<String, f64>,
}

impl Signal {
    /// No action this bar.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn long(entry_price: f64) -> Self {
        Self {
            direction: Direction::Long,
            entry_price,
            ..Self::default()
        }
    }

    pub fn short(entry_price: f64) -> Self {
        Self {
            direction: Direction::Short,
            entry_price,
            ..Self::default()
        }
    }

    pub fn with_stop(mut self, stop: f64) -> Self {
        self.stop_loss = Some(stop);
        self
    }

    pub fn with_target(mut self, target: f64) -> Self {
        self.targets.push(target);
        self
    }

    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_feature(mut self, name: impl Into<String>, value: f64) -> Self {
        self.features.insert(name.into(), value);
        self
    }

    pub fn is_none(&self) -> bool {
        self.direction == Direction::None
    }
}

/// Errors raised by a signal function. Fatal for the run that hit them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("signal '{name}' failed: {reason}")]
    Failed { name: String, reason: String },
}

/// Trait for signal functions.
///
/// # Contract
/// - `evaluate` only sees `window`, which ends at the current bar. Looking at
///   later bars is impossible by construction.
/// - `Direction::None` is a valid answer, not an error.
/// - Unknown parameter names are ignored; a known name with a wrong type or an
///   out-of-range value is `SignalError::InvalidParam`.
/// - No side effects: the same window and parameters give the same signal.
pub trait SignalFunction: Send + Sync {
    /// Registry name (e.g., "ema_crossover").
    fn name(&self) -> &str;

    /// Bars needed before `evaluate` can produce anything but `None`.
    ///
    /// Also the place where parameters are first bound, so a bad override
    /// surfaces before the run starts.
    fn warmup_bars(&self, params: &ParamOverrides) -> Result<usize, SignalError>;

    fn evaluate(
        &self,
        window: PriceWindow<'_>,
        params: &ParamOverrides,
    ) -> Result<Signal, SignalError>;
}

type SignalClosure =
    dyn Fn(PriceWindow<'_>, &ParamOverrides) -> Result<Signal, SignalError> + Send + Sync;

/// Adapts a closure to [`SignalFunction`].
pub struct FnSignal {
    name: String,
    warmup: usize,
    f: Box<SignalClosure>,
}

impl FnSignal {
    pub fn new<F>(name: impl Into<String>, warmup: usize, f: F) -> Self
    where
        F: Fn(PriceWindow<'_>, &ParamOverrides) -> Result<Signal, SignalError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            warmup,
            f: Box::new(f),
        }
    }
}

impl std::fmt::Debug for FnSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSignal")
            .field("name", &self.name)
            .field("warmup", &self.warmup)
            .finish_non_exhaustive()
    }
}

impl SignalFunction for FnSignal {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup_bars(&self, _params: &ParamOverrides) -> Result<usize, SignalError> {
        Ok(self.warmup)
    }

    fn evaluate(
        &self,
        window: PriceWindow<'_>,
        params: &ParamOverrides,
    ) -> Result<Signal, SignalError> {
        (self.f)(window, params)
    }
}

/// Shared rule for the built-ins: reject `short` intents unless allowed.
pub(crate) fn gate_short(signal: Signal, allow_short: bool) -> Signal {
    if signal.direction == Direction::Short && !allow_short {
        Signal::none()
    } else {
        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn fn_signal_delegates_to_closure() {
        let sig = FnSignal::new("first_bar", 1, |window, _params| {
            let close = window.last().map(|b| b.close).unwrap_or(0.0);
            Ok(Signal::long(close).with_stop(close - 10.0))
        });

        let bars = make_bars(&[100.0, 101.0]);
        let out = sig
            .evaluate(PriceWindow::new(&bars), &ParamOverrides::new())
            .unwrap();
        assert_eq!(sig.name(), "first_bar");
        assert_eq!(out.direction, Direction::Long);
        assert_eq!(out.entry_price, 101.0);
        assert_eq!(out.stop_loss, Some(91.0));
    }

    #[test]
    fn default_signal_is_none() {
        let s = Signal::none();
        assert!(s.is_none());
        assert_eq!(s.direction.side(), None);
        assert!(s.targets.is_empty());
    }

    #[test]
    fn builders_populate_metadata() {
        let s = Signal::short(50.0)
            .with_stop(52.0)
            .with_target(47.0)
            .with_target(45.0)
            .with_rationale("test")
            .with_confidence(0.7)
            .with_feature("rsi", 75.0);
        assert_eq!(s.direction.side(), Some(Side::Short));
        assert_eq!(s.targets, vec![47.0, 45.0]);
        assert_eq!(s.features.get("rsi"), Some(&75.0));
        assert_eq!(s.confidence, Some(0.7));
    }

    #[test]
    fn short_gate() {
        assert!(gate_short(Signal::short(10.0), false).is_none());
        assert!(!gate_short(Signal::short(10.0), true).is_none());
        assert!(!gate_short(Signal::long(10.0), false).is_none());
    }

    #[test]
    fn direction_serializes_screaming() {
        assert_eq!(serde_json::to_string(&Direction::None).unwrap(), "\"NONE\"");
        assert_eq!(serde_json::to_string(&Direction::Long).unwrap(), "\"LONG\"");
    }
}
