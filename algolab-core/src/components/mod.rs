//! Component traits: indicators and signal functions.
//!
//! - Indicator: pure numeric series over bars, NaN during warmup
//! - Signal function: trailing price window + parameter overrides → Signal
//! - Params: typed overrides injected per run or sweep variant
//! - Factory: strategy name → boxed signal function

pub mod factory;
pub mod indicator;
pub mod params;
pub mod signal;

pub use factory::{build_signal, FactoryError, SIGNAL_NAMES};
pub use indicator::{last_valid, value_at, Indicator};
pub use params::{ParamOverrides, ParamValue};
pub use signal::{Direction, FnSignal, Signal, SignalError, SignalFunction};
