//! Backtesting engine: the single-symbol, single-position bar loop.
//!
//! The engine consumes a validated bar series, a signal function and its
//! parameter overrides, and runs exits → entry → mark-to-market on every bar.

pub mod loop_runner;
pub mod state;

pub use loop_runner::run;
pub use state::{BacktestError, EngineConfig, RunResult};
