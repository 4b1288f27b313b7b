//! AlgoLab Runner: backtest orchestration, parameter sweeps, leaderboards, metrics.
//!
//! This crate builds on `algolab-core` to provide:
//! - Performance metrics over closed trades and equity curves
//! - Single-run orchestration that records failures in the report
//! - Parameter grid sweeps, optionally parallel
//! - Leaderboard ranking with per-variant failure lines
//! - TOML configuration
//! - JSON / CSV / Markdown / text export

pub mod config;
pub mod export;
pub mod fitness;
pub mod leaderboard;
pub mod metrics;
pub mod result;
pub mod runner;
pub mod sweep;

pub use config::{BacktestConfig, ConfigError, DataSource, SweepSection};
pub use fitness::FitnessMetric;
pub use leaderboard::{FailureLine, InsertResult, Leaderboard, LeaderboardEntry};
pub use metrics::PerformanceMetrics;
pub use result::{BacktestReport, FailureKind, SCHEMA_VERSION};
pub use runner::{
    fetch_bars, run_backtest, run_variant, run_variant_from_provider, run_with_signal, RunError,
};
pub use sweep::{sweep_from_config, ParamGrid, ParamSweep, SweepResults, VariantOutcome, VariantStatus};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn performance_metrics_is_send_sync() {
        assert_send::<PerformanceMetrics>();
        assert_sync::<PerformanceMetrics>();
    }

    #[test]
    fn backtest_report_is_send_sync() {
        assert_send::<BacktestReport>();
        assert_sync::<BacktestReport>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<BacktestConfig>();
        assert_sync::<BacktestConfig>();
        assert_send::<ParamGrid>();
        assert_sync::<ParamGrid>();
    }

    #[test]
    fn sweep_types_are_send_sync() {
        assert_send::<ParamSweep>();
        assert_sync::<ParamSweep>();
        assert_send::<VariantOutcome>();
        assert_sync::<VariantOutcome>();
    }

    #[test]
    fn leaderboard_is_send_sync() {
        assert_send::<Leaderboard>();
        assert_sync::<Leaderboard>();
    }
}
