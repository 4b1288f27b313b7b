//! Parameter sweep: grid search over signal parameters.
//!
//! Each variant is an independent run over the same pre-loaded bars: it owns
//! its tracker and accumulators, so variants run in parallel under rayon and a
//! failing variant never affects the others.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use algolab_core::components::{ParamOverrides, ParamValue};
use algolab_core::data::PriceHistoryProvider;
use algolab_core::domain::Bar;
use algolab_core::fingerprint::VariantSpec;

use crate::config::BacktestConfig;
use crate::result::BacktestReport;
use crate::runner::{fetch_bars, run_variant, RunError};

/// Parameter grid: name → candidate values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid {
    axes: BTreeMap<String, Vec<ParamValue>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_axis<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.axes
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn axes(&self) -> &BTreeMap<String, Vec<ParamValue>> {
        &self.axes
    }

    /// Number of combinations. An empty grid has one (the base parameters).
    pub fn size(&self) -> usize {
        self.axes.values().map(Vec::len).product()
    }

    /// Every combination, each layered over `base`.
    ///
    /// Ordering is deterministic: axes in name order, last axis varying fastest.
    pub fn combinations(&self, base: &ParamOverrides) -> Vec<ParamOverrides> {
        let mut out = vec![base.clone()];
        for (name, values) in &self.axes {
            out = out
                .iter()
                .flat_map(|params| {
                    values.iter().map(move |v| {
                        let mut next = params.clone();
                        next.insert(name.clone(), v.clone());
                        next
                    })
                })
                .collect();
        }
        out
    }
}

impl From<BTreeMap<String, Vec<ParamValue>>> for ParamGrid {
    fn from(axes: BTreeMap<String, Vec<ParamValue>>) -> Self {
        Self { axes }
    }
}

/// How a variant ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantStatus {
    Completed,
    Failed,
    /// Finished, but slower than the per-variant time budget.
    Skipped,
}

/// One grid point and its report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantOutcome {
    /// Position in grid order.
    pub index: usize,
    pub status: VariantStatus,
    pub elapsed_ms: u64,
    pub report: BacktestReport,
}

/// Parameter sweep executor.
///
/// Runs every grid combination over the same bars, optionally in parallel.
#[derive(Debug, Clone)]
pub struct ParamSweep {
    base: VariantSpec,
    bars_per_year: f64,
    parallel: bool,
    time_budget: Option<Duration>,
}

impl ParamSweep {
    pub fn new(base: VariantSpec, bars_per_year: f64) -> Self {
        Self {
            base,
            bars_per_year,
            parallel: true,
            time_budget: None,
        }
    }

    /// Build from a config's `[sweep]` section (defaults when absent).
    pub fn from_config(config: &BacktestConfig) -> Self {
        let sweep = config.sweep.clone().unwrap_or_default();
        Self::new(config.variant(), config.bars_per_year())
            .with_parallelism(sweep.parallel)
            .with_time_budget(sweep.time_budget_ms.map(Duration::from_millis))
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.time_budget = budget;
        self
    }

    /// Executes the sweep over `grid`.
    pub fn sweep(&self, grid: &ParamGrid, bars: &[Bar]) -> SweepResults {
        self.sweep_with_progress(grid, bars, |_, _, _| {})
    }

    /// Executes a sweep with progress reporting.
    ///
    /// The callback is invoked after each variant completes with its index,
    /// the total number of variants, and the outcome. Under parallel
    /// execution, calls arrive in completion order.
    pub fn sweep_with_progress<F>(&self, grid: &ParamGrid, bars: &[Bar], progress: F) -> SweepResults
    where
        F: Fn(usize, usize, &VariantOutcome) + Send + Sync,
    {
        let variants: Vec<VariantSpec> = grid
            .combinations(&self.base.params)
            .into_iter()
            .map(|params| VariantSpec {
                params,
                ..self.base.clone()
            })
            .collect();
        let total = variants.len();
        let started = Instant::now();

        let run_one = |(index, variant): (usize, &VariantSpec)| {
            let outcome = self.run_one(index, variant, bars);
            progress(index, total, &outcome);
            outcome
        };
        let outcomes: Vec<VariantOutcome> = if self.parallel {
            variants.par_iter().enumerate().map(run_one).collect()
        } else {
            variants.iter().enumerate().map(run_one).collect()
        };

        let results = SweepResults::new(outcomes);
        info!(
            strategy = %self.base.strategy,
            variants = total,
            completed = results.completed().count(),
            failed = results.failed().count(),
            skipped = results.skipped().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sweep complete"
        );
        results
    }

    fn run_one(&self, index: usize, variant: &VariantSpec, bars: &[Bar]) -> VariantOutcome {
        let started = Instant::now();
        let report = run_variant(variant, bars, self.bars_per_year);
        let elapsed = started.elapsed();

        let status = if !report.is_ok() {
            warn!(
                variant = %report.label(),
                error = report.error.as_deref().unwrap_or_default(),
                "variant failed"
            );
            VariantStatus::Failed
        } else if self.time_budget.is_some_and(|budget| elapsed > budget) {
            warn!(
                variant = %report.label(),
                elapsed_ms = elapsed.as_millis() as u64,
                "variant exceeded time budget"
            );
            VariantStatus::Skipped
        } else {
            VariantStatus::Completed
        };

        VariantOutcome {
            index,
            status,
            elapsed_ms: elapsed.as_millis() as u64,
            report,
        }
    }
}

/// Fetch the config's bars once and sweep its `[sweep].grid` over them.
///
/// A failed fetch fails the whole sweep; per-variant failures do not.
pub fn sweep_from_config(
    config: &BacktestConfig,
    provider: &dyn PriceHistoryProvider,
) -> Result<SweepResults, RunError> {
    let bars = fetch_bars(provider, &config.history_request())?;
    let grid = config
        .sweep
        .as_ref()
        .map(|s| ParamGrid::from(s.grid.clone()))
        .unwrap_or_default();
    Ok(ParamSweep::from_config(config).sweep(&grid, &bars))
}

/// Results from a parameter sweep, in grid order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResults {
    outcomes: Vec<VariantOutcome>,
}

impl SweepResults {
    fn new(mut outcomes: Vec<VariantOutcome>) -> Self {
        outcomes.sort_by_key(|o| o.index);
        Self { outcomes }
    }

    /// Returns all outcomes as a slice.
    pub fn all(&self) -> &[VariantOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn completed(&self) -> impl Iterator<Item = &VariantOutcome> {
        self.with_status(VariantStatus::Completed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &VariantOutcome> {
        self.with_status(VariantStatus::Failed)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &VariantOutcome> {
        self.with_status(VariantStatus::Skipped)
    }

    fn with_status(&self, status: VariantStatus) -> impl Iterator<Item = &VariantOutcome> {
        self.outcomes.iter().filter(move |o| o.status == status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algolab_core::data::{HistoryRequest, SyntheticProvider};
    use algolab_core::domain::Interval;
    use algolab_core::engine::EngineConfig;
    use chrono::NaiveDate;

    fn bars() -> Vec<Bar> {
        let req = HistoryRequest::new(
            "RELIANCE",
            "NSE",
            Interval::Daily,
            NaiveDate::from_ymd_opt(2022, 1, 3).unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 29).unwrap(),
        );
        SyntheticProvider::new(11).history(&req).unwrap()
    }

    fn base() -> VariantSpec {
        VariantSpec {
            strategy: "ema_crossover".into(),
            params: ParamOverrides::new().with("atr_period", 10i64),
            engine: EngineConfig::new("RELIANCE", 100_000.0),
        }
    }

    #[test]
    fn test_param_grid_size() {
        let grid = ParamGrid::new()
            .with_axis("fast", [5i64, 9, 13])
            .with_axis("slow", [21i64, 34]);
        assert_eq!(grid.size(), 6);
        assert_eq!(ParamGrid::new().size(), 1);
    }

    #[test]
    fn test_combinations_layer_over_base_in_order() {
        let grid = ParamGrid::new()
            .with_axis("fast", [5i64, 9])
            .with_axis("slow", [21i64, 34]);
        let combos = grid.combinations(&ParamOverrides::new().with("atr_period", 10i64));
        let labels: Vec<String> = combos.iter().map(|p| p.label()).collect();
        assert_eq!(
            labels,
            vec![
                "atr_period=10,fast=5,slow=21",
                "atr_period=10,fast=5,slow=34",
                "atr_period=10,fast=9,slow=21",
                "atr_period=10,fast=9,slow=34",
            ]
        );
    }

    #[test]
    fn test_grid_value_overrides_base() {
        let grid = ParamGrid::new().with_axis("fast", [3i64]);
        let combos = grid.combinations(&ParamOverrides::new().with("fast", 9i64));
        assert_eq!(combos.len(), 1);
        assert_eq!(combos[0].get("fast"), Some(&ParamValue::Int(3)));
    }

    #[test]
    fn test_param_sweep_sequential_matches_parallel() {
        let bars = bars();
        let grid = ParamGrid::new()
            .with_axis("fast", [5i64, 9])
            .with_axis("slow", [21i64, 34]);
        let seq = ParamSweep::new(base(), 252.0)
            .with_parallelism(false)
            .sweep(&grid, &bars);
        let par = ParamSweep::new(base(), 252.0).sweep(&grid, &bars);
        assert_eq!(seq.len(), 4);
        for (a, b) in seq.all().iter().zip(par.all()) {
            assert_eq!(a.index, b.index);
            assert_eq!(a.report, b.report);
        }
    }

    #[test]
    fn test_failing_variant_is_isolated() {
        let grid = ParamGrid::new()
            .with_axis("fast", [9i64, 40])
            .with_axis("slow", [21i64]);
        let results = ParamSweep::new(base(), 252.0).sweep(&grid, &bars());
        assert_eq!(results.completed().count(), 1);
        let failed: Vec<_> = results.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].index, 1);
        assert!(failed[0].report.error.is_some());
    }

    #[test]
    fn test_time_budget_marks_skipped() {
        let grid = ParamGrid::new().with_axis("fast", [5i64, 9]);
        let results = ParamSweep::new(base(), 252.0)
            .with_time_budget(Some(Duration::ZERO))
            .sweep(&grid, &bars());
        // Every real run takes longer than zero.
        assert_eq!(results.skipped().count(), 2);
        assert!(results.all().iter().all(|o| o.report.is_ok()));
    }

    #[test]
    fn test_progress_called_once_per_variant() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = AtomicUsize::new(0);
        let grid = ParamGrid::new().with_axis("slow", [21i64, 34, 55]);
        ParamSweep::new(base(), 252.0).sweep_with_progress(&grid, &bars(), |_, total, _| {
            assert_eq!(total, 3);
            calls.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
