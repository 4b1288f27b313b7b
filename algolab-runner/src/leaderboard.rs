//! Sweep leaderboard: bounded, deduplicated, sorted by fitness.
//!
//! Deduplication key: `full_hash` (exact strategy + params + engine config). If
//! a variant with the same full_hash arrives with a better score it replaces
//! the existing entry; otherwise it is skipped. Failed variants are kept as
//! one failure line each so a sweep summary shows what broke.

use std::cmp::Ordering;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use algolab_core::components::ParamOverrides;
use algolab_core::fingerprint::FullHash;

use crate::fitness::FitnessMetric;
use crate::metrics::PerformanceMetrics;
use crate::result::{BacktestReport, FailureKind};
use crate::sweep::{SweepResults, VariantStatus};

/// A ranked variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub label: String,
    pub strategy: String,
    pub params: ParamOverrides,
    pub full_hash: FullHash,
    pub fitness_score: f64,
    pub metrics: PerformanceMetrics,
    pub open_position: bool,
}

impl LeaderboardEntry {
    pub fn from_report(report: &BacktestReport, metric: FitnessMetric) -> Self {
        Self {
            label: report.label(),
            strategy: report.strategy.clone(),
            params: report.params.clone(),
            full_hash: report.full_hash.clone(),
            fitness_score: metric.extract(&report.metrics),
            metrics: report.metrics.clone(),
            open_position: report.open_position.is_some(),
        }
    }
}

/// A variant that did not produce a rankable result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureLine {
    pub label: String,
    pub full_hash: FullHash,
    pub status: VariantStatus,
    pub kind: Option<FailureKind>,
    pub message: String,
}

/// Outcome of an insert operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// New entry added to the leaderboard.
    Inserted,
    /// Replaced an existing entry with the same full_hash (better score).
    Replaced,
    /// Skipped: duplicate with worse or equal score, full and not better, or non-finite score.
    Skipped,
}

/// Top N variants ranked by one metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leaderboard {
    symbol: String,
    metric: FitnessMetric,
    max_size: usize,
    entries: Vec<LeaderboardEntry>,
    failures: Vec<FailureLine>,
    /// Variants considered, including failures.
    considered: usize,
}

impl Leaderboard {
    pub fn new(symbol: impl Into<String>, max_size: usize, metric: FitnessMetric) -> Self {
        Self {
            symbol: symbol.into(),
            metric,
            max_size,
            entries: Vec::with_capacity(max_size.min(1024)),
            failures: Vec::new(),
            considered: 0,
        }
    }

    /// Rank every completed variant of a sweep and collect failure lines.
    pub fn from_sweep(
        symbol: impl Into<String>,
        results: &SweepResults,
        max_size: usize,
        metric: FitnessMetric,
    ) -> Self {
        let mut lb = Self::new(symbol, max_size, metric);
        for outcome in results.all() {
            lb.considered += 1;
            match outcome.status {
                VariantStatus::Completed => {
                    lb.insert(LeaderboardEntry::from_report(&outcome.report, metric));
                }
                VariantStatus::Failed => lb.failures.push(FailureLine {
                    label: outcome.report.label(),
                    full_hash: outcome.report.full_hash.clone(),
                    status: outcome.status,
                    kind: outcome.report.failure,
                    message: outcome.report.error.clone().unwrap_or_default(),
                }),
                VariantStatus::Skipped => lb.failures.push(FailureLine {
                    label: outcome.report.label(),
                    full_hash: outcome.report.full_hash.clone(),
                    status: outcome.status,
                    kind: None,
                    message: format!("exceeded time budget ({} ms)", outcome.elapsed_ms),
                }),
            }
        }
        lb
    }

    /// Insert an entry. Returns the outcome.
    ///
    /// - Rejects entries with non-finite fitness scores.
    /// - Deduplicates by `full_hash`: replaces if better, skips if worse.
    /// - After insert, trims to `max_size` by removing the worst entry.
    pub fn insert(&mut self, entry: LeaderboardEntry) -> InsertResult {
        if !entry.fitness_score.is_finite() {
            return InsertResult::Skipped;
        }

        if let Some(idx) = self.find_by_hash(&entry.full_hash) {
            if self
                .metric
                .is_better(entry.fitness_score, self.entries[idx].fitness_score)
            {
                self.entries[idx] = entry;
                self.sort_entries();
                return InsertResult::Replaced;
            }
            return InsertResult::Skipped;
        }

        if self.entries.len() < self.max_size {
            self.entries.push(entry);
            self.sort_entries();
            InsertResult::Inserted
        } else if let Some(worst) = self.entries.last() {
            if self.metric.is_better(entry.fitness_score, worst.fitness_score) {
                self.entries.pop();
                self.entries.push(entry);
                self.sort_entries();
                InsertResult::Inserted
            } else {
                InsertResult::Skipped
            }
        } else {
            // max_size 0
            InsertResult::Skipped
        }
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    pub fn failures(&self) -> &[FailureLine] {
        &self.failures
    }

    pub fn best(&self) -> Option<&LeaderboardEntry> {
        self.entries.first()
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn metric(&self) -> FitnessMetric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plain-text table: one row per ranked variant, then one line per failure.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Leaderboard {} | rank by {} | top {} of {} variants",
            self.symbol,
            self.metric,
            self.entries.len(),
            self.considered.max(self.entries.len())
        );
        let _ = writeln!(
            out,
            "{:>3}  {:>10}  {:>9}  {:>8}  {:>7}  {:>6}  {:>6}  {:>6}  {:<12}  variant",
            "#", "score", "return%", "maxdd%", "sharpe", "trades", "win%", "pf", "hash"
        );
        for (i, e) in self.entries.iter().enumerate() {
            let m = &e.metrics;
            let _ = writeln!(
                out,
                "{:>3}  {:>10.4}  {:>9.2}  {:>8.2}  {:>7.2}  {:>6}  {:>6.1}  {:>6.2}  {:<12}  {}{}",
                i + 1,
                e.fitness_score,
                m.total_return_pct,
                m.max_drawdown_pct,
                m.sharpe,
                m.trade_count,
                m.win_rate * 100.0,
                m.profit_factor,
                e.full_hash.short(),
                e.label,
                if e.open_position { " (open)" } else { "" }
            );
        }
        for f in &self.failures {
            let tag = match f.status {
                VariantStatus::Skipped => "SKIPPED",
                _ => "FAILED",
            };
            let _ = writeln!(out, "{tag} {} [{}]: {}", f.label, f.full_hash.short(), f.message);
        }
        out
    }

    fn find_by_hash(&self, hash: &FullHash) -> Option<usize> {
        self.entries.iter().position(|e| e.full_hash == *hash)
    }

    /// Best first; ties broken by full_hash so the order is reproducible.
    fn sort_entries(&mut self) {
        let metric = self.metric;
        self.entries.sort_by(|a, b| {
            let by_score = if metric.is_higher_better() {
                b.fitness_score.partial_cmp(&a.fitness_score)
            } else {
                a.fitness_score.partial_cmp(&b.fitness_score)
            };
            by_score
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.full_hash.cmp(&b.full_hash))
        });
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(strategy: &str, lookback: i64, score: f64) -> LeaderboardEntry {
        let params = ParamOverrides::new().with("lookback", lookback);
        let hash_input = format!("{strategy}:{}", params.label());
        LeaderboardEntry {
            label: format!("{strategy}({})", params.label()),
            strategy: strategy.into(),
            params,
            full_hash: FullHash::from_bytes(hash_input.as_bytes()),
            fitness_score: score,
            metrics: PerformanceMetrics {
                sharpe: score,
                max_drawdown_pct: score,
                ..PerformanceMetrics::default()
            },
            open_position: false,
        }
    }

    #[test]
    fn insert_unique_entries() {
        let mut lb = Leaderboard::new("SBIN", 10, FitnessMetric::Sharpe);
        assert_eq!(lb.insert(make_entry("ema_crossover", 9, 1.5)), InsertResult::Inserted);
        assert_eq!(lb.insert(make_entry("ema_crossover", 13, 2.0)), InsertResult::Inserted);
        assert_eq!(lb.insert(make_entry("macd_trend", 12, 1.0)), InsertResult::Inserted);
        assert_eq!(lb.len(), 3);
    }

    #[test]
    fn entries_sorted_best_first() {
        let mut lb = Leaderboard::new("SBIN", 10, FitnessMetric::Sharpe);
        lb.insert(make_entry("ema_crossover", 9, 1.0));
        lb.insert(make_entry("ema_crossover", 13, 3.0));
        lb.insert(make_entry("macd_trend", 12, 2.0));
        let scores: Vec<f64> = lb.entries().iter().map(|e| e.fitness_score).collect();
        assert_eq!(scores, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn drawdown_ranks_lowest_first() {
        let mut lb = Leaderboard::new("SBIN", 2, FitnessMetric::MaxDrawdown);
        lb.insert(make_entry("ema_crossover", 9, 12.0));
        lb.insert(make_entry("ema_crossover", 13, 4.0));
        assert_eq!(lb.insert(make_entry("macd_trend", 12, 8.0)), InsertResult::Inserted);
        let scores: Vec<f64> = lb.entries().iter().map(|e| e.fitness_score).collect();
        assert_eq!(scores, vec![4.0, 8.0]);
    }

    #[test]
    fn dedup_replaces_on_better_score() {
        let mut lb = Leaderboard::new("SBIN", 10, FitnessMetric::Sharpe);
        lb.insert(make_entry("ema_crossover", 9, 1.0));
        assert_eq!(lb.insert(make_entry("ema_crossover", 9, 2.0)), InsertResult::Replaced);
        assert_eq!(lb.len(), 1);
        assert_eq!(lb.entries()[0].fitness_score, 2.0);
    }

    #[test]
    fn dedup_skips_on_worse_score() {
        let mut lb = Leaderboard::new("SBIN", 10, FitnessMetric::Sharpe);
        lb.insert(make_entry("ema_crossover", 9, 2.0));
        assert_eq!(lb.insert(make_entry("ema_crossover", 9, 1.0)), InsertResult::Skipped);
        assert_eq!(lb.entries()[0].fitness_score, 2.0);
    }

    #[test]
    fn trims_to_max_size() {
        let mut lb = Leaderboard::new("SBIN", 3, FitnessMetric::Sharpe);
        lb.insert(make_entry("ema_crossover", 9, 1.0));
        lb.insert(make_entry("ema_crossover", 13, 2.0));
        lb.insert(make_entry("macd_trend", 12, 3.0));
        assert_eq!(lb.insert(make_entry("rsi_reversion", 14, 4.0)), InsertResult::Inserted);
        let scores: Vec<f64> = lb.entries().iter().map(|e| e.fitness_score).collect();
        assert_eq!(scores, vec![4.0, 3.0, 2.0]);
    }

    #[test]
    fn rejects_when_worse_than_all_and_full() {
        let mut lb = Leaderboard::new("SBIN", 2, FitnessMetric::Sharpe);
        lb.insert(make_entry("ema_crossover", 9, 3.0));
        lb.insert(make_entry("ema_crossover", 13, 2.0));
        assert_eq!(lb.insert(make_entry("macd_trend", 12, 1.0)), InsertResult::Skipped);
        assert_eq!(lb.len(), 2);
    }

    #[test]
    fn rejects_non_finite_fitness() {
        let mut lb = Leaderboard::new("SBIN", 10, FitnessMetric::Sharpe);
        assert_eq!(lb.insert(make_entry("ema_crossover", 9, f64::NAN)), InsertResult::Skipped);
        assert_eq!(
            lb.insert(make_entry("ema_crossover", 9, f64::INFINITY)),
            InsertResult::Skipped
        );
        assert!(lb.is_empty());
    }

    #[test]
    fn render_lists_rows_then_failures() {
        let mut lb = Leaderboard::new("SBIN", 10, FitnessMetric::Sharpe);
        lb.insert(make_entry("ema_crossover", 9, 1.25));
        lb.failures.push(FailureLine {
            label: "ema_crossover(fast=40)".into(),
            full_hash: FullHash::from_bytes(b"x"),
            status: VariantStatus::Failed,
            kind: Some(FailureKind::Configuration),
            message: "invalid parameter".into(),
        });
        let text = lb.render_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].contains("ema_crossover(lookback=9)"));
        assert!(lines[3].starts_with("FAILED ema_crossover(fast=40)"));
    }

    #[test]
    fn empty_leaderboard_accessors() {
        let lb = Leaderboard::new("SBIN", 10, FitnessMetric::Sharpe);
        assert!(lb.is_empty());
        assert!(lb.best().is_none());
        assert_eq!(lb.symbol(), "SBIN");
        assert_eq!(lb.metric(), FitnessMetric::Sharpe);
    }
}
