//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! No metric ever returns NaN or infinity; degenerate inputs map to documented
//! sentinels (0.0, or [`PROFIT_FACTOR_CAP`]).

use algolab_core::domain::ClosedTrade;
use serde::{Deserialize, Serialize};

/// Profit factor reported when there are winners but no losers. Also the cap.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return_pct: f64,
    pub cagr_pct: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    /// Largest peak-to-trough decline, as a positive percentage of the peak.
    pub max_drawdown_pct: f64,
    /// Fraction of closed trades with positive P&L (0..=1).
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub net_pnl: f64,
    pub gross_profit: f64,
    /// Sum of losing P&L, as a positive number.
    pub gross_loss: f64,
    pub avg_win: f64,
    /// Mean losing P&L, as a positive number.
    pub avg_loss: f64,
    pub expectancy: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    /// Fraction of bars that ended with a position open (0..=1).
    pub exposure: f64,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::compute(&[], &[], 0.0, 0, 0.0)
    }
}

impl PerformanceMetrics {
    /// Compute all metrics from an equity curve and trade list.
    ///
    /// `bars_per_year` annualizes Sharpe, Sortino and CAGR.
    pub fn compute(
        equity_curve: &[f64],
        trades: &[ClosedTrade],
        initial_capital: f64,
        bars_in_position: usize,
        bars_per_year: f64,
    ) -> Self {
        let gross_profit = gross_profit(trades);
        let gross_loss = gross_loss(trades);
        Self {
            total_return_pct: total_return_pct(equity_curve, initial_capital),
            cagr_pct: cagr_pct(equity_curve, initial_capital, bars_per_year),
            sharpe: sharpe_ratio(equity_curve, bars_per_year),
            sortino: sortino_ratio(equity_curve, bars_per_year),
            calmar: calmar_ratio(equity_curve, initial_capital, bars_per_year),
            max_drawdown_pct: max_drawdown_pct(equity_curve, initial_capital),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            trade_count: trades.len(),
            net_pnl: finite_or_zero(gross_profit - gross_loss),
            gross_profit,
            gross_loss,
            avg_win: avg_win(trades),
            avg_loss: avg_loss(trades),
            expectancy: expectancy(trades),
            max_consecutive_wins: max_consecutive_wins(trades),
            max_consecutive_losses: max_consecutive_losses(trades),
            exposure: exposure(bars_in_position, equity_curve.len()),
        }
    }

    /// Look up a metric by its snake_case name, for ranking and sweeps.
    pub fn get(&self, name: &str) -> Option<f64> {
        let v = match name {
            "total_return_pct" => self.total_return_pct,
            "cagr_pct" => self.cagr_pct,
            "sharpe" => self.sharpe,
            "sortino" => self.sortino,
            "calmar" => self.calmar,
            "max_drawdown_pct" => self.max_drawdown_pct,
            "win_rate" => self.win_rate,
            "profit_factor" => self.profit_factor,
            "trade_count" => self.trade_count as f64,
            "net_pnl" => self.net_pnl,
            "expectancy" => self.expectancy,
            "exposure" => self.exposure,
            _ => return None,
        };
        Some(v)
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return in percent: (final / initial − 1) × 100.
pub fn total_return_pct(equity_curve: &[f64], initial_capital: f64) -> f64 {
    let Some(&final_eq) = equity_curve.last() else {
        return 0.0;
    };
    if initial_capital <= 0.0 {
        return 0.0;
    }
    finite_or_zero((final_eq / initial_capital - 1.0) * 100.0)
}

/// Compound annual growth rate in percent.
///
/// The run length in years is `equity_curve.len() / bars_per_year`.
pub fn cagr_pct(equity_curve: &[f64], initial_capital: f64, bars_per_year: f64) -> f64 {
    let Some(&final_eq) = equity_curve.last() else {
        return 0.0;
    };
    if equity_curve.len() < 2 || initial_capital <= 0.0 || final_eq <= 0.0 || bars_per_year <= 0.0
    {
        return 0.0;
    }
    let years = equity_curve.len() as f64 / bars_per_year;
    finite_or_zero(((final_eq / initial_capital).powf(1.0 / years) - 1.0) * 100.0)
}

/// Annualized Sharpe ratio from bar returns.
///
/// Sharpe = mean(bar returns) / std(bar returns) × sqrt(bars_per_year).
/// Returns 0.0 if variance is zero or there are fewer than 2 returns.
pub fn sharpe_ratio(equity_curve: &[f64], bars_per_year: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 || bars_per_year <= 0.0 {
        return 0.0;
    }
    let mean = mean_f64(&returns);
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    finite_or_zero((mean / std) * bars_per_year.sqrt())
}

/// Annualized Sortino ratio (downside deviation only).
///
/// Returns 0.0 if there is no downside or fewer than 2 returns.
pub fn sortino_ratio(equity_curve: &[f64], bars_per_year: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 || bars_per_year <= 0.0 {
        return 0.0;
    }
    let mean = mean_f64(&returns);
    let downside_sq: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    if downside_sq == 0.0 {
        return 0.0;
    }
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    finite_or_zero((mean / downside_std) * bars_per_year.sqrt())
}

/// Calmar ratio: CAGR / max drawdown. 0.0 without a drawdown.
pub fn calmar_ratio(equity_curve: &[f64], initial_capital: f64, bars_per_year: f64) -> f64 {
    let dd = max_drawdown_pct(equity_curve, initial_capital);
    if dd < 1e-10 {
        return 0.0;
    }
    finite_or_zero(cagr_pct(equity_curve, initial_capital, bars_per_year) / dd)
}

/// Maximum drawdown as a positive percentage of the running peak.
///
/// The peak starts at the initial capital, so a run that loses from its first
/// bar still registers a drawdown.
pub fn max_drawdown_pct(equity_curve: &[f64], initial_capital: f64) -> f64 {
    let mut peak = initial_capital.max(0.0);
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak);
        }
    }
    finite_or_zero(max_dd * 100.0)
}

/// Fraction of trades with positive P&L.
pub fn win_rate(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Gross profit / gross loss.
///
/// Only winners → [`PROFIT_FACTOR_CAP`]. Neither winners nor losers → 0.0.
pub fn profit_factor(trades: &[ClosedTrade]) -> f64 {
    let gross_profit = gross_profit(trades);
    let gross_loss = gross_loss(trades);
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { PROFIT_FACTOR_CAP } else { 0.0 };
    }
    finite_or_zero(gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
}

pub fn gross_profit(trades: &[ClosedTrade]) -> f64 {
    finite_or_zero(trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum())
}

/// Sum of losing P&L as a positive number.
pub fn gross_loss(trades: &[ClosedTrade]) -> f64 {
    finite_or_zero(trades.iter().filter(|t| t.pnl < 0.0).map(|t| -t.pnl).sum())
}

pub fn avg_win(trades: &[ClosedTrade]) -> f64 {
    let wins = trades.iter().filter(|t| t.pnl > 0.0).count();
    if wins == 0 {
        return 0.0;
    }
    gross_profit(trades) / wins as f64
}

/// Mean losing P&L as a positive number.
pub fn avg_loss(trades: &[ClosedTrade]) -> f64 {
    let losses = trades.iter().filter(|t| t.pnl < 0.0).count();
    if losses == 0 {
        return 0.0;
    }
    gross_loss(trades) / losses as f64
}

/// Mean P&L per trade.
pub fn expectancy(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
    finite_or_zero(mean_f64(&pnls))
}

pub fn max_consecutive_wins(trades: &[ClosedTrade]) -> usize {
    max_consecutive(trades, true)
}

/// Longest run of non-winning trades (break-even counts as a loss).
pub fn max_consecutive_losses(trades: &[ClosedTrade]) -> usize {
    max_consecutive(trades, false)
}

/// Fraction of bars spent in a position.
pub fn exposure(bars_in_position: usize, total_bars: usize) -> f64 {
    if total_bars == 0 {
        return 0.0;
    }
    (bars_in_position.min(total_bars)) as f64 / total_bars as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple returns between consecutive equity points.
pub fn bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1).
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

fn max_consecutive(trades: &[ClosedTrade], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for t in trades {
        if t.is_winner() == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algolab_core::domain::{ExitReason, Side};
    use chrono::NaiveDate;

    fn trade(pnl: f64) -> ClosedTrade {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        ClosedTrade {
            symbol: "SBIN".into(),
            side: Side::Long,
            entry_bar: 0,
            entry_time: day.and_hms_opt(9, 15, 0).unwrap(),
            entry_price: 100.0,
            exit_bar: 5,
            exit_time: day.and_hms_opt(9, 40, 0).unwrap(),
            exit_price: 100.0 + pnl / 10.0,
            quantity: 10.0,
            pnl,
            bars_held: 5,
            exit_reason: if pnl > 0.0 {
                ExitReason::TakeProfit
            } else {
                ExitReason::StopLoss
            },
        }
    }

    fn trades(pnls: &[f64]) -> Vec<ClosedTrade> {
        pnls.iter().map(|&p| trade(p)).collect()
    }

    // ── Total return ──

    #[test]
    fn total_return_positive() {
        let eq = vec![100_000.0, 100_500.0, 101_000.0, 110_000.0];
        assert!((total_return_pct(&eq, 100_000.0) - 10.0).abs() < 1e-10);
    }

    #[test]
    fn total_return_negative() {
        let eq = vec![100_000.0, 95_000.0, 90_000.0];
        assert!((total_return_pct(&eq, 100_000.0) - (-10.0)).abs() < 1e-10);
    }

    #[test]
    fn total_return_measured_from_initial_capital() {
        // First mark already includes the first bar's move.
        assert!((total_return_pct(&[101_000.0], 100_000.0) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn total_return_empty() {
        assert_eq!(total_return_pct(&[], 100_000.0), 0.0);
    }

    // ── CAGR ──

    #[test]
    fn cagr_one_year() {
        let mut eq = vec![100_000.0];
        for i in 1..252 {
            let r = (1.1_f64).powf(1.0 / 251.0);
            eq.push(eq[i - 1] * r);
        }
        let c = cagr_pct(&eq, 100_000.0, 252.0);
        assert!((c - 10.0).abs() < 0.5, "CAGR should be ~10%, got {c}");
    }

    #[test]
    fn cagr_constant_equity() {
        let eq = vec![100_000.0; 252];
        assert_eq!(cagr_pct(&eq, 100_000.0, 252.0), 0.0);
    }

    // ── Sharpe ──

    #[test]
    fn sharpe_constant_equity_is_zero() {
        let eq = vec![100_000.0; 100];
        assert_eq!(sharpe_ratio(&eq, 252.0), 0.0);
    }

    #[test]
    fn sharpe_known_returns() {
        let mut eq = vec![100_000.0];
        for i in 1..253 {
            let r = if i % 2 == 0 { 1.002 } else { 1.0005 };
            eq.push(eq[i - 1] * r);
        }
        let s = sharpe_ratio(&eq, 252.0);
        assert!(s > 5.0, "Sharpe should be high for consistent gains, got {s}");
    }

    #[test]
    fn sharpe_scales_with_bars_per_year() {
        let eq = vec![100.0, 101.0, 100.5, 102.0, 101.0, 103.0];
        let daily = sharpe_ratio(&eq, 252.0);
        let five_min = sharpe_ratio(&eq, 75.0 * 252.0);
        assert!((five_min / daily - 75.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn sharpe_single_return_is_zero() {
        assert_eq!(sharpe_ratio(&[100_000.0, 101_000.0], 252.0), 0.0);
    }

    // ── Sortino ──

    #[test]
    fn sortino_no_downside_is_zero() {
        let eq: Vec<f64> = (0..100).map(|i| 100_000.0 + i as f64 * 100.0).collect();
        assert_eq!(sortino_ratio(&eq, 252.0), 0.0);
    }

    #[test]
    fn sortino_with_downside() {
        let mut eq = vec![100_000.0];
        for _ in 0..50 {
            eq.push(eq[eq.len() - 1] * 1.002);
        }
        for _ in 0..10 {
            eq.push(eq[eq.len() - 1] * 0.995);
        }
        let s = sortino_ratio(&eq, 252.0);
        assert!(s > 0.0, "Sortino should be positive, got {s}");
    }

    // ── Max drawdown ──

    #[test]
    fn max_drawdown_known() {
        let eq = vec![100_000.0, 110_000.0, 90_000.0, 95_000.0];
        let expected = (110_000.0 - 90_000.0) / 110_000.0 * 100.0;
        assert!((max_drawdown_pct(&eq, 100_000.0) - expected).abs() < 1e-10);
    }

    #[test]
    fn max_drawdown_monotonic_increase() {
        let eq: Vec<f64> = (0..100).map(|i| 100_000.0 + i as f64 * 100.0).collect();
        assert_eq!(max_drawdown_pct(&eq, 100_000.0), 0.0);
    }

    #[test]
    fn max_drawdown_counts_loss_from_initial_capital() {
        let dd = max_drawdown_pct(&[95_000.0, 96_000.0], 100_000.0);
        assert!((dd - 5.0).abs() < 1e-10);
    }

    // ── Trade statistics ──

    #[test]
    fn win_rate_no_trades_is_zero() {
        assert_eq!(win_rate(&[]), 0.0);
    }

    #[test]
    fn win_rate_mixed() {
        assert!((win_rate(&trades(&[100.0, -50.0, 30.0, -10.0])) - 0.5).abs() < 1e-10);
    }

    #[test]
    fn profit_factor_known() {
        let t = trades(&[300.0, -100.0, -50.0]);
        assert!((profit_factor(&t) - 2.0).abs() < 1e-10);
    }

    #[test]
    fn profit_factor_all_winners_capped() {
        assert_eq!(profit_factor(&trades(&[10.0, 20.0])), PROFIT_FACTOR_CAP);
    }

    #[test]
    fn profit_factor_no_trades_is_zero() {
        assert_eq!(profit_factor(&[]), 0.0);
        assert_eq!(profit_factor(&trades(&[0.0])), 0.0);
    }

    #[test]
    fn profit_factor_huge_ratio_capped() {
        let t = trades(&[1_000_000.0, -1.0]);
        assert_eq!(profit_factor(&t), PROFIT_FACTOR_CAP);
    }

    #[test]
    fn averages_and_expectancy() {
        let t = trades(&[300.0, 100.0, -100.0, -50.0]);
        assert!((avg_win(&t) - 200.0).abs() < 1e-10);
        assert!((avg_loss(&t) - 75.0).abs() < 1e-10);
        assert!((expectancy(&t) - 62.5).abs() < 1e-10);
        assert!((gross_profit(&t) - 400.0).abs() < 1e-10);
        assert!((gross_loss(&t) - 150.0).abs() < 1e-10);
    }

    #[test]
    fn consecutive_streaks() {
        let t = trades(&[10.0, -1.0, -2.0, -3.0, 5.0, 6.0, -1.0]);
        assert_eq!(max_consecutive_losses(&t), 3);
        assert_eq!(max_consecutive_wins(&t), 2);
    }

    #[test]
    fn breakeven_trade_counts_as_loss_streak() {
        let t = trades(&[0.0, 0.0]);
        assert_eq!(max_consecutive_losses(&t), 2);
        assert_eq!(win_rate(&t), 0.0);
    }

    #[test]
    fn exposure_fraction() {
        assert_eq!(exposure(0, 0), 0.0);
        assert!((exposure(25, 100) - 0.25).abs() < 1e-10);
        assert_eq!(exposure(200, 100), 1.0);
    }

    // ── Aggregate ──

    #[test]
    fn compute_empty_run_is_all_zero() {
        let m = PerformanceMetrics::compute(&[], &[], 100_000.0, 0, 252.0);
        assert_eq!(m.trade_count, 0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.total_return_pct, 0.0);
        assert_eq!(m.sharpe, 0.0);
        assert_eq!(m.max_drawdown_pct, 0.0);
    }

    #[test]
    fn compute_is_idempotent() {
        let eq = vec![100_000.0, 100_200.0, 99_900.0, 100_400.0];
        let t = trades(&[200.0, -300.0, 500.0]);
        let a = PerformanceMetrics::compute(&eq, &t, 100_000.0, 3, 252.0);
        let b = PerformanceMetrics::compute(&eq, &t, 100_000.0, 3, 252.0);
        assert_eq!(a, b);
        assert!((a.net_pnl - 400.0).abs() < 1e-10);
        assert!((a.exposure - 0.75).abs() < 1e-10);
    }

    #[test]
    fn get_by_name() {
        let m = PerformanceMetrics::compute(&[100.0, 110.0], &trades(&[10.0]), 100.0, 1, 252.0);
        assert_eq!(m.get("trade_count"), Some(1.0));
        assert!((m.get("total_return_pct").unwrap() - 10.0).abs() < 1e-10);
        assert_eq!(m.get("nope"), None);
    }

    #[test]
    fn degenerate_capital_never_nan() {
        let m = PerformanceMetrics::compute(&[0.0, 0.0, 5.0], &trades(&[f64::MAX, f64::MAX]), 0.0, 1, 0.0);
        for v in [
            m.total_return_pct,
            m.cagr_pct,
            m.sharpe,
            m.sortino,
            m.calmar,
            m.max_drawdown_pct,
            m.profit_factor,
            m.net_pnl,
            m.gross_profit,
            m.avg_win,
            m.expectancy,
        ] {
            assert!(v.is_finite(), "metric must be finite, got {v}");
        }
    }
}
