//! Bar-by-bar loop: the heart of the backtesting engine.
//!
//! Per bar:
//! 1. Exits: if a position is open, the tracker runs stop/target/time checks
//!    and applies stop adjustments for the next bar
//! 2. Entry: if flat (including flat again after an exit on this bar) and past
//!    warmup, the signal function sees the trailing window; a non-`NONE`
//!    signal opens a position at its entry price
//! 3. Post-bar: mark-to-market equity at the bar's close

use tracing::debug;

use crate::components::indicator::{value_at, Indicator};
use crate::components::params::ParamOverrides;
use crate::components::signal::SignalFunction;
use crate::domain::{validate_series, Bar, BarError, ClosedTrade, EquityPoint, PriceWindow};
use crate::indicators::Atr;
use crate::position_management::PositionTracker;

use super::state::{BacktestError, EngineConfig, RunResult};

/// Run one backtest over `bars`.
///
/// Deterministic: the same bars, signal, parameters, and config always give
/// the same result. Fails without panicking on an empty, malformed or
/// too-short series, on bad parameters, and on an invalid config.
pub fn run(
    bars: &[Bar],
    signal: &dyn SignalFunction,
    params: &ParamOverrides,
    config: &EngineConfig,
) -> Result<RunResult, BacktestError> {
    config.validate()?;
    validate_series(bars)?;

    let warmup_bars = signal.warmup_bars(params)?.max(1);
    // Trailing stops need one full ATR value somewhere in the series.
    let required = if config.exits.needs_atr() {
        warmup_bars.max(config.exits.atr_period + 1)
    } else {
        warmup_bars
    };
    if bars.len() < required {
        return Err(BarError::Insufficient {
            required,
            available: bars.len(),
        }
        .into());
    }
    let window_len = config.window_bars.max(warmup_bars);

    let atr = if config.exits.needs_atr() {
        Atr::new(config.exits.atr_period).compute(bars)
    } else {
        Vec::new()
    };

    let mut tracker = PositionTracker::new(config.symbol.clone(), config.exits.clone());
    let mut closed_trades: Vec<ClosedTrade> = Vec::new();
    let mut equity_curve = Vec::with_capacity(bars.len());
    let mut bars_in_position = 0;
    let mut entries = 0;

    for (t, bar) in bars.iter().enumerate() {
        // ─── Exits ───
        if !tracker.is_flat() {
            for trade in tracker.on_bar(bar, t, value_at(&atr, t)) {
                debug!(
                    symbol = %trade.symbol,
                    bar = t,
                    reason = %trade.exit_reason,
                    exit_price = trade.exit_price,
                    quantity = trade.quantity,
                    pnl = trade.pnl,
                    "position closed"
                );
                closed_trades.push(trade);
            }
        }

        // ─── Entry ───
        if tracker.is_flat() && t + 1 >= warmup_bars {
            let window = PriceWindow::trailing(bars, t, window_len);
            let sig = signal.evaluate(window, params)?;
            if !sig.is_none() {
                let pos = tracker.open(&sig, bar, t, config.quantity)?;
                entries += 1;
                debug!(
                    symbol = %pos.symbol,
                    bar = t,
                    side = ?pos.side,
                    entry_price = pos.entry_price,
                    stop = ?pos.stop_loss,
                    targets = ?pos.targets,
                    "position opened"
                );
            }
        }

        // ─── Post-bar ───
        if !tracker.is_flat() {
            bars_in_position += 1;
        }
        let equity =
            config.initial_capital + tracker.realized_pnl() + tracker.unrealized_pnl(bar.close);
        equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity,
        });
    }

    if config.flatten_at_end {
        if let Some(last) = bars.last() {
            if !tracker.is_flat() {
                let trade = tracker.close_manual(last.close, last.timestamp, bars.len() - 1)?;
                debug!(symbol = %trade.symbol, pnl = trade.pnl, "flattened at end of data");
                closed_trades.push(trade);
            }
        }
    }

    Ok(RunResult {
        closed_trades,
        equity_curve,
        open_position: tracker.position().cloned(),
        warmup_bars,
        bars_processed: bars.len(),
        bars_in_position,
        entries,
    })
}
