//! Position tracker: the single-position state machine.
//!
//! `Flat --open--> Open --exit--> Flat`. While open, each later bar runs the
//! exit checks in a fixed order (stop, targets, time stop), then applies the
//! stop adjustments (breakeven, ATR trailing) that take effect from the next
//! bar. Every stop change goes through the ratchet.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::signal::Signal;
use crate::domain::{realized_pnl, Bar, ClosedTrade, ExitReason, Position, Side, StopOrigin};

use super::ratchet::RatchetState;

/// Exit rules applied to every position of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitRules {
    /// Close at the bar's close once this many bars have elapsed since entry.
    pub time_stop_bars: Option<usize>,
    /// Favorable excursion, in R, that moves the stop to breakeven.
    pub breakeven_trigger_r: Option<f64>,
    /// Offset past entry (in R, profit direction) for the breakeven stop.
    pub breakeven_offset_r: f64,
    /// Trailing distance in ATR multiples from the favorable extreme.
    pub trailing_atr_mult: Option<f64>,
    pub atr_period: usize,
}

impl Default for ExitRules {
    fn default() -> Self {
        Self {
            time_stop_bars: None,
            breakeven_trigger_r: None,
            breakeven_offset_r: 0.0,
            trailing_atr_mult: None,
            atr_period: 14,
        }
    }
}

impl ExitRules {
    /// Whether the runner needs an ATR series for trailing.
    pub fn needs_atr(&self) -> bool {
        self.trailing_atr_mult.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error("a {side:?} position in {symbol} is already open")]
    PositionAlreadyOpen { symbol: String, side: Side },

    #[error("no open position")]
    NoOpenPosition,

    #[error("invalid signal: {0}")]
    InvalidSignal(String),
}

#[derive(Debug, Clone)]
struct OpenState {
    position: Position,
    ratchet: RatchetState,
    /// Number of targets at entry; each closes this share of the initial size.
    target_count: usize,
}

/// Owns at most one open position and emits closed-trade records.
#[derive(Debug, Clone)]
pub struct PositionTracker {
    symbol: String,
    rules: ExitRules,
    open: Option<OpenState>,
    realized_pnl: f64,
}

impl PositionTracker {
    pub fn new(symbol: impl Into<String>, rules: ExitRules) -> Self {
        Self {
            symbol: symbol.into(),
            rules,
            open: None,
            realized_pnl: 0.0,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.open.as_ref().map(|s| &s.position)
    }

    pub fn is_flat(&self) -> bool {
        self.open.is_none()
    }

    /// Sum of P&L over every closed slice so far.
    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    /// Unrealized P&L of the open position at `price` (0 when flat).
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.position().map_or(0.0, |p| p.unrealized_pnl(price))
    }

    pub fn rules(&self) -> &ExitRules {
        &self.rules
    }

    /// Open a position from a non-`NONE` signal on `bar`.
    ///
    /// `default_quantity` applies when the signal carries none.
    pub fn open(
        &mut self,
        signal: &Signal,
        bar: &Bar,
        bar_index: usize,
        default_quantity: f64,
    ) -> Result<&Position, TrackerError> {
        if let Some(state) = &self.open {
            return Err(TrackerError::PositionAlreadyOpen {
                symbol: state.position.symbol.clone(),
                side: state.position.side,
            });
        }
        let side = signal
            .direction
            .side()
            .ok_or_else(|| TrackerError::InvalidSignal("direction is NONE".into()))?;

        let entry = signal.entry_price;
        if !entry.is_finite() || entry <= 0.0 {
            return Err(TrackerError::InvalidSignal(format!(
                "entry price must be positive and finite, got {entry}"
            )));
        }
        let quantity = signal.quantity.unwrap_or(default_quantity);
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(TrackerError::InvalidSignal(format!(
                "quantity must be positive, got {quantity}"
            )));
        }
        if let Some(stop) = signal.stop_loss {
            let wrong_side = match side {
                Side::Long => stop >= entry,
                Side::Short => stop <= entry,
            };
            if !stop.is_finite() || wrong_side {
                return Err(TrackerError::InvalidSignal(format!(
                    "stop {stop} is on the wrong side of {side:?} entry {entry}"
                )));
            }
        }

        let mut targets = signal.targets.clone();
        for &t in &targets {
            let wrong_side = match side {
                Side::Long => t <= entry,
                Side::Short => t >= entry,
            };
            if !t.is_finite() || wrong_side {
                return Err(TrackerError::InvalidSignal(format!(
                    "target {t} is on the wrong side of {side:?} entry {entry}"
                )));
            }
        }
        // Nearest first.
        targets.sort_by(|a, b| match side {
            Side::Long => a.total_cmp(b),
            Side::Short => b.total_cmp(a),
        });
        let target_count = targets.len();

        let position = Position {
            symbol: self.symbol.clone(),
            side,
            entry_price: entry,
            entry_time: bar.timestamp,
            entry_bar: bar_index,
            quantity,
            initial_quantity: quantity,
            stop_loss: signal.stop_loss,
            stop_origin: StopOrigin::Initial,
            targets,
            time_stop_bar: self.rules.time_stop_bars.map(|n| bar_index + n),
            initial_risk: signal.stop_loss.map_or(0.0, |s| (entry - s).abs()),
            highest_since_entry: entry,
            lowest_since_entry: entry,
        };

        let state = self.open.insert(OpenState {
            ratchet: RatchetState::from_stop(side, position.stop_loss),
            position,
            target_count,
        });
        Ok(&state.position)
    }

    /// Run the exit checks and stop adjustments for one bar.
    ///
    /// `atr` is the ATR at this bar (used only for trailing). Bars at or before
    /// the entry bar are ignored. Returns the slices closed on this bar.
    pub fn on_bar(&mut self, bar: &Bar, bar_index: usize, atr: Option<f64>) -> Vec<ClosedTrade> {
        let mut closed = Vec::new();
        let Some(state) = self.open.as_mut() else {
            return closed;
        };
        if bar_index <= state.position.entry_bar {
            return closed;
        }

        let side = state.position.side;

        // 1. Stop. Checked before targets: a bar that touches both is a loss.
        if let Some(stop) = state.position.stop_loss {
            let hit = match side {
                Side::Long => bar.low <= stop,
                Side::Short => bar.high >= stop,
            };
            if hit {
                let reason = match state.position.stop_origin {
                    StopOrigin::Trailing => ExitReason::TrailingStop,
                    StopOrigin::Initial | StopOrigin::Breakeven => ExitReason::StopLoss,
                };
                let qty = state.position.quantity;
                closed.extend(self.close_slice(qty, stop, bar.timestamp, bar_index, reason));
                return closed;
            }
        }

        // 2. Targets, nearest first, possibly several on one bar.
        while let Some(state) = self.open.as_ref() {
            let Some(&target) = state.position.targets.first() else {
                break;
            };
            let hit = match side {
                Side::Long => bar.high >= target,
                Side::Short => bar.low <= target,
            };
            if !hit {
                break;
            }
            let qty = if state.position.targets.len() == 1 {
                state.position.quantity
            } else {
                let share = state.position.initial_quantity / state.target_count as f64;
                share.min(state.position.quantity)
            };
            if let Some(state) = self.open.as_mut() {
                state.position.targets.remove(0);
            }
            closed.extend(self.close_slice(
                qty,
                target,
                bar.timestamp,
                bar_index,
                ExitReason::TakeProfit,
            ));
        }

        let Some(state) = self.open.as_mut() else {
            return closed;
        };

        // 3. Time stop at the close.
        if state.position.time_stop_bar.is_some_and(|t| bar_index >= t) {
            let qty = state.position.quantity;
            closed.extend(self.close_slice(
                qty,
                bar.close,
                bar.timestamp,
                bar_index,
                ExitReason::TimeStop,
            ));
            return closed;
        }

        self.adjust_stop(bar, atr);
        closed
    }

    /// Update excursion extremes and ratchet the stop for the next bar.
    fn adjust_stop(&mut self, bar: &Bar, atr: Option<f64>) {
        let rules = &self.rules;
        let Some(state) = self.open.as_mut() else {
            return;
        };
        let pos = &mut state.position;
        pos.highest_since_entry = pos.highest_since_entry.max(bar.high);
        pos.lowest_since_entry = pos.lowest_since_entry.min(bar.low);
        let sign = pos.side.sign();

        if let (Some(trigger), Some(r)) = (rules.breakeven_trigger_r, pos.favorable_r_multiple()) {
            if r >= trigger {
                let level = pos.entry_price + sign * rules.breakeven_offset_r * pos.initial_risk;
                if state.ratchet.tighten(level) {
                    pos.stop_loss = state.ratchet.current_level();
                    pos.stop_origin = StopOrigin::Breakeven;
                }
            }
        }

        if let (Some(mult), Some(atr)) = (rules.trailing_atr_mult, atr) {
            if atr.is_finite() && atr > 0.0 {
                let level = pos.favorable_extreme() - sign * mult * atr;
                if state.ratchet.tighten(level) {
                    pos.stop_loss = state.ratchet.current_level();
                    pos.stop_origin = StopOrigin::Trailing;
                }
            }
        }
    }

    /// Close whatever remains at `price` with reason `MANUAL`.
    pub fn close_manual(
        &mut self,
        price: f64,
        timestamp: NaiveDateTime,
        bar_index: usize,
    ) -> Result<ClosedTrade, TrackerError> {
        let qty = self
            .position()
            .map(|p| p.quantity)
            .ok_or(TrackerError::NoOpenPosition)?;
        self.close_slice(qty, price, timestamp, bar_index, ExitReason::Manual)
            .ok_or(TrackerError::NoOpenPosition)
    }

    /// Close `qty` of the open position; goes flat when nothing remains.
    fn close_slice(
        &mut self,
        qty: f64,
        price: f64,
        timestamp: NaiveDateTime,
        bar_index: usize,
        reason: ExitReason,
    ) -> Option<ClosedTrade> {
        let state = self.open.as_mut()?;
        let pos = &mut state.position;
        let pnl = realized_pnl(pos.side, pos.entry_price, price, qty);
        let trade = ClosedTrade {
            symbol: pos.symbol.clone(),
            side: pos.side,
            entry_bar: pos.entry_bar,
            entry_time: pos.entry_time,
            entry_price: pos.entry_price,
            exit_bar: bar_index,
            exit_time: timestamp,
            exit_price: price,
            quantity: qty,
            pnl,
            bars_held: pos.bars_held(bar_index),
            exit_reason: reason,
        };
        pos.quantity -= qty;
        self.realized_pnl += pnl;
        if pos.quantity <= pos.initial_quantity * 1e-12 {
            self.open = None;
        }
        Some(trade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_ohlc_bars;

    fn long_signal() -> Signal {
        Signal::long(100.0).with_stop(95.0).with_target(110.0)
    }

    fn opened(signal: &Signal, rules: ExitRules) -> (PositionTracker, Vec<Bar>) {
        let bars = make_ohlc_bars(&[(100.0, 100.0, 100.0, 100.0); 1]);
        let mut t = PositionTracker::new("SBIN", rules);
        t.open(signal, &bars[0], 0, 10.0).unwrap();
        (t, bars)
    }

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Bar {
        make_ohlc_bars(&[(o, h, l, c)]).remove(0)
    }

    #[test]
    fn second_entry_is_rejected() {
        let (mut t, bars) = opened(&long_signal(), ExitRules::default());
        let err = t.open(&long_signal(), &bars[0], 0, 10.0).unwrap_err();
        assert!(matches!(err, TrackerError::PositionAlreadyOpen { .. }));
    }

    #[test]
    fn invalid_signals_are_rejected() {
        let b = bar(100.0, 100.0, 100.0, 100.0);
        let mut t = PositionTracker::new("X", ExitRules::default());
        assert!(t.open(&Signal::none(), &b, 0, 1.0).is_err());
        assert!(t.open(&Signal::long(100.0).with_stop(101.0), &b, 0, 1.0).is_err());
        assert!(t.open(&Signal::short(100.0).with_stop(99.0), &b, 0, 1.0).is_err());
        assert!(t.open(&Signal::long(100.0).with_target(90.0), &b, 0, 1.0).is_err());
        assert!(t.open(&Signal::long(f64::NAN), &b, 0, 1.0).is_err());
        assert!(t.open(&Signal::long(100.0), &b, 0, 0.0).is_err());
        assert!(t.is_flat());
    }

    #[test]
    fn entry_bar_is_not_checked() {
        let (mut t, _) = opened(&long_signal(), ExitRules::default());
        let crash = bar(100.0, 100.0, 50.0, 60.0);
        assert!(t.on_bar(&crash, 0, None).is_empty());
        assert!(!t.is_flat());
    }

    #[test]
    fn stop_wins_when_bar_touches_both() {
        let (mut t, _) = opened(&long_signal(), ExitRules::default());
        let wide = bar(100.0, 111.0, 94.0, 105.0);
        let closed = t.on_bar(&wide, 1, None);
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].exit_reason, ExitReason::StopLoss);
        assert_eq!(closed[0].exit_price, 95.0);
        assert_eq!(closed[0].pnl, -50.0);
        assert!(t.is_flat());
    }

    #[test]
    fn short_stop_and_target() {
        let sig = Signal::short(100.0).with_stop(105.0).with_target(90.0);
        let (mut t, _) = opened(&sig, ExitRules::default());
        let closed = t.on_bar(&bar(95.0, 96.0, 89.0, 91.0), 1, None);
        assert_eq!(closed[0].exit_reason, ExitReason::TakeProfit);
        assert_eq!(closed[0].pnl, 100.0);
    }

    #[test]
    fn partial_targets_close_equal_shares() {
        let sig = Signal::long(100.0)
            .with_stop(95.0)
            .with_target(120.0)
            .with_target(110.0);
        let (mut t, _) = opened(&sig, ExitRules::default());

        let first = t.on_bar(&bar(100.0, 112.0, 99.0, 111.0), 1, None);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].exit_price, 110.0);
        assert_eq!(first[0].quantity, 5.0);
        assert_eq!(t.position().unwrap().quantity, 5.0);

        let second = t.on_bar(&bar(111.0, 125.0, 110.0, 121.0), 2, None);
        assert_eq!(second[0].exit_price, 120.0);
        assert_eq!(second[0].quantity, 5.0);
        assert!(t.is_flat());
        assert_eq!(t.realized_pnl(), 50.0 + 100.0);
    }

    #[test]
    fn both_targets_on_one_bar() {
        let sig = Signal::long(100.0).with_target(105.0).with_target(110.0);
        let (mut t, _) = opened(&sig, ExitRules::default());
        let closed = t.on_bar(&bar(100.0, 115.0, 99.0, 112.0), 1, None);
        assert_eq!(closed.len(), 2);
        assert!(t.is_flat());
    }

    #[test]
    fn time_stop_exits_at_close() {
        let rules = ExitRules {
            time_stop_bars: Some(3),
            ..ExitRules::default()
        };
        let (mut t, _) = opened(&long_signal(), rules);
        for i in 1..3 {
            assert!(t.on_bar(&bar(100.0, 101.0, 99.0, 100.5), i, None).is_empty());
        }
        let closed = t.on_bar(&bar(100.0, 102.0, 99.0, 101.0), 3, None);
        assert_eq!(closed[0].exit_reason, ExitReason::TimeStop);
        assert_eq!(closed[0].exit_price, 101.0);
        assert_eq!(closed[0].bars_held, 3);
    }

    #[test]
    fn breakeven_moves_stop_to_entry_from_next_bar() {
        let rules = ExitRules {
            breakeven_trigger_r: Some(1.0),
            ..ExitRules::default()
        };
        let sig = Signal::long(100.0).with_stop(95.0);
        let (mut t, _) = opened(&sig, rules);

        assert!(t.on_bar(&bar(100.0, 106.0, 99.0, 105.0), 1, None).is_empty());
        let pos = t.position().unwrap();
        assert_eq!(pos.stop_loss, Some(100.0));
        assert_eq!(pos.stop_origin, StopOrigin::Breakeven);

        let closed = t.on_bar(&bar(101.0, 101.0, 99.0, 99.5), 2, None);
        assert_eq!(closed[0].exit_reason, ExitReason::StopLoss);
        assert_eq!(closed[0].pnl, 0.0);
    }

    #[test]
    fn atr_trailing_ratchets_and_reports_trailing_stop() {
        let rules = ExitRules {
            trailing_atr_mult: Some(2.0),
            ..ExitRules::default()
        };
        let sig = Signal::long(100.0).with_stop(90.0);
        let (mut t, _) = opened(&sig, rules);

        t.on_bar(&bar(100.0, 110.0, 100.0, 109.0), 1, Some(2.0));
        assert_eq!(t.position().unwrap().stop_loss, Some(106.0));

        // ATR expands: proposal 110 - 2*5 = 100 is looser, stop holds.
        t.on_bar(&bar(109.0, 109.5, 107.0, 108.0), 2, Some(5.0));
        assert_eq!(t.position().unwrap().stop_loss, Some(106.0));

        let closed = t.on_bar(&bar(108.0, 108.0, 104.0, 105.0), 3, Some(2.0));
        assert_eq!(closed[0].exit_reason, ExitReason::TrailingStop);
        assert_eq!(closed[0].exit_price, 106.0);
    }

    #[test]
    fn manual_close() {
        let (mut t, _) = opened(&long_signal(), ExitRules::default());
        let ts = bar(1.0, 1.0, 1.0, 1.0).timestamp;
        let trade = t.close_manual(104.0, ts, 5).unwrap();
        assert_eq!(trade.exit_reason, ExitReason::Manual);
        assert_eq!(trade.pnl, 40.0);
        assert!(matches!(
            t.close_manual(104.0, ts, 6),
            Err(TrackerError::NoOpenPosition)
        ));
    }
}
