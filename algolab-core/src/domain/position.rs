//! Position: the live state of a single open trade.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Side of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

/// Which rule last set the stop level.
///
/// Decides whether a stop hit is reported as `STOP_LOSS` or `TRAILING_STOP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOrigin {
    Initial,
    Breakeven,
    Trailing,
}

/// An open position.
///
/// `stop_loss` is mutable only through the tracker's ratchet: it may tighten
/// toward (and past) the entry price but never loosens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub entry_bar: usize,
    /// Remaining open quantity (shrinks on partial take-profit).
    pub quantity: f64,
    pub initial_quantity: f64,
    pub stop_loss: Option<f64>,
    pub stop_origin: StopOrigin,
    /// Remaining take-profit levels, nearest first.
    pub targets: Vec<f64>,
    /// Bar index at or after which the time stop fires.
    pub time_stop_bar: Option<usize>,
    /// |entry - initial stop| per unit, 0.0 when entered without a stop.
    pub initial_risk: f64,
    pub highest_since_entry: f64,
    pub lowest_since_entry: f64,
}

impl Position {
    /// Unrealized P&L of the remaining quantity at `price`.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        realized_pnl(self.side, self.entry_price, price, self.quantity)
    }

    /// Best price reached in the position's favor since entry.
    pub fn favorable_extreme(&self) -> f64 {
        match self.side {
            Side::Long => self.highest_since_entry,
            Side::Short => self.lowest_since_entry,
        }
    }

    /// Favorable excursion expressed in multiples of the initial risk.
    ///
    /// Returns `None` when the position was entered without a stop.
    pub fn favorable_r_multiple(&self) -> Option<f64> {
        if self.initial_risk <= 0.0 {
            return None;
        }
        let excursion = (self.favorable_extreme() - self.entry_price) * self.side.sign();
        Some(excursion / self.initial_risk)
    }

    pub fn bars_held(&self, bar_index: usize) -> usize {
        bar_index.saturating_sub(self.entry_bar)
    }
}

/// P&L = (exit - entry) x quantity x (+1 long, -1 short).
pub fn realized_pnl(side: Side, entry_price: f64, exit_price: f64, quantity: f64) -> f64 {
    (exit_price - entry_price) * quantity * side.sign()
}
