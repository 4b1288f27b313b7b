//! ClosedTrade: the immutable record of a finished (or partially finished) position.

use super::position::Side;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position (or a slice of it) was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TimeStop,
    TrailingStop,
    Manual,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StopLoss => "STOP_LOSS",
            Self::TakeProfit => "TAKE_PROFIT",
            Self::TimeStop => "TIME_STOP",
            Self::TrailingStop => "TRAILING_STOP",
            Self::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A closed round trip: entry → exit.
///
/// Partial take-profit exits produce one record per consumed target, each
/// carrying the quantity it closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: String,
    pub side: Side,

    pub entry_bar: usize,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,

    pub exit_bar: usize,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,

    pub quantity: f64,
    pub pnl: f64,
    pub bars_held: usize,
    pub exit_reason: ExitReason,
}

impl ClosedTrade {
    /// Return on the trade as a fraction of entry notional.
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 || self.quantity == 0.0 {
            return 0.0;
        }
        self.pnl / (self.entry_price * self.quantity)
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}
