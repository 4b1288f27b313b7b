//! Domain types for the backtest core.

pub mod bar;
pub mod equity;
pub mod interval;
pub mod position;
pub mod trade;
pub mod window;

pub use bar::{validate_series, Bar, BarError};
pub use equity::{equity_values, EquityPoint};
pub use interval::{Interval, IntervalParseError};
pub use position::{realized_pnl, Position, Side, StopOrigin};
pub use trade::{ClosedTrade, ExitReason};
pub use window::PriceWindow;

/// Symbol type alias
pub type Symbol = String;
