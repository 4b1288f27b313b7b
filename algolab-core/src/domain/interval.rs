//! Bar interval and its annualization factor.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Minutes in one cash-market session (09:15 to 15:30).
pub const SESSION_MINUTES: u32 = 375;

/// Trading sessions per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: u32 = 252;

/// Bar interval as used by the broker history API ("1m", "5m", "15m", "1h", "D", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Interval {
    Minutes(u32),
    Hours(u32),
    Daily,
    Weekly,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized interval '{0}' (expected e.g. 1m, 5m, 15m, 1h, D, W)")]
pub struct IntervalParseError(pub String);

impl Interval {
    /// Length of one bar.
    pub fn duration(&self) -> Duration {
        match self {
            Self::Minutes(m) => Duration::minutes(*m as i64),
            Self::Hours(h) => Duration::hours(*h as i64),
            Self::Daily => Duration::days(1),
            Self::Weekly => Duration::weeks(1),
        }
    }

    /// Whether bars subdivide a trading session.
    pub fn is_intraday(&self) -> bool {
        matches!(self, Self::Minutes(_) | Self::Hours(_))
    }

    /// Number of bars in a trading year, used to annualize the Sharpe ratio.
    ///
    /// Intraday intervals count whole bars per session (a trailing partial bar
    /// is counted as one).
    pub fn bars_per_year(&self) -> f64 {
        let per_session = |minutes: u32| SESSION_MINUTES.div_ceil(minutes.max(1)) as f64;
        match self {
            Self::Minutes(m) => per_session(*m) * TRADING_DAYS_PER_YEAR as f64,
            Self::Hours(h) => per_session(h.saturating_mul(60)) * TRADING_DAYS_PER_YEAR as f64,
            Self::Daily => TRADING_DAYS_PER_YEAR as f64,
            Self::Weekly => 52.0,
        }
    }
}

impl FromStr for Interval {
    type Err = IntervalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let err = || IntervalParseError(s.to_string());
        match trimmed {
            "D" | "d" | "1d" | "1D" | "day" => return Ok(Self::Daily),
            "W" | "w" | "1w" | "1W" | "week" => return Ok(Self::Weekly),
            _ => {}
        }
        if let Some(n) = trimmed.strip_suffix('m') {
            let n: u32 = n.parse().map_err(|_| err())?;
            return if n == 0 { Err(err()) } else { Ok(Self::Minutes(n)) };
        }
        if let Some(n) = trimmed.strip_suffix('h') {
            let n: u32 = n.parse().map_err(|_| err())?;
            // Hours must still fit in u32 minutes.
            return match n.checked_mul(60) {
                Some(m) if m > 0 => Ok(Self::Hours(n)),
                _ => Err(err()),
            };
        }
        Err(err())
    }
}

impl TryFrom<String> for Interval {
    type Error = IntervalParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minutes(m) => write!(f, "{m}m"),
            Self::Hours(h) => write!(f, "{h}h"),
            Self::Daily => write!(f, "D"),
            Self::Weekly => write!(f, "W"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_broker_interval_strings() {
        assert_eq!("5m".parse::<Interval>().unwrap(), Interval::Minutes(5));
        assert_eq!("15m".parse::<Interval>().unwrap(), Interval::Minutes(15));
        assert_eq!("1h".parse::<Interval>().unwrap(), Interval::Hours(1));
        assert_eq!("D".parse::<Interval>().unwrap(), Interval::Daily);
        assert!("0m".parse::<Interval>().is_err());
        assert!("fortnight".parse::<Interval>().is_err());
    }

    #[test]
    fn display_roundtrips() {
        for s in ["1m", "5m", "15m", "1h", "D", "W"] {
            assert_eq!(s.parse::<Interval>().unwrap().to_string(), s);
        }
    }

    #[test]
    fn annualization_differs_by_interval() {
        assert_eq!(Interval::Daily.bars_per_year(), 252.0);
        assert_eq!(Interval::Minutes(5).bars_per_year(), 75.0 * 252.0);
        assert_eq!(Interval::Minutes(15).bars_per_year(), 25.0 * 252.0);
        // 375 / 60 = 6.25 → 7 hourly bars per session
        assert_eq!(Interval::Hours(1).bars_per_year(), 7.0 * 252.0);
    }

    #[test]
    fn oversized_hour_counts_are_rejected() {
        assert!("100000000h".parse::<Interval>().is_err());
        assert!("71582788h".parse::<Interval>().is_ok());
        assert!("71582789h".parse::<Interval>().is_err());
        // Constructed directly, the annualization still saturates instead of overflowing.
        assert_eq!(Interval::Hours(u32::MAX).bars_per_year(), 252.0);
    }

    #[test]
    fn intervals_order_as_map_keys() {
        use std::collections::BTreeMap;
        let mut m = BTreeMap::new();
        m.insert(Interval::Daily, "d");
        m.insert(Interval::Minutes(5), "5m");
        assert_eq!(m.get(&Interval::Minutes(5)), Some(&"5m"));
        assert!(Interval::Minutes(1) < Interval::Minutes(5));
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&Interval::Minutes(15)).unwrap();
        assert_eq!(json, "\"15m\"");
        let back: Interval = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Interval::Minutes(15));
    }
}
