//! Bar: the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar at a fixed interval.
///
/// Timestamps are exchange-local wall-clock times. A series of bars is
/// strictly increasing in `timestamp`; see [`validate_series`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high.is_finite()
            && self.low.is_finite()
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.low > 0.0
    }

    /// Typical price: (high + low + close) / 3.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Data-quality defects in a bar series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("price series is empty")]
    Empty,

    #[error("bar {index} is malformed (NaN or inconsistent OHLC)")]
    Malformed { index: usize },

    #[error("bar {index} timestamp {timestamp} does not advance past the previous bar")]
    NotIncreasing {
        index: usize,
        timestamp: NaiveDateTime,
    },

    #[error("insufficient data: {available} bars available, {required} required")]
    Insufficient { required: usize, available: usize },
}

/// Check a series for emptiness, malformed bars and non-increasing timestamps.
///
/// Duplicated and out-of-order timestamps are both reported as `NotIncreasing`
/// at the first offending index.
pub fn validate_series(bars: &[Bar]) -> Result<(), BarError> {
    if bars.is_empty() {
        return Err(BarError::Empty);
    }
    for (index, bar) in bars.iter().enumerate() {
        if !bar.is_sane() {
            return Err(BarError::Malformed { index });
        }
        if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
            return Err(BarError::NotIncreasing {
                index,
                timestamp: bar.timestamp,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 15 + minute, 0)
            .unwrap()
    }

    fn sample_bar() -> Bar {
        Bar {
            timestamp: ts(0),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            volume: 50_000,
        }
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.open = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut bar = sample_bar();
        bar.high = 97.0; // below low
        assert!(!bar.is_sane());
    }

    #[test]
    fn typical_price() {
        let bar = sample_bar();
        assert!((bar.typical_price() - (105.0 + 98.0 + 103.0) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn validate_empty() {
        assert_eq!(validate_series(&[]), Err(BarError::Empty));
    }

    #[test]
    fn validate_duplicate_timestamp() {
        let a = sample_bar();
        let b = sample_bar();
        assert!(matches!(
            validate_series(&[a, b]),
            Err(BarError::NotIncreasing { index: 1, .. })
        ));
    }

    #[test]
    fn validate_out_of_order() {
        let mut a = sample_bar();
        a.timestamp = ts(5);
        let b = sample_bar();
        assert!(matches!(
            validate_series(&[a, b]),
            Err(BarError::NotIncreasing { index: 1, .. })
        ));
    }

    #[test]
    fn validate_malformed() {
        let a = sample_bar();
        let mut b = sample_bar();
        b.timestamp = ts(1);
        b.low = 110.0;
        assert_eq!(
            validate_series(&[a, b]),
            Err(BarError::Malformed { index: 1 })
        );
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = sample_bar();
        let json = serde_json::to_string(&bar).unwrap();
        let deser: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, deser);
    }
}
