//! Indicator trait and helpers for reading warmup-padded series.
//!
//! Indicators are pure functions: bar history in, numeric series out. Values
//! that are undefined (warmup, NaN input) are `f64::NAN`; callers read them
//! through [`value_at`] / [`last_valid`] and skip decisions on `None`.

use crate::domain::Bar;

/// Trait for indicators.
///
/// Indicators take a full bar series and produce a numeric output series of
/// the same length. The first `lookback()` values are `f64::NAN` (warmup).
///
/// # Look-ahead contamination guard
/// No indicator value at bar t may depend on price data from bar t+1 or later.
/// Every indicator must pass the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;

    /// Value at the last bar, `None` while warming up.
    fn latest(&self, bars: &[Bar]) -> Option<f64> {
        last_valid(&self.compute(bars))
    }
}

/// Value at `index`, treating NaN and out-of-range as unknown.
pub fn value_at(series: &[f64], index: usize) -> Option<f64> {
    series.get(index).copied().filter(|v| v.is_finite())
}

/// Value at the final index, treating NaN as unknown.
pub fn last_valid(series: &[f64]) -> Option<f64> {
    series.last().copied().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_at_filters_nan() {
        let s = vec![f64::NAN, 1.0, 2.0];
        assert_eq!(value_at(&s, 0), None);
        assert_eq!(value_at(&s, 1), Some(1.0));
        assert_eq!(value_at(&s, 3), None); // out of bounds
    }

    #[test]
    fn last_valid_requires_final_value() {
        assert_eq!(last_valid(&[1.0, f64::NAN]), None);
        assert_eq!(last_valid(&[f64::NAN, 3.0]), Some(3.0));
        assert_eq!(last_valid(&[]), None);
    }
}
