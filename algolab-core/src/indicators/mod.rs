//! Concrete indicator implementations.
//!
//! All indicators implement the `Indicator` trait from `components::indicator`.
//! Series-level helpers (`ema_of_series`, `sma_of_series`, `rsi_of_series`,
//! `macd_of_series`) let strategies compose indicators over derived series.
//!
//! Multi-series indicators (MACD, ADX with its DI lines) expose a
//! `compute_full` returning every series; `Indicator::compute` returns the
//! headline one.

pub mod adx;
pub mod atr;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod vwap;

pub use adx::{Adx, AdxOutput};
pub use atr::{true_range, wilder_smooth, Atr, AtrSmoothing};
pub use ema::{ema_of_series, Ema};
pub use macd::{macd_of_series, Macd, MacdOutput};
pub use rsi::{rsi_of_series, Rsi};
pub use sma::{sma_of_series, Sma};
pub use vwap::{Vwap, VwapAnchor};

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
/// Bars are one day apart starting 2024-01-02 09:15.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    let data: Vec<_> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            (open, open.max(close) + 1.0, open.min(close) - 1.0, close)
        })
        .collect();
    make_ohlc_bars(&data)
}

/// Create bars from explicit (open, high, low, close) tuples, one day apart.
#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 15, 0)
        .unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            timestamp: base + chrono::Duration::days(i as i64),
            open,
            high,
            low,
            close,
            volume: 1000,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
