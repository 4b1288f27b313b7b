//! MACD: Moving Average Convergence/Divergence.
//!
//! line      = EMA(fast) - EMA(slow)
//! signal    = EMA(signal) of the line
//! histogram = line - signal
//!
//! Lookback: slow - 1 for the line, slow + signal - 2 for signal/histogram.

use crate::components::indicator::Indicator;
use crate::domain::Bar;
use crate::indicators::ema::ema_of_series;

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    name: String,
}

/// The three MACD series, each the same length as the input.
#[derive(Debug, Clone)]
pub struct MacdOutput {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1 && slow >= 1 && signal >= 1, "MACD periods must be >= 1");
        assert!(fast < slow, "MACD fast period must be shorter than slow period");
        Self {
            fast,
            slow,
            signal,
            name: format!("macd_{fast}_{slow}_{signal}"),
        }
    }

    pub fn compute_full(&self, bars: &[Bar]) -> MacdOutput {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        macd_of_series(&closes, self.fast, self.slow, self.signal)
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    /// Lookback of the histogram (the latest-defined of the three series).
    fn lookback(&self) -> usize {
        self.slow + self.signal - 2
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        self.compute_full(bars).histogram
    }
}

/// MACD of an arbitrary price series.
pub fn macd_of_series(values: &[f64], fast: usize, slow: usize, signal: usize) -> MacdOutput {
    let fast_ema = ema_of_series(values, fast);
    let slow_ema = ema_of_series(values, slow);

    let line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_of_series(&line, signal);
    let histogram = line
        .iter()
        .zip(&signal_line)
        .map(|(l, s)| l - s)
        .collect();

    MacdOutput {
        line,
        signal: signal_line,
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn macd_line_is_fast_minus_slow() {
        let closes = ramp(30);
        let out = macd_of_series(&closes, 3, 6, 4);
        let fast = ema_of_series(&closes, 3);
        let slow = ema_of_series(&closes, 6);
        for i in 5..30 {
            assert_approx(out.line[i], fast[i] - slow[i], DEFAULT_EPSILON);
        }
    }

    #[test]
    fn macd_warmup_lengths() {
        let macd = Macd::new(3, 6, 4);
        let bars = make_bars(&ramp(30));
        let out = macd.compute_full(&bars);

        assert!(out.line[4].is_nan());
        assert!(!out.line[5].is_nan());
        assert!(out.signal[7].is_nan());
        assert!(!out.signal[8].is_nan());
        let first_hist = out.histogram.iter().position(|v| !v.is_nan()).unwrap();
        assert_eq!(first_hist, macd.lookback());
    }

    #[test]
    fn macd_positive_in_uptrend() {
        let out = macd_of_series(&ramp(40), 12, 26, 9);
        assert!(out.line[39] > 0.0);
    }

    #[test]
    fn macd_flat_series_is_zero() {
        let out = macd_of_series(&[50.0; 40], 12, 26, 9);
        assert_approx(out.line[39], 0.0, DEFAULT_EPSILON);
        assert_approx(out.histogram[39], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    #[should_panic(expected = "fast period must be shorter")]
    fn macd_rejects_inverted_periods() {
        Macd::new(26, 12, 9);
    }
}
