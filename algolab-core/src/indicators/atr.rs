//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! Smoothing: Wilder (EMA with alpha = 1/period, the default) or a simple
//! moving average of TR.
//! Lookback: period (TR[0] has no previous close, so the first valid value is
//! at index `period`).

use serde::{Deserialize, Serialize};

use crate::components::indicator::Indicator;
use crate::domain::Bar;
use crate::indicators::sma::sma_of_series;

/// How true range is averaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtrSmoothing {
    #[default]
    Wilder,
    Simple,
}

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    smoothing: AtrSmoothing,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self::with_smoothing(period, AtrSmoothing::Wilder)
    }

    pub fn with_smoothing(period: usize, smoothing: AtrSmoothing) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        let name = match smoothing {
            AtrSmoothing::Wilder => format!("atr_{period}"),
            AtrSmoothing::Simple => format!("atr_sma_{period}"),
        };
        Self {
            period,
            smoothing,
            name,
        }
    }
}

/// Compute the True Range series from bars.
/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let n = bars.len();
    let mut tr = vec![f64::NAN; n];

    if n == 0 {
        return tr;
    }

    let h = bars[0].high;
    let l = bars[0].low;
    if !(h.is_nan() || l.is_nan()) {
        tr[0] = h - l;
    }

    for i in 1..n {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        if !(h.is_nan() || l.is_nan() || pc.is_nan()) {
            tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
        }
    }

    tr
}

/// Apply Wilder smoothing to a series. Alpha = 1/period.
///
/// Seed: mean of the first `period` consecutive non-NaN values. A NaN after
/// the seed taints the rest of the output.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if n < period || period == 0 {
        return result;
    }

    let mut run = 0usize;
    let mut seed_end = None;
    for (i, v) in values.iter().enumerate() {
        if v.is_nan() {
            run = 0;
            continue;
        }
        run += 1;
        if run == period {
            seed_end = Some(i + 1);
            break;
        }
    }

    let seed_end = match seed_end {
        Some(e) => e,
        None => return result,
    };

    let seed: f64 = values[seed_end - period..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let alpha = 1.0 / period as f64;
    let mut prev = seed;

    for i in seed_end..n {
        if values[i].is_nan() {
            return result;
        }
        let smoothed = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = smoothed;
        prev = smoothed;
    }

    result
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut tr = true_range(bars);
        // TR[0] is just high-low, not a proper true range.
        if let Some(first) = tr.first_mut() {
            *first = f64::NAN;
        }
        match self.smoothing {
            AtrSmoothing::Wilder => wilder_smooth(&tr, self.period),
            AtrSmoothing::Simple => sma_of_series(&tr, self.period),
        }
    }
}
