//! ADX: Average Directional Index (Wilder).
//!
//! Steps:
//! 1. Compute +DM and -DM from consecutive bars
//! 2. Smooth +DM, -DM, and TR using Wilder smoothing (alpha = 1/period)
//! 3. +DI = 100 * smoothed(+DM) / smoothed(TR)
//! 4. -DI = 100 * smoothed(-DM) / smoothed(TR)
//! 5. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 6. ADX = Wilder-smoothed DX
//!
//! Lookback: 2 * period (period for DI smoothing, then period for ADX smoothing).

use crate::components::indicator::Indicator;
use crate::domain::Bar;
use crate::indicators::atr::{true_range, wilder_smooth};

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
}

/// ADX together with the directional indicators it is built from.
#[derive(Debug, Clone)]
pub struct AdxOutput {
    pub adx: Vec<f64>,
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            period,
            name: format!("adx_{period}"),
        }
    }

    /// Compute ADX, +DI and -DI in one pass.
    pub fn compute_full(&self, bars: &[Bar]) -> AdxOutput {
        let n = bars.len();
        let mut out = AdxOutput {
            adx: vec![f64::NAN; n],
            plus_di: vec![f64::NAN; n],
            minus_di: vec![f64::NAN; n],
        };

        if n < 2 {
            return out;
        }

        let mut plus_dm = vec![f64::NAN; n];
        let mut minus_dm = vec![f64::NAN; n];

        for i in 1..n {
            if bars[i].high.is_nan()
                || bars[i].low.is_nan()
                || bars[i - 1].high.is_nan()
                || bars[i - 1].low.is_nan()
            {
                continue;
            }

            let up_move = bars[i].high - bars[i - 1].high;
            let down_move = bars[i - 1].low - bars[i].low;

            plus_dm[i] = if up_move > down_move && up_move > 0.0 {
                up_move
            } else {
                0.0
            };
            minus_dm[i] = if down_move > up_move && down_move > 0.0 {
                down_move
            } else {
                0.0
            };
        }

        // TR[0] lacks a previous close; align it with the DM series.
        let mut tr = true_range(bars);
        tr[0] = f64::NAN;
        let smooth_tr = wilder_smooth(&tr, self.period);
        let smooth_plus_dm = wilder_smooth(&plus_dm, self.period);
        let smooth_minus_dm = wilder_smooth(&minus_dm, self.period);

        let mut dx = vec![f64::NAN; n];
        for i in 0..n {
            if smooth_tr[i].is_nan() || smooth_plus_dm[i].is_nan() || smooth_minus_dm[i].is_nan()
            {
                continue;
            }
            if smooth_tr[i] == 0.0 {
                // No range at all: no directional movement either.
                out.plus_di[i] = 0.0;
                out.minus_di[i] = 0.0;
                dx[i] = 0.0;
                continue;
            }

            let plus_di = 100.0 * smooth_plus_dm[i] / smooth_tr[i];
            let minus_di = 100.0 * smooth_minus_dm[i] / smooth_tr[i];
            out.plus_di[i] = plus_di;
            out.minus_di[i] = minus_di;

            let di_sum = plus_di + minus_di;
            dx[i] = if di_sum == 0.0 {
                0.0
            } else {
                100.0 * (plus_di - minus_di).abs() / di_sum
            };
        }

        out.adx = wilder_smooth(&dx, self.period);
        out
    }
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        self.compute_full(bars).adx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_ohlc_bars;

    #[test]
    fn adx_bounds() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
            (106.0, 107.0, 98.0, 99.0),
            (99.0, 103.0, 97.0, 101.0),
            (101.0, 106.0, 100.0, 105.0),
            (105.0, 110.0, 103.0, 108.0),
            (108.0, 112.0, 106.0, 110.0),
            (110.0, 111.0, 104.0, 105.0),
            (105.0, 109.0, 103.0, 107.0),
            (107.0, 113.0, 105.0, 112.0),
        ]);
        let result = Adx::new(3).compute(&bars);

        assert!(result.iter().any(|v| !v.is_nan()));
        for (i, &v) in result.iter().enumerate() {
            if !v.is_nan() {
                assert!((0.0..=100.0).contains(&v), "ADX out of bounds at bar {i}: {v}");
            }
        }
    }

    #[test]
    fn adx_strong_trend_elevated() {
        let data: Vec<_> = (0..20)
            .map(|i| {
                let base = 100.0 + i as f64 * 5.0;
                (base - 1.0, base + 3.0, base - 3.0, base + 2.0)
            })
            .collect();
        let bars = make_ohlc_bars(&data);
        let out = Adx::new(5).compute_full(&bars);

        let last = out.adx.iter().rev().find(|v| !v.is_nan()).copied().unwrap();
        assert!(last > 10.0, "ADX should be elevated in strong trend, got {last}");
        let n = bars.len() - 1;
        assert!(out.plus_di[n] > out.minus_di[n]);
    }

    #[test]
    fn adx_flat_market_is_zero_not_nan() {
        let bars = make_ohlc_bars(&[(100.0, 100.0, 100.0, 100.0); 12]);
        let result = Adx::new(3).compute(&bars);
        assert_eq!(result[11], 0.0);
    }

    #[test]
    fn adx_lookback() {
        assert_eq!(Adx::new(14).lookback(), 28);
        assert_eq!(Adx::new(7).lookback(), 14);
    }

    #[test]
    fn adx_too_few_bars() {
        let bars = make_ohlc_bars(&[(100.0, 105.0, 95.0, 102.0)]);
        let result = Adx::new(3).compute(&bars);
        assert!(result.iter().all(|v| v.is_nan()));
    }
}
