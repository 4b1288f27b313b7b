//! EMA crossover: trend entry on fast/slow exponential average crosses.
//!
//! Fires Long when the fast EMA crosses above the slow EMA on the current bar,
//! Short when it crosses below. Stop and target are placed at ATR multiples
//! from the close.

use crate::components::indicator::{value_at, Indicator};
use crate::components::params::ParamOverrides;
use crate::domain::PriceWindow;
use crate::indicators::{ema_of_series, Atr};

use super::{gate_short, Signal, SignalError, SignalFunction};

#[derive(Debug, Clone, PartialEq)]
struct Params {
    fast: usize,
    slow: usize,
    atr_period: usize,
    stop_atr: f64,
    target_atr: f64,
    allow_short: bool,
}

impl Params {
    fn bind(params: &ParamOverrides) -> Result<Self, SignalError> {
        let p = Self {
            fast: params.period_or("fast", 9)?,
            slow: params.period_or("slow", 21)?,
            atr_period: params.period_or("atr_period", 14)?,
            stop_atr: params.positive_f64_or("stop_atr", 1.5)?,
            target_atr: params.positive_f64_or("target_atr", 3.0)?,
            allow_short: params.bool_or("allow_short", true)?,
        };
        if p.fast >= p.slow {
            return Err(SignalError::InvalidParam {
                name: "fast".into(),
                reason: format!("must be < slow ({}), got {}", p.slow, p.fast),
            });
        }
        Ok(p)
    }
}

/// Fast/slow EMA crossover with ATR-based exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmaCrossover;

impl SignalFunction for EmaCrossover {
    fn name(&self) -> &str {
        "ema_crossover"
    }

    fn warmup_bars(&self, params: &ParamOverrides) -> Result<usize, SignalError> {
        let p = Params::bind(params)?;
        // One extra bar so the previous-bar comparison is defined.
        Ok((p.slow + 1).max(p.atr_period + 1))
    }

    fn evaluate(
        &self,
        window: PriceWindow<'_>,
        params: &ParamOverrides,
    ) -> Result<Signal, SignalError> {
        let p = Params::bind(params)?;
        let n = window.len();
        if n < 2 {
            return Ok(Signal::none());
        }

        let closes = window.closes();
        let fast = ema_of_series(&closes, p.fast);
        let slow = ema_of_series(&closes, p.slow);
        let atr = Atr::new(p.atr_period).compute(window.bars());

        let (Some(fast_cur), Some(slow_cur), Some(fast_prev), Some(slow_prev), Some(atr_now)) = (
            value_at(&fast, n - 1),
            value_at(&slow, n - 1),
            value_at(&fast, n - 2),
            value_at(&slow, n - 2),
            value_at(&atr, n - 1),
        ) else {
            return Ok(Signal::none());
        };
        if atr_now <= 0.0 {
            return Ok(Signal::none());
        }

        let close = closes[n - 1];
        let signal = if fast_cur > slow_cur && fast_prev <= slow_prev {
            Signal::long(close)
                .with_stop(close - p.stop_atr * atr_now)
                .with_target(close + p.target_atr * atr_now)
                .with_rationale(format!("ema{} crossed above ema{}", p.fast, p.slow))
        } else if fast_cur < slow_cur && fast_prev >= slow_prev {
            Signal::short(close)
                .with_stop(close + p.stop_atr * atr_now)
                .with_target(close - p.target_atr * atr_now)
                .with_rationale(format!("ema{} crossed below ema{}", p.fast, p.slow))
        } else {
            return Ok(Signal::none());
        };

        let spread = (fast_cur - slow_cur) / atr_now;
        Ok(gate_short(
            signal
                .with_confidence(spread.abs().min(1.0))
                .with_feature("ema_fast", fast_cur)
                .with_feature("ema_slow", slow_cur)
                .with_feature("atr", atr_now),
            p.allow_short,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::signal::Direction;
    use crate::indicators::make_bars;

    fn params() -> ParamOverrides {
        ParamOverrides::new()
            .with("fast", 3i64)
            .with("slow", 6i64)
            .with("atr_period", 3i64)
    }

    /// Falls for a while then turns up sharply: fast crosses above slow.
    fn v_shape() -> Vec<f64> {
        let mut closes: Vec<f64> = (0..15).map(|i| 120.0 - i as f64).collect();
        closes.extend((1..=6).map(|i| 106.0 + 3.0 * i as f64));
        closes
    }

    fn first_signal(closes: &[f64], params: &ParamOverrides) -> Option<(usize, Signal)> {
        let bars = make_bars(closes);
        (1..=bars.len()).find_map(|end| {
            let s = EmaCrossover
                .evaluate(PriceWindow::new(&bars[..end]), params)
                .unwrap();
            (!s.is_none()).then_some((end - 1, s))
        })
    }

    #[test]
    fn golden_cross_goes_long_with_atr_exits() {
        let (_, signal) = first_signal(&v_shape(), &params()).expect("crossover expected");
        assert_eq!(signal.direction, Direction::Long);
        let stop = signal.stop_loss.unwrap();
        assert!(stop < signal.entry_price);
        assert!(signal.targets[0] > signal.entry_price);
        let atr = signal.features["atr"];
        assert!((signal.entry_price - stop - 1.5 * atr).abs() < 1e-9);
    }

    #[test]
    fn death_cross_respects_allow_short() {
        let mut closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        closes.extend((1..=6).map(|i| 114.0 - 3.0 * i as f64));

        let (_, short) = first_signal(&closes, &params()).expect("crossover expected");
        assert_eq!(short.direction, Direction::Short);

        let long_only = params().with("allow_short", false);
        assert!(first_signal(&closes, &long_only).is_none());
    }

    #[test]
    fn no_signal_during_warmup() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        let s = EmaCrossover
            .evaluate(PriceWindow::new(&bars), &params())
            .unwrap();
        assert!(s.is_none());
    }

    #[test]
    fn inverted_periods_are_rejected() {
        let bad = ParamOverrides::new().with("fast", 30i64).with("slow", 10i64);
        assert!(matches!(
            EmaCrossover.warmup_bars(&bad),
            Err(SignalError::InvalidParam { .. })
        ));
    }

    #[test]
    fn warmup_covers_slow_and_atr() {
        assert_eq!(EmaCrossover.warmup_bars(&params()).unwrap(), 7);
        assert_eq!(EmaCrossover.warmup_bars(&ParamOverrides::new()).unwrap(), 22);
    }
}
