//! MACD trend: histogram zero-cross entries confirmed by ADX.

use crate::components::indicator::{value_at, Indicator};
use crate::components::params::ParamOverrides;
use crate::domain::PriceWindow;
use crate::indicators::{macd_of_series, Adx, Atr};

use super::{gate_short, Signal, SignalError, SignalFunction};

#[derive(Debug, Clone, PartialEq)]
struct Params {
    fast: usize,
    slow: usize,
    signal: usize,
    adx_period: usize,
    min_adx: f64,
    atr_period: usize,
    stop_atr: f64,
    target_atr: f64,
    allow_short: bool,
}

impl Params {
    fn bind(params: &ParamOverrides) -> Result<Self, SignalError> {
        let p = Self {
            fast: params.period_or("fast", 12)?,
            slow: params.period_or("slow", 26)?,
            signal: params.period_or("signal", 9)?,
            adx_period: params.period_or("adx_period", 14)?,
            min_adx: params.f64_or("min_adx", 20.0)?,
            atr_period: params.period_or("atr_period", 14)?,
            stop_atr: params.positive_f64_or("stop_atr", 2.0)?,
            target_atr: params.positive_f64_or("target_atr", 4.0)?,
            allow_short: params.bool_or("allow_short", true)?,
        };
        if p.fast >= p.slow {
            return Err(SignalError::InvalidParam {
                name: "fast".into(),
                reason: format!("must be < slow ({}), got {}", p.slow, p.fast),
            });
        }
        if p.min_adx < 0.0 {
            return Err(SignalError::InvalidParam {
                name: "min_adx".into(),
                reason: format!("must be >= 0, got {}", p.min_adx),
            });
        }
        Ok(p)
    }
}

/// MACD histogram crossover; `min_adx = 0` disables the trend confirmation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacdTrend;

impl SignalFunction for MacdTrend {
    fn name(&self) -> &str {
        "macd_trend"
    }

    fn warmup_bars(&self, params: &ParamOverrides) -> Result<usize, SignalError> {
        let p = Params::bind(params)?;
        let macd = p.slow + p.signal;
        let adx = if p.min_adx > 0.0 { 2 * p.adx_period + 1 } else { 0 };
        Ok(macd.max(adx).max(p.atr_period + 1))
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
        let macd = macd_of_series(&closes, p.fast, p.slow, p.signal);
        let atr = Atr::new(p.atr_period).compute(window.bars());

        let (Some(hist_cur), Some(hist_prev), Some(line), Some(atr_now)) = (
            value_at(&macd.histogram, n - 1),
            value_at(&macd.histogram, n - 2),
            value_at(&macd.line, n - 1),
            value_at(&atr, n - 1),
        ) else {
            return Ok(Signal::none());
        };

        let crossed_up = hist_cur > 0.0 && hist_prev <= 0.0;
        let crossed_down = hist_cur < 0.0 && hist_prev >= 0.0;
        if !(crossed_up || crossed_down) || atr_now <= 0.0 {
            return Ok(Signal::none());
        }

        let mut adx_now = None;
        if p.min_adx > 0.0 {
            match value_at(&Adx::new(p.adx_period).compute(window.bars()), n - 1) {
                Some(adx) if adx >= p.min_adx => adx_now = Some(adx),
                _ => return Ok(Signal::none()),
            }
        }

        let close = closes[n - 1];
        let signal = if crossed_up {
            Signal::long(close)
                .with_stop(close - p.stop_atr * atr_now)
                .with_target(close + p.target_atr * atr_now)
                .with_rationale("macd histogram crossed above zero")
        } else {
            Signal::short(close)
                .with_stop(close + p.stop_atr * atr_now)
                .with_target(close - p.target_atr * atr_now)
                .with_rationale("macd histogram crossed below zero")
        };

        let mut signal = signal
            .with_feature("macd", line)
            .with_feature("macd_hist", hist_cur)
            .with_feature("atr", atr_now);
        if let Some(adx) = adx_now {
            signal = signal
                .with_feature("adx", adx)
                .with_confidence((adx / 50.0).min(1.0));
        }
        Ok(gate_short(signal, p.allow_short))
    }
}
