//! RSI mean reversion: fade oversold/overbought readings in ranging markets.
//!
//! Long when RSI is at or below `oversold`, Short when at or above
//! `overbought`. An ADX ceiling (`max_adx`, 0 disables it) keeps the strategy
//! out of strong trends. Stop and target are percentages of the close.

use crate::components::indicator::{value_at, Indicator};
use crate::components::params::ParamOverrides;
use crate::domain::PriceWindow;
use crate::indicators::{rsi_of_series, Adx};

use super::{gate_short, Signal, SignalError, SignalFunction};

#[derive(Debug, Clone, PartialEq)]
struct Params {
    rsi_period: usize,
    oversold: f64,
    overbought: f64,
    stop_pct: f64,
    target_pct: f64,
    max_adx: f64,
    adx_period: usize,
    allow_short: bool,
}

impl Params {
    fn bind(params: &ParamOverrides) -> Result<Self, SignalError> {
        let p = Self {
            rsi_period: params.period_or("rsi_period", 14)?,
            oversold: params.f64_or("oversold", 30.0)?,
            overbought: params.f64_or("overbought", 70.0)?,
            stop_pct: params.positive_f64_or("stop_pct", 1.0)?,
            target_pct: params.positive_f64_or("target_pct", 2.0)?,
            max_adx: params.f64_or("max_adx", 25.0)?,
            adx_period: params.period_or("adx_period", 14)?,
            allow_short: params.bool_or("allow_short", true)?,
        };
        if !(0.0 < p.oversold && p.oversold < p.overbought && p.overbought < 100.0) {
            return Err(SignalError::InvalidParam {
                name: "oversold".into(),
                reason: format!(
                    "need 0 < oversold < overbought < 100, got {} / {}",
                    p.oversold, p.overbought
                ),
            });
        }
        if p.max_adx < 0.0 {
            return Err(SignalError::InvalidParam {
                name: "max_adx".into(),
                reason: format!("must be >= 0, got {}", p.max_adx),
            });
        }
        Ok(p)
    }

    fn adx_enabled(&self) -> bool {
        self.max_adx > 0.0
    }
}

/// RSI extremes with an optional ADX trend filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct RsiReversion;

impl SignalFunction for RsiReversion {
    fn name(&self) -> &str {
        "rsi_reversion"
    }

    fn warmup_bars(&self, params: &ParamOverrides) -> Result<usize, SignalError> {
        let p = Params::bind(params)?;
        let adx = if p.adx_enabled() { 2 * p.adx_period + 1 } else { 0 };
        Ok((p.rsi_period + 1).max(adx))
    }

    fn evaluate(
        &self,
        window: PriceWindow<'_>,
        params: &ParamOverrides,
    ) -> Result<Signal, SignalError> {
        let p = Params::bind(params)?;
        let n = window.len();
        if n == 0 {
            return Ok(Signal::none());
        }

        let closes = window.closes();
        let Some(rsi) = value_at(&rsi_of_series(&closes, p.rsi_period), n - 1) else {
            return Ok(Signal::none());
        };

        let adx = if p.adx_enabled() {
            let Some(adx) = value_at(&Adx::new(p.adx_period).compute(window.bars()), n - 1) else {
                return Ok(Signal::none());
            };
            if adx > p.max_adx {
                return Ok(Signal::none());
            }
            Some(adx)
        } else {
            None
        };

        let close = closes[n - 1];
        let signal = if rsi <= p.oversold {
            Signal::long(close)
                .with_stop(close * (1.0 - p.stop_pct / 100.0))
                .with_target(close * (1.0 + p.target_pct / 100.0))
                .with_rationale(format!("rsi {rsi:.1} <= {}", p.oversold))
                .with_confidence(((p.oversold - rsi) / p.oversold).clamp(0.0, 1.0))
        } else if rsi >= p.overbought {
            Signal::short(close)
                .with_stop(close * (1.0 + p.stop_pct / 100.0))
                .with_target(close * (1.0 - p.target_pct / 100.0))
                .with_rationale(format!("rsi {rsi:.1} >= {}", p.overbought))
                .with_confidence(((rsi - p.overbought) / (100.0 - p.overbought)).clamp(0.0, 1.0))
        } else {
            return Ok(Signal::none());
        };

        let mut signal = signal.with_feature("rsi", rsi);
        if let Some(adx) = adx {
            signal = signal.with_feature("adx", adx);
        }
        Ok(gate_short(signal, p.allow_short))
    }
}
