//! VWAP reversion: fade closes stretched away from session VWAP.
//!
//! The VWAP resets at each calendar-date change inside the window. If the
//! window starts mid-session, accumulation starts at the window's first bar.

use crate::components::indicator::{value_at, Indicator};
use crate::components::params::ParamOverrides;
use crate::domain::PriceWindow;
use crate::indicators::{Vwap, VwapAnchor};

use super::{gate_short, Signal, SignalError, SignalFunction};

#[derive(Debug, Clone, PartialEq)]
struct Params {
    band_pct: f64,
    stop_pct: f64,
    target_pct: f64,
    allow_short: bool,
}

impl Params {
    fn bind(params: &ParamOverrides) -> Result<Self, SignalError> {
        Ok(Self {
            band_pct: params.positive_f64_or("band_pct", 0.5)?,
            stop_pct: params.positive_f64_or("stop_pct", 0.5)?,
            target_pct: params.positive_f64_or("target_pct", 1.0)?,
            allow_short: params.bool_or("allow_short", true)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VwapReversion;

impl SignalFunction for VwapReversion {
    fn name(&self) -> &str {
        "vwap_reversion"
    }

    fn warmup_bars(&self, params: &ParamOverrides) -> Result<usize, SignalError> {
        Params::bind(params)?;
        Ok(1)
    }

    fn evaluate(
        &self,
        window: PriceWindow<'_>,
        params: &ParamOverrides,
    ) -> Result<Signal, SignalError> {
        let p = Params::bind(params)?;
        let n = window.len();
        let vwap = Vwap::new(VwapAnchor::Session).compute(window.bars());
        let vwap_now = n.checked_sub(1).and_then(|i| value_at(&vwap, i));
        let (Some(vwap_now), Some(bar)) = (vwap_now, window.last()) else {
            return Ok(Signal::none());
        };

        let close = bar.close;
        let deviation_pct = (close / vwap_now - 1.0) * 100.0;
        let signal = if deviation_pct <= -p.band_pct {
            Signal::long(close)
                .with_stop(close * (1.0 - p.stop_pct / 100.0))
                .with_target(close * (1.0 + p.target_pct / 100.0))
                .with_rationale(format!("close {deviation_pct:.2}% below vwap"))
        } else if deviation_pct >= p.band_pct {
            Signal::short(close)
                .with_stop(close * (1.0 + p.stop_pct / 100.0))
                .with_target(close * (1.0 - p.target_pct / 100.0))
                .with_rationale(format!("close {deviation_pct:.2}% above vwap"))
        } else {
            return Ok(Signal::none());
        };

        Ok(gate_short(
            signal
                .with_confidence((deviation_pct.abs() / (2.0 * p.band_pct)).min(1.0))
                .with_feature("vwap", vwap_now)
                .with_feature("vwap_dev_pct", deviation_pct),
            p.allow_short,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::signal::Direction;
    use crate::indicators::make_ohlc_bars;

    fn eval(data: &[(f64, f64, f64, f64)], params: &ParamOverrides) -> Signal {
        let bars = make_ohlc_bars(data);
        VwapReversion
            .evaluate(PriceWindow::new(&bars), params)
            .unwrap()
    }

    #[test]
    fn close_far_below_vwap_goes_long() {
        // Single-bar session: VWAP = typical price = 97.0667.
        let s = eval(&[(100.0, 101.0, 95.0, 95.2)], &ParamOverrides::new());
        assert_eq!(s.direction, Direction::Long);
        assert_eq!(s.entry_price, 95.2);
        assert!(s.features["vwap_dev_pct"] < -0.5);
    }

    #[test]
    fn close_far_above_vwap_goes_short() {
        let data = [(100.0, 105.0, 99.0, 104.8)];
        assert_eq!(eval(&data, &ParamOverrides::new()).direction, Direction::Short);

        let long_only = ParamOverrides::new().with("allow_short", false);
        assert!(eval(&data, &long_only).is_none());
    }

    #[test]
    fn close_inside_band_is_none() {
        let s = eval(&[(100.0, 100.5, 99.5, 100.0)], &ParamOverrides::new());
        assert!(s.is_none());
    }

    #[test]
    fn empty_window_is_none() {
        let s = VwapReversion
            .evaluate(PriceWindow::new(&[]), &ParamOverrides::new())
            .unwrap();
        assert!(s.is_none());
    }

    #[test]
    fn band_must_be_positive() {
        let bad = ParamOverrides::new().with("band_pct", 0.0);
        assert!(VwapReversion.warmup_bars(&bad).is_err());
    }
}
