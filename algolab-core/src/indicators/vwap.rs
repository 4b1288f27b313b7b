//! VWAP: Volume Weighted Average Price.
//!
//! VWAP[t] = sum(typical_price * volume) / sum(volume), accumulated since the
//! most recent anchor. Typical price = (high + low + close) / 3.
//!
//! Zero cumulative volume (e.g. the first bars of an illiquid session) yields
//! the bar's typical price rather than 0/0.
//! Lookback: 0.

use serde::{Deserialize, Serialize};

use crate::components::indicator::Indicator;
use crate::domain::Bar;

/// Where the cumulative sums restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "bars")]
pub enum VwapAnchor {
    /// Reset whenever the calendar date of the bar changes.
    #[default]
    Session,
    /// Accumulate over the whole series.
    Never,
    /// Reset every `n` bars, counted from the start of the series.
    EveryBars(usize),
}

#[derive(Debug, Clone)]
pub struct Vwap {
    anchor: VwapAnchor,
    name: String,
}

impl Vwap {
    pub fn new(anchor: VwapAnchor) -> Self {
        if let VwapAnchor::EveryBars(n) = anchor {
            assert!(n >= 1, "VWAP anchor bar count must be >= 1");
        }
        let name = match anchor {
            VwapAnchor::Session => "vwap_session".to_string(),
            VwapAnchor::Never => "vwap".to_string(),
            VwapAnchor::EveryBars(n) => format!("vwap_{n}"),
        };
        Self { anchor, name }
    }

    fn is_anchor(&self, bars: &[Bar], i: usize) -> bool {
        if i == 0 {
            return true;
        }
        match self.anchor {
            VwapAnchor::Session => bars[i].timestamp.date() != bars[i - 1].timestamp.date(),
            VwapAnchor::Never => false,
            VwapAnchor::EveryBars(n) => i % n == 0,
        }
    }
}

impl Indicator for Vwap {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut result = Vec::with_capacity(bars.len());
        let mut pv = 0.0;
        let mut vol = 0.0;

        for (i, bar) in bars.iter().enumerate() {
            if self.is_anchor(bars, i) {
                pv = 0.0;
                vol = 0.0;
            }
            let tp = bar.typical_price();
            if tp.is_nan() {
                result.push(f64::NAN);
                continue;
            }
            pv += tp * bar.volume as f64;
            vol += bar.volume as f64;

            result.push(if vol > 0.0 { pv / vol } else { tp });
        }

        result
    }
}
