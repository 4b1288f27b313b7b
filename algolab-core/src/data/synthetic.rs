//! Seeded synthetic price generator.
//!
//! Produces a random-walk OHLCV series for any request. The stream is derived
//! from the explicit seed plus (exchange, symbol, interval, start date), so the
//! same request always yields the same bars and different symbols diverge.
//!
//! Calendar: weekdays only. Intraday bars cover the 09:15–15:30 cash session;
//! daily bars are stamped 09:15; weekly bars fall on Mondays.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rand::rngs::StdRng;
use rand::Rng;

use crate::domain::interval::SESSION_MINUTES;
use crate::domain::{Bar, Interval};
use crate::rng::SeedHierarchy;

use super::provider::{HistoryRequest, PriceHistoryProvider, ProviderError};

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    seeds: SeedHierarchy,
    start_price: f64,
    /// Maximum absolute per-bar return (uniform in ±volatility).
    volatility: f64,
    /// Constant per-bar return added to every step.
    drift: f64,
}

impl SyntheticProvider {
    pub fn new(seed: u64) -> Self {
        Self {
            seeds: SeedHierarchy::new(seed),
            start_price: 100.0,
            volatility: 0.01,
            drift: 0.0,
        }
    }

    pub fn with_start_price(mut self, price: f64) -> Self {
        self.start_price = price;
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    pub fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seeds.master_seed()
    }

    fn check(&self) -> Result<(), ProviderError> {
        if !(self.start_price.is_finite() && self.start_price > 0.0) {
            return Err(ProviderError::InvalidRequest(format!(
                "synthetic start price must be > 0, got {}",
                self.start_price
            )));
        }
        if !(self.volatility > 0.0 && self.volatility < 0.5) {
            return Err(ProviderError::InvalidRequest(format!(
                "synthetic volatility must be in (0, 0.5), got {}",
                self.volatility
            )));
        }
        if !(self.drift.abs() < self.volatility) {
            return Err(ProviderError::InvalidRequest(format!(
                "synthetic drift must be smaller than volatility, got {}",
                self.drift
            )));
        }
        Ok(())
    }

    fn next_bar(&self, rng: &mut StdRng, prev_close: f64, timestamp: NaiveDateTime) -> Bar {
        let v = self.volatility;
        let open = prev_close * (1.0 + rng.gen_range(-v / 4.0..v / 4.0));
        let close = open * (1.0 + self.drift + rng.gen_range(-v..v));
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..v / 2.0));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..v / 2.0));
        Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume: rng.gen_range(1_000..100_000u64),
        }
    }
}

impl PriceHistoryProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn history(&self, request: &HistoryRequest) -> Result<Vec<Bar>, ProviderError> {
        request.validate()?;
        self.check()?;

        let interval = request.interval.to_string();
        let start = request.start.to_string();
        let mut rng = self.seeds.rng_for(&[
            request.exchange.as_str(),
            request.symbol.as_str(),
            interval.as_str(),
            start.as_str(),
        ]);

        let mut price = self.start_price;
        let bars = bar_timestamps(request.interval, request.start, request.end)
            .into_iter()
            .map(|ts| {
                let bar = self.next_bar(&mut rng, price, ts);
                price = bar.close;
                bar
            })
            .collect();
        Ok(bars)
    }
}

fn session_open() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 15, 0).unwrap_or(NaiveTime::MIN)
}

fn is_weekday(d: NaiveDate) -> bool {
    !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Bar start times for `interval` between `start` and `end` (inclusive dates).
pub fn bar_timestamps(interval: Interval, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDateTime> {
    let open = session_open();
    let days = start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| is_weekday(*d));

    match interval {
        Interval::Daily => days.map(|d| d.and_time(open)).collect(),
        Interval::Weekly => days
            .filter(|d| d.weekday() == Weekday::Mon)
            .map(|d| d.and_time(open))
            .collect(),
        Interval::Minutes(_) | Interval::Hours(_) => {
            let step = interval.duration();
            let step_minutes = step.num_minutes().max(1);
            let per_session = (SESSION_MINUTES as i64 + step_minutes - 1) / step_minutes;
            days.flat_map(|d| {
                let first = d.and_time(open);
                (0..per_session).map(move |k| first + Duration::minutes(k * step_minutes))
            })
            .collect()
        }
    }
}
