//! In-memory provider for tests and for glue code that already holds bars.

use std::collections::BTreeMap;

use crate::domain::{Bar, Interval};

use super::provider::{HistoryRequest, PriceHistoryProvider, ProviderError};

type SeriesKey = (String, String, Interval);

#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    series: BTreeMap<SeriesKey, Vec<Bar>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the series for one instrument and interval.
    /// Bars are served in the order given.
    pub fn insert(
        &mut self,
        exchange: impl Into<String>,
        symbol: impl Into<String>,
        interval: Interval,
        bars: Vec<Bar>,
    ) {
        self.series
            .insert((exchange.into(), symbol.into(), interval), bars);
    }

    pub fn with_series(
        mut self,
        exchange: impl Into<String>,
        symbol: impl Into<String>,
        interval: Interval,
        bars: Vec<Bar>,
    ) -> Self {
        self.insert(exchange, symbol, interval, bars);
        self
    }
}

impl PriceHistoryProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn history(&self, request: &HistoryRequest) -> Result<Vec<Bar>, ProviderError> {
        request.validate()?;
        let key = (
            request.exchange.clone(),
            request.symbol.clone(),
            request.interval,
        );
        let bars = self
            .series
            .get(&key)
            .ok_or_else(|| ProviderError::SymbolNotFound {
                symbol: request.symbol.clone(),
                exchange: request.exchange.clone(),
                interval: request.interval,
            })?;
        Ok(bars.iter().filter(|b| request.contains(b)).cloned().collect())
    }
}
