//! Price-history provider trait and structured error types.
//!
//! The `PriceHistoryProvider` trait abstracts over data sources (in-memory
//! fixtures, CSV directories, seeded synthetic series) so runs can be wired to
//! any of them by dependency injection.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Bar, Interval};

/// What to fetch: one instrument at one interval over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub symbol: String,
    pub exchange: String,
    pub interval: Interval,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl HistoryRequest {
    pub fn new(
        symbol: impl Into<String>,
        exchange: impl Into<String>,
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: exchange.into(),
            interval,
            start,
            end,
        }
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.start > self.end {
            return Err(ProviderError::InvalidRequest(format!(
                "start {} is after end {}",
                self.start, self.end
            )));
        }
        if self.symbol.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("symbol is empty".into()));
        }
        Ok(())
    }

    /// Whether `bar` falls inside the requested date range.
    pub fn contains(&self, bar: &Bar) -> bool {
        let date = bar.timestamp.date();
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for HistoryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {} {}..={}",
            self.exchange, self.symbol, self.interval, self.start, self.end
        )
    }
}

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no data source for {exchange}:{symbol} at {interval}")]
    SymbolNotFound {
        symbol: String,
        exchange: String,
        interval: Interval,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {path} at record {record}: {message}")]
    Parse {
        path: PathBuf,
        record: usize,
        message: String,
    },
}

/// Trait for price-history providers.
///
/// A range with no bars is `Ok(vec![])`, not an error. Returned bars are in
/// ascending timestamp order; validation of the series is the engine's job.
pub trait PriceHistoryProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    fn history(&self, request: &HistoryRequest) -> Result<Vec<Bar>, ProviderError>;
}
