//! CSV directory provider.
//!
//! Layout: `{data_dir}/{EXCHANGE}_{SYMBOL}_{interval}.csv`, e.g.
//! `NSE_SBIN_5m.csv` or `NSE_SBIN_D.csv`.
//!
//! Columns: `timestamp,open,high,low,close,volume`. Timestamps are
//! `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`, or a bare `YYYY-MM-DD`
//! (midnight). Rows are returned in file order; an out-of-order file is
//! reported by series validation, not repaired here.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Bar, Interval};

use super::provider::{HistoryRequest, PriceHistoryProvider, ProviderError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Deserialize, Serialize)]
struct BarRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

#[derive(Debug, Clone)]
pub struct CsvProvider {
    data_dir: PathBuf,
}

impl CsvProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// File backing one instrument at one interval.
    pub fn path_for(&self, exchange: &str, symbol: &str, interval: Interval) -> PathBuf {
        self.data_dir
            .join(format!("{exchange}_{symbol}_{interval}.csv"))
    }
}

impl PriceHistoryProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn history(&self, request: &HistoryRequest) -> Result<Vec<Bar>, ProviderError> {
        request.validate()?;
        let path = self.path_for(&request.exchange, &request.symbol, request.interval);
        if !path.exists() {
            return Err(ProviderError::SymbolNotFound {
                symbol: request.symbol.clone(),
                exchange: request.exchange.clone(),
                interval: request.interval,
            });
        }
        let mut bars = read_bars(&path)?;
        bars.retain(|b| request.contains(b));
        debug!(path = %path.display(), bars = bars.len(), "loaded csv history");
        Ok(bars)
    }
}

/// Read every bar in a CSV file, in file order.
pub fn read_bars(path: &Path) -> Result<Vec<Bar>, ProviderError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, 0, e))?;

    let mut bars = Vec::new();
    for (i, row) in reader.deserialize::<BarRow>().enumerate() {
        let record = i + 1;
        let row = row.map_err(|e| csv_error(path, record, e))?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| ProviderError::Parse {
            path: path.to_path_buf(),
            record,
            message: format!("unrecognized timestamp '{}'", row.timestamp),
        })?;
        bars.push(Bar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(bars)
}

/// Write bars in the layout [`read_bars`] accepts, creating parent directories.
pub fn write_bars(path: &Path, bars: &[Bar]) -> Result<(), ProviderError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ProviderError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, 0, e))?;
    for (i, bar) in bars.iter().enumerate() {
        writer
            .serialize(BarRow {
                timestamp: bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            })
            .map_err(|e| csv_error(path, i + 1, e))?;
    }
    writer.flush().map_err(|source| ProviderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn csv_error(path: &Path, record: usize, err: csv::Error) -> ProviderError {
    if err.is_io_error() {
        if let csv::ErrorKind::Io(source) = err.into_kind() {
            return ProviderError::Io {
                path: path.to_path_buf(),
                source,
            };
        }
        return ProviderError::Parse {
            path: path.to_path_buf(),
            record,
            message: "I/O error".into(),
        };
    }
    ProviderError::Parse {
        path: path.to_path_buf(),
        record,
        message: err.to_string(),
    }
}
