//! Price-history providers.

pub mod csv_file;
pub mod memory;
pub mod provider;
pub mod synthetic;

pub use csv_file::{read_bars, write_bars, CsvProvider};
pub use memory::InMemoryProvider;
pub use provider::{HistoryRequest, PriceHistoryProvider, ProviderError};
pub use synthetic::SyntheticProvider;
