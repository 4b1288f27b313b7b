//! Run fingerprinting: deterministic identification of variants and datasets.
//!
//! - `VariantSpec`: strategy name + parameter overrides + engine config.
//! - `ConfigHash`: structural identity (strategy and parameter names only).
//! - `FullHash`: exact identity (everything, including parameter values).
//! - `DatasetHash`: identity of the bar series a run consumed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::components::params::ParamOverrides;
use crate::domain::Bar;
use crate::engine::EngineConfig;

macro_rules! hash_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn from_bytes(bytes: &[u8]) -> Self {
                Self(blake3::hash(bytes).to_hex().to_string())
            }

            /// First 12 hex characters, for tables and logs.
            pub fn short(&self) -> &str {
                &self.0[..self.0.len().min(12)]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

hash_newtype!(
    /// Strategy name + parameter names, ignoring values.
    ConfigHash
);
hash_newtype!(
    /// Strategy, parameter values and engine config.
    FullHash
);
hash_newtype!(
    /// Content hash of a bar series.
    DatasetHash
);

/// Everything that determines a run's output besides the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSpec {
    pub strategy: String,
    pub params: ParamOverrides,
    pub engine: EngineConfig,
}

impl VariantSpec {
    /// Structural hash: two variants of the same strategy that override the
    /// same parameter names share it.
    pub fn config_hash(&self) -> ConfigHash {
        let names: Vec<&str> = self.params.iter().map(|(k, _)| k.as_str()).collect();
        let structural = format!("{}[{}]", self.strategy, names.join(","));
        ConfigHash::from_bytes(structural.as_bytes())
    }

    /// Full hash over the canonical JSON form (params are a `BTreeMap`, so key
    /// order is deterministic).
    pub fn full_hash(&self) -> FullHash {
        let json = serde_json::to_string(self).expect("VariantSpec must serialize");
        FullHash::from_bytes(json.as_bytes())
    }
}

/// Hash a bar series field by field.
pub fn dataset_hash(bars: &[Bar]) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.and_utc().timestamp().to_le_bytes());
        for v in [bar.open, bar.high, bar.low, bar.close] {
            hasher.update(&v.to_bits().to_le_bytes());
        }
        hasher.update(&bar.volume.to_le_bytes());
    }
    DatasetHash(hasher.finalize().to_hex().to_string())
}
