//! Factory: maps strategy names from configs to runtime signal functions.

use super::signal::{EmaCrossover, MacdTrend, RsiReversion, SignalFunction, VwapReversion};

/// Errors that can occur during component construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactoryError {
    #[error("unknown strategy '{0}' (available: {list})", list = SIGNAL_NAMES.join(", "))]
    UnknownSignal(String),
}

/// Names accepted by [`build_signal`].
pub const SIGNAL_NAMES: &[&str] = &[
    "ema_crossover",
    "rsi_reversion",
    "macd_trend",
    "vwap_reversion",
];

/// Create a built-in signal function by name.
pub fn build_signal(name: &str) -> Result<Box<dyn SignalFunction>, FactoryError> {
    match name {
        "ema_crossover" => Ok(Box::new(EmaCrossover)),
        "rsi_reversion" => Ok(Box::new(RsiReversion)),
        "macd_trend" => Ok(Box::new(MacdTrend)),
        "vwap_reversion" => Ok(Box::new(VwapReversion)),
        other => Err(FactoryError::UnknownSignal(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::params::ParamOverrides;

    #[test]
    fn every_listed_name_builds_with_defaults() {
        for name in SIGNAL_NAMES {
            let sig = build_signal(name).unwrap();
            assert_eq!(sig.name(), *name);
            assert!(sig.warmup_bars(&ParamOverrides::new()).unwrap() >= 1);
        }
    }

    #[test]
    fn unknown_name_lists_alternatives() {
        let err = build_signal("turtle").err().unwrap();
        assert_eq!(err, FactoryError::UnknownSignal("turtle".into()));
        assert!(err.to_string().contains("ema_crossover"));
    }
}
