//! Typed parameter overrides injected into signal functions.
//!
//! A sweep variant is a `ParamOverrides` map. Signal functions resolve the
//! names they understand through the typed getters below; names they do not
//! recognize are ignored.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::signal::SignalError;

/// A single parameter value.
///
/// Untagged so that TOML/JSON literals (`10`, `2.5`, `true`, `"sma"`) map
/// directly onto the matching variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "integer",
            ParamValue::Float(_) => "float",
            ParamValue::Bool(_) => "bool",
            ParamValue::Text(_) => "string",
        }
    }

    /// Numeric view: integers widen to floats, everything else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// Named parameter overrides, ordered by name for stable hashing and display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamOverrides(BTreeMap<String, ParamValue>);

impl ParamOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Float parameter; integers are accepted and widened.
    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64, SignalError> {
        match self.0.get(name) {
            None => Ok(default),
            Some(value) => match value.as_f64() {
                Some(v) if v.is_finite() => Ok(v),
                Some(v) => Err(invalid(name, format!("must be finite, got {v}"))),
                None => Err(wrong_type(name, "number", value)),
            },
        }
    }

    /// Positive integer parameter (periods, bar counts).
    ///
    /// Floats with no fractional part are accepted so that sweep grids written
    /// as `[10.0, 20.0]` still bind.
    pub fn period_or(&self, name: &str, default: usize) -> Result<usize, SignalError> {
        let v = match self.0.get(name) {
            None => return Ok(default),
            Some(ParamValue::Int(v)) => *v,
            Some(ParamValue::Float(f)) if f.fract() == 0.0 && f.is_finite() => *f as i64,
            Some(other) => return Err(wrong_type(name, "integer", other)),
        };
        if v < 1 {
            return Err(invalid(name, format!("must be >= 1, got {v}")));
        }
        Ok(v as usize)
    }

    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool, SignalError> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Bool(v)) => Ok(*v),
            Some(other) => Err(wrong_type(name, "bool", other)),
        }
    }

    pub fn text_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str, SignalError> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Text(v)) => Ok(v.as_str()),
            Some(other) => Err(wrong_type(name, "string", other)),
        }
    }

    /// Float parameter that must be strictly positive.
    pub fn positive_f64_or(&self, name: &str, default: f64) -> Result<f64, SignalError> {
        let v = self.f64_or(name, default)?;
        if v <= 0.0 {
            return Err(invalid(name, format!("must be > 0, got {v}")));
        }
        Ok(v)
    }

    /// Compact `name=value` rendering used in leaderboard rows and logs.
    pub fn label(&self) -> String {
        if self.0.is_empty() {
            return "defaults".to_string();
        }
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromIterator<(String, ParamValue)> for ParamOverrides {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, ParamValue>> for ParamOverrides {
    fn from(map: BTreeMap<String, ParamValue>) -> Self {
        Self(map)
    }
}

fn wrong_type(name: &str, expected: &str, got: &ParamValue) -> SignalError {
    invalid(
        name,
        format!("expected {expected}, got {} ({got})", got.type_name()),
    )
}

fn invalid(name: &str, reason: String) -> SignalError {
    SignalError::InvalidParam {
        name: name.to_string(),
        reason,
    }
}
