//! Fitness function: configurable metric selector for variant ranking.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::metrics::PerformanceMetrics;

/// Which metric to optimize/sort by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessMetric {
    #[default]
    Sharpe,
    Sortino,
    Calmar,
    TotalReturn,
    WinRate,
    ProfitFactor,
    MaxDrawdown,
    Expectancy,
    NetPnl,
}

impl FitnessMetric {
    pub const ALL: [FitnessMetric; 9] = [
        Self::Sharpe,
        Self::Sortino,
        Self::Calmar,
        Self::TotalReturn,
        Self::WinRate,
        Self::ProfitFactor,
        Self::MaxDrawdown,
        Self::Expectancy,
        Self::NetPnl,
    ];

    /// Extract the relevant metric value from a PerformanceMetrics struct.
    pub fn extract(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            Self::Sharpe => metrics.sharpe,
            Self::Sortino => metrics.sortino,
            Self::Calmar => metrics.calmar,
            Self::TotalReturn => metrics.total_return_pct,
            Self::WinRate => metrics.win_rate,
            Self::ProfitFactor => metrics.profit_factor,
            Self::MaxDrawdown => metrics.max_drawdown_pct,
            Self::Expectancy => metrics.expectancy,
            Self::NetPnl => metrics.net_pnl,
        }
    }

    /// Whether higher values are better for this metric.
    ///
    /// Drawdown is reported as a positive percentage, so lower is better.
    pub fn is_higher_better(&self) -> bool {
        !matches!(self, Self::MaxDrawdown)
    }

    /// Returns true if `a` is strictly better than `b`.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        if self.is_higher_better() {
            a > b
        } else {
            a < b
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sharpe => "sharpe",
            Self::Sortino => "sortino",
            Self::Calmar => "calmar",
            Self::TotalReturn => "total_return",
            Self::WinRate => "win_rate",
            Self::ProfitFactor => "profit_factor",
            Self::MaxDrawdown => "max_drawdown",
            Self::Expectancy => "expectancy",
            Self::NetPnl => "net_pnl",
        }
    }
}

impl fmt::Display for FitnessMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FitnessMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|m| m.as_str()).collect();
                format!("unknown ranking metric '{s}' (expected one of: {})", names.join(", "))
            })
    }
}
