// =============================================================================
// Shared types used across the RSI crossover pipeline
// =============================================================================

use serde::{Deserialize, Serialize};

/// Discrete signal attached to every row of the output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    None,
    Buy,
    Sell,
}

impl Signal {
    /// Numeric code used by the legacy tables: 0 = none, 1 = buy, 2 = sell.
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Buy => 1,
            Self::Sell => 2,
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::None
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Bar cadence of a price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    Daily,
    Weekly,
}

impl Interval {
    /// Interval string understood by the Yahoo chart endpoint.
    pub fn as_query(self) -> &'static str {
        match self {
            Self::Daily => "1d",
            Self::Weekly => "1wk",
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
        }
    }
}

/// How to resolve a row on which both latches fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictPolicy {
    /// SELL overwrites BUY (the historical two-pass behaviour).
    PreferSell,
    PreferBuy,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self::PreferSell
    }
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreferSell => write!(f, "PreferSell"),
            Self::PreferBuy => write!(f, "PreferBuy"),
        }
    }
}
