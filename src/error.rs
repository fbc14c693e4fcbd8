// =============================================================================
// Domain errors
// =============================================================================
//
// Conditions the pipeline itself can detect.  Transport and file failures
// stay as `anyhow::Error` with context attached at the call site.

use chrono::NaiveDate;
use thiserror::Error;

use crate::types::Interval;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The provider returned no usable close prices.
    #[error("unable to retrieve close data for {symbol} ({interval}): {reason}")]
    MissingData {
        symbol: String,
        interval: Interval,
        reason: String,
    },

    #[error("no daily rows on or after the analysis cutoff {cutoff}")]
    EmptyWindow { cutoff: NaiveDate },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{series} series has {prices} prices but {rsi} RSI values")]
    LengthMismatch {
        series: Interval,
        prices: usize,
        rsi: usize,
    },
}

impl AnalysisError {
    pub fn missing(symbol: impl Into<String>, interval: Interval, reason: impl Into<String>) -> Self {
        Self::MissingData {
            symbol: symbol.into(),
            interval,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_data_message_names_symbol_and_interval() {
        let err = AnalysisError::missing("PAYTM.NS", Interval::Weekly, "empty series");
        let msg = err.to_string();
        assert!(msg.contains("PAYTM.NS"));
        assert!(msg.contains("weekly"));
        assert!(msg.contains("empty series"));
    }
}
