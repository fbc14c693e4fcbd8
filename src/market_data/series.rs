use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AnalysisError;
use crate::types::Interval;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// One bar of a daily or weekly price history.
///
/// Only `date` and `close` feed the oscillator; the remaining fields are the
/// provider's original columns, carried through to the exported tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub adj_close: Option<f64>,
    pub volume: Option<f64>,
}

impl PricePoint {
    /// A bar with only a close price.
    #[cfg(test)]
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: None,
            high: None,
            low: None,
            close,
            adj_close: None,
            volume: None,
        }
    }
}

/// Date-ordered price history for one symbol at one cadence.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    symbol: String,
    interval: Interval,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series from raw provider bars.
    ///
    /// * Bars are sorted by date; for duplicate dates the last bar wins.
    /// * Bars with a non-finite or non-positive close are dropped.
    /// * An empty result is [`AnalysisError::MissingData`].
    pub fn new(
        symbol: impl Into<String>,
        interval: Interval,
        mut points: Vec<PricePoint>,
    ) -> Result<Self, AnalysisError> {
        let symbol = symbol.into();
        let raw = points.len();

        points.retain(|p| p.close.is_finite() && p.close > 0.0);
        let invalid = raw - points.len();
        if invalid > 0 {
            warn!(%symbol, %interval, invalid, "dropped bars with unusable close");
        }

        // Stable sort keeps provider order within a date, so `dedup` on the
        // reversed vec retains the last occurrence.
        points.sort_by_key(|p| p.date);
        points.reverse();
        points.dedup_by_key(|p| p.date);
        points.reverse();

        if points.is_empty() {
            return Err(AnalysisError::missing(symbol, interval, "no close prices"));
        }

        debug!(
            %symbol,
            %interval,
            bars = points.len(),
            first = %points[0].date,
            last = %points[points.len() - 1].date,
            "price series ready"
        );

        Ok(Self {
            symbol,
            interval,
            points,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Close prices in date order.
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }
}
