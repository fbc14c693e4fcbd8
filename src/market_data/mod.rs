// =============================================================================
// Market Data Module
// =============================================================================
//
// Historical price input for the pipeline:
// - Price point / series types
// - Yahoo Finance chart client (online)
// - CSV files in yfinance export layout (offline)

pub mod csv_source;
pub mod series;
pub mod yahoo;

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::info;

use crate::types::Interval;

pub use series::{PricePoint, PriceSeries};
pub use yahoo::YahooClient;

/// Where the daily and weekly histories come from.
#[derive(Debug, Clone)]
pub enum PriceSource {
    Yahoo(YahooClient),
    Csv { daily: PathBuf, weekly: PathBuf },
}

impl PriceSource {
    /// Fetch bars for `symbol` at `interval` in `[start, end)`.
    pub async fn fetch(
        &self,
        symbol: &str,
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        let series = match self {
            Self::Yahoo(client) => client.fetch_history(symbol, interval, start, end).await?,
            Self::Csv { daily, weekly } => {
                let path = match interval {
                    Interval::Daily => daily,
                    Interval::Weekly => weekly,
                };
                let all = csv_source::load_prices(path, symbol, interval)?;
                let in_range = all
                    .points()
                    .iter()
                    .filter(|p| p.date >= start && p.date < end)
                    .cloned()
                    .collect();
                PriceSeries::new(symbol, interval, in_range)?
            }
        };

        info!(
            symbol,
            %interval,
            bars = series.len(),
            source = self.name(),
            "price history loaded"
        );
        Ok(series)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Yahoo(_) => "yahoo",
            Self::Csv { .. } => "csv",
        }
    }
}
