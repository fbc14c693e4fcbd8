// =============================================================================
// CSV price source — offline input in the layout yfinance exports
// =============================================================================
//
//   Date,Open,High,Low,Close,Adj Close,Volume
//   2023-01-02,540.0,548.0,538.0,546.2,546.2,1200000
//
// Header names are matched case-insensitively; only `Date` and `Close` are
// required.  A date cell may carry a time suffix ("2023-01-02 00:00:00+05:30");
// only the leading calendar date is used.
// =============================================================================

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::AnalysisError;
use crate::market_data::series::{PricePoint, PriceSeries};
use crate::types::Interval;

struct Columns {
    date: usize,
    close: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    adj_close: Option<usize>,
    volume: Option<usize>,
}

/// Load a price series from a CSV file.
pub fn load_prices(path: impl AsRef<Path>, symbol: &str, interval: Interval) -> Result<PriceSeries> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open price file {}", path.display()))?;
    read_prices(file, symbol, interval)
        .with_context(|| format!("failed to read price file {}", path.display()))
}

/// Parse a price series from any CSV reader.
pub fn read_prices<R: Read>(reader: R, symbol: &str, interval: Interval) -> Result<PriceSeries> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = rdr.headers().context("failed to read CSV header")?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
    };

    let cols = Columns {
        date: find("date")
            .ok_or_else(|| AnalysisError::missing(symbol, interval, "no 'Date' column"))?,
        close: find("close")
            .ok_or_else(|| AnalysisError::missing(symbol, interval, "no 'Close' column"))?,
        open: find("open"),
        high: find("high"),
        low: find("low"),
        adj_close: find("adj close").or_else(|| find("adj_close")),
        volume: find("volume"),
    };

    let mut points = Vec::new();
    let mut skipped = 0usize;

    for (line, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("malformed CSV record {}", line + 2))?;

        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).and_then(parse_number);

        let date_cell = record.get(cols.date).unwrap_or_default();
        let date = NaiveDate::parse_from_str(date_cell.get(..10).unwrap_or(date_cell), "%Y-%m-%d")
            .with_context(|| format!("bad date '{date_cell}' on line {}", line + 2))?;

        let Some(close) = cell(Some(cols.close)) else {
            skipped += 1;
            continue;
        };

        points.push(PricePoint {
            date,
            open: cell(cols.open),
            high: cell(cols.high),
            low: cell(cols.low),
            close,
            adj_close: cell(cols.adj_close),
            volume: cell(cols.volume),
        });
    }

    if skipped > 0 {
        warn!(symbol, %interval, skipped, "skipping rows without a close");
    }
    debug!(symbol, %interval, rows = points.len(), "CSV prices parsed");

    Ok(PriceSeries::new(symbol, interval, points)?)
}

/// Empty cells and "nan"/"null" markers are treated as missing.
fn parse_number(s: &str) -> Option<f64> {
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}
