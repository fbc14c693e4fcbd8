// =============================================================================
// Yahoo Finance chart client — public historical bars
// =============================================================================
//
// Wraps GET /v8/finance/chart/{symbol}.  The endpoint is unauthenticated and
// returns column arrays (timestamp, open, high, low, close, volume, adjclose)
// rather than one object per bar.  Bar timestamps are the session open in UTC;
// adding `meta.gmtoffset` before truncating gives the exchange-local calendar
// date that daily and weekly bars are keyed by.  Weekly bars keep Yahoo's
// stamp (the week's first session) even though they close on its last.
// =============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::error::AnalysisError;
use crate::market_data::series::{PricePoint, PriceSeries};
use crate::types::Interval;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    close: Option<Vec<Option<f64>>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Yahoo Finance chart API client.
#[derive(Debug, Clone)]
pub struct YahooClient {
    base_url: String,
    client: reqwest::Client,
}

impl YahooClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Client against a different host (proxies, mirrors).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            // The endpoint rejects requests without a browser-like agent.
            .user_agent("Mozilla/5.0")
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;

        let base_url = base_url.into();
        debug!(%base_url, "YahooClient initialised");

        Ok(Self { base_url, client })
    }

    /// Download bars for `symbol` between `start` (inclusive) and `end`
    /// (exclusive).
    #[instrument(skip(self), name = "yahoo::fetch_history")]
    pub async fn fetch_history(
        &self,
        symbol: &str,
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        let url = format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval={}&events=history&includeAdjustedClose=true",
            self.base_url,
            symbol,
            unix_midnight(start),
            unix_midnight(end),
            interval.as_query()
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET chart for {symbol} ({interval}) failed"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .with_context(|| format!("failed to read chart response ({status})"))?;

        let points = parse_chart_response(symbol, interval, status, &text)?;
        debug!(symbol, %interval, count = points.len(), "bars fetched");

        Ok(PriceSeries::new(symbol, interval, points)?)
    }
}

/// Decode a raw chart response, keeping the HTTP status in every error.
///
/// Yahoo reports unknown symbols as 404 with a `chart.error` payload; that
/// case goes through [`parse_chart`] and becomes `MissingData`.  Any other
/// non-success status, or a body that is not JSON, is a transport error.
pub fn parse_chart_response(
    symbol: &str,
    interval: Interval,
    status: reqwest::StatusCode,
    text: &str,
) -> Result<Vec<PricePoint>> {
    let body: serde_json::Value = match serde_json::from_str(text) {
        Ok(body) => body,
        Err(e) if status.is_success() => {
            return Err(e).context(format!("failed to parse chart response ({status})"))
        }
        Err(_) => anyhow::bail!("Yahoo chart for {} returned {}: {}", symbol, status, text.trim()),
    };

    if !status.is_success() && body.pointer("/chart/error").map_or(true, |e| e.is_null()) {
        anyhow::bail!("Yahoo chart for {} returned {}: {}", symbol, status, body);
    }

    parse_chart(symbol, interval, body)
}

/// Turn a chart response body into price points.
///
/// Bars whose close is null are skipped.  An error payload, or a payload with
/// no timestamps or no close column, is [`AnalysisError::MissingData`].
pub fn parse_chart(
    symbol: &str,
    interval: Interval,
    body: serde_json::Value,
) -> Result<Vec<PricePoint>> {
    let response: ChartResponse =
        serde_json::from_value(body).context("unexpected chart response shape")?;

    if let Some(err) = response.chart.error {
        return Err(AnalysisError::missing(
            symbol,
            interval,
            format!("{}: {}", err.code, err.description),
        )
        .into());
    }

    let data = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| AnalysisError::missing(symbol, interval, "empty chart result"))?;

    let timestamps = data
        .timestamp
        .ok_or_else(|| AnalysisError::missing(symbol, interval, "no timestamps"))?;

    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
    let closes = quote
        .close
        .ok_or_else(|| AnalysisError::missing(symbol, interval, "no 'close' column"))?;
    let adj = data
        .indicators
        .adjclose
        .and_then(|a| a.into_iter().next())
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let at = |col: &[Option<f64>], i: usize| col.get(i).copied().flatten();

    let mut points = Vec::with_capacity(timestamps.len());
    let mut skipped = 0usize;

    for (i, &ts) in timestamps.iter().enumerate() {
        let Some(close) = at(&closes, i) else {
            skipped += 1;
            continue;
        };
        let Some(date) = DateTime::from_timestamp(ts + data.meta.gmtoffset, 0)
            .map(|dt| dt.date_naive())
        else {
            skipped += 1;
            continue;
        };

        points.push(PricePoint {
            date,
            open: at(&quote.open, i),
            high: at(&quote.high, i),
            low: at(&quote.low, i),
            close,
            adj_close: at(&adj, i),
            volume: at(&quote.volume, i),
        });
    }

    if skipped > 0 {
        warn!(symbol, %interval, skipped, "skipping bars without a close");
    }

    Ok(points)
}

fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_body() -> serde_json::Value {
        // 2023-01-02 03:45 UTC and 2023-01-03 03:45 UTC, exchange at +05:30.
        json!({
            "chart": {
                "result": [{
                    "meta": { "symbol": "PAYTM.NS", "gmtoffset": 19800 },
                    "timestamp": [1672631100, 1672717500, 1672803900],
                    "indicators": {
                        "quote": [{
                            "open":   [540.0, 545.5, null],
                            "high":   [548.0, 550.0, null],
                            "low":    [538.0, 541.0, null],
                            "close":  [546.2, 543.9, null],
                            "volume": [1200000, 980000, null]
                        }],
                        "adjclose": [{ "adjclose": [546.2, 543.9, null] }]
                    }
                }],
                "error": null
            }
        })
    }

    #[test]
    fn parses_columns_and_skips_null_close() {
        let pts = parse_chart("PAYTM.NS", Interval::Daily, sample_body()).unwrap();
        assert_eq!(pts.len(), 2);
        assert_eq!(pts[0].date, NaiveDate::from_ymd_opt(2023, 1, 2).unwrap());
        assert_eq!(pts[1].date, NaiveDate::from_ymd_opt(2023, 1, 3).unwrap());
        assert!((pts[0].close - 546.2).abs() < 1e-10);
        assert_eq!(pts[0].open, Some(540.0));
        assert_eq!(pts[1].volume, Some(980000.0));
        assert_eq!(pts[1].adj_close, Some(543.9));
    }

    #[test]
    fn gmt_offset_moves_late_utc_bar_to_next_day() {
        // 2023-01-01 20:00 UTC is 2023-01-02 in a +09:00 market.
        let body = json!({
            "chart": {
                "result": [{
                    "meta": { "gmtoffset": 32400 },
                    "timestamp": [1672603200],
                    "indicators": { "quote": [{ "close": [10.0] }] }
                }],
                "error": null
            }
        });
        let pts = parse_chart("7203.T", Interval::Weekly, body).unwrap();
        assert_eq!(pts[0].date, NaiveDate::from_ymd_opt(2023, 1, 2).unwrap());
        assert_eq!(pts[0].open, None);
    }

    #[test]
    fn error_payload_is_missing_data() {
        let body = json!({
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        });
        let err = parse_chart("NOPE", Interval::Daily, body).unwrap_err();
        let domain = err.downcast_ref::<AnalysisError>().unwrap();
        assert!(matches!(domain, AnalysisError::MissingData { .. }));
        assert!(err.to_string().contains("delisted"));
    }

    #[test]
    fn missing_close_column_is_missing_data() {
        let body = json!({
            "chart": {
                "result": [{
                    "timestamp": [1672631100],
                    "indicators": { "quote": [{ "open": [1.0] }] }
                }],
                "error": null
            }
        });
        let err = parse_chart("X", Interval::Daily, body).unwrap_err();
        assert!(err.to_string().contains("close"));
        assert!(err.downcast_ref::<AnalysisError>().is_some());
    }

    #[test]
    fn plain_text_error_keeps_http_status() {
        let err = parse_chart_response(
            "PAYTM.NS",
            Interval::Daily,
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            "Too Many Requests\n",
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("429"), "{msg}");
        assert!(msg.contains("Too Many Requests"));
    }

    #[test]
    fn not_found_with_error_payload_is_missing_data() {
        let text = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        let err = parse_chart_response("NOPE", Interval::Weekly, reqwest::StatusCode::NOT_FOUND, text)
            .unwrap_err();
        assert!(err.downcast_ref::<AnalysisError>().is_some());
    }

    #[test]
    fn success_with_chart_body_parses() {
        let text = sample_body().to_string();
        let pts = parse_chart_response("PAYTM.NS", Interval::Daily, reqwest::StatusCode::OK, &text)
            .unwrap();
        assert_eq!(pts.len(), 2);
    }

    #[test]
    fn unix_midnight_is_utc() {
        let d = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        assert_eq!(unix_midnight(d), 1640995200);
    }
}
