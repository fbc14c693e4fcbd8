// =============================================================================
// Series Alignment — weekly RSI onto the daily timeline
// =============================================================================
//
// 1. Left-join every daily bar against the weekly bars by exact date.
// 2. Forward-fill the weekly RSI in date order.  Days before the first matched
//    weekly bar stay `None`.
// 3. Drop rows before the analysis cutoff.
//
// Step 3 must come after step 2: a weekly value dated before the cutoff still
// carries into the first days of the window.
//
// Bar dates are taken as the provider stamps them.  Yahoo dates a weekly bar
// on the week's first session while its close is the week's last close, so
// Monday..Thursday rows see a weekly RSI that already includes Friday's
// close.  Callers needing strict point-in-time values must re-date weekly
// bars to the week's last session before aligning.
// =============================================================================

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AnalysisError;
use crate::market_data::PricePoint;
use crate::types::Interval;

/// One daily bar with both oscillators attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedRow {
    pub date: NaiveDate,
    pub price: PricePoint,
    pub daily_rsi: f64,
    /// Most recently known weekly RSI as of `date`.
    pub weekly_rsi: Option<f64>,
}

/// Merge the weekly RSI onto the daily bars and apply the cutoff.
///
/// `daily` / `daily_rsi` (and `weekly` / `weekly_rsi`) must be index-aligned
/// and date-ordered.
pub fn align(
    daily: &[PricePoint],
    daily_rsi: &[f64],
    weekly: &[PricePoint],
    weekly_rsi: &[f64],
    cutoff: NaiveDate,
) -> Result<Vec<AlignedRow>, AnalysisError> {
    check_lengths(Interval::Daily, daily.len(), daily_rsi.len())?;
    check_lengths(Interval::Weekly, weekly.len(), weekly_rsi.len())?;

    let by_date: HashMap<NaiveDate, f64> = weekly
        .iter()
        .zip(weekly_rsi)
        .map(|(p, &rsi)| (p.date, rsi))
        .collect();

    let joined: Vec<Option<f64>> = daily.iter().map(|p| by_date.get(&p.date).copied()).collect();
    let matched = joined.iter().filter(|v| v.is_some()).count();
    let filled = forward_fill(&joined);

    let rows: Vec<AlignedRow> = daily
        .iter()
        .zip(daily_rsi)
        .zip(filled)
        .filter(|((p, _), _)| p.date >= cutoff)
        .map(|((p, &rsi), weekly_rsi)| AlignedRow {
            date: p.date,
            price: p.clone(),
            daily_rsi: rsi,
            weekly_rsi,
        })
        .collect();

    debug!(
        daily = daily.len(),
        weekly = weekly.len(),
        matched,
        kept = rows.len(),
        %cutoff,
        "series aligned"
    );

    Ok(rows)
}

/// Replace each `None` with the last preceding `Some` value.
pub fn forward_fill(values: &[Option<f64>]) -> Vec<Option<f64>> {
    values
        .iter()
        .scan(None, |last, &v| {
            if v.is_some() {
                *last = v;
            }
            Some(*last)
        })
        .collect()
}

fn check_lengths(series: Interval, prices: usize, rsi: usize) -> Result<(), AnalysisError> {
    if prices != rsi {
        return Err(AnalysisError::LengthMismatch {
            series,
            prices,
            rsi,
        });
    }
    Ok(())
}
