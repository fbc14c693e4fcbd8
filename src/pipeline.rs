// =============================================================================
// Signal Pipeline — prices in, signal table out
// =============================================================================
//
//   daily prices  ──► RSI ─┐
//                          ├─► align (fill, then cutoff) ──► detect ──► report
//   weekly prices ──► RSI ─┘
//
// Pure and synchronous: fetching and writing happen in the caller.
// =============================================================================

use serde::Serialize;
use tracing::{info, warn};

use crate::alignment::align;
use crate::detector::{SignalDetector, SignalEvent, SignalRow};
use crate::error::AnalysisError;
use crate::indicators::rsi::{calculate_rsi, RsiZone};
use crate::market_data::PriceSeries;
use crate::runtime_config::AnalysisConfig;
use crate::types::Signal;

/// Everything the output sinks need from one run.
#[derive(Debug, Clone, Serialize)]
pub struct SignalReport {
    pub symbol: String,
    /// All rows on or after the cutoff, with their signal.
    pub rows: Vec<SignalRow>,
    pub buys: Vec<SignalRow>,
    pub sells: Vec<SignalRow>,
    pub events: Vec<SignalEvent>,
    pub conflicts: usize,
}

impl SignalReport {
    pub fn last_row(&self) -> Option<&SignalRow> {
        self.rows.last()
    }

    /// Log a short run summary.
    pub fn log_summary(&self, config: &AnalysisConfig) {
        let t = &config.thresholds;

        info!(
            symbol = %self.symbol,
            rows = self.rows.len(),
            buys = self.buys.len(),
            sells = self.sells.len(),
            from = %self.rows.first().map(|r| r.row.date.to_string()).unwrap_or_default(),
            to = %self.rows.last().map(|r| r.row.date.to_string()).unwrap_or_default(),
            "signal scan finished"
        );

        if let Some(last) = self.last_row() {
            let zone = RsiZone::classify(last.row.daily_rsi, t.oversold, t.overbought);
            info!(
                date = %last.row.date,
                close = last.row.price.close,
                daily_rsi = format!("{:.2}", last.row.daily_rsi),
                weekly_rsi = %last
                    .row
                    .weekly_rsi
                    .map(|w| format!("{w:.2}"))
                    .unwrap_or_else(|| "n/a".into()),
                %zone,
                "latest reading"
            );
        }

        for event in &self.events {
            info!(
                date = %event.date,
                signal = %event.signal,
                daily_rsi = format!("{:.2}", event.daily_rsi),
                "signal"
            );
        }
    }
}

/// Run the full computation for one symbol.
pub fn run(
    config: &AnalysisConfig,
    daily: &PriceSeries,
    weekly: &PriceSeries,
) -> Result<SignalReport, AnalysisError> {
    config.validate()?;

    let daily_rsi = calculate_rsi(&daily.closes(), config.rsi_window);
    let weekly_rsi = calculate_rsi(&weekly.closes(), config.rsi_window);

    if daily.len() <= config.rsi_window {
        warn!(
            bars = daily.len(),
            window = config.rsi_window,
            "daily history shorter than the RSI window; early values are warm-up"
        );
    }

    let aligned = align(
        daily.points(),
        &daily_rsi,
        weekly.points(),
        &weekly_rsi,
        config.cutoff_date,
    )?;

    if aligned.is_empty() {
        return Err(AnalysisError::EmptyWindow {
            cutoff: config.cutoff_date,
        });
    }

    let scan = SignalDetector::new(config.thresholds).scan(&aligned);

    let pick = |wanted: Signal| -> Vec<SignalRow> {
        scan.rows
            .iter()
            .filter(|r| r.signal == wanted)
            .cloned()
            .collect()
    };
    let buys = pick(Signal::Buy);
    let sells = pick(Signal::Sell);

    Ok(SignalReport {
        symbol: config.symbol.clone(),
        buys,
        sells,
        events: scan.events,
        conflicts: scan.conflicts,
        rows: scan.rows,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::PricePoint;
    use crate::types::Interval;
    use chrono::{Days, NaiveDate};

    fn day0() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
    }

    fn series(interval: Interval, step_days: u64, closes: &[f64]) -> PriceSeries {
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::from_close(day0() + Days::new(i as u64 * step_days), c))
            .collect();
        PriceSeries::new("TEST", interval, points).unwrap()
    }

    /// 30 rising days, 10 sharp down days, 10 sharp up days.
    fn swing_daily() -> PriceSeries {
        let mut closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        for _ in 0..10 {
            let last = *closes.last().unwrap();
            closes.push(last - 3.0);
        }
        for _ in 0..10 {
            let last = *closes.last().unwrap();
            closes.push(last + 3.0);
        }
        series(Interval::Daily, 1, &closes)
    }

    /// Steadily rising weekly bars on the same calendar as `swing_daily`.
    fn rising_weekly() -> PriceSeries {
        let closes: Vec<f64> = (0..8).map(|k| 100.0 + 10.0 * k as f64).collect();
        series(Interval::Weekly, 7, &closes)
    }

    fn config(cutoff: NaiveDate) -> AnalysisConfig {
        AnalysisConfig {
            symbol: "TEST".into(),
            start_date: day0(),
            cutoff_date: cutoff,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn swing_produces_sell_then_buy() {
        let report = run(&config(day0()), &swing_daily(), &rising_weekly()).unwrap();
        assert_eq!(report.rows.len(), 50);
        assert_eq!(report.sells.len(), 1);
        assert_eq!(report.buys.len(), 1);
        assert_eq!(report.events.len(), 2);
        assert_eq!(report.conflicts, 0);

        // SELL on the second down day, BUY on the second up day.
        assert_eq!(report.sells[0].row.date, day0() + Days::new(31));
        assert_eq!(report.buys[0].row.date, day0() + Days::new(41));
        assert!(report.sells[0].row.daily_rsi < 75.0);
        assert!(report.buys[0].row.daily_rsi > 35.0);
    }

    #[test]
    fn first_weekly_bar_is_not_bullish() {
        // The first weekly RSI is neutral 50, so nothing arms during week one.
        let report = run(&config(day0()), &swing_daily(), &rising_weekly()).unwrap();
        for r in &report.rows[..7] {
            assert_eq!(r.row.weekly_rsi, Some(50.0));
        }
        assert_eq!(report.rows[7].row.weekly_rsi, Some(100.0));
    }

    #[test]
    fn cutoff_keeps_fill_and_rearms_from_window_start() {
        // Cutoff inside the sell-off: the SELL is outside the window, the
        // first row is already oversold so the recovery latch starts armed.
        let cutoff = day0() + Days::new(38);
        let report = run(&config(cutoff), &swing_daily(), &rising_weekly()).unwrap();
        assert_eq!(report.rows.len(), 12);
        assert_eq!(report.rows[0].row.date, cutoff);
        assert_eq!(report.rows[0].row.weekly_rsi, Some(100.0));
        assert!(report.sells.is_empty());
        assert_eq!(report.buys.len(), 1);
        assert_eq!(report.buys[0].row.date, day0() + Days::new(41));
    }

    #[test]
    fn full_table_and_subsets_agree() {
        let report = run(&config(day0()), &swing_daily(), &rising_weekly()).unwrap();
        let tagged = report.rows.iter().filter(|r| r.signal != Signal::None).count();
        assert_eq!(tagged, report.buys.len() + report.sells.len());
        assert!(report.buys.iter().all(|r| r.signal == Signal::Buy));
        assert!(report.sells.iter().all(|r| r.signal == Signal::Sell));
    }

    #[test]
    fn bearish_weekly_gives_no_signals() {
        let falling: Vec<f64> = (0..8).map(|k| 200.0 - 10.0 * k as f64).collect();
        let weekly = series(Interval::Weekly, 7, &falling);
        let report = run(&config(day0()), &swing_daily(), &weekly).unwrap();
        assert!(report.events.is_empty());
        assert!(report.buys.is_empty() && report.sells.is_empty());
    }

    #[test]
    fn cutoff_past_data_is_empty_window() {
        let cutoff = day0() + Days::new(400);
        let err = run(&config(cutoff), &swing_daily(), &rising_weekly()).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyWindow { .. }));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = config(day0());
        cfg.rsi_window = 0;
        let err = run(&cfg, &swing_daily(), &rising_weekly()).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[test]
    fn rerun_is_identical() {
        let cfg = config(day0());
        let a = run(&cfg, &swing_daily(), &rising_weekly()).unwrap();
        let b = run(&cfg, &swing_daily(), &rising_weekly()).unwrap();
        assert_eq!(a.rows, b.rows);
        assert_eq!(a.events, b.events);
    }
}
