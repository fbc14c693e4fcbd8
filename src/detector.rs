// =============================================================================
// Dual-Timeframe RSI Crossover Detector
// =============================================================================
//
// Two independent two-state latches scan the aligned rows in date order:
//
//   Recovery (BUY)   WAITING -> ARMED    daily < oversold   AND weekly > bullish
//                    ARMED   -> WAITING  daily > oversold   AND weekly > bullish  => BUY
//
//   Reversal (SELL)  WAITING -> ARMED    daily > overbought AND weekly > bullish
//                    ARMED   -> WAITING  daily < overbought AND weekly > bullish  => SELL
//
// A latch whose first row already meets its arming rule starts ARMED.  While
// the weekly RSI is at or below the bullish line (or unknown) neither latch
// moves.  Within a row a latch evaluates its arming rule before its firing
// rule.
//
// Latches are plain values threaded through one fold; each step returns the
// next latch plus an optional emission.  The per-latch event lists are then
// merged into the signal column under an explicit `ConflictPolicy`.
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::alignment::AlignedRow;
use crate::runtime_config::SignalThresholds;
use crate::types::{ConflictPolicy, Signal};

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatchSide {
    /// Oversold dip followed by recovery; emits BUY.
    Recovery,
    /// Overbought spike followed by reversal; emits SELL.
    Reversal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatchState {
    Waiting,
    Armed,
}

/// One side of the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Latch {
    side: LatchSide,
    threshold: f64,
    weekly_bullish: f64,
    state: LatchState,
}

/// One latch emission, before the merge into the signal column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub index: usize,
    pub date: NaiveDate,
    pub signal: Signal,
    pub daily_rsi: f64,
    pub weekly_rsi: Option<f64>,
}

/// Aligned row plus its resolved signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRow {
    #[serde(flatten)]
    pub row: AlignedRow,
    pub signal: Signal,
}

/// Result of one scan.
#[derive(Debug, Clone)]
pub struct ScanOutput {
    pub rows: Vec<SignalRow>,
    /// Every latch emission in row order (BUY before SELL within a row).
    pub events: Vec<SignalEvent>,
    /// Rows on which both latches fired.
    pub conflicts: usize,
}

// =============================================================================
// Latch
// =============================================================================

impl Latch {
    pub fn recovery(thresholds: &SignalThresholds) -> Self {
        Self {
            side: LatchSide::Recovery,
            threshold: thresholds.oversold,
            weekly_bullish: thresholds.weekly_bullish,
            state: LatchState::Waiting,
        }
    }

    pub fn reversal(thresholds: &SignalThresholds) -> Self {
        Self {
            side: LatchSide::Reversal,
            threshold: thresholds.overbought,
            weekly_bullish: thresholds.weekly_bullish,
            state: LatchState::Waiting,
        }
    }

    /// Initial state: ARMED when `first` already meets the arming rule.
    pub fn primed_by(mut self, first: Option<&AlignedRow>) -> Self {
        if first.is_some_and(|row| self.arms(row)) {
            self.state = LatchState::Armed;
        }
        self
    }

    pub fn side(&self) -> LatchSide {
        self.side
    }

    pub fn state(&self) -> LatchState {
        self.state
    }

    pub fn signal(&self) -> Signal {
        match self.side {
            LatchSide::Recovery => Signal::Buy,
            LatchSide::Reversal => Signal::Sell,
        }
    }

    /// Advance over one row.
    pub fn step(mut self, row: &AlignedRow) -> (Self, Option<Signal>) {
        if self.state == LatchState::Waiting && self.arms(row) {
            self.state = LatchState::Armed;
        }

        if self.state == LatchState::Armed && self.fires(row) {
            self.state = LatchState::Waiting;
            return (self, Some(self.signal()));
        }

        (self, None)
    }

    fn weekly_confirms(&self, row: &AlignedRow) -> bool {
        row.weekly_rsi.is_some_and(|w| w > self.weekly_bullish)
    }

    fn arms(&self, row: &AlignedRow) -> bool {
        let beyond = match self.side {
            LatchSide::Recovery => row.daily_rsi < self.threshold,
            LatchSide::Reversal => row.daily_rsi > self.threshold,
        };
        beyond && self.weekly_confirms(row)
    }

    fn fires(&self, row: &AlignedRow) -> bool {
        let back = match self.side {
            LatchSide::Recovery => row.daily_rsi > self.threshold,
            LatchSide::Reversal => row.daily_rsi < self.threshold,
        };
        back && self.weekly_confirms(row)
    }
}

// =============================================================================
// SignalDetector
// =============================================================================

/// Stateless scanner; latches are created fresh for every scan.
#[derive(Debug, Clone)]
pub struct SignalDetector {
    thresholds: SignalThresholds,
}

impl SignalDetector {
    pub fn new(thresholds: SignalThresholds) -> Self {
        Self { thresholds }
    }

    /// Scan `rows` (ascending date order) and attach a signal to each.
    pub fn scan(&self, rows: &[AlignedRow]) -> ScanOutput {
        let recovery = Latch::recovery(&self.thresholds).primed_by(rows.first());
        let reversal = Latch::reversal(&self.thresholds).primed_by(rows.first());

        for latch in [&recovery, &reversal] {
            debug!(side = ?latch.side(), state = ?latch.state(), "latch primed");
        }

        let (recovery, reversal, buys, sells) = rows.iter().enumerate().fold(
            (recovery, reversal, Vec::new(), Vec::new()),
            |(rec, rev, mut buys, mut sells), (index, row)| {
                let (rec, buy) = rec.step(row);
                let (rev, sell) = rev.step(row);
                if let Some(signal) = buy {
                    buys.push(SignalEvent::at(index, row, signal));
                }
                if let Some(signal) = sell {
                    sells.push(SignalEvent::at(index, row, signal));
                }
                (rec, rev, buys, sells)
            },
        );

        let (column, conflicts) = merge_events(
            rows.len(),
            &buys,
            &sells,
            self.thresholds.conflict_policy,
        );

        let rows_out = rows
            .iter()
            .cloned()
            .zip(column)
            .map(|(row, signal)| SignalRow { row, signal })
            .collect();

        let mut events = buys;
        events.extend(sells);
        // Stable: BUY stays ahead of SELL on the same row.
        events.sort_by_key(|e| e.index);

        debug!(
            rows = rows.len(),
            buys = events.iter().filter(|e| e.signal == Signal::Buy).count(),
            sells = events.iter().filter(|e| e.signal == Signal::Sell).count(),
            conflicts,
            recovery_end = ?recovery.state(),
            reversal_end = ?reversal.state(),
            "scan complete"
        );

        ScanOutput {
            rows: rows_out,
            events,
            conflicts,
        }
    }
}

impl SignalEvent {
    fn at(index: usize, row: &AlignedRow, signal: Signal) -> Self {
        Self {
            index,
            date: row.date,
            signal,
            daily_rsi: row.daily_rsi,
            weekly_rsi: row.weekly_rsi,
        }
    }
}

/// Build a signal column of length `len` from the two event lists.
///
/// Events are written lowest-precedence first so the preferred signal
/// overwrites on a shared row.  Returns the column and the number of shared
/// rows.
pub fn merge_events(
    len: usize,
    buys: &[SignalEvent],
    sells: &[SignalEvent],
    policy: ConflictPolicy,
) -> (Vec<Signal>, usize) {
    let (first, second) = match policy {
        ConflictPolicy::PreferSell => (buys, sells),
        ConflictPolicy::PreferBuy => (sells, buys),
    };

    let mut column = vec![Signal::None; len];
    let mut conflicts = 0;

    for event in first {
        if let Some(slot) = column.get_mut(event.index) {
            *slot = event.signal;
        }
    }
    for event in second {
        if let Some(slot) = column.get_mut(event.index) {
            if *slot != Signal::None {
                conflicts += 1;
                warn!(
                    date = %event.date,
                    kept = %event.signal,
                    dropped = %slot,
                    %policy,
                    "BUY and SELL on the same row"
                );
            }
            *slot = event.signal;
        }
    }

    (column, conflicts)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::PricePoint;

    fn rows(daily: &[f64], weekly: &[Option<f64>]) -> Vec<AlignedRow> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        daily
            .iter()
            .zip(weekly)
            .enumerate()
            .map(|(i, (&d, &w))| {
                let date = start + chrono::Days::new(i as u64);
                AlignedRow {
                    date,
                    price: PricePoint::from_close(date, 100.0),
                    daily_rsi: d,
                    weekly_rsi: w,
                }
            })
            .collect()
    }

    fn constant_weekly(daily: &[f64], weekly: f64) -> Vec<AlignedRow> {
        rows(daily, &vec![Some(weekly); daily.len()])
    }

    fn signals(out: &ScanOutput) -> Vec<Signal> {
        out.rows.iter().map(|r| r.signal).collect()
    }

    fn detector() -> SignalDetector {
        SignalDetector::new(SignalThresholds::default())
    }

    use Signal::{Buy, None as No, Sell};

    // ---- end-to-end scenario -----------------------------------------------

    #[test]
    fn recovery_then_reversal_scenario() {
        let input = constant_weekly(&[40.0, 30.0, 25.0, 36.0, 80.0, 70.0], 60.0);
        let out = detector().scan(&input);
        assert_eq!(signals(&out), vec![No, No, No, Buy, No, Sell]);
        assert_eq!(out.events.len(), 2);
        assert_eq!(out.events[0].index, 3);
        assert_eq!(out.events[0].signal, Buy);
        assert_eq!(out.events[1].index, 5);
        assert_eq!(out.events[1].signal, Sell);
        assert_eq!(out.conflicts, 0);
    }

    #[test]
    fn scan_is_idempotent() {
        let input = constant_weekly(&[40.0, 30.0, 25.0, 36.0, 80.0, 70.0, 20.0, 90.0], 60.0);
        let d = detector();
        let a = d.scan(&input);
        let b = d.scan(&input);
        assert_eq!(a.rows, b.rows);
        assert_eq!(a.events, b.events);
    }

    #[test]
    fn bearish_weekly_blocks_everything() {
        let input = constant_weekly(&[80.0, 20.0, 90.0, 10.0, 50.0, 95.0, 30.0], 50.0);
        let out = detector().scan(&input);
        assert!(out.rows.iter().all(|r| r.signal == No));
        assert!(out.events.is_empty());
    }

    #[test]
    fn missing_weekly_blocks_transitions() {
        let input = rows(&[20.0, 40.0, 80.0, 60.0], &[None, None, None, None]);
        let out = detector().scan(&input);
        assert!(out.events.is_empty());
    }

    // ---- latch mechanics ---------------------------------------------------

    #[test]
    fn first_row_primes_recovery() {
        let t = SignalThresholds::default();
        let input = constant_weekly(&[20.0], 60.0);
        assert_eq!(Latch::recovery(&t).primed_by(input.first()).state(), LatchState::Armed);
        assert_eq!(Latch::reversal(&t).primed_by(input.first()).state(), LatchState::Waiting);
        assert_eq!(Latch::recovery(&t).primed_by(None).state(), LatchState::Waiting);
    }

    #[test]
    fn first_row_primes_reversal() {
        let t = SignalThresholds::default();
        let input = constant_weekly(&[80.0], 60.0);
        assert_eq!(Latch::reversal(&t).primed_by(input.first()).state(), LatchState::Armed);
    }

    #[test]
    fn armed_from_first_row_fires_on_second() {
        let out = detector().scan(&constant_weekly(&[30.0, 40.0], 55.0));
        assert_eq!(signals(&out), vec![No, Buy]);
    }

    #[test]
    fn thresholds_are_strict() {
        // Touching 35 neither arms nor fires; touching 75 likewise.
        let out = detector().scan(&constant_weekly(&[35.0, 36.0, 75.0, 74.0], 60.0));
        assert!(out.events.is_empty());

        let out = detector().scan(&constant_weekly(&[34.0, 35.0, 35.5], 60.0));
        assert_eq!(signals(&out), vec![No, No, Buy]);
    }

    #[test]
    fn weekly_at_bullish_line_does_not_count() {
        let input = rows(
            &[30.0, 40.0, 40.0],
            &[Some(60.0), Some(50.0), Some(50.1)],
        );
        let out = detector().scan(&input);
        // Armed on row 0, frozen on row 1, fires on row 2.
        assert_eq!(signals(&out), vec![No, No, Buy]);
    }

    #[test]
    fn latch_stays_armed_through_bearish_weeks() {
        let input = rows(
            &[90.0, 60.0, 50.0, 70.0],
            &[Some(55.0), Some(45.0), Some(49.0), Some(52.0)],
        );
        let out = detector().scan(&input);
        assert_eq!(signals(&out), vec![No, No, No, Sell]);
    }

    #[test]
    fn latch_rearms_after_firing() {
        let out = detector().scan(&constant_weekly(&[30.0, 40.0, 30.0, 40.0], 60.0));
        assert_eq!(signals(&out), vec![No, Buy, No, Buy]);
    }

    #[test]
    fn repeated_dips_emit_once() {
        let out = detector().scan(&constant_weekly(&[30.0, 20.0, 30.0, 10.0, 50.0, 60.0], 60.0));
        assert_eq!(signals(&out), vec![No, No, No, No, Buy, No]);
    }

    #[test]
    fn crash_from_overbought_sells_and_arms_recovery() {
        // 90 arms reversal (and would fire an armed recovery); 20 fires SELL
        // and arms recovery on the same row.
        let out = detector().scan(&constant_weekly(&[50.0, 90.0, 20.0, 40.0], 60.0));
        assert_eq!(signals(&out), vec![No, No, Sell, Buy]);
    }

    #[test]
    fn custom_thresholds() {
        let t = SignalThresholds {
            oversold: 30.0,
            overbought: 70.0,
            weekly_bullish: 40.0,
            conflict_policy: ConflictPolicy::PreferSell,
        };
        let out = SignalDetector::new(t).scan(&constant_weekly(&[32.0, 29.0, 31.0, 72.0, 69.0], 45.0));
        assert_eq!(signals(&out), vec![No, No, Buy, No, Sell]);
    }

    #[test]
    fn empty_input() {
        let out = detector().scan(&[]);
        assert!(out.rows.is_empty());
        assert!(out.events.is_empty());
    }

    #[test]
    fn step_returns_emission() {
        let t = SignalThresholds::default();
        let input = constant_weekly(&[20.0, 40.0], 60.0);
        let latch = Latch::recovery(&t);
        let (latch, first) = latch.step(&input[0]);
        assert_eq!(first, None);
        assert_eq!(latch.state(), LatchState::Armed);
        let (latch, second) = latch.step(&input[1]);
        assert_eq!(second, Some(Buy));
        assert_eq!(latch.state(), LatchState::Waiting);
        assert_eq!(latch.side(), LatchSide::Recovery);
    }

    // ---- merge precedence --------------------------------------------------

    fn event(index: usize, signal: Signal) -> SignalEvent {
        SignalEvent {
            index,
            date: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + chrono::Days::new(index as u64),
            signal,
            daily_rsi: 50.0,
            weekly_rsi: Some(60.0),
        }
    }

    #[test]
    fn merge_prefer_sell_overwrites_buy() {
        let buys = [event(1, Buy), event(3, Buy)];
        let sells = [event(3, Sell), event(4, Sell)];
        let (column, conflicts) = merge_events(5, &buys, &sells, ConflictPolicy::PreferSell);
        assert_eq!(column, vec![No, Buy, No, Sell, Sell]);
        assert_eq!(conflicts, 1);
    }

    #[test]
    fn merge_prefer_buy_keeps_buy() {
        let buys = [event(1, Buy), event(3, Buy)];
        let sells = [event(3, Sell), event(4, Sell)];
        let (column, conflicts) = merge_events(5, &buys, &sells, ConflictPolicy::PreferBuy);
        assert_eq!(column, vec![No, Buy, No, Buy, Sell]);
        assert_eq!(conflicts, 1);
    }

    #[test]
    fn merge_ignores_out_of_range_events() {
        let (column, conflicts) = merge_events(2, &[event(5, Buy)], &[], ConflictPolicy::PreferSell);
        assert_eq!(column, vec![No, No]);
        assert_eq!(conflicts, 0);
    }
}
