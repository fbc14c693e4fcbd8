// =============================================================================
// Relative Strength Index (RSI) — exponentially smoothed
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Compute price changes from consecutive closes.  The first close has
//          no predecessor; its change counts as 0.
// Step 2 — Split into gains (change clamped >= 0) and losses (negated change
//          clamped >= 0).
// Step 3 — Smooth both with `ewm_mean` (centre-of-mass = window - 1, no bias
//          adjustment).
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Unlike a seeded Wilder RSI this produces one value per close, so the daily
// and weekly series can be joined back onto their bars by index.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::indicators::ema::ewm_mean;

/// Default look-back window.
pub const DEFAULT_RSI_WINDOW: usize = 14;

/// Compute the full RSI series for the given `closes` and `window`.
///
/// One output value per input close.
///
/// # Edge cases
/// - `window == 0` or empty input => empty vec
/// - Average loss of zero saturates RSI at 100.0; zero gain *and* zero loss
///   (flat market, and always the first bar) is neutral 50.0.
/// - Non-finite closes truncate the series at that point.
pub fn calculate_rsi(closes: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || closes.is_empty() {
        return Vec::new();
    }

    // --- Gains / losses --------------------------------------------------------
    let mut gains = Vec::with_capacity(closes.len());
    let mut losses = Vec::with_capacity(closes.len());
    gains.push(0.0);
    losses.push(0.0);
    for w in closes.windows(2) {
        let change = w[1] - w[0];
        // `f64::max` swallows NaN; keep it so the smoothing truncates.
        if change.is_finite() {
            gains.push(change.max(0.0));
            losses.push((-change).max(0.0));
        } else {
            gains.push(f64::NAN);
            losses.push(f64::NAN);
        }
    }

    // --- Smoothing -------------------------------------------------------------
    let avg_gain = ewm_mean(&gains, window);
    let avg_loss = ewm_mean(&losses, window);

    avg_gain
        .iter()
        .zip(avg_loss.iter())
        .map_while(|(&g, &l)| rsi_from_averages(g, l))
        .collect()
}

/// Where an RSI value sits relative to the oversold / overbought bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiZone {
    Oversold,
    Neutral,
    Overbought,
}

impl RsiZone {
    pub fn classify(value: f64, oversold: f64, overbought: f64) -> Self {
        if value < oversold {
            Self::Oversold
        } else if value > overbought {
            Self::Overbought
        } else {
            Self::Neutral
        }
    }
}

impl std::fmt::Display for RsiZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Oversold => write!(f, "OVERSOLD"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Overbought => write!(f, "OVERBOUGHT"),
        }
    }
}

/// Return the most recent RSI value together with its zone.
///
/// Returns `None` when the series is empty.
pub fn current_rsi(
    closes: &[f64],
    window: usize,
    oversold: f64,
    overbought: f64,
) -> Option<(f64, RsiZone)> {
    let series = calculate_rsi(closes, window);
    let value = *series.last()?;
    Some((value, RsiZone::classify(value, oversold, overbought)))
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// - Both averages zero => 50.0 (no movement).
/// - Average loss zero  => 100.0 (only gains).
/// - Returns `None` when the result is non-finite.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    if rsi.is_finite() {
        Some(rsi)
    } else {
        None
    }
}
