// =============================================================================
// Analysis Configuration — JSON settings with atomic save
// =============================================================================
//
// Every tunable parameter of a run lives here: instrument, date range,
// analysis cutoff, RSI window, latch thresholds and output options.
//
// All fields carry `#[serde(default)]` so that a partial (or empty) JSON file
// loads cleanly.  Persistence uses an atomic tmp + rename pattern.
//
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AnalysisError;
use crate::indicators::rsi::DEFAULT_RSI_WINDOW;
use crate::types::ConflictPolicy;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_symbol() -> String {
    "PAYTM.NS".to_string()
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or_default()
}

fn default_cutoff_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default()
}

fn default_rsi_window() -> usize {
    DEFAULT_RSI_WINDOW
}

fn default_oversold() -> f64 {
    35.0
}

fn default_overbought() -> f64 {
    75.0
}

fn default_weekly_bullish() -> f64 {
    50.0
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

// =============================================================================
// SignalThresholds
// =============================================================================

/// Latch thresholds for the dual-timeframe detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    /// Daily RSI below this arms the recovery latch; crossing back above it
    /// emits BUY.
    #[serde(default = "default_oversold")]
    pub oversold: f64,

    /// Daily RSI above this arms the reversal latch; falling back below it
    /// emits SELL.
    #[serde(default = "default_overbought")]
    pub overbought: f64,

    /// Weekly RSI must be strictly above this for any latch to move.
    #[serde(default = "default_weekly_bullish")]
    pub weekly_bullish: f64,

    /// Which signal survives when both latches fire on the same row.
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            oversold: default_oversold(),
            overbought: default_overbought(),
            weekly_bullish: default_weekly_bullish(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

// =============================================================================
// AnalysisConfig
// =============================================================================

/// Top-level configuration for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    // --- Instrument & dates ---------------------------------------------------

    /// Ticker symbol as understood by the price source.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// First date requested from the price source.
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,

    /// Exclusive end of the requested range; `None` means today.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    /// Signals are only reported for rows on or after this date.  History
    /// before it still warms up the RSI and the weekly forward-fill.
    #[serde(default = "default_cutoff_date")]
    pub cutoff_date: NaiveDate,

    // --- Indicator ------------------------------------------------------------

    #[serde(default = "default_rsi_window")]
    pub rsi_window: usize,

    #[serde(default)]
    pub thresholds: SignalThresholds,

    // --- Output ---------------------------------------------------------------

    /// Directory receiving the CSV tables and the chart.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_true")]
    pub render_chart: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            start_date: default_start_date(),
            end_date: None,
            cutoff_date: default_cutoff_date(),
            rsi_window: default_rsi_window(),
            thresholds: SignalThresholds::default(),
            output_dir: default_output_dir(),
            render_chart: true,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// Returns `Ok(None)` when the file does not exist so the caller can fall
    /// back to defaults.  Any other read failure, and a file that does not
    /// parse, is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read config from {}", path.display()))
            }
        };

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            cutoff = %config.cutoff_date,
            "analysis config loaded"
        );

        Ok(Some(config))
    }

    /// Persist the configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "analysis config saved (atomic)");
        Ok(())
    }

    /// End of the requested range, defaulting to `today`.
    pub fn effective_end(&self, today: NaiveDate) -> NaiveDate {
        self.end_date.unwrap_or(today)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let invalid = |msg: String| Err(AnalysisError::InvalidConfig(msg));

        if self.symbol.trim().is_empty() {
            return invalid("symbol must not be empty".into());
        }
        if self.rsi_window == 0 {
            return invalid("rsi_window must be at least 1".into());
        }

        let t = &self.thresholds;
        for (name, value) in [
            ("oversold", t.oversold),
            ("overbought", t.overbought),
            ("weekly_bullish", t.weekly_bullish),
        ] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return invalid(format!("{name} threshold {value} is outside [0, 100]"));
            }
        }

        if self.cutoff_date < self.start_date {
            return invalid(format!(
                "cutoff_date {} is before start_date {}",
                self.cutoff_date, self.start_date
            ));
        }
        if let Some(end) = self.end_date {
            if end <= self.start_date {
                return invalid(format!(
                    "end_date {} is not after start_date {}",
                    end, self.start_date
                ));
            }
        }

        if t.oversold >= t.overbought {
            warn!(
                oversold = t.oversold,
                overbought = t.overbought,
                policy = %t.conflict_policy,
                "oversold >= overbought: the latches re-arm on every row and signals will be noisy"
            );
        }

        Ok(())
    }
}
