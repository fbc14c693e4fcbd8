// =============================================================================
// RSI Crossover — Main Entry Point
// =============================================================================
//
// One run, one symbol:
//   config → daily + weekly history → RSI / align / detect → CSV + chart
//
// Settings resolve as defaults → JSON file → environment → CLI flags.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod alignment;
mod detector;
mod error;
mod indicators;
mod market_data;
mod output;
mod pipeline;
mod runtime_config;
mod types;

use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::indicators::rsi::current_rsi;
use crate::market_data::{PriceSeries, PriceSource, YahooClient};
use crate::runtime_config::AnalysisConfig;
use crate::types::Interval;

const DEFAULT_CONFIG_PATH: &str = "rsi_config.json";

/// Dual-timeframe RSI crossover signals for one symbol.
#[derive(Debug, Parser)]
#[command(name = "rsi-crossover", version, about)]
struct Cli {
    /// JSON config file; a missing file falls back to defaults.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Ticker symbol, e.g. PAYTM.NS.
    #[arg(long)]
    symbol: Option<String>,

    /// First date of history to request (YYYY-MM-DD).
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Exclusive end date (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Signals are reported from this date on (YYYY-MM-DD).
    #[arg(long)]
    cutoff: Option<NaiveDate>,

    #[arg(long)]
    rsi_window: Option<usize>,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Read daily bars from a CSV file instead of Yahoo Finance.
    #[arg(long, requires = "weekly_csv")]
    daily_csv: Option<PathBuf>,

    /// Read weekly bars from a CSV file instead of Yahoo Finance.
    #[arg(long, requires = "daily_csv")]
    weekly_csv: Option<PathBuf>,

    /// Skip the HTML chart.
    #[arg(long)]
    no_chart: bool,

    /// Write the effective config back to --config before running.
    #[arg(long)]
    save_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut AnalysisConfig) {
        if let Some(symbol) = &self.symbol {
            config.symbol = symbol.trim().to_uppercase();
        }
        if let Some(start) = self.start {
            config.start_date = start;
        }
        if let Some(end) = self.end {
            config.end_date = Some(end);
        }
        if let Some(cutoff) = self.cutoff {
            config.cutoff_date = cutoff;
        }
        if let Some(window) = self.rsi_window {
            config.rsi_window = window;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if self.no_chart {
            config.render_chart = false;
        }
    }

    fn price_source(&self) -> anyhow::Result<PriceSource> {
        match (&self.daily_csv, &self.weekly_csv) {
            (Some(daily), Some(weekly)) => Ok(PriceSource::Csv {
                daily: daily.clone(),
                weekly: weekly.clone(),
            }),
            _ => Ok(PriceSource::Yahoo(YahooClient::new()?)),
        }
    }
}

/// Apply `RSI_SYMBOL` / `RSI_OUTPUT_DIR` overrides.
fn apply_env(config: &mut AnalysisConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(symbol) = var("RSI_SYMBOL").filter(|s| !s.trim().is_empty()) {
        config.symbol = symbol.trim().to_uppercase();
    }
    if let Some(dir) = var("RSI_OUTPUT_DIR").filter(|s| !s.trim().is_empty()) {
        config.output_dir = PathBuf::from(dir);
    }
}

/// Defaults → JSON file → environment → CLI flags, then validate.
///
/// Only a missing config file falls back to defaults; an unreadable or
/// malformed one aborts the run.
fn resolve_config(
    cli: &Cli,
    var: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<AnalysisConfig> {
    let mut config = match AnalysisConfig::load(&cli.config)? {
        Some(config) => config,
        None => {
            warn!(path = %cli.config.display(), "Config file not found, using defaults");
            AnalysisConfig::default()
        }
    };
    apply_env(&mut config, var);
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn log_current(series: &PriceSeries, config: &AnalysisConfig) {
    let t = &config.thresholds;
    if let Some((value, zone)) =
        current_rsi(&series.closes(), config.rsi_window, t.oversold, t.overbought)
    {
        info!(
            symbol = series.symbol(),
            interval = %series.interval(),
            rsi = format!("{value:.2}"),
            %zone,
            "current RSI"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = resolve_config(&cli, |key| std::env::var(key).ok())?;

    if cli.save_config {
        config.save(&cli.config)?;
    }

    let today = Utc::now().date_naive();
    let end = config.effective_end(today);

    info!(
        symbol = %config.symbol,
        start = %config.start_date,
        end = %end,
        cutoff = %config.cutoff_date,
        window = config.rsi_window,
        "RSI crossover run starting"
    );

    // ── 2. Price history ─────────────────────────────────────────────────
    let source = cli.price_source()?;
    let daily = source
        .fetch(&config.symbol, Interval::Daily, config.start_date, end)
        .await?;
    let weekly = source
        .fetch(&config.symbol, Interval::Weekly, config.start_date, end)
        .await?;

    log_current(&daily, &config);
    log_current(&weekly, &config);

    // ── 3. Signals ───────────────────────────────────────────────────────
    let report = pipeline::run(&config, &daily, &weekly)?;
    report.log_summary(&config);

    // ── 4. Output ────────────────────────────────────────────────────────
    let files = output::csv_export::export_report(&report, &config.output_dir)?;
    info!(merged = %files.merged.display(), "CSV export complete");

    if config.render_chart {
        output::chart::write_chart(&report, &config.thresholds, &config.output_dir)?;
    }

    info!(
        buys = report.buys.len(),
        sells = report.sells.len(),
        "RSI crossover run complete"
    );
    Ok(())
}
