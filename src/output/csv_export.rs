// =============================================================================
// CSV Export — full signal table plus BUY / SELL subsets
// =============================================================================
//
// Column order is fixed so downstream tools can rely on it:
//
//   date, open, high, low, close, adj_close, volume,
//   daily_rsi, weekly_rsi, signal, signal_code
//
// Missing values (provider fields, weekly RSI before the first weekly bar) are
// written as empty cells.
// =============================================================================

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::detector::SignalRow;
use crate::pipeline::SignalReport;
use crate::types::Signal;

pub const MERGED_FILE: &str = "merged_data.csv";
pub const BUY_FILE: &str = "buy_signals.csv";
pub const SELL_FILE: &str = "sell_signals.csv";

#[derive(Debug, Serialize)]
struct CsvRecord {
    date: NaiveDate,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: f64,
    adj_close: Option<f64>,
    volume: Option<f64>,
    daily_rsi: f64,
    weekly_rsi: Option<f64>,
    signal: Signal,
    signal_code: u8,
}

impl From<&SignalRow> for CsvRecord {
    fn from(r: &SignalRow) -> Self {
        let p = &r.row.price;
        Self {
            date: r.row.date,
            open: p.open,
            high: p.high,
            low: p.low,
            close: p.close,
            adj_close: p.adj_close,
            volume: p.volume,
            daily_rsi: r.row.daily_rsi,
            weekly_rsi: r.row.weekly_rsi,
            signal: r.signal,
            signal_code: r.signal.code(),
        }
    }
}

/// Paths written by [`export_report`].
#[derive(Debug, Clone)]
pub struct ExportedFiles {
    pub merged: PathBuf,
    pub buys: PathBuf,
    pub sells: PathBuf,
}

/// Write `rows` as CSV (with header) to any writer.
pub fn write_rows<W: Write>(writer: W, rows: &[SignalRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        // serde only emits the header alongside the first record.
        wtr.write_record([
            "date", "open", "high", "low", "close", "adj_close", "volume", "daily_rsi",
            "weekly_rsi", "signal", "signal_code",
        ])?;
    }
    for row in rows {
        wtr.serialize(CsvRecord::from(row))
            .with_context(|| format!("failed to serialise row {}", row.row.date))?;
    }
    wtr.flush().context("failed to flush CSV writer")?;
    Ok(())
}

fn write_file(path: &Path, rows: &[SignalRow]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_rows(file, rows).with_context(|| format!("failed to write {}", path.display()))
}

/// Write the three tables into `dir`, creating it if needed.
pub fn export_report(report: &SignalReport, dir: impl AsRef<Path>) -> Result<ExportedFiles> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output dir {}", dir.display()))?;

    let files = ExportedFiles {
        merged: dir.join(MERGED_FILE),
        buys: dir.join(BUY_FILE),
        sells: dir.join(SELL_FILE),
    };

    write_file(&files.merged, &report.rows)?;
    write_file(&files.buys, &report.buys)?;
    write_file(&files.sells, &report.sells)?;

    info!(
        merged = %files.merged.display(),
        buys = %files.buys.display(),
        sells = %files.sells.display(),
        "signal tables written"
    );

    Ok(files)
}
