// =============================================================================
// Signal Chart — self-contained HTML with two inline SVG panels
// =============================================================================
//
// Panel 1: daily RSI, weekly RSI, threshold guides, BUY / SELL markers.
// Panel 2: the BUY / SELL markers alone.
//
// Both panels share the x axis (one slot per trading row) and a fixed [0, 100]
// y axis.  No scripts or external assets; the file opens in any browser.
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::detector::SignalRow;
use crate::pipeline::SignalReport;
use crate::runtime_config::SignalThresholds;
use crate::types::Signal;

pub const CHART_FILE: &str = "rsi_signals.html";

const DAILY_COLOR: &str = "#1f77b4";
const WEEKLY_COLOR: &str = "#2ca02c";
const BUY_COLOR: &str = "#2ca02c";
const SELL_COLOR: &str = "#d62728";
const X_TICKS: usize = 6;

/// Pixel geometry of one panel.
#[derive(Debug, Clone, Copy)]
pub struct ChartLayout {
    pub width: f64,
    pub panel_height: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self {
            width: 1100.0,
            panel_height: 320.0,
            margin_left: 50.0,
            margin_right: 20.0,
            margin_top: 30.0,
            margin_bottom: 40.0,
        }
    }
}

impl ChartLayout {
    fn plot_width(&self) -> f64 {
        self.width - self.margin_left - self.margin_right
    }

    fn plot_height(&self) -> f64 {
        self.panel_height - self.margin_top - self.margin_bottom
    }

    fn x(&self, index: usize, count: usize) -> f64 {
        let slots = count.saturating_sub(1).max(1) as f64;
        self.margin_left + self.plot_width() * index as f64 / slots
    }

    fn y(&self, rsi: f64) -> f64 {
        self.margin_top + self.plot_height() * (1.0 - rsi.clamp(0.0, 100.0) / 100.0)
    }
}

/// Render the report as an HTML document.
pub fn render_html(report: &SignalReport, thresholds: &SignalThresholds, layout: ChartLayout) -> String {
    let title = format!("RSI with Buy and Sell Signals — {}", escape(&report.symbol));

    let mut output = String::new();
    output.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    output.push_str("<meta charset=\"utf-8\">\n");
    output.push_str(&format!("<title>{}</title>\n", title));
    output.push_str(
        "<style>body{font-family:sans-serif;margin:20px}\
         .axis{stroke:#444;stroke-width:1}\
         .grid{stroke:#ccc;stroke-width:1;stroke-dasharray:4 3}\
         text{font-size:11px;fill:#333}</style>\n",
    );
    output.push_str("</head>\n<body>\n");
    output.push_str(&format!("<h2>{}</h2>\n", title));
    output.push_str(&format!(
        "<p>{} rows, {} buy, {} sell</p>\n",
        report.rows.len(),
        report.buys.len(),
        report.sells.len()
    ));

    output.push_str(&rsi_panel(&report.rows, thresholds, layout));
    output.push_str(&signal_panel(&report.rows, layout));

    output.push_str("</body>\n</html>\n");
    output
}

/// Render and write the chart into `dir`.
pub fn write_chart(
    report: &SignalReport,
    thresholds: &SignalThresholds,
    dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output dir {}", dir.display()))?;

    let path = dir.join(CHART_FILE);
    let html = render_html(report, thresholds, ChartLayout::default());
    std::fs::write(&path, html).with_context(|| format!("failed to write {}", path.display()))?;

    info!(path = %path.display(), "chart written");
    Ok(path)
}

// =============================================================================
// Panels
// =============================================================================

fn rsi_panel(rows: &[SignalRow], t: &SignalThresholds, layout: ChartLayout) -> String {
    let mut svg = open_panel("RSI", rows, layout);

    for (level, label) in [
        (t.overbought, "overbought"),
        (t.weekly_bullish, "bullish"),
        (t.oversold, "oversold"),
    ] {
        let y = layout.y(level);
        svg.push_str(&format!(
            "<line class=\"grid\" x1=\"{:.1}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\"><title>{label} {level}</title></line>\n",
            layout.margin_left,
            layout.width - layout.margin_right,
        ));
    }

    let daily: Vec<Option<f64>> = rows.iter().map(|r| Some(r.row.daily_rsi)).collect();
    let weekly: Vec<Option<f64>> = rows.iter().map(|r| r.row.weekly_rsi).collect();
    svg.push_str(&polylines(&daily, DAILY_COLOR, "Daily RSI", layout));
    svg.push_str(&polylines(&weekly, WEEKLY_COLOR, "Weekly RSI", layout));
    svg.push_str(&markers(rows, layout));

    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"18\" fill=\"{DAILY_COLOR}\">Daily RSI</text>\
         <text x=\"{:.1}\" y=\"18\" fill=\"{WEEKLY_COLOR}\">Weekly RSI</text>\n",
        layout.margin_left + 60.0,
        layout.margin_left + 140.0,
    ));

    svg.push_str("</svg>\n");
    svg
}

fn signal_panel(rows: &[SignalRow], layout: ChartLayout) -> String {
    let mut svg = open_panel("Buy and Sell Signals", rows, layout);
    svg.push_str(&markers(rows, layout));
    svg.push_str("</svg>\n");
    svg
}

/// SVG header, frame, y grid and date ticks shared by both panels.
fn open_panel(name: &str, rows: &[SignalRow], layout: ChartLayout) -> String {
    let (left, right) = (layout.margin_left, layout.width - layout.margin_right);
    let (top, bottom) = (layout.margin_top, layout.panel_height - layout.margin_bottom);

    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{:.0}\" height=\"{:.0}\" data-panel=\"{}\">\n",
        layout.width,
        layout.panel_height,
        escape(name)
    );
    svg.push_str(&format!("<text x=\"{left:.1}\" y=\"18\">{}</text>\n", escape(name)));
    svg.push_str(&format!(
        "<rect x=\"{left:.1}\" y=\"{top:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"none\" class=\"axis\"/>\n",
        right - left,
        bottom - top
    ));

    for level in [0.0, 25.0, 50.0, 75.0, 100.0] {
        let y = layout.y(level);
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\">{level}</text>\n",
            left - 6.0,
            y + 4.0
        ));
    }

    if !rows.is_empty() {
        let step = (rows.len() / X_TICKS).max(1);
        let mut ticks: Vec<usize> = (0..rows.len()).step_by(step).collect();
        if ticks.last() != Some(&(rows.len() - 1)) {
            ticks.push(rows.len() - 1);
        }
        for i in ticks {
            let x = layout.x(i, rows.len());
            svg.push_str(&format!(
                "<text x=\"{x:.1}\" y=\"{:.1}\" text-anchor=\"middle\">{}</text>\n",
                bottom + 16.0,
                rows[i].row.date
            ));
        }
    }

    svg
}

/// One `<polyline>` per run of consecutive defined values.
fn polylines(values: &[Option<f64>], color: &str, name: &str, layout: ChartLayout) -> String {
    let mut out = String::new();
    let mut segment: Vec<String> = Vec::new();

    let flush = |segment: &mut Vec<String>, out: &mut String| {
        if !segment.is_empty() {
            out.push_str(&format!(
                "<polyline fill=\"none\" stroke=\"{color}\" stroke-width=\"1.5\" points=\"{}\"><title>{name}</title></polyline>\n",
                segment.join(" ")
            ));
            segment.clear();
        }
    };

    for (i, v) in values.iter().enumerate() {
        match v {
            Some(rsi) => segment.push(format!(
                "{:.1},{:.1}",
                layout.x(i, values.len()),
                layout.y(*rsi)
            )),
            None => flush(&mut segment, &mut out),
        }
    }
    flush(&mut segment, &mut out);

    out
}

/// Triangle markers at the daily RSI of each signalled row.
fn markers(rows: &[SignalRow], layout: ChartLayout) -> String {
    let mut out = String::new();
    for (i, r) in rows.iter().enumerate() {
        let (class, color, dy) = match r.signal {
            Signal::Buy => ("buy", BUY_COLOR, 1.0),
            Signal::Sell => ("sell", SELL_COLOR, -1.0),
            Signal::None => continue,
        };
        let x = layout.x(i, rows.len());
        let y = layout.y(r.row.daily_rsi);
        // Buy points up (apex above), sell points down.
        let apex = y - 7.0 * dy;
        let base = y + 5.0 * dy;
        out.push_str(&format!(
            "<polygon class=\"marker {class}\" fill=\"{color}\" points=\"{x:.1},{apex:.1} {:.1},{base:.1} {:.1},{base:.1}\"><title>{} {} RSI {:.2}</title></polygon>\n",
            x - 6.0,
            x + 6.0,
            r.signal,
            r.row.date,
            r.row.daily_rsi
        ));
    }
    out
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
