//! Output formatting utilities

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use perf_lib::analysis::{StageStat, UtilizationHistogram, UTILIZATION_BANDS};
use perf_lib::VerificationStatus;
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            println!("{}", render_table(items));
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

pub fn render_table<T: Tabled>(items: &[T]) -> String {
    Table::new(items).with(Style::rounded()).to_string()
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format milliseconds as a human-readable duration
pub fn format_millis(ms: f64) -> String {
    if ms.abs() >= 60_000.0 {
        format!("{:.2}m", ms / 60_000.0)
    } else if ms.abs() >= 1000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else {
        format!("{:.0}ms", ms)
    }
}

/// Color a verification status
pub fn color_status(status: VerificationStatus) -> String {
    match status {
        VerificationStatus::Succeeded => status.to_string().green().to_string(),
        VerificationStatus::Failed => status.to_string().red().to_string(),
    }
}

/// Row of the elapsed-time statistics table
#[derive(Debug, Tabled, Serialize)]
pub struct TimeStatRow {
    #[tabled(rename = "From")]
    pub from: String,
    #[tabled(rename = "To")]
    pub to: String,
    #[tabled(rename = "Count")]
    pub count: usize,
    #[tabled(rename = "TotalTime")]
    pub total_time: String,
    #[tabled(rename = "AvgTime")]
    pub avg_time: String,
    #[tabled(rename = "Percentage")]
    pub percentage: String,
}

impl From<&StageStat> for TimeStatRow {
    fn from(stat: &StageStat) -> Self {
        Self {
            from: stat.key.from.to_string(),
            to: stat.key.to.to_string(),
            count: stat.count,
            total_time: format_millis(stat.total_ms as f64),
            avg_time: format_millis(stat.average_ms),
            percentage: format!("{:.2}%", stat.percentage),
        }
    }
}

/// Row of the QPS statistics table
#[derive(Debug, Tabled, Serialize)]
pub struct QpsStatRow {
    #[tabled(rename = "To")]
    pub to: String,
    #[tabled(rename = "MaxQPS")]
    pub max_qps: usize,
    #[tabled(rename = "AvgQPS")]
    pub avg_qps: String,
    #[tabled(rename = "Samples")]
    pub samples: String,
}

impl From<&StageStat> for QpsStatRow {
    fn from(stat: &StageStat) -> Self {
        let samples: Vec<String> = stat.samples.iter().map(usize::to_string).collect();
        Self {
            to: stat.key.to.to_string(),
            max_qps: stat.max_qps,
            avg_qps: format!("{:.2}", stat.avg_qps),
            samples: samples.join(" "),
        }
    }
}

/// Label of a utilization band, e.g. `10-20%`
pub fn band_label(band: usize) -> String {
    format!("{}-{}%", band * 10, (band + 1) * 10)
}

/// One row per elapsed second, one column per utilization band
pub fn render_histogram(histogram: &UtilizationHistogram) -> String {
    let mut builder = Builder::default();
    let mut header = vec!["Second".to_string()];
    header.extend((0..UTILIZATION_BANDS).map(band_label));
    builder.push_record(header);

    let seconds = histogram[0].len();
    for second in 0..seconds {
        let mut row = vec![second.to_string()];
        row.extend(histogram.iter().map(|band| band[second].to_string()));
        builder.push_record(row);
    }

    builder.build().with(Style::rounded()).to_string()
}

/// Named series of a chart
#[derive(Debug, Clone, Serialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<usize>,
}

/// Chart data written next to the tables, rendered by external tooling
#[derive(Debug, Clone, Serialize)]
pub struct SeriesChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
}

impl SeriesChart {
    pub fn new(
        title: impl Into<String>,
        x_label: impl Into<String>,
        y_label: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            series: Vec::new(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, values: Vec<usize>) {
        self.series.push(Series {
            name: name.into(),
            values,
        });
    }
}

pub async fn write_text(path: &Path, content: &str) -> Result<()> {
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    write_text(path, &content).await
}
