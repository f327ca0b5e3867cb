//! Scheduler performance benchmarking harness
//!
//! Runs the configured benchmark scenarios against captured snapshots of
//! test workloads and reports throughput, node fairness and lifecycle
//! statistics per scheduler.

mod config;
mod output;
mod scenarios;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use colored::Colorize;
use crate::config::HarnessConfig;
use crate::output::{LogFormat, OutputFormat};
use crate::scenarios::{RunContext, ScenarioRegistry};
use perf_lib::analysis::{distribute, last_n, summarize, NodeAnalyzer, StageStatistics};
use perf_lib::source::{FileSnapshotSource, SnapshotSource};
use perf_lib::{CaseWindow, HarnessMetrics, NodeTaskCount, Results, StageType, StructuredLogger};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tabled::Tabled;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Scheduler performance benchmarking harness
#[derive(Parser)]
#[command(name = "perf-tools")]
#[command(author, version, about = "Scheduler performance benchmarking harness", long_about = None)]
pub struct Cli {
    /// Configuration file (can also be set via PERF_CONFIG env var)
    #[arg(long, short, env = "PERF_CONFIG", default_value = "conf.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    /// Log format
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run benchmark scenarios
    Run {
        /// Comma-separated scenario names (all configured scenarios if not specified)
        #[arg(long, short, value_delimiter = ',')]
        scenarios: Vec<String>,
    },

    /// List available scenarios
    List,

    /// Analyze a single captured snapshot
    Analyze {
        /// Snapshot name, read from `<snapshot_dir>/<snapshot>.json`
        snapshot: String,

        /// Node snapshot used for the task distribution summary
        #[arg(long)]
        nodes: Option<String>,

        /// Number of most recently running tasks to show
        #[arg(long, default_value_t = 10)]
        last: usize,
    },
}

/// Row of the scenario list
#[derive(Tabled, Serialize)]
struct ScenarioRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Configured")]
    configured: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Row of the last running tasks table
#[derive(Tabled, Serialize)]
struct TaskRow {
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "ToRunning")]
    to_running: String,
    #[tabled(rename = "Running At")]
    running_at: String,
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match cli.command {
        Commands::Run { ref scenarios } => run(&cli, scenarios).await,
        Commands::List => {
            list(&cli)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Analyze {
            ref snapshot,
            ref nodes,
            last,
        } => {
            analyze(&cli, snapshot, nodes.as_deref(), last).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn list(cli: &Cli) -> Result<()> {
    let config = HarnessConfig::load(&cli.config, false)?;
    let registry = ScenarioRegistry::with_defaults();

    let rows: Vec<ScenarioRow> = registry
        .iter()
        .map(|scenario| ScenarioRow {
            name: scenario.name().to_string(),
            configured: if config.scenarios.contains_key(scenario.name()) {
                "yes".to_string()
            } else {
                "no".to_string()
            },
            description: scenario.description().to_string(),
        })
        .collect();
    output::print_table(&rows, cli.format);
    Ok(())
}

async fn run(cli: &Cli, requested: &[String]) -> Result<ExitCode> {
    let config = HarnessConfig::load(&cli.config, true)?;
    let registry = ScenarioRegistry::with_defaults();

    let names: Vec<String> = if requested.is_empty() {
        registry
            .names()
            .into_iter()
            .filter(|name| config.scenarios.contains_key(*name))
            .map(str::to_string)
            .collect()
    } else {
        requested.to_vec()
    };
    let selected = registry.resolve(&names)?;
    if selected.is_empty() {
        output::print_warning("No scenario configured, nothing to run");
        return Ok(ExitCode::SUCCESS);
    }

    let started_at = Local::now();
    let output_dir = config.common.output_root_path.join(format!(
        "PERF-{}-{}",
        names.join("-"),
        started_at.format("%Y%m%d%H%M%S")
    ));
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let run_id = output_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let logger = StructuredLogger::new(run_id);
    logger.log_startup(VERSION, &names);
    info!(output_dir = %output_dir.display(), "Created output directory");

    let ctx = RunContext {
        source: Arc::new(FileSnapshotSource::new(config.common.snapshot_dir.clone())),
        config,
        output_dir: output_dir.clone(),
        format: cli.format,
        metrics: HarnessMetrics::new(),
        logger: logger.clone(),
    };

    let mut results = Results::new();
    for scenario in selected {
        info!(scenario = scenario.name(), "Running scenario");
        let result = results.create_scenario_results(scenario.name());
        if let Err(err) = scenario.run(&ctx, result).await {
            error!(scenario = scenario.name(), error = %err, "Scenario failed");
            result.add_verification(
                "init",
                format!("{:#}", err),
                perf_lib::VerificationStatus::Failed,
            );
        }
    }
    results.refresh_status();

    output::write_text(&output_dir.join("results.txt"), &results.to_string()).await?;
    let metrics = ctx
        .metrics
        .gather_text()
        .context("Failed to encode metrics")?;
    output::write_text(&output_dir.join("metrics.prom"), &metrics).await?;

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        OutputFormat::Table => {
            println!();
            println!("{}", "Results".bold());
            println!("{}", "=".repeat(50));
            print!("{}", results);
            println!();
            for scenario in &results.scenarios {
                println!("{:<20} {}", scenario.name, output::color_status(scenario.status));
            }
            output::print_info(&format!("Outputs written to {}", output_dir.display()));
        }
    }

    let failed = results.is_failed();
    logger.log_shutdown(failed);
    if failed {
        output::print_error("Some scenarios failed");
        Ok(ExitCode::FAILURE)
    } else {
        if cli.format == OutputFormat::Table {
            output::print_success("All scenarios succeeded");
        }
        Ok(ExitCode::SUCCESS)
    }
}

async fn analyze(cli: &Cli, snapshot: &str, nodes: Option<&str>, last: usize) -> Result<()> {
    let config = HarnessConfig::load(&cli.config, false)?;
    let source = FileSnapshotSource::new(config.common.snapshot_dir.clone());

    let tasks = source.load_tasks(snapshot).await?;
    let window = CaseWindow::from_tasks(&tasks)?;
    let distribution = distribute(&tasks, StageType::Scheduled, window.begin);
    let report = StageStatistics::compute(&tasks, window.end).report(&StageType::ordered());

    let summary = match nodes {
        Some(name) => {
            let mut analyzer = NodeAnalyzer::new(source.load_nodes(name).await?)?;
            analyzer.analyze_tasks(&tasks);
            let counts: Vec<NodeTaskCount> = analyzer
                .scheduled_nodes()
                .into_iter()
                .map(NodeTaskCount::from)
                .collect();
            Some(summarize(&counts)?)
        }
        None => None,
    };

    if cli.format == OutputFormat::Json {
        let value = serde_json::json!({
            "snapshot": snapshot,
            "window": window,
            "scheduled_time_series": distribution.time_series(),
            "skipped": distribution.skipped,
            "report": report,
            "distribution": summary,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", format!("Snapshot {}", snapshot).bold());
    println!("{}", "=".repeat(50));
    println!("Tasks:                  {}", tasks.len());
    println!("Window:                 {} .. {}", window.begin, window.end);
    println!("Scheduled per second:   {:?}", distribution.time_series());
    if distribution.skipped > 0 {
        output::print_warning(&format!(
            "{} task(s) left out of the scheduled distribution",
            distribution.skipped
        ));
    }
    println!();

    let rows: Vec<TaskRow> = last_n(&tasks, last)
        .into_iter()
        .map(|task| TaskRow {
            task: task.id.clone(),
            node: task.node_id.clone(),
            to_running: output::format_millis(
                (task.running_at - task.created_at).num_milliseconds() as f64,
            ),
            running_at: task.running_at.to_rfc3339(),
        })
        .collect();
    println!("{}", "Last Running Tasks".bold());
    output::print_table(&rows, cli.format);
    println!();

    println!("{}", "Time Statistics".bold());
    let time_rows: Vec<output::TimeStatRow> =
        report.time_stats.iter().map(output::TimeStatRow::from).collect();
    output::print_table(&time_rows, cli.format);
    println!();

    println!("{}", "QPS Statistics".bold());
    let qps_rows: Vec<output::QpsStatRow> =
        report.qps_stats.iter().map(output::QpsStatRow::from).collect();
    output::print_table(&qps_rows, cli.format);

    if let Some(info) = summary {
        println!();
        println!("{}", "Tasks Distribution".bold());
        println!("{}", "-".repeat(50));
        println!(
            "Least:                  {} ({})",
            info.least_count,
            info.least_node_id.cyan()
        );
        println!(
            "Most:                   {} ({})",
            info.most_count,
            info.most_node_id.cyan()
        );
        println!("Average per node:       {:.2}", info.average);
    }

    Ok(())
}
