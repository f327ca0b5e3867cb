//! Scheduling throughput per scheduler
//!
//! For each case the same workload was captured once per scheduler; the
//! cumulative number of scheduled tasks over elapsed seconds is compared
//! across schedulers in one chart.

use super::common::{finish_case, RunContext};
use super::Scenario;
use crate::output::SeriesChart;
use anyhow::Result;
use async_trait::async_trait;
use perf_lib::analysis::{cumulative, distribute};
use perf_lib::{CaseWindow, ScenarioResult, StageType, VerificationStatus};
use serde::Deserialize;
use std::time::Instant;
use tracing::{error, info};

pub const NAME: &str = "throughput";

#[derive(Debug, Clone, Deserialize)]
pub struct ThroughputConfig {
    pub scheduler_names: Vec<String>,
    #[serde(default)]
    pub cases: Vec<ThroughputCase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThroughputCase {
    pub description: String,
    /// Base snapshot name, captured as `<snapshot>-<scheduler>`
    pub snapshot: String,
}

pub struct Throughput;

impl Throughput {
    /// Cumulative scheduled-task curve of one captured run
    async fn scheduled_curve(
        &self,
        ctx: &RunContext,
        snapshot: &str,
        scheduler: &str,
    ) -> Result<Vec<usize>> {
        let tasks = ctx.load_case_tasks(snapshot).await?;
        let started = Instant::now();
        let window = CaseWindow::from_tasks(&tasks)?;

        let distribution = distribute(&tasks, StageType::Scheduled, window.begin);
        ctx.metrics
            .add_skipped_tasks(StageType::Scheduled.label(), distribution.skipped);
        let curve = cumulative(&distribution.time_series());
        ctx.metrics
            .observe_analysis_latency(started.elapsed().as_secs_f64());

        ctx.logger.log_distribution(
            NAME,
            scheduler,
            distribution.buckets.len(),
            distribution.total(),
            distribution.skipped,
        );
        Ok(curve)
    }
}

#[async_trait]
impl Scenario for Throughput {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Cumulative scheduled tasks over time, compared across schedulers"
    }

    async fn run(&self, ctx: &RunContext, result: &mut ScenarioResult) -> Result<()> {
        let conf: ThroughputConfig = ctx.config.scenario(NAME)?;

        for (index, case) in conf.cases.iter().enumerate() {
            let case_name = format!("Case-{}", index);
            ctx.logger.log_case_started(NAME, &case_name, &case.description);
            let group = result.add_verification_group(&case_name, &case.description);

            let mut chart = SeriesChart::new(
                "Scheduling Throughput",
                "Seconds",
                "Number of Scheduled Tasks",
            );
            for scheduler in &conf.scheduler_names {
                let snapshot = format!("{}-{}", case.snapshot, scheduler);
                let scheduler_group =
                    group.add_group(format!("test for {}", scheduler), &case.description);

                match self.scheduled_curve(ctx, &snapshot, scheduler).await {
                    Ok(curve) => {
                        info!(
                            scheduler = %scheduler,
                            seconds = curve.len(),
                            scheduled = curve.last().copied().unwrap_or(0),
                            "Scheduled time distribution ready"
                        );
                        scheduler_group.add(
                            "get scheduled time distribution",
                            format!("seconds: {}, cumulative: {:?}", curve.len(), curve),
                            VerificationStatus::Succeeded,
                        );
                        chart.push(scheduler, curve);
                    }
                    Err(err) => {
                        error!(
                            scheduler = %scheduler,
                            snapshot = %snapshot,
                            error = %err,
                            "Failed to analyze app"
                        );
                        scheduler_group.add(
                            "test app",
                            format!("{:#}", err),
                            VerificationStatus::Failed,
                        );
                    }
                }
            }

            let path = ctx.case_file(NAME, index, "series.json");
            let written = crate::output::write_json(&path, &chart).await;
            group.add_result(
                &written.map_err(|e| format!("{:#}", e)),
                "output chart",
                path.display().to_string(),
            );

            finish_case(ctx, NAME, &case_name, group);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::common::test_support::{context, task_json, write_snapshot};
    use perf_lib::Results;
    use tempfile::TempDir;

    const CONF: &str = "  throughput:
    scheduler_names: [alpha, beta]
    cases:
      - description: three tasks
        snapshot: tp
";

    #[tokio::test]
    async fn test_throughput_per_scheduler() {
        let snapshots = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_snapshot(
            snapshots.path(),
            "tp-alpha",
            &[
                task_json("a", "n1", "100m", 1000),
                task_json("b", "n1", "100m", 1400),
                task_json("c", "n1", "100m", 3000),
            ],
            "",
        );
        // beta was never captured
        let ctx = context(snapshots.path(), output.path(), CONF);

        let mut results = Results::new();
        let scenario = results.create_scenario_results(NAME);
        Throughput.run(&ctx, scenario).await.unwrap();
        results.refresh_status();

        let case = &results.scenarios[0].verifications[0];
        assert_eq!(case.name, "Case-0");
        assert!(case.is_failed());
        assert!(!case.children[0].is_failed());
        assert!(case.children[0].children[0].description.contains("[0, 0, 2, 2, 3]"));
        assert!(case.children[1].is_failed());

        let series =
            std::fs::read_to_string(output.path().join("throughput-case0-series.json")).unwrap();
        let chart: serde_json::Value = serde_json::from_str(&series).unwrap();
        assert_eq!(chart["series"].as_array().unwrap().len(), 1);
        assert_eq!(chart["series"][0]["name"], "alpha");
    }

    #[tokio::test]
    async fn test_missing_configuration_section() {
        let snapshots = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let ctx = context(snapshots.path(), output.path(), "  e2e_perf: {}\n");

        let mut results = Results::new();
        let scenario = results.create_scenario_results(NAME);
        assert!(Throughput.run(&ctx, scenario).await.is_err());
    }
}
