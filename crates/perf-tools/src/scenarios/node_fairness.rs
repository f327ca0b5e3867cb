//! Node fairness: how evenly schedulers spread load over nodes
//!
//! The node inventory is loaded once; before each scheduler's run the
//! attributed tasks are cleared so every scheduler starts from the same
//! baseline allocation.

use super::common::{finish_case, RunContext};
use super::Scenario;
use crate::output::{band_label, render_histogram, write_json, write_text, SeriesChart};
use anyhow::Result;
use async_trait::async_trait;
use perf_lib::analysis::{distribute, NodeAnalyzer, UtilizationHistogram};
use perf_lib::quantity::canonical_resource_name;
use perf_lib::{CaseWindow, ScenarioResult, StageType, Verification, VerificationStatus};
use serde::Deserialize;
use std::time::Instant;
use tracing::{error, info};

pub const NAME: &str = "node_fairness";

#[derive(Debug, Clone, Deserialize)]
pub struct NodeFairnessConfig {
    pub scheduler_names: Vec<String>,
    #[serde(default)]
    pub cases: Vec<NodeFairnessCase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeFairnessCase {
    pub description: String,
    /// Resource whose utilization is tracked, `cpu` or `memory` for instance
    pub resource_name: String,
    /// Base snapshot name, captured as `<snapshot>-<scheduler>`
    pub snapshot: String,
}

pub struct NodeFairness;

impl NodeFairness {
    async fn histogram(
        &self,
        ctx: &RunContext,
        analyzer: &mut NodeAnalyzer,
        snapshot: &str,
        resource: &str,
    ) -> Result<UtilizationHistogram> {
        analyzer.clear_tasks();
        let tasks = ctx.load_case_tasks(snapshot).await?;
        let started = Instant::now();
        let window = CaseWindow::from_tasks(&tasks)?;

        let attributed = analyzer.analyze_tasks(&tasks);
        info!(
            snapshot = %snapshot,
            tasks = tasks.len(),
            attributed = attributed,
            scheduled_nodes = analyzer.scheduled_nodes().len(),
            "Attributed tasks to nodes"
        );

        let distribution = distribute(&tasks, StageType::Scheduled, window.begin);
        ctx.metrics
            .add_skipped_tasks(StageType::Scheduled.label(), distribution.skipped);
        let histogram = analyzer.histogram(&distribution, resource)?;
        ctx.metrics
            .observe_analysis_latency(started.elapsed().as_secs_f64());
        Ok(histogram)
    }

    async fn output(
        &self,
        ctx: &RunContext,
        index: usize,
        scheduler: &str,
        histogram: &UtilizationHistogram,
        group: &mut Verification,
    ) {
        let table = render_histogram(histogram);
        ctx.print(&format!("Node distribution of {}", scheduler), &table);

        let table_path = ctx.case_file(
            NAME,
            index,
            &format!("{}-node-distribution.txt", scheduler),
        );
        let written = write_text(&table_path, &table).await;
        group.add_result(
            &written.map_err(|e| format!("{:#}", e)),
            "output node distribution timeline table",
            table_path.display().to_string(),
        );

        let mut chart = SeriesChart::new("Node Fairness", "Seconds", "Number of Nodes");
        for (band, series) in histogram.iter().enumerate() {
            chart.push(band_label(band), series.clone());
        }
        let chart_path = ctx.case_file(NAME, index, &format!("{}-series.json", scheduler));
        let written = write_json(&chart_path, &chart).await;
        group.add_result(
            &written.map_err(|e| format!("{:#}", e)),
            "output node distribution timeline chart",
            chart_path.display().to_string(),
        );
    }
}

#[async_trait]
impl Scenario for NodeFairness {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Node utilization bands over time, per scheduler"
    }

    async fn run(&self, ctx: &RunContext, result: &mut ScenarioResult) -> Result<()> {
        let conf: NodeFairnessConfig = ctx.config.scenario(NAME)?;

        let nodes_snapshot = &ctx.config.common.nodes_snapshot;
        let mut analyzer = match ctx.load_nodes(nodes_snapshot).await {
            Ok(nodes) => match NodeAnalyzer::new(nodes) {
                Ok(analyzer) => analyzer,
                Err(err) => {
                    error!(error = %err, "Failed to init nodes");
                    result.add_verification(
                        "init nodes",
                        err.to_string(),
                        VerificationStatus::Failed,
                    );
                    return Ok(());
                }
            },
            Err(err) => {
                error!(snapshot = %nodes_snapshot, error = %err, "Failed to init nodes");
                result.add_verification(
                    "init nodes",
                    format!("{:#}", err),
                    VerificationStatus::Failed,
                );
                return Ok(());
            }
        };
        ctx.metrics.set_nodes_tracked(analyzer.num_nodes());
        info!(nodes = analyzer.num_nodes(), "Initialized nodes");

        for (index, case) in conf.cases.iter().enumerate() {
            let case_name = format!("Case-{}", index);
            ctx.logger.log_case_started(NAME, &case_name, &case.description);
            let group = result.add_verification_group(&case_name, &case.description);

            analyzer.clear_tasks();
            let resource = canonical_resource_name(&case.resource_name);
            let total = analyzer.total_allocatable();
            if !total.contains(resource) {
                group.add(
                    "Unknown resource name",
                    format!("resourceName={}, totalAllocatable={:?}", resource, total),
                    VerificationStatus::Failed,
                );
                finish_case(ctx, NAME, &case_name, group);
                continue;
            }

            for scheduler in &conf.scheduler_names {
                let snapshot = format!("{}-{}", case.snapshot, scheduler);
                let scheduler_group =
                    group.add_group(format!("test for {}", scheduler), &case.description);

                match self.histogram(ctx, &mut analyzer, &snapshot, resource).await {
                    Ok(histogram) => {
                        self.output(ctx, index, scheduler, &histogram, scheduler_group)
                            .await;
                    }
                    Err(err) => {
                        error!(
                            scheduler = %scheduler,
                            snapshot = %snapshot,
                            error = %err,
                            "Failed to analyze node distribution"
                        );
                        scheduler_group.add(
                            "test app",
                            format!("{:#}", err),
                            VerificationStatus::Failed,
                        );
                    }
                }
            }

            finish_case(ctx, NAME, &case_name, group);
        }

        Ok(())
    }
}
