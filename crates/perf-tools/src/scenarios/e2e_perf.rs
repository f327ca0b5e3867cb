//! End-to-end lifecycle performance of one workload
//!
//! Reports the slowest tasks, how tasks spread over nodes, and elapsed-time
//! and QPS statistics between consecutive lifecycle stages.

use super::common::{finish_case, RunContext};
use super::Scenario;
use crate::output::{render_table, write_text, QpsStatRow, TimeStatRow};
use anyhow::Result;
use async_trait::async_trait;
use perf_lib::analysis::{last_n, summarize, NodeAnalyzer, StageReport, StageStatistics};
use perf_lib::{
    CaseWindow, NodeRecord, NodeTaskCount, ScenarioResult, StageType, TaskRecord, Verification,
    VerificationStatus,
};
use serde::Deserialize;
use std::time::Instant;
use tracing::{error, info};

pub const NAME: &str = "e2e_perf";

#[derive(Debug, Clone, Deserialize)]
pub struct E2ePerfConfig {
    /// Number of most recently running tasks to log, 0 to skip
    #[serde(default)]
    pub show_num_of_last_tasks: usize,
    #[serde(default)]
    pub cases: Vec<E2ePerfCase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct E2ePerfCase {
    pub description: String,
    pub snapshot: String,
}

pub struct E2ePerf;

impl E2ePerf {
    fn log_last_tasks(&self, tasks: &[TaskRecord], n: usize) {
        let last = last_n(tasks, n);
        info!(count = last.len(), "Last running tasks");
        for task in last {
            info!(
                task_id = %task.id,
                node_id = %task.node_id,
                to_running_ms = (task.running_at - task.created_at).num_milliseconds(),
                created_at = %task.created_at,
                running_at = %task.running_at,
                "Task status"
            );
        }
    }

    fn log_distribution_info(&self, nodes: Vec<NodeRecord>, tasks: &[TaskRecord]) -> Result<()> {
        let mut analyzer = NodeAnalyzer::new(nodes)?;
        analyzer.analyze_tasks(tasks);
        let scheduled = analyzer.scheduled_nodes();
        let counts: Vec<NodeTaskCount> = scheduled
            .iter()
            .copied()
            .map(NodeTaskCount::from)
            .collect();
        let info = summarize(&counts)?;

        info!(
            least_count = info.least_count,
            least_node_id = %info.least_node_id,
            most_count = info.most_count,
            most_node_id = %info.most_node_id,
            average = info.average,
            tasks = tasks.len(),
            scheduled_nodes = scheduled.len(),
            "Tasks distribution info on nodes"
        );
        for node_id in [&info.least_node_id, &info.most_node_id] {
            if let Some(node) = analyzer.node(node_id) {
                info!(summary = %node.summary(), "Node summary");
            }
        }
        Ok(())
    }

    async fn output(
        &self,
        ctx: &RunContext,
        index: usize,
        report: &StageReport,
        group: &mut Verification,
    ) {
        let time_rows: Vec<TimeStatRow> =
            report.time_stats.iter().map(TimeStatRow::from).collect();
        let time_table = render_table(&time_rows);
        ctx.print("Time statistics for task conditions", &time_table);
        let time_path = ctx.case_file(NAME, index, "timecost-stat.txt");
        let written = write_text(&time_path, &time_table).await;
        group.add_result(
            &written.map_err(|e| format!("{:#}", e)),
            "time statistics",
            time_path.display().to_string(),
        );

        let qps_rows: Vec<QpsStatRow> = report.qps_stats.iter().map(QpsStatRow::from).collect();
        let qps_table = render_table(&qps_rows);
        ctx.print("QPS statistics for task conditions", &qps_table);
        let qps_path = ctx.case_file(NAME, index, "qps-stat.txt");
        let written = write_text(&qps_path, &qps_table).await;
        group.add_result(
            &written.map_err(|e| format!("{:#}", e)),
            "QPS statistics",
            qps_path.display().to_string(),
        );
    }
}

#[async_trait]
impl Scenario for E2ePerf {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Elapsed time and QPS between task lifecycle stages"
    }

    async fn run(&self, ctx: &RunContext, result: &mut ScenarioResult) -> Result<()> {
        let conf: E2ePerfConfig = ctx.config.scenario(NAME)?;

        for (index, case) in conf.cases.iter().enumerate() {
            let case_name = format!("Case-{}", index);
            ctx.logger.log_case_started(NAME, &case_name, &case.description);
            let group = result.add_verification_group(&case_name, &case.description);

            let nodes = match ctx.load_nodes(&ctx.config.common.nodes_snapshot).await {
                Ok(nodes) => nodes,
                Err(err) => {
                    error!(error = %err, "Failed to init nodes");
                    group.add("init nodes", format!("{:#}", err), VerificationStatus::Failed);
                    finish_case(ctx, NAME, &case_name, group);
                    continue;
                }
            };

            let tasks = match ctx.load_case_tasks(&case.snapshot).await {
                Ok(tasks) => tasks,
                Err(err) => {
                    error!(snapshot = %case.snapshot, error = %err, "Failed to load app");
                    group.add("test app", format!("{:#}", err), VerificationStatus::Failed);
                    finish_case(ctx, NAME, &case_name, group);
                    continue;
                }
            };
            let started = Instant::now();

            let window = match CaseWindow::from_tasks(&tasks) {
                Ok(window) => window,
                Err(err) => {
                    group.add("test app", err.to_string(), VerificationStatus::Failed);
                    finish_case(ctx, NAME, &case_name, group);
                    continue;
                }
            };

            if conf.show_num_of_last_tasks > 0 {
                self.log_last_tasks(&tasks, conf.show_num_of_last_tasks);
            }

            let distribution_info = self.log_distribution_info(nodes, &tasks);
            group.add_result(
                &distribution_info.map_err(|e| format!("{:#}", e)),
                "tasks distribution info",
                "",
            );

            let stats = StageStatistics::compute(&tasks, window.end);
            if stats.count() > 0 {
                let report = stats.report(&StageType::ordered());
                ctx.metrics
                    .observe_analysis_latency(started.elapsed().as_secs_f64());
                self.output(ctx, index, &report, group).await;
            }

            finish_case(ctx, NAME, &case_name, group);
        }

        Ok(())
    }
}
