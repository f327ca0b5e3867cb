use crate::config::HarnessConfig;
use crate::output::OutputFormat;
use anyhow::Result;
use perf_lib::source::{wait_for_snapshot, SnapshotSource};
use perf_lib::{
    HarnessMetrics, NodeRecord, StructuredLogger, TaskRecord, Verification, VerificationStatus,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Everything a scenario needs from the running harness
pub struct RunContext {
    pub config: HarnessConfig,
    pub source: Arc<dyn SnapshotSource>,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub metrics: HarnessMetrics,
    pub logger: StructuredLogger,
}

impl RunContext {
    /// Wait for a snapshot to be captured, then load its task records
    pub async fn load_case_tasks(&self, snapshot: &str) -> Result<Vec<TaskRecord>> {
        self.wait(snapshot).await?;
        self.source.load_tasks(snapshot).await
    }

    /// Wait for a snapshot to be captured, then load its node records
    pub async fn load_nodes(&self, snapshot: &str) -> Result<Vec<NodeRecord>> {
        self.wait(snapshot).await?;
        self.source.load_nodes(snapshot).await
    }

    async fn wait(&self, snapshot: &str) -> Result<()> {
        let common = &self.config.common;
        let waited = wait_for_snapshot(
            self.source.as_ref(),
            snapshot,
            common.poll_interval(),
            common.max_wait(),
        )
        .await?;
        self.metrics.observe_snapshot_wait(waited.as_secs_f64());
        info!(snapshot = %snapshot, waited_ms = waited.as_millis() as u64, "Snapshot ready");
        Ok(())
    }

    /// Output file `<scenario>-case<index>-<suffix>` in the run directory
    pub fn case_file(&self, scenario: &str, index: usize, suffix: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}-case{}-{}", scenario, index, suffix))
    }

    /// Print a rendered table unless the run emits JSON
    pub fn print(&self, title: &str, table: &str) {
        if self.format == OutputFormat::Table {
            println!("{}\n{}", title, table);
        }
    }
}

/// Close a case group: refresh its status, count it and log the outcome
pub fn finish_case(ctx: &RunContext, scenario: &str, case: &str, group: &mut Verification) {
    let succeeded = group.refresh_status() == VerificationStatus::Succeeded;
    ctx.metrics.inc_case(scenario, succeeded);
    ctx.logger.log_case_finished(scenario, case, succeeded);
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::CommonConfig;
    use perf_lib::FileSnapshotSource;
    use std::collections::HashMap;
    use std::path::Path;

    /// Context reading snapshots from `snapshots` and writing into `output`
    pub fn context(snapshots: &Path, output: &Path, scenarios: &str) -> RunContext {
        let yaml = format!("scenarios:\n{}", scenarios);
        let conf = snapshots.join("conf.yaml");
        std::fs::write(&conf, yaml).unwrap();
        let mut config = HarnessConfig::load_with_env(&conf, true, Some(HashMap::new())).unwrap();
        config.common = CommonConfig {
            output_root_path: output.to_path_buf(),
            snapshot_dir: snapshots.to_path_buf(),
            max_wait_seconds: 1,
            poll_interval_ms: 10,
            nodes_snapshot: "nodes".to_string(),
        };

        RunContext {
            config,
            source: Arc::new(FileSnapshotSource::new(snapshots)),
            output_dir: output.to_path_buf(),
            format: OutputFormat::Json,
            metrics: HarnessMetrics::new(),
            logger: StructuredLogger::new("test"),
        }
    }

    /// Task snapshot entry scheduled `scheduled_ms` after `2024-01-01T00:00:00Z`
    pub fn task_json(id: &str, node: &str, cpu: &str, scheduled_ms: i64) -> String {
        let base = chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap();
        let scheduled = base + chrono::Duration::milliseconds(scheduled_ms);
        let ready = scheduled + chrono::Duration::milliseconds(500);
        format!(
            r#"{{"id": "{}", "node": "{}", "createdAt": "{}", "requests": {{"cpu": "{}"}},
                "conditions": [{{"type": "PodScheduled", "time": "{}"}},
                               {{"type": "ContainersReady", "time": "{}"}}]}}"#,
            id,
            node,
            base.to_rfc3339(),
            cpu,
            scheduled.to_rfc3339(),
            ready.to_rfc3339()
        )
    }

    pub fn write_snapshot(dir: &Path, name: &str, tasks: &[String], nodes: &str) {
        let content = format!(r#"{{"tasks": [{}], "nodes": [{}]}}"#, tasks.join(","), nodes);
        std::fs::write(dir.join(format!("{}.json", name)), content).unwrap();
    }
}
