//! Observability infrastructure for benchmark runs
//!
//! Provides:
//! - Prometheus metrics (cases by outcome, skipped task records, analysis and wait latency)
//! - Structured logging of run and case events with tracing

use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Encoder, Histogram,
    IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for analysis latency (in seconds)
const ANALYSIS_BUCKETS: &[f64] = &[0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

/// Histogram buckets for snapshot wait time (in seconds)
const WAIT_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<HarnessMetricsInner> = OnceLock::new();

struct HarnessMetricsInner {
    cases_total: IntCounterVec,
    skipped_tasks_total: IntCounterVec,
    analysis_latency_seconds: Histogram,
    snapshot_wait_seconds: Histogram,
    nodes_tracked: IntGauge,
}

impl HarnessMetricsInner {
    fn new() -> Self {
        Self {
            cases_total: register_int_counter_vec!(
                "perf_tools_cases_total",
                "Test cases run, by scenario and outcome",
                &["scenario", "status"]
            )
            .expect("Failed to register cases_total"),

            skipped_tasks_total: register_int_counter_vec!(
                "perf_tools_skipped_tasks_total",
                "Task records left out of a distribution, by stage",
                &["stage"]
            )
            .expect("Failed to register skipped_tasks_total"),

            analysis_latency_seconds: register_histogram!(
                "perf_tools_analysis_latency_seconds",
                "Time spent analyzing one test case",
                ANALYSIS_BUCKETS.to_vec()
            )
            .expect("Failed to register analysis_latency_seconds"),

            snapshot_wait_seconds: register_histogram!(
                "perf_tools_snapshot_wait_seconds",
                "Time spent waiting for a case snapshot to become available",
                WAIT_BUCKETS.to_vec()
            )
            .expect("Failed to register snapshot_wait_seconds"),

            nodes_tracked: register_int_gauge!(
                "perf_tools_nodes_tracked",
                "Number of nodes in the current node snapshot"
            )
            .expect("Failed to register nodes_tracked"),
        }
    }
}

/// Harness metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct HarnessMetrics {
    _private: (),
}

impl Default for HarnessMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl HarnessMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(HarnessMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &HarnessMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_case(&self, scenario: &str, succeeded: bool) {
        let status = if succeeded { "succeeded" } else { "failed" };
        self.inner()
            .cases_total
            .with_label_values(&[scenario, status])
            .inc();
    }

    pub fn add_skipped_tasks(&self, stage: &str, count: usize) {
        if count > 0 {
            self.inner()
                .skipped_tasks_total
                .with_label_values(&[stage])
                .inc_by(count as u64);
        }
    }

    pub fn observe_analysis_latency(&self, duration_secs: f64) {
        self.inner().analysis_latency_seconds.observe(duration_secs);
    }

    pub fn observe_snapshot_wait(&self, duration_secs: f64) {
        self.inner().snapshot_wait_seconds.observe(duration_secs);
    }

    pub fn set_nodes_tracked(&self, count: usize) {
        self.inner().nodes_tracked.set(count as i64);
    }

    /// Render all registered metrics in the Prometheus text format
    pub fn gather_text(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Structured logger for run events
///
/// Emits consistently shaped `event = ...` records for runs, cases and
/// analysis summaries.
#[derive(Clone)]
pub struct StructuredLogger {
    run_id: String,
}

impl StructuredLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    pub fn log_startup(&self, version: &str, scenarios: &[String]) {
        info!(
            event = "run_started",
            run = %self.run_id,
            version = %version,
            scenarios = ?scenarios,
            "Benchmark run started"
        );
    }

    pub fn log_case_started(&self, scenario: &str, case: &str, description: &str) {
        info!(
            event = "case_started",
            run = %self.run_id,
            scenario = %scenario,
            case = %case,
            description = %description,
            "Test case started"
        );
    }

    pub fn log_case_finished(&self, scenario: &str, case: &str, succeeded: bool) {
        if succeeded {
            info!(
                event = "case_finished",
                run = %self.run_id,
                scenario = %scenario,
                case = %case,
                status = "succeeded",
                "Test case finished"
            );
        } else {
            warn!(
                event = "case_finished",
                run = %self.run_id,
                scenario = %scenario,
                case = %case,
                status = "failed",
                "Test case failed"
            );
        }
    }

    pub fn log_distribution(
        &self,
        scenario: &str,
        scheduler: &str,
        seconds: usize,
        total: usize,
        skipped: usize,
    ) {
        info!(
            event = "distribution_computed",
            run = %self.run_id,
            scenario = %scenario,
            scheduler = %scheduler,
            seconds = seconds,
            tasks = total,
            skipped = skipped,
            "Computed scheduled time distribution"
        );
    }

    pub fn log_shutdown(&self, failed: bool) {
        info!(
            event = "run_finished",
            run = %self.run_id,
            failed = failed,
            "Benchmark run finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_metrics() {
        let metrics = HarnessMetrics::new();

        metrics.inc_case("throughput", true);
        metrics.inc_case("throughput", false);
        metrics.add_skipped_tasks("PodScheduled", 3);
        metrics.add_skipped_tasks("PodScheduled", 0);
        metrics.observe_analysis_latency(0.002);
        metrics.observe_snapshot_wait(1.5);
        metrics.set_nodes_tracked(12);

        let text = metrics.gather_text().unwrap();
        assert!(text.contains("perf_tools_cases_total"));
        assert!(text.contains("perf_tools_nodes_tracked 12"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("run-1");
        assert_eq!(logger.run_id, "run-1");
    }
}
