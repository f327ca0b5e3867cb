//! Analysis engine for captured task lifecycles
//!
//! Converts task and node records of one test case into:
//! - Per-second distributions of a stage transition (throughput)
//! - Node utilization histograms over time (fairness)
//! - Per-stage elapsed-time and QPS statistics
//! - Task distribution extremes over nodes
//!
//! Everything here is synchronous and deterministic for a given input.

mod cumulative;
mod distribution;
mod stages;
mod summary;
mod utilization;

#[cfg(test)]
mod tests;

pub use cumulative::cumulative;
pub use distribution::{distribute, last_n, Distribution};
pub use stages::{Checkpoint, StageKey, StageReport, StageStat, StageStatistics};
pub use summary::summarize;
pub use utilization::{utilization_band, NodeAnalyzer, UtilizationHistogram, UTILIZATION_BANDS};
