//! Scheduler benchmark library
//!
//! This crate provides the core functionality for:
//! - Analysis of captured task lifecycles (distributions, utilization, stage statistics)
//! - Resource quantity normalization
//! - Loading test case snapshots
//! - Verification results and observability of benchmark runs

pub mod analysis;
pub mod error;
pub mod models;
pub mod observability;
pub mod quantity;
pub mod results;
pub mod source;

pub use error::{AnalysisError, Result};
pub use models::*;
pub use observability::{HarnessMetrics, StructuredLogger};
pub use results::{Results, ScenarioResult, Verification, VerificationStatus};
pub use source::{wait_for_snapshot, FileSnapshotSource, SnapshotSource, WaitTimeout};
