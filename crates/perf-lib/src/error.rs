//! Typed errors raised by the analysis engine

use crate::models::StageType;
use thiserror::Error;

/// Errors returned by analysis operations
///
/// Per-record problems (a task missing the measured stage, clock skew) are
/// not errors: they are logged and the record is left out. Everything here
/// invalidates the whole computation it was raised from.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// A task never reached the stage that defines its running time
    #[error("task {task_id} has no {stage} transition, cannot establish its running time")]
    MissingRunningStage { task_id: String, stage: StageType },

    /// A case was analyzed without any task records
    #[error("no task records to analyze")]
    NoTasks,

    /// An operation requiring at least one node got an empty node set
    #[error("node set is empty")]
    NoNodes,

    /// Utilization was requested against a node without capacity for the resource
    #[error("node {node_id} has zero capacity for resource {resource}")]
    ZeroCapacity { node_id: String, resource: String },

    /// A resource quantity string could not be parsed
    #[error("invalid resource quantity {value:?}: {reason}")]
    InvalidQuantity { value: String, reason: String },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
