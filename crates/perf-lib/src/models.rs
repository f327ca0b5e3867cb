//! Core data models for the analysis engine

use crate::error::{AnalysisError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Lifecycle stage of a task (pod condition type)
///
/// The declaration order is the presentation order used for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StageType {
    #[serde(rename = "PodCreated")]
    Created,
    #[serde(rename = "PodScheduled")]
    Scheduled,
    #[serde(rename = "PodStarted")]
    Started,
    #[serde(rename = "Initialized")]
    Initialized,
    #[serde(rename = "Ready")]
    Ready,
    #[serde(rename = "ContainersReady")]
    ContainersReady,
}

impl StageType {
    /// Stage whose transition marks a task as running
    pub const RUNNING: StageType = StageType::ContainersReady;

    /// All stages in lifecycle order
    pub fn ordered() -> [StageType; 6] {
        [
            StageType::Created,
            StageType::Scheduled,
            StageType::Started,
            StageType::Initialized,
            StageType::Ready,
            StageType::ContainersReady,
        ]
    }

    /// Wire label of the stage
    pub fn label(&self) -> &'static str {
        match self {
            StageType::Created => "PodCreated",
            StageType::Scheduled => "PodScheduled",
            StageType::Started => "PodStarted",
            StageType::Initialized => "Initialized",
            StageType::Ready => "Ready",
            StageType::ContainersReady => "ContainersReady",
        }
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StageType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        StageType::ordered()
            .into_iter()
            .find(|stage| stage.label() == s)
            .ok_or_else(|| format!("unknown stage type: {}", s))
    }
}

/// Resource quantities keyed by canonical resource name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resources(BTreeMap<String, u64>);

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantity of a resource, zero when absent
    pub fn get(&self, name: &str) -> u64 {
        self.0.get(name).copied().unwrap_or(0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Add every quantity of `other` into this set
    pub fn add_to(&mut self, other: &Resources) {
        for (name, quantity) in &other.0 {
            let entry = self.0.entry(name.clone()).or_insert(0);
            *entry = entry.saturating_add(*quantity);
        }
    }

    /// Subtract `other`, flooring every quantity at zero
    pub fn saturating_sub(&self, other: &Resources) -> Resources {
        let mut result = self.clone();
        for (name, quantity) in &other.0 {
            if let Some(entry) = result.0.get_mut(name) {
                *entry = entry.saturating_sub(*quantity);
            }
        }
        result
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(name, quantity)| (name.as_str(), *quantity))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, u64)> for Resources {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A single stage transition of a task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskCondition {
    pub stage: StageType,
    pub transition_at: DateTime<Utc>,
}

impl TaskCondition {
    pub fn new(stage: StageType, transition_at: DateTime<Utc>) -> Self {
        Self {
            stage,
            transition_at,
        }
    }
}

/// Captured lifecycle of one task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub id: String,
    /// Node the task was bound to, empty when unscheduled
    pub node_id: String,
    pub created_at: DateTime<Utc>,
    pub running_at: DateTime<Utc>,
    pub requests: Resources,
    pub conditions: Vec<TaskCondition>,
}

impl TaskRecord {
    /// Build a task record, deriving its running time from the
    /// `ContainersReady` transition
    ///
    /// Conditions are kept in lifecycle order regardless of input order.
    pub fn new(
        id: impl Into<String>,
        node_id: impl Into<String>,
        created_at: DateTime<Utc>,
        requests: Resources,
        mut conditions: Vec<TaskCondition>,
    ) -> Result<Self> {
        let id = id.into();
        conditions.sort_by_key(|cond| cond.stage);
        let running_at = conditions
            .iter()
            .find(|cond| cond.stage == StageType::RUNNING)
            .map(|cond| cond.transition_at)
            .ok_or_else(|| AnalysisError::MissingRunningStage {
                task_id: id.clone(),
                stage: StageType::RUNNING,
            })?;

        Ok(Self {
            id,
            node_id: node_id.into(),
            created_at,
            running_at,
            requests,
            conditions,
        })
    }

    /// Transition time of a stage, if the task reached it
    pub fn transition(&self, stage: StageType) -> Option<DateTime<Utc>> {
        self.conditions
            .iter()
            .find(|cond| cond.stage == stage)
            .map(|cond| cond.transition_at)
    }
}

/// Observation window of one test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaseWindow {
    /// Earliest task creation, the baseline for elapsed-time buckets
    pub begin: DateTime<Utc>,
    /// Latest running time among all tasks
    pub end: DateTime<Utc>,
}

impl CaseWindow {
    pub fn from_tasks(tasks: &[TaskRecord]) -> Result<Self> {
        let begin = tasks
            .iter()
            .map(|task| task.created_at)
            .min()
            .ok_or(AnalysisError::NoTasks)?;
        let end = tasks
            .iter()
            .map(|task| task.running_at)
            .max()
            .ok_or(AnalysisError::NoTasks)?;
        Ok(Self { begin, end })
    }
}

/// Node snapshot with the tasks currently attributed to it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub id: String,
    pub capacity: Resources,
    /// Load present on the node before the test began
    pub baseline: Resources,
    tasks: BTreeMap<String, TaskRecord>,
    tasks_total: Resources,
}

impl NodeRecord {
    pub fn new(id: impl Into<String>, capacity: Resources, baseline: Resources) -> Self {
        Self {
            id: id.into(),
            capacity,
            baseline,
            tasks: BTreeMap::new(),
            tasks_total: Resources::new(),
        }
    }

    pub fn add_task(&mut self, task: &TaskRecord) {
        if let Some(previous) = self.tasks.insert(task.id.clone(), task.clone()) {
            // re-attributing a task must not count its requests twice
            self.tasks_total = self.tasks_total.saturating_sub(&previous.requests);
        }
        self.tasks_total.add_to(&task.requests);
    }

    pub fn clear_tasks(&mut self) {
        self.tasks.clear();
        self.tasks_total = Resources::new();
    }

    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Baseline plus the requests of all attributed tasks
    pub fn allocated(&self) -> Resources {
        let mut allocated = self.baseline.clone();
        allocated.add_to(&self.tasks_total);
        allocated
    }

    pub fn summary(&self) -> String {
        format!(
            "nodeID={}, numTasks={}, capacity={:?}, allocated={:?}",
            self.id,
            self.tasks.len(),
            self.capacity,
            self.allocated()
        )
    }
}

/// Task count observed on one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeTaskCount {
    pub node_id: String,
    pub count: usize,
}

impl NodeTaskCount {
    pub fn new(node_id: impl Into<String>, count: usize) -> Self {
        Self {
            node_id: node_id.into(),
            count,
        }
    }
}

impl From<&NodeRecord> for NodeTaskCount {
    fn from(node: &NodeRecord) -> Self {
        Self::new(node.id.clone(), node.num_tasks())
    }
}

/// Distribution extremes of tasks over nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TasksDistributionInfo {
    pub least_count: usize,
    pub least_node_id: String,
    pub most_count: usize,
    pub most_node_id: String,
    pub average: f64,
    /// Nodes ordered by ascending task count
    pub sorted_nodes: Vec<NodeTaskCount>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn resources(pairs: &[(&str, u64)]) -> Resources {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_stage_labels_round_trip() {
        for stage in StageType::ordered() {
            assert_eq!(stage.label().parse::<StageType>().unwrap(), stage);
        }
        assert!("Pending".parse::<StageType>().is_err());
    }

    #[test]
    fn test_task_requires_running_stage() {
        let err = TaskRecord::new(
            "task-1",
            "node-1",
            at(0),
            Resources::new(),
            vec![TaskCondition::new(StageType::Scheduled, at(1))],
        )
        .unwrap_err();

        assert_eq!(
            err,
            AnalysisError::MissingRunningStage {
                task_id: "task-1".to_string(),
                stage: StageType::ContainersReady,
            }
        );
    }

    #[test]
    fn test_task_running_time_from_containers_ready() {
        let task = TaskRecord::new(
            "task-1",
            "node-1",
            at(0),
            Resources::new(),
            vec![
                TaskCondition::new(StageType::Scheduled, at(1)),
                TaskCondition::new(StageType::ContainersReady, at(4)),
            ],
        )
        .unwrap();

        assert_eq!(task.running_at, at(4));
        assert_eq!(task.transition(StageType::Scheduled), Some(at(1)));
        assert_eq!(task.transition(StageType::Ready), None);
    }

    #[test]
    fn test_case_window() {
        let mk = |id: &str, created: i64, running: i64| {
            TaskRecord::new(
                id,
                "",
                at(created),
                Resources::new(),
                vec![TaskCondition::new(StageType::ContainersReady, at(running))],
            )
            .unwrap()
        };
        let tasks = vec![mk("a", 3, 9), mk("b", 1, 5), mk("c", 2, 12)];

        let window = CaseWindow::from_tasks(&tasks).unwrap();
        assert_eq!(window.begin, at(1));
        assert_eq!(window.end, at(12));
        assert_eq!(CaseWindow::from_tasks(&[]), Err(AnalysisError::NoTasks));
    }

    #[test]
    fn test_node_allocation_and_clear() {
        let mut node = NodeRecord::new(
            "node-1",
            resources(&[("vcore", 4000)]),
            resources(&[("vcore", 500)]),
        );
        let task = TaskRecord::new(
            "task-1",
            "node-1",
            at(0),
            resources(&[("vcore", 1000)]),
            vec![TaskCondition::new(StageType::ContainersReady, at(1))],
        )
        .unwrap();

        node.add_task(&task);
        node.add_task(&task);
        assert_eq!(node.num_tasks(), 1);
        assert_eq!(node.allocated().get("vcore"), 1500);

        node.clear_tasks();
        assert_eq!(node.num_tasks(), 0);
        assert_eq!(node.allocated().get("vcore"), 500);
    }

    #[test]
    fn test_resources_arithmetic() {
        let mut a = resources(&[("vcore", 100), ("memory", 10)]);
        a.add_to(&resources(&[("vcore", 50), ("pods", 1)]));
        assert_eq!(a.get("vcore"), 150);
        assert_eq!(a.get("pods"), 1);
        assert_eq!(a.get("gpu"), 0);

        let b = a.saturating_sub(&resources(&[("memory", 40)]));
        assert_eq!(b.get("memory"), 0);
        assert_eq!(b.get("vcore"), 150);
    }
}
