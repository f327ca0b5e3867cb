//! Snapshot sources for captured test cases
//!
//! A snapshot is a JSON document holding the task lifecycles of one test
//! case and/or the node inventory of the cluster:
//!
//! ```json
//! {
//!   "tasks": [{ "id": "ns/pod-0", "node": "node-1", "createdAt": "...",
//!               "requests": { "cpu": "100m" },
//!               "conditions": [{ "type": "PodScheduled", "time": "..." }] }],
//!   "nodes": [{ "id": "node-1", "allocatable": { "cpu": "8" },
//!               "allocated": { "cpu": "500m" } }]
//! }
//! ```
//!
//! Quantities stay raw strings on the wire and are normalized on load.

use crate::models::{NodeRecord, StageType, TaskCondition, TaskRecord};
use crate::quantity::normalize_resources;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

/// Source of captured test case snapshots
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Whether the snapshot has been captured and can be loaded
    async fn is_ready(&self, name: &str) -> Result<bool>;

    /// Task records of a snapshot
    async fn load_tasks(&self, name: &str) -> Result<Vec<TaskRecord>>;

    /// Node records of a snapshot
    async fn load_nodes(&self, name: &str) -> Result<Vec<NodeRecord>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub tasks: Vec<RawTask>,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTask {
    pub id: String,
    #[serde(default)]
    pub node: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub requests: BTreeMap<String, String>,
    #[serde(default)]
    pub conditions: Vec<RawCondition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCondition {
    #[serde(rename = "type")]
    pub kind: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNode {
    pub id: String,
    #[serde(default)]
    pub allocatable: BTreeMap<String, String>,
    /// Requests already placed on the node before the test
    #[serde(default)]
    pub allocated: BTreeMap<String, String>,
}

impl RawTask {
    pub fn into_record(self) -> Result<TaskRecord> {
        let requests = normalize_resources(&self.requests)
            .with_context(|| format!("Invalid requests of task {}", self.id))?;

        let mut conditions = Vec::with_capacity(self.conditions.len());
        for cond in self.conditions {
            match cond.kind.parse::<StageType>() {
                Ok(stage) => conditions.push(TaskCondition::new(stage, cond.time)),
                Err(_) => debug!(
                    task_id = %self.id,
                    condition = %cond.kind,
                    "Ignoring unknown condition type"
                ),
            }
        }

        Ok(TaskRecord::new(
            self.id,
            self.node,
            self.created_at,
            requests,
            conditions,
        )?)
    }
}

impl RawNode {
    pub fn into_record(self) -> Result<NodeRecord> {
        let capacity = normalize_resources(&self.allocatable)
            .with_context(|| format!("Invalid allocatable resources of node {}", self.id))?;
        let baseline = normalize_resources(&self.allocated)
            .with_context(|| format!("Invalid allocated resources of node {}", self.id))?;
        Ok(NodeRecord::new(self.id, capacity, baseline))
    }
}

/// Reads snapshots from `<dir>/<name>.json`
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    dir: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    async fn read(&self, name: &str) -> Result<RawSnapshot> {
        let path = self.path_of(name);
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn is_ready(&self, name: &str) -> Result<bool> {
        let path = self.path_of(name);
        fs::try_exists(&path)
            .await
            .with_context(|| format!("Failed to stat snapshot {}", path.display()))
    }

    async fn load_tasks(&self, name: &str) -> Result<Vec<TaskRecord>> {
        let snapshot = self.read(name).await?;
        let tasks = snapshot
            .tasks
            .into_iter()
            .map(RawTask::into_record)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Invalid task records in snapshot {}", name))?;

        debug!(snapshot = %name, tasks = tasks.len(), "Loaded task records");
        Ok(tasks)
    }

    async fn load_nodes(&self, name: &str) -> Result<Vec<NodeRecord>> {
        let snapshot = self.read(name).await?;
        let nodes = snapshot
            .nodes
            .into_iter()
            .map(RawNode::into_record)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Invalid node records in snapshot {}", name))?;

        debug!(snapshot = %name, nodes = nodes.len(), "Loaded node records");
        Ok(nodes)
    }
}

/// A snapshot did not become ready in time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("timed out after {timeout:?} waiting for snapshot {snapshot}")]
pub struct WaitTimeout {
    pub snapshot: String,
    pub timeout: Duration,
}

/// Poll `source` every `interval` until `name` is ready
///
/// Returns the time spent waiting. Fails with [`WaitTimeout`] once `timeout`
/// has elapsed, and immediately when the source itself errors.
pub async fn wait_for_snapshot(
    source: &dyn SnapshotSource,
    name: &str,
    interval: Duration,
    timeout: Duration,
) -> Result<Duration> {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let poll = async {
        loop {
            ticker.tick().await;
            if source.is_ready(name).await? {
                return Ok::<_, anyhow::Error>(());
            }
            debug!(snapshot = %name, elapsed = ?started.elapsed(), "Snapshot not ready yet");
        }
    };

    match tokio::time::timeout(timeout, poll).await {
        Ok(result) => result.map(|()| started.elapsed()),
        Err(_) => Err(WaitTimeout {
            snapshot: name.to_string(),
            timeout,
        }
        .into()),
    }
}
