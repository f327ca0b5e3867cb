//! Node resource utilization over time
//!
//! Tracks the nodes of a test run and builds, for every second of a
//! distribution, the number of nodes in each 10%-wide utilization band
//! (`[0%,10%)`, `[10%,20%)`, ..., `[90%,100%]`).

use super::Distribution;
use crate::error::{AnalysisError, Result};
use crate::models::{NodeRecord, Resources, TaskRecord};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Number of utilization bands
pub const UTILIZATION_BANDS: usize = 10;

/// One time series of node counts per utilization band
pub type UtilizationHistogram = [Vec<usize>; UTILIZATION_BANDS];

/// Band index of an allocated/capacity ratio
///
/// Exactly 100% falls in the top band, as does over-allocation. Returns
/// `None` when the capacity is zero and no ratio exists.
pub fn utilization_band(allocated: u64, capacity: u64) -> Option<usize> {
    if capacity == 0 {
        return None;
    }
    let ratio = (allocated as u128 * UTILIZATION_BANDS as u128) / capacity as u128;
    Some((ratio as usize).min(UTILIZATION_BANDS - 1))
}

/// Owns the node records of a test run
///
/// Nodes are created once from a snapshot; their attributed tasks are
/// cleared between cases instead of reloading capacity.
#[derive(Debug, Clone)]
pub struct NodeAnalyzer {
    nodes: BTreeMap<String, NodeRecord>,
}

impl NodeAnalyzer {
    pub fn new(nodes: Vec<NodeRecord>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(AnalysisError::NoNodes);
        }
        let nodes = nodes
            .into_iter()
            .map(|node| (node.id.clone(), node))
            .collect();
        Ok(Self { nodes })
    }

    /// Detach every task from every node
    pub fn clear_tasks(&mut self) {
        for node in self.nodes.values_mut() {
            node.clear_tasks();
        }
    }

    /// Attribute tasks to the nodes they were bound to
    ///
    /// Returns the number of tasks attributed. Unscheduled tasks and tasks
    /// on nodes outside the snapshot are ignored.
    pub fn analyze_tasks(&mut self, tasks: &[TaskRecord]) -> usize {
        let mut attributed = 0;
        for task in tasks {
            if let Some(node) = self.nodes.get_mut(&task.node_id) {
                node.add_task(task);
                attributed += 1;
            }
        }
        attributed
    }

    /// All tracked nodes, ordered by id
    pub fn allocatable_nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.values()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: &str) -> Option<&NodeRecord> {
        self.nodes.get(id)
    }

    /// Nodes with at least one attributed task, ordered by id
    pub fn scheduled_nodes(&self) -> Vec<&NodeRecord> {
        self.nodes
            .values()
            .filter(|node| node.num_tasks() > 0)
            .collect()
    }

    /// Capacity left on all nodes combined
    pub fn total_allocatable(&self) -> Resources {
        let mut total = Resources::new();
        for node in self.nodes.values() {
            total.add_to(&node.capacity.saturating_sub(&node.allocated()));
        }
        total
    }

    /// Utilization band counts for every second of `distribution`
    ///
    /// Allocation starts from each node's baseline and only grows: tasks do
    /// not release resources within the observation window.
    pub fn histogram(
        &self,
        distribution: &Distribution<'_>,
        resource: &str,
    ) -> Result<UtilizationHistogram> {
        let mut usage: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
        for node in self.nodes.values() {
            let capacity = node.capacity.get(resource);
            if capacity == 0 {
                return Err(AnalysisError::ZeroCapacity {
                    node_id: node.id.clone(),
                    resource: resource.to_string(),
                });
            }
            usage.insert(node.id.as_str(), (capacity, node.baseline.get(resource)));
        }

        let mut histogram: UtilizationHistogram = Default::default();
        for (second, tasks) in distribution.buckets.iter().enumerate() {
            for task in tasks {
                match usage.get_mut(task.node_id.as_str()) {
                    Some((_, allocated)) => {
                        *allocated = allocated.saturating_add(task.requests.get(resource));
                    }
                    None => {
                        warn!(
                            task_id = %task.id,
                            node_id = %task.node_id,
                            second = second,
                            "Skipping task bound to an untracked node"
                        );
                    }
                }
            }

            let mut counts = [0usize; UTILIZATION_BANDS];
            for (node_id, (capacity, allocated)) in &usage {
                if allocated > capacity {
                    debug!(
                        node_id = %node_id,
                        resource = %resource,
                        allocated = allocated,
                        capacity = capacity,
                        "Node allocation exceeds capacity"
                    );
                }
                // capacity was checked above
                let band = utilization_band(*allocated, *capacity).unwrap_or(UTILIZATION_BANDS - 1);
                counts[band] += 1;
            }
            for (band, count) in counts.into_iter().enumerate() {
                histogram[band].push(count);
            }
        }

        Ok(histogram)
    }
}
