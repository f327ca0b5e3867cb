use crate::error::{AnalysisError, Result};
use crate::models::{NodeTaskCount, TasksDistributionInfo};

/// Least/most loaded nodes and the average task count per node
///
/// Nodes are stable-sorted by task count, so among equal counts the one
/// that came first in `node_counts` is reported.
pub fn summarize(node_counts: &[NodeTaskCount]) -> Result<TasksDistributionInfo> {
    let mut sorted = node_counts.to_vec();
    sorted.sort_by_key(|node| node.count);

    let (least, most) = match (sorted.first(), sorted.last()) {
        (Some(least), Some(most)) => (least.clone(), most.clone()),
        _ => return Err(AnalysisError::NoNodes),
    };
    let total: usize = sorted.iter().map(|node| node.count).sum();

    Ok(TasksDistributionInfo {
        least_count: least.count,
        least_node_id: least.node_id,
        most_count: most.count,
        most_node_id: most.node_id,
        average: total as f64 / sorted.len() as f64,
        sorted_nodes: sorted,
    })
}
