//! Time-bucket distribution of stage transitions
//!
//! A task whose transition happened `d` seconds after the baseline lands in
//! bucket `floor(d) + 1`. Bucket 0 absorbs transitions up to one second
//! before the baseline (baseline timestamps are truncated to the second);
//! anything earlier is treated as clock skew and skipped.

use crate::models::{StageType, TaskRecord};
use chrono::{DateTime, Utc};
use tracing::warn;

/// Tasks grouped by the whole second their stage transition fell in
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution<'a> {
    pub stage: StageType,
    /// Index is elapsed whole seconds from the baseline, the last bucket is
    /// never empty
    pub buckets: Vec<Vec<&'a TaskRecord>>,
    /// Records left out because of a missing transition or clock skew
    pub skipped: usize,
}

impl<'a> Distribution<'a> {
    /// Number of tasks per bucket
    pub fn time_series(&self) -> Vec<usize> {
        self.buckets.iter().map(Vec::len).collect()
    }

    /// Number of tasks placed in any bucket
    pub fn total(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Bucket `tasks` by the time they reached `stage`, relative to `baseline`
pub fn distribute<'a>(
    tasks: &'a [TaskRecord],
    stage: StageType,
    baseline: DateTime<Utc>,
) -> Distribution<'a> {
    let mut placed: Vec<(usize, &'a TaskRecord)> = Vec::with_capacity(tasks.len());
    let mut skipped = 0;

    for task in tasks {
        let Some(transition_at) = task.transition(stage) else {
            warn!(
                task_id = %task.id,
                stage = %stage,
                "Skipping task without stage transition"
            );
            skipped += 1;
            continue;
        };

        // floor of the exact offset, sub-second parts of negative offsets included
        let elapsed = transition_at - baseline;
        let seconds = elapsed.num_seconds() - i64::from(elapsed.subsec_nanos() < 0) + 1;
        if seconds < 0 {
            warn!(
                task_id = %task.id,
                stage = %stage,
                baseline = %baseline,
                transition_at = %transition_at,
                "Skipping task with transition before baseline"
            );
            skipped += 1;
            continue;
        }

        placed.push((seconds as usize, task));
    }

    // sized to the latest observed transition, so no empty tail can remain
    let len = placed.iter().map(|(index, _)| index + 1).max().unwrap_or(0);
    let mut buckets: Vec<Vec<&'a TaskRecord>> = vec![Vec::new(); len];
    for (index, task) in placed {
        buckets[index].push(task);
    }

    Distribution {
        stage,
        buckets,
        skipped,
    }
}

/// The `n` tasks that became running last, in running order
///
/// Ties on running time keep their input order.
pub fn last_n(tasks: &[TaskRecord], n: usize) -> Vec<&TaskRecord> {
    let mut sorted: Vec<&TaskRecord> = tasks.iter().collect();
    sorted.sort_by_key(|task| task.running_at);
    let start = sorted.len().saturating_sub(n);
    sorted.split_off(start)
}
