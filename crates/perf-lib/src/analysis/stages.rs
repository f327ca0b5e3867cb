//! Elapsed-time and QPS statistics between lifecycle checkpoints
//!
//! Every task is walked as a chain of checkpoints: its creation (`Start`),
//! each recorded stage transition in lifecycle order, and the last running
//! time of the whole case (`Finish`). Each consecutive pair is an interval
//! keyed by `(from, to)`.

use crate::models::{StageType, TaskRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A point in a task's lifecycle chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Checkpoint {
    Start,
    Stage(StageType),
    Finish,
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checkpoint::Start => f.write_str("Start"),
            Checkpoint::Stage(stage) => write!(f, "{}", stage),
            Checkpoint::Finish => f.write_str("Finish"),
        }
    }
}

/// Interval between two consecutive checkpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StageKey {
    pub from: Checkpoint,
    pub to: Checkpoint,
}

impl StageKey {
    pub fn new(from: Checkpoint, to: Checkpoint) -> Self {
        Self { from, to }
    }
}

/// Aggregated statistics of one interval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageStat {
    pub key: StageKey,
    /// Number of tasks that went through this interval
    pub count: usize,
    pub total_ms: i64,
    pub average_ms: f64,
    /// Share of this interval in the sum of all interval totals (0-100)
    pub percentage: f64,
    /// Highest number of arrivals at `to` within one second
    pub max_qps: usize,
    /// Mean arrivals per second over seconds with at least one arrival
    pub avg_qps: f64,
    /// Arrivals per second, from the earliest arrival on
    pub samples: Vec<usize>,
}

/// Statistics split into the two tables reported per case
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    /// Every interval in key order
    pub time_stats: Vec<StageStat>,
    /// One entry per requested stage that was reached, in request order
    pub qps_stats: Vec<StageStat>,
}

#[derive(Default)]
struct Interval {
    count: usize,
    total_ms: i64,
    arrivals: Vec<DateTime<Utc>>,
}

/// Per-interval statistics of a set of tasks
#[derive(Debug, Clone, PartialEq)]
pub struct StageStatistics {
    stats: BTreeMap<StageKey, StageStat>,
    tasks: usize,
}

impl StageStatistics {
    /// Walk every task from creation through its stages to `end`
    pub fn compute(tasks: &[TaskRecord], end: DateTime<Utc>) -> Self {
        let mut intervals: BTreeMap<StageKey, Interval> = BTreeMap::new();
        let mut record = |from: Checkpoint,
                          from_at: DateTime<Utc>,
                          to: Checkpoint,
                          to_at: DateTime<Utc>| {
            let interval = intervals.entry(StageKey::new(from, to)).or_default();
            interval.count += 1;
            interval.total_ms += (to_at - from_at).num_milliseconds();
            interval.arrivals.push(to_at);
        };

        for task in tasks {
            let mut previous = (Checkpoint::Start, task.created_at);
            for cond in &task.conditions {
                let current = (Checkpoint::Stage(cond.stage), cond.transition_at);
                record(previous.0, previous.1, current.0, current.1);
                previous = current;
            }
            record(previous.0, previous.1, Checkpoint::Finish, end);
        }

        let grand_total_ms: i64 = intervals.values().map(|i| i.total_ms).sum();
        let stats = intervals
            .into_iter()
            .map(|(key, interval)| {
                let samples = per_second(&interval.arrivals);
                let max_qps = samples.iter().copied().max().unwrap_or(0);
                let active = samples.iter().filter(|count| **count > 0).count();
                let avg_qps = if active > 0 {
                    interval.count as f64 / active as f64
                } else {
                    0.0
                };
                let percentage = if grand_total_ms != 0 {
                    interval.total_ms as f64 / grand_total_ms as f64 * 100.0
                } else {
                    0.0
                };

                let stat = StageStat {
                    key,
                    count: interval.count,
                    total_ms: interval.total_ms,
                    average_ms: interval.total_ms as f64 / interval.count as f64,
                    percentage,
                    max_qps,
                    avg_qps,
                    samples,
                };
                (key, stat)
            })
            .collect();

        Self {
            stats,
            tasks: tasks.len(),
        }
    }

    /// Number of tasks the statistics were computed from
    pub fn count(&self) -> usize {
        self.tasks
    }

    pub fn get(&self, key: &StageKey) -> Option<&StageStat> {
        self.stats.get(key)
    }

    /// All intervals in key order
    pub fn time_stats(&self) -> impl Iterator<Item = &StageStat> {
        self.stats.values()
    }

    /// Interval ending at `stage`, whatever checkpoint it came from
    ///
    /// When tasks reached the stage from different checkpoints, the interval
    /// with the earliest origin wins.
    pub fn qps_for(&self, stage: StageType) -> Option<&StageStat> {
        self.stats
            .values()
            .find(|stat| stat.key.to == Checkpoint::Stage(stage))
    }

    /// QPS entries for `stages` in the given order, unreached stages omitted
    pub fn ordered_qps(&self, stages: &[StageType]) -> Vec<&StageStat> {
        stages.iter().filter_map(|stage| self.qps_for(*stage)).collect()
    }

    pub fn report(&self, stages: &[StageType]) -> StageReport {
        StageReport {
            time_stats: self.time_stats().cloned().collect(),
            qps_stats: self.ordered_qps(stages).into_iter().cloned().collect(),
        }
    }
}

/// Count timestamps per whole second from the earliest one
fn per_second(arrivals: &[DateTime<Utc>]) -> Vec<usize> {
    let Some(earliest) = arrivals.iter().min() else {
        return Vec::new();
    };
    let indexes: Vec<usize> = arrivals
        .iter()
        .map(|at| (*at - *earliest).num_milliseconds().div_euclid(1000) as usize)
        .collect();
    let len = indexes.iter().max().map_or(0, |max| max + 1);

    let mut samples = vec![0; len];
    for index in indexes {
        samples[index] += 1;
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Resources, TaskCondition};
    use chrono::{Duration, TimeZone};

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn task(id: &str, created: i64, scheduled: Option<i64>, running: i64) -> TaskRecord {
        let mut conditions = vec![TaskCondition::new(StageType::ContainersReady, at(running))];
        if let Some(ms) = scheduled {
            conditions.push(TaskCondition::new(StageType::Scheduled, at(ms)));
        }
        TaskRecord::new(id, "node-1", at(created), Resources::new(), conditions).unwrap()
    }

    fn key(from: Checkpoint, to: Checkpoint) -> StageKey {
        StageKey::new(from, to)
    }

    #[test]
    fn test_time_statistics() {
        let tasks = vec![task("a", 0, Some(1000), 3000), task("b", 0, Some(3000), 4000)];

        let stats = StageStatistics::compute(&tasks, at(4000));
        assert_eq!(stats.count(), 2);

        let scheduled = Checkpoint::Stage(StageType::Scheduled);
        let ready = Checkpoint::Stage(StageType::ContainersReady);

        let s = stats.get(&key(Checkpoint::Start, scheduled)).unwrap();
        assert_eq!(s.count, 2);
        assert_eq!(s.total_ms, 4000);
        assert_eq!(s.average_ms, 2000.0);

        let r = stats.get(&key(scheduled, ready)).unwrap();
        assert_eq!(r.total_ms, 3000);

        let f = stats.get(&key(ready, Checkpoint::Finish)).unwrap();
        assert_eq!(f.total_ms, 1000);

        // totals: 4000 + 3000 + 1000
        assert!((s.percentage - 50.0).abs() < 1e-9);
        let sum: f64 = stats.time_stats().map(|stat| stat.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_qps_samples_from_earliest_arrival() {
        let tasks = vec![
            task("a", 0, Some(1100), 5000),
            task("b", 0, Some(1900), 5000),
            task("c", 0, Some(2150), 5000),
            task("d", 0, Some(4200), 5000),
        ];

        let stats = StageStatistics::compute(&tasks, at(5000));
        let qps = stats.qps_for(StageType::Scheduled).unwrap();

        assert_eq!(qps.samples, vec![2, 1, 0, 1]);
        assert_eq!(qps.max_qps, 2);
        assert!((qps.avg_qps - 4.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_qps_lookup_ignores_origin_and_keeps_order() {
        // "b" skips the scheduled stage, so ContainersReady is reached from two origins
        let tasks = vec![task("a", 0, Some(1000), 2000), task("b", 0, None, 2500)];

        let stats = StageStatistics::compute(&tasks, at(2500));
        let ready = stats.qps_for(StageType::ContainersReady).unwrap();
        assert_eq!(ready.key.from, Checkpoint::Start);

        let ordered: Vec<Checkpoint> = stats
            .ordered_qps(&[StageType::ContainersReady, StageType::Ready, StageType::Scheduled])
            .iter()
            .map(|stat| stat.key.to)
            .collect();
        assert_eq!(
            ordered,
            vec![
                Checkpoint::Stage(StageType::ContainersReady),
                Checkpoint::Stage(StageType::Scheduled),
            ]
        );
    }

    #[test]
    fn test_report_is_deterministic() {
        let tasks = vec![
            task("a", 0, Some(900), 2000),
            task("b", 100, Some(1500), 2100),
            task("c", 200, None, 2600),
        ];
        let order = StageType::ordered();

        let first = StageStatistics::compute(&tasks, at(2600)).report(&order);
        let second = StageStatistics::compute(&tasks, at(2600)).report(&order);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(first.qps_stats.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let stats = StageStatistics::compute(&[], at(0));
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.time_stats().count(), 0);
        assert!(stats.qps_for(StageType::Scheduled).is_none());
    }
}
