//! Cross-component tests for the analysis engine
//!
//! These tests run synthetic cases through the full chain: case window,
//! distribution, utilization histogram, stage statistics and summary.

use super::*;
use crate::models::{
    CaseWindow, NodeRecord, NodeTaskCount, Resources, StageType, TaskCondition, TaskRecord,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn vcore(quantity: u64) -> Resources {
    [("vcore".to_string(), quantity)].into_iter().collect()
}

/// Deterministic pseudo-random case with `n` tasks spread over `nodes`
fn synthetic_case(n: usize, nodes: usize) -> Vec<TaskRecord> {
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move |bound: i64| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 33) % bound as u64) as i64
    };

    (0..n)
        .map(|i| {
            let created = next(2000);
            let scheduled = created + next(4000) - 300;
            let started = scheduled + next(1500);
            let ready = started + next(2500);
            let mut conditions = vec![
                TaskCondition::new(StageType::Created, t0() + Duration::milliseconds(created)),
                TaskCondition::new(StageType::Started, t0() + Duration::milliseconds(started)),
                TaskCondition::new(StageType::Ready, t0() + Duration::milliseconds(ready)),
                TaskCondition::new(
                    StageType::ContainersReady,
                    t0() + Duration::milliseconds(ready),
                ),
            ];
            // every seventh task never reports a scheduled condition
            if i % 7 != 0 {
                conditions.push(TaskCondition::new(
                    StageType::Scheduled,
                    t0() + Duration::milliseconds(scheduled),
                ));
            }
            TaskRecord::new(
                format!("task-{}", i),
                format!("node-{}", i % nodes),
                t0() + Duration::milliseconds(created),
                vcore(100 + next(400) as u64),
                conditions,
            )
            .unwrap()
        })
        .collect()
}

fn synthetic_nodes(nodes: usize) -> Vec<NodeRecord> {
    (0..nodes)
        .map(|i| NodeRecord::new(format!("node-{}", i), vcore(8000), vcore(250 * i as u64)))
        .collect()
}

#[test]
fn test_distribution_counts_every_valid_task() {
    let tasks = synthetic_case(200, 5);
    let window = CaseWindow::from_tasks(&tasks).unwrap();

    let dist = distribute(&tasks, StageType::Scheduled, window.begin);
    let expected = tasks
        .iter()
        .filter_map(|task| task.transition(StageType::Scheduled))
        .filter(|at| (*at - window.begin).num_milliseconds().div_euclid(1000) + 1 >= 0)
        .count();

    assert_eq!(dist.total(), expected);
    assert_eq!(dist.total() + dist.skipped, tasks.len());
    assert_ne!(dist.buckets.last().map(Vec::len), Some(0));
}

#[test]
fn test_cumulative_of_time_series_reaches_total() {
    let tasks = synthetic_case(120, 3);
    let window = CaseWindow::from_tasks(&tasks).unwrap();
    let dist = distribute(&tasks, StageType::Scheduled, window.begin);

    let curve = cumulative(&dist.time_series());
    assert_eq!(curve.len(), dist.buckets.len());
    assert!(curve.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(curve.last().copied(), Some(dist.total()));
}

#[test]
fn test_histogram_bands_cover_all_nodes() {
    let tasks = synthetic_case(150, 6);
    let window = CaseWindow::from_tasks(&tasks).unwrap();
    let analyzer = NodeAnalyzer::new(synthetic_nodes(6)).unwrap();
    let dist = distribute(&tasks, StageType::Scheduled, window.begin);

    let histogram = analyzer.histogram(&dist, "vcore").unwrap();
    for second in 0..dist.buckets.len() {
        let nodes: usize = histogram.iter().map(|band| band[second]).sum();
        assert_eq!(nodes, 6);
    }
}

#[test]
fn test_pipeline_is_deterministic() {
    let run = || {
        let tasks = synthetic_case(80, 4);
        let window = CaseWindow::from_tasks(&tasks).unwrap();
        let mut analyzer = NodeAnalyzer::new(synthetic_nodes(4)).unwrap();
        analyzer.analyze_tasks(&tasks);

        let dist = distribute(&tasks, StageType::Scheduled, window.begin);
        let histogram = analyzer.histogram(&dist, "vcore").unwrap();
        let report = StageStatistics::compute(&tasks, window.end).report(&StageType::ordered());
        let counts: Vec<NodeTaskCount> = analyzer
            .scheduled_nodes()
            .into_iter()
            .map(NodeTaskCount::from)
            .collect();
        let summary = summarize(&counts).unwrap();

        serde_json::to_string(&(dist.time_series(), histogram, report, summary)).unwrap()
    };

    assert_eq!(run(), run());
}

#[test]
fn test_last_n_running_order() {
    let tasks = synthetic_case(60, 2);

    let last = last_n(&tasks, 10);
    assert_eq!(last.len(), 10);
    assert!(last.windows(2).all(|w| w[0].running_at <= w[1].running_at));

    let latest = tasks.iter().map(|task| task.running_at).max().unwrap();
    assert_eq!(last.last().unwrap().running_at, latest);
}

#[test]
fn test_scheduled_throughput_example() {
    // three tasks scheduled in elapsed seconds 1, 1 and 3
    let mk = |id: &str, ms: i64| {
        TaskRecord::new(
            id,
            "node-0",
            t0(),
            vcore(10),
            vec![
                TaskCondition::new(StageType::Scheduled, t0() + Duration::milliseconds(ms)),
                TaskCondition::new(StageType::ContainersReady, t0() + Duration::seconds(5)),
            ],
        )
        .unwrap()
    };
    let tasks = vec![mk("a", 1000), mk("b", 1400), mk("c", 3000)];

    let dist = distribute(&tasks, StageType::Scheduled, t0());
    let series = dist.time_series();
    assert_eq!(&series[2..], &[2, 0, 1]);
    assert_eq!(&cumulative(&series)[2..], &[2, 2, 3]);
}
