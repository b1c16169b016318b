
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing_test::traced_test;

use api_mock::{MockSupervisor, manifest, record, supervisor_base};
use fleet_dashboard::domain::execution::aggregator::{AggregationEpoch, ResultAggregator};

fn aggregator(supervisor: MockSupervisor) -> (Arc<MockSupervisor>, ResultAggregator<MockSupervisor>) {
    let supervisor = Arc::new(supervisor);
    let aggregator = ResultAggregator::new(supervisor.clone(), AggregationEpoch::new(), Duration::from_secs(5));
    (supervisor, aggregator)
}

#[tokio::test]
async fn test_latest_successful_record_wins() {
    let m1 = manifest("m1", "pipeline", &[("d1", "mod1", "f1")]);
    let (_, aggregator) = aggregator(MockSupervisor::new().with_history(
        &supervisor_base("d1"),
        vec![
            record("r1", "m1", "mod1-name", "f1", true, "2024-05-01T10:00:00Z", json!(1)),
            record("r2", "m1", "mod1-name", "f1", true, "2024-05-01T10:05:00Z", json!(2)),
            record("r3", "m1", "mod1-name", "f1", false, "2024-05-01T10:10:00Z", json!(3)),
        ],
    ));

    let results = aggregator.run(&m1).await.unwrap();
    let step = results.steps.get(0).unwrap();

    assert_eq!(step.request_id.as_str(), "r2");
    assert_eq!(step.result, json!(2));
    assert_eq!(step.url, supervisor_base("d1"));
}

#[tokio::test]
async fn test_records_of_other_deployments_are_ignored() {
    let m1 = manifest("m1", "pipeline", &[("d1", "mod1", "f1")]);
    let (_, aggregator) = aggregator(MockSupervisor::new().with_history(
        &supervisor_base("d1"),
        vec![record("r1", "m2", "mod1-name", "f1", true, "2024-05-01T10:00:00Z", json!(1)), record("r2", "m1", "mod1-name", "other", true, "2024-05-01T10:00:00Z", json!(2))],
    ));

    let results = aggregator.run(&m1).await.unwrap();
    assert_eq!(results.steps.len(), 1);
    assert!(results.steps.get(0).is_none());
}

#[tokio::test]
#[traced_test]
async fn test_failing_step_does_not_affect_others() {
    let m1 = manifest("m1", "pipeline", &[("d1", "mod1", "f1"), ("d2", "mod1", "f2"), ("d3", "mod1", "f3")]);
    let (supervisor, aggregator) = aggregator(
        MockSupervisor::new()
            .with_history(&supervisor_base("d1"), vec![record("r1", "m1", "mod1-name", "f1", true, "2024-05-01T10:00:00Z", json!("a"))])
            .with_history(&supervisor_base("d2"), vec![record("r2", "m1", "mod1-name", "f2", true, "2024-05-01T10:00:01Z", json!("b"))])
            .failing(&supervisor_base("d3")),
    );

    let results = aggregator.run(&m1).await.unwrap();

    assert_eq!(supervisor.calls(), 3);
    assert_eq!(results.steps.len(), 3);
    assert_eq!(results.steps.get(0).unwrap().result, json!("a"));
    assert_eq!(results.steps.get(1).unwrap().result, json!("b"));
    assert!(results.steps.get(2).is_none());
    assert_eq!(results.steps.resolved_count(), 2);
    assert!(logs_contain("Could not read step history"));
}

#[tokio::test]
async fn test_step_without_supervisor_is_skipped() {
    let mut m1 = manifest("m1", "pipeline", &[("d1", "mod1", "f1"), ("d2", "mod1", "f2")]);
    m1.full_manifest.remove("d2");
    let (supervisor, aggregator) = aggregator(MockSupervisor::new().with_history(&supervisor_base("d1"), vec![record("r1", "m1", "mod1-name", "f1", true, "2024-05-01T10:00:00Z", json!(7))]));

    let results = aggregator.run(&m1).await.unwrap();

    assert_eq!(supervisor.calls(), 1);
    assert_eq!(results.steps.get(0).unwrap().result, json!(7));
    assert!(results.steps.get(1).is_none());
}

#[tokio::test]
async fn test_aggregation_is_idempotent() {
    let m1 = manifest("m1", "pipeline", &[("d1", "mod1", "f1"), ("d2", "mod1", "f2")]);
    let (_, aggregator) = aggregator(
        MockSupervisor::new()
            .with_history(&supervisor_base("d1"), vec![record("r1", "m1", "mod1-name", "f1", true, "2024-05-01T10:00:00Z", json!(1))])
            .with_history(&supervisor_base("d2"), vec![record("r2", "m1", "mod1-name", "f2", true, "2024-05-01 10:00:00", json!(2))]),
    );

    let first = aggregator.run(&m1).await.unwrap();
    let second = aggregator.run(&m1).await.unwrap();

    assert_eq!(first.steps, second.steps);
    assert!(second.token > first.token);
    assert_eq!(aggregator.latest(), Some(second));
}

#[tokio::test(start_paused = true)]
async fn test_slow_supervisor_times_out_per_step() {
    let m1 = manifest("m1", "pipeline", &[("d1", "mod1", "f1"), ("d2", "mod1", "f2")]);
    let (_, aggregator) = aggregator(
        MockSupervisor::new()
            .with_history(&supervisor_base("d1"), vec![record("r1", "m1", "mod1-name", "f1", true, "2024-05-01T10:00:00Z", json!(1))])
            .with_history(&supervisor_base("d2"), vec![record("r2", "m1", "mod1-name", "f2", true, "2024-05-01T10:00:00Z", json!(2))])
            .delayed(&supervisor_base("d2"), Duration::from_secs(60)),
    );

    let started = tokio::time::Instant::now();
    let results = aggregator.run(&m1).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(results.steps.get(0).unwrap().result, json!(1));
    assert!(results.steps.get(1).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stale_run_does_not_overwrite_newer_results() {
    let slow = manifest("m1", "slow", &[("d1", "mod1", "f1")]);
    let fast = manifest("m2", "fast", &[("d2", "mod1", "f1")]);
    let (_, aggregator) = aggregator(
        MockSupervisor::new()
            .with_history(&supervisor_base("d1"), vec![record("r1", "m1", "mod1-name", "f1", true, "2024-05-01T10:00:00Z", json!("old"))])
            .with_history(&supervisor_base("d2"), vec![record("r2", "m2", "mod1-name", "f1", true, "2024-05-01T10:00:00Z", json!("new"))])
            .delayed(&supervisor_base("d1"), Duration::from_secs(3)),
    );

    let (stale, fresh) = tokio::join!(aggregator.run(&slow), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        aggregator.run(&fast).await
    });

    assert!(stale.is_none());
    let fresh = fresh.unwrap();
    assert_eq!(fresh.manifest_id.as_str(), "m2");
    assert_eq!(aggregator.latest().unwrap().manifest_id.as_str(), "m2");
    assert_eq!(aggregator.latest().unwrap().steps.get(0).unwrap().result, json!("new"));
}

#[tokio::test]
async fn test_invalidate_discards_published_results() {
    let m1 = manifest("m1", "pipeline", &[("d1", "mod1", "f1")]);
    let (_, aggregator) = aggregator(MockSupervisor::new());

    assert!(aggregator.run(&m1).await.is_some());
    aggregator.epoch().invalidate();
    assert!(aggregator.latest().is_none());
}
