
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use api_mock::{MockOrchestrator, MockSupervisor, manifest, record, supervisor_base};
use fleet_dashboard::api::orchestrator_dto::manifest_dto::ManifestDto;
use fleet_dashboard::domain::execution::aggregator::{AggregationEpoch, ResultAggregator};
use fleet_dashboard::domain::execution::params::{ExecutionParams, ParamValue};
use fleet_dashboard::domain::execution::submitter::ExecutionSubmitter;
use fleet_dashboard::domain::utils::id::ManifestId;
use fleet_dashboard::error::Error;

fn submitter(orchestrator: Arc<MockOrchestrator>, supervisor: MockSupervisor) -> ExecutionSubmitter<MockOrchestrator, MockSupervisor> {
    let aggregator = Arc::new(ResultAggregator::new(Arc::new(supervisor), AggregationEpoch::new(), Duration::from_secs(5)));
    ExecutionSubmitter::new(orchestrator, aggregator)
}

fn orchestrator_answering(body: serde_json::Value) -> Arc<MockOrchestrator> {
    let orchestrator = MockOrchestrator::new();
    *orchestrator.execute_response.lock().unwrap() = Some(body);
    Arc::new(orchestrator)
}

/// Manifest whose first step declares a required integer parameter `count`.
fn manifest_with_required_count() -> ManifestDto {
    let mut m1 = manifest("m1", "counter", &[("d1", "mod1", "f1")]);
    let endpoint = m1.full_manifest.get_mut("d1").unwrap().endpoints.get_mut("mod1-name").unwrap().get_mut("f1").unwrap();
    endpoint.request.parameters = serde_json::from_value(json!([{ "name": "count", "required": true, "schema": { "type": "integer" } }])).unwrap();
    m1
}

#[tokio::test]
async fn test_result_url_is_followed_and_unwrapped() {
    let orchestrator = orchestrator_answering(json!({ "resultUrl": "http://x/y" }));
    orchestrator.documents.lock().unwrap().insert("http://x/y".to_string(), json!({ "result": 42 }));
    let submitter = submitter(orchestrator.clone(), MockSupervisor::new());

    let outcome = submitter.submit(&manifest("m1", "pipeline", &[("d1", "mod1", "f1")]), &ExecutionParams::new()).await.unwrap();

    assert_eq!(outcome.result, json!(42));
    assert_eq!(outcome.manifest_id.as_str(), "m1");
    assert_eq!(orchestrator.execution_count(), 1);
}

#[tokio::test]
async fn test_inline_result_is_unwrapped_once() {
    let submitter = submitter(orchestrator_answering(json!({ "result": { "result": 1 } })), MockSupervisor::new());
    let outcome = submitter.submit(&manifest("m1", "pipeline", &[("d1", "mod1", "f1")]), &ExecutionParams::new()).await.unwrap();
    assert_eq!(outcome.result, json!({ "result": 1 }));

    let submitter = self::submitter(orchestrator_answering(json!("plain")), MockSupervisor::new());
    let outcome = submitter.submit(&manifest("m1", "pipeline", &[("d1", "mod1", "f1")]), &ExecutionParams::new()).await.unwrap();
    assert_eq!(outcome.result, json!("plain"));
}

#[tokio::test]
async fn test_successful_execution_triggers_aggregation() {
    let supervisor = MockSupervisor::new().with_history(&supervisor_base("d1"), vec![record("r1", "m1", "mod1-name", "f1", true, "2024-05-01T10:00:00Z", json!("done"))]);
    let submitter = submitter(orchestrator_answering(json!({ "result": "done" })), supervisor);

    let outcome = submitter.submit(&manifest("m1", "pipeline", &[("d1", "mod1", "f1")]), &ExecutionParams::new()).await.unwrap();

    let steps = outcome.steps.unwrap();
    assert_eq!(steps.manifest_id.as_str(), "m1");
    assert_eq!(steps.steps.get(0).unwrap().request_id.as_str(), "r1");
}

#[tokio::test]
async fn test_remote_failure_reports_execution_failed() {
    let orchestrator = Arc::new(MockOrchestrator::new());
    let submitter = submitter(orchestrator.clone(), MockSupervisor::new());

    let error = submitter.submit(&manifest("m1", "pipeline", &[("d1", "mod1", "f1")]), &ExecutionParams::new()).await.unwrap_err();

    assert!(matches!(error, Error::ExecutionFailed(_)));
    assert_eq!(error.user_message(), "Execution failed. Please try again.");
    assert_eq!(orchestrator.execution_count(), 1);
}

#[tokio::test]
async fn test_unreachable_result_url_reports_execution_failed() {
    let submitter = submitter(orchestrator_answering(json!({ "resultUrl": "http://x/missing" })), MockSupervisor::new());
    let error = submitter.submit(&manifest("m1", "pipeline", &[("d1", "mod1", "f1")]), &ExecutionParams::new()).await.unwrap_err();
    assert!(matches!(error, Error::ExecutionFailed(_)));
}

#[tokio::test]
async fn test_missing_selection_is_rejected_before_any_request() {
    let orchestrator = orchestrator_answering(json!({ "result": 1 }));
    let submitter = submitter(orchestrator.clone(), MockSupervisor::new());

    let unselected = manifest("", "nothing", &[]);
    let error = submitter.submit(&unselected, &ExecutionParams::new()).await.unwrap_err();

    assert!(matches!(error, Error::ValidationError(_)));
    assert_eq!(error.user_message(), "Please select a manifest to execute.");
    assert_eq!(orchestrator.execution_count(), 0);
}

#[tokio::test]
async fn test_required_parameter_is_validated_before_any_request() {
    let orchestrator = orchestrator_answering(json!({ "result": 1 }));
    let submitter = submitter(orchestrator.clone(), MockSupervisor::new());
    let m1 = manifest_with_required_count();

    let error = submitter.submit(&m1, &ExecutionParams::new()).await.unwrap_err();
    assert_eq!(error.user_message(), "Parameter 'count' is required.");

    let blank = ExecutionParams::from([("count".to_string(), ParamValue::Text("  ".to_string()))]);
    assert!(submitter.submit(&m1, &blank).await.is_err());
    assert_eq!(orchestrator.execution_count(), 0);

    let filled = ExecutionParams::from([("count".to_string(), ParamValue::Integer(3))]);
    submitter.submit(&m1, &filled).await.unwrap();

    let executions = orchestrator.executions.lock().unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].1.get("count"), Some(&ParamValue::Integer(3)));
}

#[tokio::test]
async fn test_deploy_requires_a_manifest() {
    let orchestrator = Arc::new(MockOrchestrator::new());
    let submitter = submitter(orchestrator.clone(), MockSupervisor::new());

    let error = submitter.deploy(&ManifestId::new("")).await.unwrap_err();
    assert_eq!(error.user_message(), "Please select a manifest to deploy.");

    submitter.deploy(&ManifestId::new("m1")).await.unwrap();
    assert_eq!(orchestrator.deployments.lock().unwrap().as_slice(), &[ManifestId::new("m1")]);
}
