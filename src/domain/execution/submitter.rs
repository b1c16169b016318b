use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::api::orchestrator_dto::manifest_dto::ManifestDto;
use crate::domain::client::api_trait::{OrchestratorApi, SupervisorApi};
use crate::domain::execution::aggregator::{ResultAggregator, StepResults};
use crate::domain::execution::params::{ExecutionParams, validate_parameters};
use crate::domain::manifest::manifest_view::ManifestView;
use crate::domain::utils::id::ManifestId;
use crate::error::{Error, Result};

/// What a successful execution produced.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub manifest_id: ManifestId,

    /// Final value of the whole pipeline, unwrapped from `{result}` / `{resultUrl}`.
    pub result: Value,

    /// Per-step results gathered right after the execution. `None` if a newer aggregation
    /// superseded this one before it finished.
    pub steps: Option<StepResults>,
}

/// Unwraps one `{"result": ...}` level if present.
pub fn extract_final(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("result") => map.remove("result").unwrap_or(Value::Null),
        other => other,
    }
}

/// Returns the `resultUrl` of an execution response, if it carries one.
pub fn result_url(body: &Value) -> Option<&str> {
    body.get("resultUrl").and_then(Value::as_str).filter(|url| !url.is_empty())
}

/// Submits executions and deployments to the orchestrator. Single attempt, no retries.
pub struct ExecutionSubmitter<O: OrchestratorApi, S: SupervisorApi> {
    orchestrator: Arc<O>,
    aggregator: Arc<ResultAggregator<S>>,
}

impl<O: OrchestratorApi, S: SupervisorApi> ExecutionSubmitter<O, S> {
    pub fn new(orchestrator: Arc<O>, aggregator: Arc<ResultAggregator<S>>) -> Self {
        ExecutionSubmitter { orchestrator, aggregator }
    }

    /// Follows `resultUrl` if the response has one, otherwise unwraps `result` in place.
    async fn normalize(&self, body: Value) -> Result<Value> {
        if let Some(url) = result_url(&body) {
            log::info!("Execution result is delivered indirectly, fetching '{}'.", url);
            let fetched = self.orchestrator.fetch_json(url).await.map_err(|e| Error::ExecutionFailed(format!("could not fetch result from '{}': {}", url, e)))?;
            return Ok(extract_final(fetched));
        }
        Ok(extract_final(body))
    }

    /// Executes `manifest` with `params` and then gathers its per-step results.
    ///
    /// Input is validated before anything is sent. Network and remote failures become
    /// `Error::ExecutionFailed`. The aggregation token is taken before the execute call, so a
    /// selection change while the call is in flight makes the follow-up aggregation stale.
    pub async fn submit(&self, manifest: &ManifestDto, params: &ExecutionParams) -> Result<ExecutionOutcome> {
        if manifest.id.is_empty() {
            return Err(Error::ValidationError("Please select a manifest to execute.".to_string()));
        }
        validate_parameters(&ManifestView::new(manifest).execution_parameters(), params)?;
        let token = self.aggregator.epoch().begin();

        log::info!("Executing manifest '{}' ({}) with {} parameter(s).", manifest.name, manifest.id, params.len());
        let body = self.orchestrator.execute(&manifest.id, params).await.map_err(|e| {
            log::error!("Execution of manifest '{}' failed: {}", manifest.id, e);
            Error::ExecutionFailed(e.to_string())
        })?;

        let result = self.normalize(body).await?;
        log::info!("Manifest '{}' executed successfully.", manifest.id);

        let steps = self.aggregator.run_with_token(token, manifest).await;
        Ok(ExecutionOutcome { manifest_id: manifest.id.clone(), result, steps })
    }

    /// Deploys a manifest; the orchestrator validates it and issues a certificate.
    pub async fn deploy(&self, manifest_id: &ManifestId) -> Result<Value> {
        if manifest_id.is_empty() {
            return Err(Error::ValidationError("Please select a manifest to deploy.".to_string()));
        }

        log::info!("Deploying manifest '{}'.", manifest_id);
        self.orchestrator.deploy_manifest(manifest_id).await.map_err(|e| {
            log::error!("Deployment of manifest '{}' failed: {}", manifest_id, e);
            e
        })
    }
}
