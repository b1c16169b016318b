use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;

use crate::api::orchestrator_dto::manifest_dto::ManifestDto;
use crate::api::supervisor_dto::execution_record_dto::ExecutionRecordDto;
use crate::domain::client::api_trait::SupervisorApi;
use crate::domain::manifest::manifest_view::ManifestView;
use crate::domain::manifest::step::ResolvedStep;
use crate::domain::utils::id::{ManifestId, RequestId};
use crate::error::{Error, Result};

/// Latest successful result of one step.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub request_id: RequestId,
    pub result: Value,

    /// Supervisor the record was read from.
    pub url: String,
}

/// Results indexed by step. `None` marks a step without a usable result.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct StepResultMap(pub Vec<Option<StepResult>>);

impl StepResultMap {
    pub fn get(&self, index: usize) -> Option<&StepResult> {
        self.0.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn resolved_count(&self) -> usize {
        self.0.iter().filter(|entry| entry.is_some()).count()
    }
}

/// A committed aggregation run.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepResults {
    pub manifest_id: ManifestId,
    pub token: u64,
    pub steps: StepResultMap,
}

#[derive(Debug, Default)]
struct EpochState {
    latest: u64,
    published: Option<StepResults>,
}

/// Generation counter guarding the published step results.
///
/// Each run takes a token with [`AggregationEpoch::begin`]. A run may only publish while its
/// token is still the latest one issued, so a slow run for an old selection can not
/// overwrite the results of a newer one.
#[derive(Debug, Clone, Default)]
pub struct AggregationEpoch {
    inner: Arc<Mutex<EpochState>>,
}

impl AggregationEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, EpochState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn begin(&self) -> u64 {
        let mut state = self.state();
        state.latest += 1;
        state.latest
    }

    /// Publishes `results` if `results.token` is still the latest token.
    ///
    /// # Returns
    /// `true` if the results were published.
    pub fn commit(&self, results: StepResults) -> bool {
        let mut state = self.state();
        if results.token != state.latest {
            return false;
        }
        state.published = Some(results);
        true
    }

    /// Makes every outstanding run stale and drops the published results.
    pub fn invalidate(&self) {
        let mut state = self.state();
        state.latest += 1;
        state.published = None;
    }

    pub fn latest_token(&self) -> u64 {
        self.state().latest
    }

    pub fn published(&self) -> Option<StepResults> {
        self.state().published.clone()
    }
}

/// Picks the most recent successful record for `(deployment, module, function)`.
/// Records with an unreadable queue time sort as oldest.
pub fn select_latest<'a>(records: &'a [ExecutionRecordDto], manifest_id: &ManifestId, module_name: &str, function_name: &str) -> Option<&'a ExecutionRecordDto> {
    records
        .iter()
        .filter(|record| record.success && record.deployment_id == manifest_id.as_str() && record.module_name == module_name && record.function_name == function_name)
        .max_by_key(|record| record.queued_at())
}

/// Fans out one `request-history` fetch per manifest step and joins them into a [`StepResultMap`].
pub struct ResultAggregator<S: SupervisorApi> {
    supervisor: Arc<S>,
    epoch: AggregationEpoch,
    history_timeout: Duration,
}

impl<S: SupervisorApi> ResultAggregator<S> {
    pub fn new(supervisor: Arc<S>, epoch: AggregationEpoch, history_timeout: Duration) -> Self {
        ResultAggregator { supervisor, epoch, history_timeout }
    }

    pub fn epoch(&self) -> &AggregationEpoch {
        &self.epoch
    }

    async fn fetch_step(&self, manifest_id: &ManifestId, step: &ResolvedStep) -> Result<Option<StepResult>> {
        let Some(base) = step.supervisor_base.as_deref() else {
            tracing::debug!(step = step.index, module = %step.module_name, "No supervisor endpoint for step.");
            return Ok(None);
        };

        let records = tokio::time::timeout(self.history_timeout, self.supervisor.request_history(base))
            .await
            .map_err(|_| Error::TimeoutError(format!("request history of '{}' timed out", base)))??;

        Ok(select_latest(&records, manifest_id, &step.module_name, &step.function_name).map(|record| StepResult {
            request_id: record.request_id.clone(),
            result: record.result.clone(),
            url: base.to_string(),
        }))
    }

    /// Collects the latest result of every step without publishing anything.
    ///
    /// All fetches run concurrently and the join waits for every one of them. A failing step
    /// is logged and recorded as `None`; it never affects the other steps.
    pub async fn collect(&self, manifest: &ManifestDto) -> StepResultMap {
        let view = ManifestView::new(manifest);
        let steps = view.resolved_steps();

        let fetches = steps.iter().map(|step| async move {
            match self.fetch_step(&manifest.id, step).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(step = step.index, module = %step.module_name, function = %step.function_name, "Could not read step history: {}", e);
                    None
                }
            }
        });

        StepResultMap(join_all(fetches).await)
    }

    /// Runs one aggregation for `manifest` and publishes it if no newer run started meanwhile.
    ///
    /// # Returns
    /// The results if they were published, `None` if the run went stale.
    pub async fn run(&self, manifest: &ManifestDto) -> Option<StepResults> {
        let token = self.epoch.begin();
        self.run_with_token(token, manifest).await
    }

    /// Like [`ResultAggregator::run`], but with a token taken earlier from
    /// [`AggregationEpoch::begin`]. Any selection change or run begun after `token` was
    /// issued makes this run stale.
    pub async fn run_with_token(&self, token: u64, manifest: &ManifestDto) -> Option<StepResults> {
        let steps = self.collect(manifest).await;

        tracing::info!(manifest = %manifest.id, token, resolved = steps.resolved_count(), total = steps.len(), "Aggregated step results.");

        let results = StepResults { manifest_id: manifest.id.clone(), token, steps };
        if self.epoch.commit(results.clone()) {
            Some(results)
        } else {
            tracing::info!(manifest = %manifest.id, token, "Discarding stale step results.");
            None
        }
    }

    pub fn latest(&self) -> Option<StepResults> {
        self.epoch.published()
    }
}
