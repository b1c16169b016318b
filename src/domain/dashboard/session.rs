use std::sync::{Arc, RwLock};

use serde_json::Value;
use tokio::sync::watch;

use crate::api::orchestrator_dto::{certificate_dto::DeploymentCertificateDto, manifest_dto::ManifestDto};
use crate::config::DashboardConfig;
use crate::domain::client::api_trait::{OrchestratorApi, SupervisorApi};
use crate::domain::dashboard::poller::DevicePoller;
use crate::domain::dashboard::state::{DashboardState, SharedState, read_state, write_state};
use crate::domain::execution::aggregator::{AggregationEpoch, ResultAggregator, StepResults};
use crate::domain::execution::params::ExecutionParams;
use crate::domain::execution::submitter::{ExecutionOutcome, ExecutionSubmitter};
use crate::domain::graph::device_graph::{DeviceGraph, GraphUpdate};
use crate::domain::graph::layout::Position;
use crate::domain::manifest::manifest_view::ManifestView;
use crate::domain::utils::id::{DeviceId, EdgeId, ManifestId};
use crate::error::{Error, Result};

/// One mounted dashboard view.
///
/// Owns the fetched lists, the manifest selection, the device graph and the device poller.
/// Created by [`DashboardSession::mount`] and torn down by [`DashboardSession::unmount`];
/// dropping the session stops the poller as well. Every change to the state bumps a revision
/// counter that observers can follow through [`DashboardSession::subscribe`].
pub struct DashboardSession<O: OrchestratorApi + 'static, S: SupervisorApi + 'static> {
    config: DashboardConfig,
    orchestrator: Arc<O>,
    state: SharedState,
    aggregator: Arc<ResultAggregator<S>>,
    submitter: ExecutionSubmitter<O, S>,
    revision: Arc<watch::Sender<u64>>,
    poller: Option<DevicePoller>,
}

impl<O: OrchestratorApi + 'static, S: SupervisorApi + 'static> DashboardSession<O, S> {
    /// Validates `config`, creates the session and starts polling devices. Must be called
    /// inside a tokio runtime.
    pub fn mount(orchestrator: Arc<O>, supervisor: Arc<S>, config: &DashboardConfig) -> Result<Self> {
        config.validate()?;
        let mut session = Self::detached(orchestrator, supervisor, config);
        session.poller = Some(DevicePoller::spawn(session.orchestrator.clone(), session.state.clone(), config.device_poll_interval(), session.revision.clone()));
        log::info!("Dashboard session mounted for '{}'.", config.orchestrator_base());
        Ok(session)
    }

    /// Creates the session without a device poller. Devices are then only fetched through
    /// [`DashboardSession::refresh_devices`].
    pub fn detached(orchestrator: Arc<O>, supervisor: Arc<S>, config: &DashboardConfig) -> Self {
        let aggregator = Arc::new(ResultAggregator::new(supervisor, AggregationEpoch::new(), config.history_timeout()));
        let (revision, _) = watch::channel(0);

        DashboardSession {
            config: config.clone(),
            submitter: ExecutionSubmitter::new(orchestrator.clone(), aggregator.clone()),
            orchestrator,
            state: Arc::new(RwLock::new(DashboardState::new(config))),
            aggregator,
            revision: Arc::new(revision),
            poller: None,
        }
    }

    /// Stops the device poller and waits for it. A fetch in flight is abandoned.
    pub async fn unmount(mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop().await;
        }
        self.aggregator.epoch().invalidate();
        log::info!("Dashboard session unmounted.");
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(DevicePoller::is_running)
    }

    /// Receiver of the state revision counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    /// Runs `f` against a consistent view of the current state.
    pub fn with_state<R>(&self, f: impl FnOnce(&DashboardState) -> R) -> R {
        f(&read_state(&self.state))
    }

    pub fn graph_snapshot(&self) -> DeviceGraph {
        self.with_state(|state| state.graph.clone())
    }

    pub fn selected(&self) -> Option<ManifestId> {
        self.with_state(|state| state.selected.clone())
    }

    pub fn certificate(&self, manifest_id: &ManifestId) -> Option<DeploymentCertificateDto> {
        self.with_state(|state| state.certificates.get(manifest_id).cloned())
    }

    /// Published step results, as long as they belong to the selected manifest.
    pub fn step_results(&self) -> Option<StepResults> {
        let selected = self.selected()?;
        self.aggregator.latest().filter(|results| results.manifest_id == selected)
    }

    /// Fetches devices once, outside of the poll schedule.
    pub async fn refresh_devices(&self) -> Result<GraphUpdate> {
        let devices = self.orchestrator.devices().await?;
        let update = write_state(&self.state).apply_devices(devices);
        if update != GraphUpdate::Unchanged {
            self.bump();
        }
        Ok(update)
    }

    pub async fn refresh_modules(&self) -> Result<usize> {
        let modules = self.orchestrator.modules().await?;
        let count = modules.len();
        write_state(&self.state).apply_modules(modules);
        self.bump();
        Ok(count)
    }

    /// Fetches manifests. If the selected manifest is gone, the selection is dropped.
    pub async fn refresh_manifests(&self) -> Result<usize> {
        let manifests = self.orchestrator.manifests().await?;
        let count = manifests.len();
        let selection_lost = write_state(&self.state).apply_manifests(manifests);
        if selection_lost {
            log::warn!("Selected manifest no longer exists, clearing the selection.");
            self.select_manifest(None)?;
        }
        self.bump();
        Ok(count)
    }

    pub async fn refresh_certificates(&self) -> Result<usize> {
        let certificates = self.orchestrator.deployment_certificates().await?;
        let count = certificates.len();
        write_state(&self.state).apply_certificates(certificates);
        self.bump();
        Ok(count)
    }

    /// Refreshes modules, manifests and certificates concurrently. Every successful fetch is
    /// applied; the first failure is returned.
    pub async fn refresh_catalog(&self) -> Result<()> {
        let (modules, manifests, certificates) = tokio::join!(self.refresh_modules(), self.refresh_manifests(), self.refresh_certificates());
        let mut first_error = None;
        for (what, outcome) in [("modules", modules), ("manifests", manifests), ("certificates", certificates)] {
            match outcome {
                Ok(count) => log::debug!("Fetched {} {}.", count, what),
                Err(e) => {
                    log::error!("Fetching {} failed: {}", what, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Changes the selected manifest.
    ///
    /// Any aggregation still running for the previous selection goes stale. Selecting a
    /// manifest draws its execution path on the graph; deselecting keeps the last drawn path
    /// unless `clearOverlayOnDeselect` is set.
    pub fn select_manifest(&self, manifest_id: Option<&ManifestId>) -> Result<()> {
        {
            let mut state = write_state(&self.state);
            match manifest_id {
                Some(id) => {
                    let manifest = state.manifest(id).cloned().ok_or_else(|| Error::ValidationError(format!("Unknown manifest '{}'.", id)))?;
                    self.aggregator.epoch().invalidate();
                    state.selected = Some(id.clone());
                    state.graph.show_manifest(&ManifestView::new(&manifest));
                }
                None => {
                    self.aggregator.epoch().invalidate();
                    state.selected = None;
                    if self.config.clear_overlay_on_deselect {
                        state.graph.clear_overlay();
                    }
                }
            }
        }
        self.bump();
        Ok(())
    }

    fn selected_manifest(&self) -> Option<ManifestDto> {
        self.with_state(|state| state.selected_manifest().cloned())
    }

    /// Executes the selected manifest and gathers its step results.
    pub async fn execute(&self, params: &ExecutionParams) -> Result<ExecutionOutcome> {
        let manifest = self.selected_manifest().ok_or_else(|| Error::ValidationError("Please select a manifest to execute.".to_string()))?;
        let outcome = self.submitter.submit(&manifest, params).await;
        self.bump();
        outcome
    }

    /// Re-reads the step results of the selected manifest.
    ///
    /// # Returns
    /// `None` without a selection or if the selection changed while the results were fetched.
    pub async fn aggregate_selected(&self) -> Option<StepResults> {
        let manifest = self.selected_manifest()?;
        let results = self.aggregator.run(&manifest).await;
        if results.is_some() {
            self.bump();
        }
        results
    }

    /// Deploys a manifest and then re-reads the certificates.
    pub async fn deploy(&self, manifest_id: &ManifestId) -> Result<Value> {
        let response = self.submitter.deploy(manifest_id).await?;
        if let Err(e) = self.refresh_certificates().await {
            log::warn!("Could not refresh certificates after deploying '{}': {}", manifest_id, e);
        }
        Ok(response)
    }

    pub fn move_node(&self, id: &DeviceId, position: Position) -> bool {
        let moved = write_state(&self.state).graph.move_node(id, position);
        if moved {
            self.bump();
        }
        moved
    }

    pub fn connect(&self, source: &DeviceId, target: &DeviceId) -> Result<EdgeId> {
        let edge = write_state(&self.state).graph.connect(source, target)?;
        self.bump();
        Ok(edge)
    }

    pub fn highlight_step(&self, index: Option<usize>) {
        write_state(&self.state).graph.highlight_step(index);
        self.bump();
    }
}
