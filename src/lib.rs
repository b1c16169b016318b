use std::sync::Arc;

use crate::config::DashboardConfig;
use crate::domain::client::orchestrator_client::OrchestratorClient;
use crate::domain::client::supervisor_client::SupervisorClient;
use crate::domain::dashboard::session::DashboardSession;
use crate::error::Result;

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

pub type LiveSession = DashboardSession<OrchestratorClient, SupervisorClient>;

/// Validates `config`, builds the HTTP clients and mounts a dashboard session against the
/// configured orchestrator. Must be called inside a tokio runtime.
pub fn open_session(config: &DashboardConfig) -> Result<LiveSession> {
    config.validate()?;
    let orchestrator = Arc::new(OrchestratorClient::new(config)?);
    let supervisor = Arc::new(SupervisorClient::new(config)?);
    log::info!("HTTP clients ready for '{}'.", config.orchestrator_base());

    DashboardSession::mount(orchestrator, supervisor, config)
}
