use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};

use crate::api::endpoint::SupervisorEndpoint;
use crate::api::supervisor_dto::execution_record_dto::ExecutionRecordDto;
use crate::config::DashboardConfig;
use crate::domain::client::api_trait::SupervisorApi;
use crate::domain::utils::id::RequestId;
use crate::error::{Error, Result};

/// REST client for the per-device supervisors. The supervisor base is passed per call
/// because every step of a manifest may run on a different device.
#[derive(Debug, Clone)]
pub struct SupervisorClient {
    client: Client,
    history_timeout: Duration,
}

impl SupervisorClient {
    pub fn new(config: &DashboardConfig) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(SupervisorClient { client, history_timeout: config.history_timeout() })
    }

    async fn get(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).timeout(self.history_timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("Supervisor request '{}' answered {}: {}", url, status, body);
            return Err(Error::RemoteStatusError { status, url: url.to_string(), body });
        }
        Ok(response)
    }

    pub async fn request_history_entry(&self, supervisor_base: &str, request_id: &RequestId) -> Result<ExecutionRecordDto> {
        let url = SupervisorEndpoint::RequestHistoryEntry(request_id.clone()).url(supervisor_base);
        let bytes = self.get(&url).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Raw output artifact written by a module, e.g. image bytes.
    pub async fn module_result(&self, supervisor_base: &str, module_name: &str, filename: &str) -> Result<Bytes> {
        let endpoint = SupervisorEndpoint::ModuleResult { module_name: module_name.to_string(), filename: filename.to_string() };
        let url = endpoint.url(supervisor_base);
        Ok(self.get(&url).await?.bytes().await?)
    }
}

#[async_trait]
impl SupervisorApi for SupervisorClient {
    async fn request_history(&self, supervisor_base: &str) -> Result<Vec<ExecutionRecordDto>> {
        let url = SupervisorEndpoint::RequestHistory.url(supervisor_base);
        let bytes = self.get(&url).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
