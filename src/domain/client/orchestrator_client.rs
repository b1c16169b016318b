use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::api::endpoint::{CardKind, OrchestratorEndpoint};
use crate::api::orchestrator_dto::{
    certificate_dto::DeploymentCertificateDto,
    device_dto::DeviceDto,
    manifest_dto::{ManifestDto, NewManifestDto, SequenceStepDto},
    module_dto::{FunctionDescriptionDto, ModuleDto},
};
use crate::config::DashboardConfig;
use crate::domain::client::api_trait::OrchestratorApi;
use crate::domain::execution::params::ExecutionParams;
use crate::domain::utils::id::{ManifestId, ModuleId};
use crate::error::{Error, Result};

/// REST client for the orchestrator. One method per route; no retries.
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    client: Client,
    base_url: String,
}

impl OrchestratorClient {
    pub fn new(config: &DashboardConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(OrchestratorClient { client, base_url: config.orchestrator_base().to_string() })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &OrchestratorEndpoint) -> String {
        endpoint.url(&self.base_url)
    }

    /// Sends `request` and turns any non-2xx status into `Error::RemoteStatusError`.
    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            log::error!("Request to '{}' could not be delivered: {}", url, e);
            Error::TransportError(e)
        })?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        log::error!("Orchestrator request was unsuccessful.\nUrl: <<{}>>\nResponse-Status-Code: <<{}>>\nResponse-Body: <<{}>>", url, status, body);
        Err(Error::RemoteStatusError { status, url: url.to_string(), body })
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: OrchestratorEndpoint) -> Result<T> {
        let url = self.url(&endpoint);
        log::debug!("GET {}", url);
        let response = self.send(self.client.get(&url), &url).await?;
        Self::read_json(response).await
    }

    async fn delete(&self, endpoint: OrchestratorEndpoint) -> Result<Value> {
        let url = self.url(&endpoint);
        log::debug!("DELETE {}", url);
        let response = self.send(self.client.delete(&url), &url).await?;
        Self::read_json(response).await
    }

    pub async fn delete_devices(&self) -> Result<Value> {
        self.delete(OrchestratorEndpoint::Devices).await
    }

    pub async fn reset_device_discovery(&self) -> Result<Value> {
        let url = self.url(&OrchestratorEndpoint::DeviceDiscoveryReset);
        let response = self.send(self.client.post(&url), &url).await?;
        Self::read_json(response).await
    }

    /// Uploads a module binary under `name`.
    pub async fn create_module(&self, name: &str, filename: &str, bytes: Vec<u8>) -> Result<Value> {
        let url = self.url(&OrchestratorEndpoint::Modules);
        let form = Form::new().text("name", name.to_string()).part("module", Part::bytes(bytes).file_name(filename.to_string()));

        log::info!("Uploading module '{}' ({}).", name, filename);
        let response = self.send(self.client.post(&url).multipart(form), &url).await?;
        Self::read_json(response).await
    }

    /// Single module. The orchestrator answers with a one-element array.
    pub async fn module(&self, module_id: &ModuleId) -> Result<Option<ModuleDto>> {
        let modules: Vec<ModuleDto> = self.get_json(OrchestratorEndpoint::Module(module_id.clone())).await?;
        Ok(modules.into_iter().next())
    }

    pub async fn delete_module(&self, module_id: &ModuleId) -> Result<Value> {
        self.delete(OrchestratorEndpoint::Module(module_id.clone())).await
    }

    pub async fn delete_all_modules(&self) -> Result<Value> {
        self.delete(OrchestratorEndpoint::Modules).await
    }

    /// Sends the exported-function descriptions of a module. `files` are mount contents keyed by mount name.
    pub async fn describe_module(&self, module_id: &ModuleId, descriptions: &[FunctionDescriptionDto], files: Vec<(String, Vec<u8>)>) -> Result<Value> {
        let url = self.url(&OrchestratorEndpoint::ModuleDescription(module_id.clone()));

        let mut form = Form::new();
        for description in descriptions {
            for (key, value) in description.form_fields() {
                form = form.text(key, value);
            }
        }
        for (mount_name, bytes) in files {
            form = form.part(mount_name.clone(), Part::bytes(bytes).file_name(mount_name));
        }

        let response = self.send(self.client.post(&url).multipart(form), &url).await?;
        Self::read_json(response).await
    }

    pub async fn create_manifest(&self, name: &str, sequence: Vec<SequenceStepDto>) -> Result<Value> {
        if name.trim().is_empty() {
            return Err(Error::ValidationError("Please give the manifest a name.".to_string()));
        }
        if sequence.is_empty() {
            return Err(Error::ValidationError("A manifest needs at least one step.".to_string()));
        }

        let url = self.url(&OrchestratorEndpoint::Manifests);
        let body = NewManifestDto { name: name.to_string(), sequence };
        let response = self.send(self.client.post(&url).json(&body), &url).await?;
        Self::read_json(response).await
    }

    pub async fn delete_manifest(&self, manifest_id: &ManifestId) -> Result<Value> {
        self.delete(OrchestratorEndpoint::Manifest(manifest_id.clone())).await
    }

    pub async fn delete_all_manifests(&self) -> Result<Value> {
        self.delete(OrchestratorEndpoint::Manifests).await
    }

    pub async fn cards(&self, kind: CardKind) -> Result<Value> {
        self.get_json(OrchestratorEndpoint::Cards(kind)).await
    }

    pub async fn post_cards(&self, kind: CardKind, body: &Value) -> Result<Value> {
        let url = self.url(&OrchestratorEndpoint::Cards(kind));
        let response = self.send(self.client.post(&url).json(body), &url).await?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl OrchestratorApi for OrchestratorClient {
    async fn devices(&self) -> Result<Vec<DeviceDto>> {
        self.get_json(OrchestratorEndpoint::Devices).await
    }

    async fn modules(&self) -> Result<Vec<ModuleDto>> {
        self.get_json(OrchestratorEndpoint::Modules).await
    }

    async fn manifests(&self) -> Result<Vec<ManifestDto>> {
        self.get_json(OrchestratorEndpoint::Manifests).await
    }

    async fn deployment_certificates(&self) -> Result<Vec<DeploymentCertificateDto>> {
        self.get_json(OrchestratorEndpoint::DeploymentCertificates).await
    }

    async fn deploy_manifest(&self, manifest_id: &ManifestId) -> Result<Value> {
        let url = self.url(&OrchestratorEndpoint::Manifest(manifest_id.clone()));
        let response = self.send(self.client.post(&url).json(&json!({ "id": manifest_id })), &url).await?;
        Self::read_json(response).await
    }

    async fn execute(&self, manifest_id: &ManifestId, params: &ExecutionParams) -> Result<Value> {
        let url = self.url(&OrchestratorEndpoint::Execute(manifest_id.clone()));
        let form = params.iter().fold(Form::new(), |form, (name, value)| form.text(name.clone(), value.to_string()));

        let response = self.send(self.client.post(&url).multipart(form), &url).await?;
        Self::read_json(response).await
    }

    async fn fetch_json(&self, url: &str) -> Result<Value> {
        let response = self.send(self.client.get(url), url).await?;
        Self::read_json(response).await
    }
}
