use async_trait::async_trait;
use serde_json::Value;

use crate::api::orchestrator_dto::{certificate_dto::DeploymentCertificateDto, device_dto::DeviceDto, manifest_dto::ManifestDto, module_dto::ModuleDto};
use crate::api::supervisor_dto::execution_record_dto::ExecutionRecordDto;
use crate::domain::execution::params::ExecutionParams;
use crate::domain::utils::id::ManifestId;
use crate::error::Result;

/// The part of the orchestrator API the dashboard core depends on.
#[async_trait]
pub trait OrchestratorApi: Send + Sync {
    async fn devices(&self) -> Result<Vec<DeviceDto>>;

    async fn modules(&self) -> Result<Vec<ModuleDto>>;

    async fn manifests(&self) -> Result<Vec<ManifestDto>>;

    async fn deployment_certificates(&self) -> Result<Vec<DeploymentCertificateDto>>;

    async fn deploy_manifest(&self, manifest_id: &ManifestId) -> Result<Value>;

    /// Submits an execution. The body is returned untouched; it is either `{result}` or `{resultUrl}`.
    async fn execute(&self, manifest_id: &ManifestId, params: &ExecutionParams) -> Result<Value>;

    /// Plain GET of an absolute URL, used to follow `resultUrl`.
    async fn fetch_json(&self, url: &str) -> Result<Value>;
}

/// The part of the supervisor API the result aggregator depends on.
#[async_trait]
pub trait SupervisorApi: Send + Sync {
    async fn request_history(&self, supervisor_base: &str) -> Result<Vec<ExecutionRecordDto>>;
}
