use serde::{Deserialize, Serialize};

use crate::domain::utils::id::ManifestId;

/// Validation certificate produced by the orchestrator after a manifest has been deployed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentCertificateDto {
    pub deployment_id: ManifestId,

    #[serde(default)]
    pub valid: bool,

    #[serde(default)]
    pub validation_logs: Vec<serde_json::Value>,
}
