use std::fmt;
use std::str::FromStr;

use crate::domain::utils::id::{ManifestId, ModuleId, RequestId};
use crate::error::Error;

/// Routes of the orchestrator REST API consumed by the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEndpoint {
    Devices,
    DeviceDiscoveryReset,
    Modules,
    Module(ModuleId),
    ModuleDescription(ModuleId),
    Manifests,
    Manifest(ManifestId),
    Execute(ManifestId),
    DeploymentCertificates,
    Cards(CardKind),
}

impl OrchestratorEndpoint {
    pub fn path(&self) -> String {
        match self {
            Self::Devices => "/file/device".to_string(),
            Self::DeviceDiscoveryReset => "/file/device/discovery/reset".to_string(),
            Self::Modules => "/file/module".to_string(),
            Self::Module(id) => format!("/file/module/{}", id),
            Self::ModuleDescription(id) => format!("/file/module/{}/upload", id),
            Self::Manifests => "/file/manifest".to_string(),
            Self::Manifest(id) => format!("/file/manifest/{}", id),
            Self::Execute(id) => format!("/execute/{}", id),
            Self::DeploymentCertificates => "/deploymentCertificates".to_string(),
            Self::Cards(kind) => format!("/{}", kind.route()),
        }
    }

    pub fn url(&self, base: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), self.path())
    }
}

/// Routes of a per-device supervisor.
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEndpoint {
    RequestHistory,
    RequestHistoryEntry(RequestId),
    ModuleResult { module_name: String, filename: String },
}

impl SupervisorEndpoint {
    pub fn path(&self) -> String {
        match self {
            Self::RequestHistory => "/request-history".to_string(),
            Self::RequestHistoryEntry(id) => format!("/request-history/{}", id),
            Self::ModuleResult { module_name, filename } => format!("/module_results/{}/{}", module_name, filename),
        }
    }

    pub fn url(&self, base: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), self.path())
    }
}

/// Metadata card collections kept by the orchestrator. Their content is opaque to the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardKind {
    Node,
    Module,
    DataSource,
    ZoneRiskLevels,
}

impl CardKind {
    pub fn route(&self) -> &'static str {
        match self {
            CardKind::Node => "nodeCards",
            CardKind::Module => "moduleCards",
            CardKind::DataSource => "dataSourceCards",
            CardKind::ZoneRiskLevels => "zoneRiskLevels",
        }
    }
}

impl fmt::Display for CardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.route())
    }
}

impl FromStr for CardKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "node" | "nodes" | "nodecards" => Ok(CardKind::Node),
            "module" | "modules" | "modulecards" => Ok(CardKind::Module),
            "datasource" | "data-source" | "datasourcecards" => Ok(CardKind::DataSource),
            "zone" | "zones" | "zonerisklevels" => Ok(CardKind::ZoneRiskLevels),
            other => Err(Error::ValidationError(format!("Unknown card kind '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_orchestrator_urls() {
        assert_eq!(OrchestratorEndpoint::Devices.url("http://orch:3000/"), "http://orch:3000/file/device");
        assert_eq!(OrchestratorEndpoint::Execute(ManifestId::new("m1")).url("http://orch:3000"), "http://orch:3000/execute/m1");
        assert_eq!(OrchestratorEndpoint::ModuleDescription(ModuleId::new("x")).path(), "/file/module/x/upload");
        assert_eq!(OrchestratorEndpoint::Cards(CardKind::ZoneRiskLevels).path(), "/zoneRiskLevels");
    }

    #[test]
    fn builds_supervisor_urls() {
        let endpoint = SupervisorEndpoint::ModuleResult { module_name: "cam".to_string(), filename: "image.jpg".to_string() };
        assert_eq!(endpoint.url("http://10.0.0.2:5000"), "http://10.0.0.2:5000/module_results/cam/image.jpg");
        assert_eq!(SupervisorEndpoint::RequestHistory.url("http://10.0.0.2:5000/"), "http://10.0.0.2:5000/request-history");
    }

    #[test]
    fn parses_card_kinds() {
        assert_eq!("zones".parse::<CardKind>().unwrap(), CardKind::ZoneRiskLevels);
        assert_eq!("dataSourceCards".parse::<CardKind>().unwrap(), CardKind::DataSource);
        assert!("weather".parse::<CardKind>().is_err());
    }
}
