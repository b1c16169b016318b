use std::path::Path;

use serde::Serialize;

use crate::api::orchestrator_dto::manifest_dto::MountDto;
use crate::domain::utils::id::{DeviceId, ModuleId};

/// A declared output artifact of a step.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutputMount {
    pub path: String,
    pub media_type: String,
    pub stage: String,
}

impl OutputMount {
    /// Local file name for this artifact of step `step_index`. Only the last component of the
    /// remote path is kept; `None` if the path has no usable file name.
    pub fn local_file_name(&self, step_index: usize) -> Option<String> {
        let name = Path::new(&self.path).file_name()?.to_str()?;
        Some(format!("{}_{}", step_index, name))
    }
}

impl From<&MountDto> for OutputMount {
    fn from(dto: &MountDto) -> Self {
        OutputMount { path: dto.path.clone(), media_type: dto.media_type.clone(), stage: dto.stage.clone() }
    }
}

/// A sequence step with its ids resolved to names and addresses.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStep {
    pub index: usize,
    pub device_id: DeviceId,
    pub module_id: ModuleId,
    pub module_name: String,
    pub function_name: String,

    /// `None` when the manifest carries no usable endpoint URL for this step.
    pub supervisor_base: Option<String>,
    pub output_mounts: Vec<OutputMount>,
}
