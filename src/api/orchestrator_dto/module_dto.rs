use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::utils::id::ModuleId;
use crate::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDto {
    #[serde(rename = "_id")]
    pub id: ModuleId,
    pub name: String,

    #[serde(default)]
    pub exports: Vec<ExportDto>,

    #[serde(default)]
    pub wasm: Option<WasmDto>,

    #[serde(flatten)]
    pub extra_fields: HashMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportDto {
    pub name: String,
    pub parameter_count: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WasmDto {
    pub original_filename: String,
}

/// Kind of a mount declared for a module function.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MountStage {
    Deployment,
    Execution,
    Output,
}

/// A mount attached to an exported function when the module is described.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MountDescriptionDto {
    pub name: String,
    pub stage: MountStage,
}

/// Description of one exported function, sent as multipart form to `/file/module/{id}/upload`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDescriptionDto {
    pub name: String,
    pub method: String,
    pub parameter_types: Vec<String>,
    pub output_type: String,
    pub mounts: Vec<MountDescriptionDto>,
}

impl FunctionDescriptionDto {
    /// Default description derived from an export: `GET`, integer parameters and output.
    pub fn from_export(export: &ExportDto) -> Self {
        FunctionDescriptionDto {
            name: export.name.clone(),
            method: "GET".to_string(),
            parameter_types: vec!["integer".to_string(); export.parameter_count as usize],
            output_type: "integer".to_string(),
            mounts: Vec::new(),
        }
    }

    /// Text fields in the bracketed layout the orchestrator expects, e.g. `add[param0]`,
    /// `add[output]`, `add[mounts][0][name]`. Mount files are attached separately under the mount name.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let prefix = &self.name;
        let mut fields = Vec::new();

        for (i, typ) in self.parameter_types.iter().enumerate() {
            fields.push((format!("{}[param{}]", prefix, i), typ.clone()));
        }
        fields.push((format!("{}[output]", prefix), self.output_type.clone()));
        fields.push((format!("{}[method]", prefix), self.method.clone()));

        for (i, mount) in self.mounts.iter().enumerate() {
            fields.push((format!("{}[mounts][{}][name]", prefix, i), mount.name.clone()));
            fields.push((format!("{}[mounts][{}][stage]", prefix, i), mount.stage.as_str().to_string()));
        }

        // The last mount doubles as the function's primary mount.
        if let Some(last) = self.mounts.last() {
            fields.push((format!("{}[mountName]", prefix), last.name.clone()));
            fields.push((format!("{}[stage]", prefix), last.stage.as_str().to_string()));
        }
        fields
    }
}

impl MountStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            MountStage::Deployment => "deployment",
            MountStage::Execution => "execution",
            MountStage::Output => "output",
        }
    }
}

impl FromStr for MountStage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deployment" => Ok(MountStage::Deployment),
            "execution" => Ok(MountStage::Execution),
            "output" => Ok(MountStage::Output),
            other => Err(Error::ValidationError(format!("Unknown mount stage '{}'", other))),
        }
    }
}
