use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::utils::id::{DeviceId, ManifestId, ModuleId};

/// A manifest as returned by `/file/manifest`.
///
/// `sequence` is the authoritative execution order. `full_manifest` is the orchestrator's
/// denormalized description of the deployment, keyed by device id. It is not guaranteed to be
/// complete, so every nested level defaults to empty, whether it is missing or `null`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDto {
    #[serde(rename = "_id")]
    pub id: ManifestId,

    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub sequence: Vec<SequenceStepDto>,

    #[serde(default, deserialize_with = "null_entries_as_default")]
    pub full_manifest: BTreeMap<String, DeviceDeploymentDto>,

    #[serde(flatten)]
    pub extra_fields: HashMap<String, serde_json::Value>,
}

/// One `(device, module, function)` step of a manifest's call sequence.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SequenceStepDto {
    pub device: DeviceId,
    pub module: ModuleId,
    pub func: String,
}

/// Body of `POST /file/manifest`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewManifestDto {
    pub name: String,
    pub sequence: Vec<SequenceStepDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct DeviceDeploymentDto {
    #[serde(deserialize_with = "null_as_default")]
    pub modules: Vec<ModuleRefDto>,

    /// module name -> function name -> endpoint
    #[serde(deserialize_with = "nested_null_entries_as_default")]
    pub endpoints: HashMap<String, HashMap<String, EndpointDto>>,

    /// module name -> function name -> mounts
    #[serde(deserialize_with = "nested_null_entries_as_default")]
    pub mounts: HashMap<String, HashMap<String, FunctionMountsDto>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ModuleRefDto {
    #[serde(deserialize_with = "null_as_default")]
    pub id: ModuleId,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct EndpointDto {
    pub url: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub request: RequestDescriptionDto,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RequestDescriptionDto {
    #[serde(deserialize_with = "null_as_default")]
    pub parameters: Vec<ParameterDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ParameterDto {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub required: bool,
    pub schema: Option<SchemaDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SchemaDto {
    #[serde(rename = "type")]
    pub typ: Option<String>,
}

impl ParameterDto {
    pub fn is_integer(&self) -> bool {
        self.schema.as_ref().and_then(|s| s.typ.as_deref()) == Some("integer")
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct FunctionMountsDto {
    #[serde(deserialize_with = "null_as_default")]
    pub output: Vec<MountDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct MountDto {
    #[serde(deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(deserialize_with = "null_as_default")]
    pub media_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub stage: String,
}

/// Reads `null` as `T::default()`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Map whose `null` entries read as `V::default()`. A `null` map is empty.
fn null_entries_as_default<'de, D, V>(deserializer: D) -> Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de> + Default,
{
    let raw: Option<BTreeMap<String, Option<V>>> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default().into_iter().map(|(key, value)| (key, value.unwrap_or_default())).collect())
}

/// `module -> function -> V` map tolerating `null` on both levels and on the leaves.
fn nested_null_entries_as_default<'de, D, V>(deserializer: D) -> Result<HashMap<String, HashMap<String, V>>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de> + Default,
{
    let raw: Option<HashMap<String, Option<HashMap<String, Option<V>>>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(module, functions)| (module, functions.unwrap_or_default().into_iter().map(|(function, value)| (function, value.unwrap_or_default())).collect()))
        .collect())
}
