use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::utils::id::DeviceId;

/// A device as listed by the orchestrator's `/file/device` endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    #[serde(rename = "_id")]
    pub id: DeviceId,
    pub name: String,

    #[serde(default)]
    pub communication: CommunicationDto,

    #[serde(default)]
    pub description: Option<DeviceDescriptionDto>,

    #[serde(default)]
    pub health: Option<HealthDto>,

    #[serde(default)]
    pub metadata_card: Option<serde_json::Value>,

    /// Captures any attributes the dashboard does not interpret.
    #[serde(flatten)]
    pub extra_fields: HashMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CommunicationDto {
    pub addresses: Vec<String>,
    pub port: u16,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceDescriptionDto {
    pub platform: PlatformDto,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PlatformDto {
    pub cpu: CpuDto,
    pub memory: MemoryDto,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CpuDto {
    pub human_readable_name: String,
    pub clock_speed: ClockSpeedDto,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ClockSpeedDto {
    #[serde(rename = "Hz")]
    pub hz: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct MemoryDto {
    pub bytes: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthDto {
    pub report: HealthReportDto,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthReportDto {
    pub cpu_usage: f64,
}

impl DeviceDto {
    /// First advertised address, if any.
    pub fn address(&self) -> Option<&str> {
        self.communication.addresses.first().map(String::as_str)
    }
}
