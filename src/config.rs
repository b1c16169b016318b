use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::loader::parser::parse_json_file;

pub const ORCHESTRATOR_URL_ENV: &str = "FLEETDASH_ORCHESTRATOR_URL";

/// Settings of one dashboard session. Every field has a default so an empty JSON object
/// (or no file at all) is a valid configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardConfig {
    /// Base URL of the orchestrator REST API.
    pub orchestrator_url: String,

    /// Name of the device that is the orchestrator itself. It is drawn in the center of the graph.
    pub orchestrator_device_name: String,

    pub device_poll_interval_secs: u64,

    /// Upper bound for a single supervisor `request-history` fetch.
    pub history_timeout_secs: u64,

    /// Upper bound for orchestrator calls.
    pub request_timeout_secs: u64,

    /// When true, deselecting a manifest removes its execution edges from the graph.
    pub clear_overlay_on_deselect: bool,

    pub layout: LayoutConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    pub center_x: f64,
    pub center_y: f64,
    pub radius: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig { center_x: 200.0, center_y: 200.0, radius: 250.0 }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            orchestrator_url: "http://localhost:3000".to_string(),
            orchestrator_device_name: "orchestrator".to_string(),
            device_poll_interval_secs: 30,
            history_timeout_secs: 5,
            request_timeout_secs: 10,
            clear_overlay_on_deselect: false,
            layout: LayoutConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Loads the configuration from `file_path` if given, otherwise starts from defaults.
    /// The orchestrator URL can be overridden by `FLEETDASH_ORCHESTRATOR_URL`.
    pub fn load(file_path: Option<&str>) -> Result<DashboardConfig> {
        let mut config = match file_path {
            Some(path) => {
                log::info!("Loading dashboard configuration from '{}'.", path);
                parse_json_file::<DashboardConfig>(path)?
            }
            None => DashboardConfig::default(),
        };

        if let Ok(url) = std::env::var(ORCHESTRATOR_URL_ENV) {
            config.orchestrator_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_orchestrator_url(mut self, url: impl Into<String>) -> Self {
        self.orchestrator_url = url.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.orchestrator_url.trim().is_empty() {
            return Err(Error::ConfigError("orchestratorUrl must not be empty".to_string()));
        }
        if self.device_poll_interval_secs == 0 {
            return Err(Error::ConfigError("devicePollIntervalSecs must be greater than zero".to_string()));
        }
        if self.history_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(Error::ConfigError("timeouts must be greater than zero".to_string()));
        }
        if !(self.layout.radius > 0.0) {
            return Err(Error::ConfigError("layout.radius must be positive".to_string()));
        }
        Ok(())
    }

    /// Orchestrator base without a trailing slash, ready for `format!("{}{}", base, path)`.
    pub fn orchestrator_base(&self) -> &str {
        self.orchestrator_url.trim_end_matches('/')
    }

    pub fn device_poll_interval(&self) -> Duration {
        Duration::from_secs(self.device_poll_interval_secs)
    }

    pub fn history_timeout(&self) -> Duration {
        Duration::from_secs(self.history_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
