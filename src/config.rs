use crate::error::{CasambiError, Result};
use crate::types::{NetworkSelection, WireId, DEFAULT_WIRE};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "casambi.yaml";

#[derive(Debug, Deserialize)]
struct RawConfig {
    api_key: Option<String>,
    email: Option<String>,
    user_password: Option<String>,
    network_password: Option<String>,
    network_id: Option<String>,
    network_uuid: Option<String>,
    wire_id: Option<WireId>,
    unit_id: Option<Value>,
    scene_id: Option<Value>,
    #[serde(default)]
    units: Vec<Value>,
    rest_url: Option<String>,
    ws_url: Option<String>,
}

/// Credentials and optional targets loaded from YAML
///
/// Only presence of the required keys is checked. Unit and scene ids are
/// kept loosely typed and validated when they are used.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: SecretString,
    pub email: String,
    pub user_password: SecretString,
    pub network_password: SecretString,
    pub network: NetworkSelection,
    /// Network UUID or bridge MAC for lookups on the app API
    pub network_uuid: Option<String>,
    pub wire_id: WireId,
    pub unit_id: Option<Value>,
    pub scene_id: Option<Value>,
    pub units: Vec<Value>,
    pub rest_url: Option<String>,
    pub ws_url: Option<String>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(text)?;

        Ok(Self {
            api_key: SecretString::from(required(raw.api_key, "api_key")?),
            email: required(raw.email, "email")?,
            user_password: SecretString::from(required(raw.user_password, "user_password")?),
            network_password: SecretString::from(required(raw.network_password, "network_password")?),
            network: raw.network_id.map_or(NetworkSelection::First, NetworkSelection::Id),
            network_uuid: raw.network_uuid,
            wire_id: raw.wire_id.unwrap_or(DEFAULT_WIRE),
            unit_id: raw.unit_id,
            scene_id: raw.scene_id,
            units: raw.units,
            rest_url: raw.rest_url,
            ws_url: raw.ws_url,
        })
    }

    /// Units to act on: `units` if given, otherwise `unit_id`
    pub fn target_units(&self) -> Vec<Value> {
        if !self.units.is_empty() {
            return self.units.clone();
        }
        self.unit_id.iter().cloned().collect()
    }
}

fn required(value: Option<String>, key: &str) -> Result<String> {
    value.ok_or_else(|| CasambiError::Config(format!("{} is not present in configuration", key)))
}
