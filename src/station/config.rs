//! Station configuration.
//!
//! ```toml
//! [station]
//! name = "tank-system"
//! tick_interval_ms = 1000
//!
//! [server]
//! endpoint_url = "opc.tcp://0.0.0.0:4840"
//! server_name = "CustomTankServer"
//! namespace_uri = "http://example.com/opcua/tank"
//! object_name = "TankSystem"
//!
//! [[tags]]
//! name = "tank_level"
//! browse_name = "TankLevel"
//! initial = 0.0
//! writable = true
//!
//! [control]
//! policy = "tank_auto"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bridge::GatewayConfig;
use crate::control::ControlConfig;
use crate::core::data::TagSpec;
use crate::core::error::{Result, SimError};
use crate::sim::{AnomalySpec, GeneratorSpec, SimulationConfig};
use crate::store::TagTable;
use crate::telemetry::TelemetryConfig;

/// Complete station configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationConfig {
    pub station: StationParams,

    #[serde(default)]
    pub server: ServerConfig,

    pub tags: Vec<TagSpec>,

    #[serde(default)]
    pub generators: Vec<GeneratorSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<AnomalySpec>,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<TelemetryConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,
}

/// `[station]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationParams {
    pub name: String,

    /// Fixed tick period in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// RNG seed for reproducible runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Tags shown in the per-tick status line.
    #[serde(default)]
    pub status_tags: Vec<String>,
}

fn default_tick_interval() -> u64 {
    1000
}

/// `[server]` section: OPC UA exposure of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,

    #[serde(default = "default_server_name")]
    pub server_name: String,

    #[serde(default = "default_namespace_uri")]
    pub namespace_uri: String,

    /// Object node grouping all tag variables.
    #[serde(default = "default_object_name")]
    pub object_name: String,
}

fn default_true() -> bool {
    true
}

fn default_endpoint_url() -> String {
    "opc.tcp://0.0.0.0:4840".to_string()
}

fn default_server_name() -> String {
    "procsim".to_string()
}

fn default_namespace_uri() -> String {
    "urn:procsim".to_string()
}

fn default_object_name() -> String {
    "Station".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint_url: default_endpoint_url(),
            server_name: default_server_name(),
            namespace_uri: default_namespace_uri(),
            object_name: default_object_name(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.endpoint_url.starts_with("opc.tcp://") {
            return Err(SimError::config(format!(
                "server: endpoint_url must start with opc.tcp://, got '{}'",
                self.endpoint_url
            )));
        }
        if self.server_name.is_empty() || self.namespace_uri.is_empty() || self.object_name.is_empty() {
            return Err(SimError::config(
                "server: server_name, namespace_uri and object_name must be set",
            ));
        }
        Ok(())
    }
}

impl StationConfig {
    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SimError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Simulation part of the configuration.
    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            generators: self.generators.clone(),
            anomaly: self.anomaly.clone(),
        }
    }

    #[inline]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.station.tick_interval_ms)
    }

    /// Enabled telemetry section, if any.
    pub fn telemetry(&self) -> Option<&TelemetryConfig> {
        self.telemetry.as_ref().filter(|t| t.enabled)
    }

    /// Enabled gateway section, if any.
    pub fn gateway(&self) -> Option<&GatewayConfig> {
        self.gateway.as_ref().filter(|g| g.enabled)
    }

    /// Check the whole configuration, including every tag reference.
    pub fn validate(&self) -> Result<()> {
        if self.station.name.is_empty() {
            return Err(SimError::config("station: name is empty"));
        }
        if self.station.tick_interval_ms == 0 {
            return Err(SimError::config("station: tick_interval_ms must be > 0"));
        }

        let tags = TagTable::from_specs(&self.tags)?;

        for name in &self.station.status_tags {
            if !tags.contains(name) {
                return Err(SimError::config(format!(
                    "station: status tag '{}' is not defined",
                    name
                )));
            }
        }

        if self.server.enabled {
            self.server.validate()?;
        }

        let simulation = self.simulation();
        simulation.validate()?;
        for (name, kind) in simulation.referenced_tags() {
            tags.expect_kind(name, kind)
                .map_err(|e| SimError::config(format!("simulation: {}", e)))?;
        }

        self.control.validate()?;
        self.control.validate_against(&tags)?;

        if let Some(telemetry) = self.telemetry() {
            telemetry.validate()?;
            telemetry.validate_against(&tags)?;
        }

        if let Some(gateway) = self.gateway() {
            gateway.validate()?;
            gateway.validate_against(&tags)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::Value;

    const MINIMAL: &str = r#"
        [station]
        name = "mini"

        [[tags]]
        name = "tank_level"
        initial = 10.0
        writable = true
    "#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = StationConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.control, ControlConfig::None);
        assert!(config.telemetry().is_none());
        assert_eq!(config.tags[0].initial, Value::Float(10.0));
    }

    #[test]
    fn test_duplicate_tags_rejected() {
        let text = format!(
            "{}\n[[tags]]\nname = \"tank_level\"\ninitial = 1.0\n",
            MINIMAL
        );
        assert!(matches!(
            StationConfig::from_toml(&text),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_control_tag_rejected() {
        let text = format!("{}\n[control]\npolicy = \"tank_auto\"\n", MINIMAL);
        let err = StationConfig::from_toml(&text).unwrap_err();
        assert!(err.to_string().contains("control"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let text = MINIMAL.replace("name = \"mini\"", "name = \"mini\"\ntick_interval_ms = 0");
        assert!(StationConfig::from_toml(&text).is_err());
    }

    #[test]
    fn test_generator_on_bool_tag_rejected() {
        let text = r#"
            [station]
            name = "bad"

            [[tags]]
            name = "pump"
            initial = false

            [[generators]]
            tag = "pump"
            nominal = { min = 0.0, max = 1.0 }
        "#;
        assert!(StationConfig::from_toml(text).is_err());
    }

    #[test]
    fn test_overflowing_generator_range_rejected() {
        let text = format!(
            "{}\n[[generators]]\ntag = \"tank_level\"\nnominal = {{ min = -1.0e308, max = 1.0e308 }}\n",
            MINIMAL
        );
        let err = StationConfig::from_toml(&text).unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
        assert!(err.to_string().contains("tank_level"));
    }

    #[test]
    fn test_disabled_telemetry_is_not_validated() {
        let text = format!(
            "{}\n[telemetry]\nenabled = false\nurl = \"not a url\"\n[telemetry.fields]\nlevel = \"missing\"\n",
            MINIMAL
        );
        let config = StationConfig::from_toml(&text).unwrap();
        assert!(config.telemetry().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = StationConfig::load(&path).unwrap();
        assert_eq!(config.station.name, "mini");

        assert!(StationConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
