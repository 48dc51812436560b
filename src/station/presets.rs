//! Built-in station configurations.

use crate::core::error::{Result, SimError};

use super::StationConfig;

/// An embedded TOML configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    pub source: &'static str,
}

impl Preset {
    /// Parse and validate the embedded configuration.
    pub fn config(&self) -> Result<StationConfig> {
        StationConfig::from_toml(self.source)
    }
}

pub const PRESETS: &[Preset] = &[
    Preset {
        name: "pumping-station",
        description: "Remote pumping station with anomaly injection and level thresholds",
        source: include_str!("../../configs/pumping_station.toml"),
    },
    Preset {
        name: "tank-system",
        description: "Tank with start/stop auto mode around a setpoint",
        source: include_str!("../../configs/tank_system.toml"),
    },
    Preset {
        name: "plc-bridge",
        description: "Local server mirroring PLC tags polled from an upstream gateway",
        source: include_str!("../../configs/plc_bridge.toml"),
    },
];

/// Look up a preset by name (case-insensitive).
pub fn find(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Look up a preset, failing with a config error listing the known names.
pub fn get(name: &str) -> Result<&'static Preset> {
    find(name).ok_or_else(|| {
        let known: Vec<&str> = PRESETS.iter().map(|p| p.name).collect();
        SimError::config(format!(
            "unknown preset '{}' (available: {})",
            name,
            known.join(", ")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlConfig;
    use crate::core::data::{Value, ValueKind};

    #[test]
    fn test_all_presets_validate() {
        for preset in PRESETS {
            let config = preset.config().unwrap_or_else(|e| panic!("{}: {}", preset.name, e));
            assert_eq!(config.station.name, preset.name);
        }
    }

    #[test]
    fn test_pumping_station_schema() {
        let config = get("pumping-station").unwrap().config().unwrap();
        assert_eq!(config.tags.len(), 13);
        assert!(matches!(config.control, ControlConfig::LevelThreshold(_)));
        assert_eq!(config.server.object_name, "RemotePumpingStation");

        let vibration = config.tags.iter().find(|t| t.name == "pump1_vibration").unwrap();
        assert_eq!(vibration.display_name(), "Pump1_Vibration_mm_s");
        assert!(!vibration.writable);

        let pump = config.tags.iter().find(|t| t.name == "pump1_status").unwrap();
        assert_eq!(pump.initial, Value::Bool(false));

        let telemetry = config.telemetry().unwrap();
        assert_eq!(telemetry.fields.len(), 11);
        assert_eq!(telemetry.fields["anomaly_triggered"], "anomaly_active");
        assert_eq!(
            telemetry.endpoint(),
            "https://blueboat.vercel.app/api/factory_tank"
        );
    }

    #[test]
    fn test_tank_system_schema() {
        let config = get("TANK-SYSTEM").unwrap().config().unwrap();
        assert!(matches!(config.control, ControlConfig::TankAuto(_)));

        let level = config.tags.iter().find(|t| t.name == "tank_level").unwrap();
        assert_eq!(level.initial, Value::Float(0.0));
        let auto = config.tags.iter().find(|t| t.name == "auto_mode").unwrap();
        assert_eq!(auto.kind(), ValueKind::Bool);
        assert!(!auto.writable);
        assert!(config.telemetry().is_none());
    }

    #[test]
    fn test_plc_bridge_schema() {
        let config = get("plc-bridge").unwrap().config().unwrap();
        let gateway = config.gateway().unwrap();
        assert_eq!(gateway.nodes.len(), 2);
        assert_eq!(gateway.poll_interval_ms, 5000);
        assert!(config.generators.is_empty());
    }

    #[test]
    fn test_unknown_preset() {
        let err = get("boiler").unwrap_err();
        assert!(err.to_string().contains("pumping-station"));
    }
}
