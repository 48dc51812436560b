//! Level-threshold actuator logic for a pumping station.

use serde::{Deserialize, Serialize};

use crate::core::data::ValueKind;
use crate::core::error::Result;
use crate::core::traits::ControlPolicy;
use crate::store::TagTable;

/// Tag wiring and thresholds for [`LevelThresholdPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelThresholdConfig {
    #[serde(default = "default_level_tag")]
    pub level_tag: String,

    #[serde(default = "default_fill_tag")]
    pub fill_valve_tag: String,

    #[serde(default = "default_discharge_tag")]
    pub discharge_valve_tag: String,

    #[serde(default = "default_pump_tag")]
    pub pump_tag: String,

    /// Below this level: fill, stop discharging, run the pump.
    #[serde(default = "default_low")]
    pub low: f64,

    /// Above this level: stop filling, discharge, stop the pump.
    #[serde(default = "default_high")]
    pub high: f64,
}

fn default_level_tag() -> String {
    "tank_level".to_string()
}

fn default_fill_tag() -> String {
    "valve_fill".to_string()
}

fn default_discharge_tag() -> String {
    "valve_discharge".to_string()
}

fn default_pump_tag() -> String {
    "pump1_status".to_string()
}

fn default_low() -> f64 {
    25.0
}

fn default_high() -> f64 {
    85.0
}

impl Default for LevelThresholdConfig {
    fn default() -> Self {
        Self {
            level_tag: default_level_tag(),
            fill_valve_tag: default_fill_tag(),
            discharge_valve_tag: default_discharge_tag(),
            pump_tag: default_pump_tag(),
            low: default_low(),
            high: default_high(),
        }
    }
}

impl LevelThresholdConfig {
    pub fn referenced_tags(&self) -> Vec<(&str, ValueKind)> {
        vec![
            (self.level_tag.as_str(), ValueKind::Float),
            (self.fill_valve_tag.as_str(), ValueKind::Bool),
            (self.discharge_valve_tag.as_str(), ValueKind::Bool),
            (self.pump_tag.as_str(), ValueKind::Bool),
        ]
    }
}

/// Bang-bang valve/pump logic driven by the current level.
///
/// Between the two thresholds both valves close and the pump keeps its state.
#[derive(Debug, Clone)]
pub struct LevelThresholdPolicy {
    config: LevelThresholdConfig,
}

impl LevelThresholdPolicy {
    pub fn new(config: LevelThresholdConfig) -> Self {
        Self { config }
    }
}

impl ControlPolicy for LevelThresholdPolicy {
    fn name(&self) -> &'static str {
        "level_threshold"
    }

    fn apply(&mut self, tags: &mut TagTable) -> Result<()> {
        let cfg = &self.config;
        let level = tags.get_f64(&cfg.level_tag)?;

        if level < cfg.low {
            tags.set(&cfg.fill_valve_tag, true)?;
            tags.set(&cfg.discharge_valve_tag, false)?;
            tags.set(&cfg.pump_tag, true)?;
        } else if level > cfg.high {
            tags.set(&cfg.fill_valve_tag, false)?;
            tags.set(&cfg.discharge_valve_tag, true)?;
            tags.set(&cfg.pump_tag, false)?;
        } else {
            tags.set(&cfg.fill_valve_tag, false)?;
            tags.set(&cfg.discharge_valve_tag, false)?;
        }
        Ok(())
    }
}
