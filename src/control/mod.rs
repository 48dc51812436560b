//! Control policies.
//!
//! A station runs at most one [`ControlPolicy`] per tick, right after the
//! simulation step and inside the same registry transaction.
//!
//! | Policy | Station | Behaviour |
//! |--------|---------|-----------|
//! | `level_threshold` | pumping station | fill below 25 %, discharge above 85 % |
//! | `tank_auto` | tank system | start/stop auto mode around a setpoint |

mod tank;
mod threshold;

pub use tank::{
    clamp_level, ControlMode, TankAutoConfig, TankAutoPolicy, DEFAULT_DRAIN_RATE,
    DEFAULT_FILL_RATE, LEVEL_MAX, LEVEL_MIN,
};
pub use threshold::{LevelThresholdConfig, LevelThresholdPolicy};

use serde::{Deserialize, Serialize};

use crate::core::data::ValueKind;
use crate::core::error::{Result, SimError};
use crate::core::traits::ControlPolicy;
use crate::store::TagTable;

/// Control section of a station configuration.
///
/// ```toml
/// [control]
/// policy = "tank_auto"
/// fill_rate = 0.2
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ControlConfig {
    /// No control logic; actuator tags are left to clients.
    #[default]
    None,
    LevelThreshold(LevelThresholdConfig),
    TankAuto(TankAutoConfig),
}

impl ControlConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::None => Ok(()),
            Self::LevelThreshold(cfg) if !(cfg.low <= cfg.high) => Err(SimError::config(format!(
                "level_threshold: low ({}) must not exceed high ({})",
                cfg.low, cfg.high
            ))),
            Self::LevelThreshold(_) => Ok(()),
            Self::TankAuto(cfg) => {
                if !(cfg.fill_rate >= 0.0 && cfg.drain_rate >= 0.0) {
                    return Err(SimError::config(
                        "tank_auto: fill_rate and drain_rate must be non-negative",
                    ));
                }
                Ok(())
            }
        }
    }

    pub fn referenced_tags(&self) -> Vec<(&str, ValueKind)> {
        match self {
            Self::None => Vec::new(),
            Self::LevelThreshold(cfg) => cfg.referenced_tags(),
            Self::TankAuto(cfg) => cfg.referenced_tags(),
        }
    }

    /// Check every referenced tag against the registry schema.
    pub fn validate_against(&self, tags: &TagTable) -> Result<()> {
        for (name, kind) in self.referenced_tags() {
            tags.expect_kind(name, kind)
                .map_err(|e| SimError::config(format!("control: {}", e)))?;
        }
        Ok(())
    }

    /// Instantiate the configured policy.
    pub fn build(&self) -> Option<Box<dyn ControlPolicy>> {
        match self {
            Self::None => None,
            Self::LevelThreshold(cfg) => Some(Box::new(LevelThresholdPolicy::new(cfg.clone()))),
            Self::TankAuto(cfg) => Some(Box::new(TankAutoPolicy::new(cfg.clone()))),
        }
    }
}
