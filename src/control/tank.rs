//! Auto/manual tank level controller.

use serde::{Deserialize, Serialize};

use crate::core::data::ValueKind;
use crate::core::error::Result;
use crate::core::traits::ControlPolicy;
use crate::store::TagTable;

/// Level added per tick while the fill valve is open.
pub const DEFAULT_FILL_RATE: f64 = 0.2;

/// Level removed per tick while the drain valve is open.
pub const DEFAULT_DRAIN_RATE: f64 = 0.3;

/// Hard bounds of the tank level, in percent.
pub const LEVEL_MIN: f64 = 0.0;
pub const LEVEL_MAX: f64 = 100.0;

/// Controller mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Valves are left to external clients.
    #[default]
    Manual,
    /// Valves follow the setpoint comparison.
    Auto,
}

/// Tag wiring and rates for [`TankAutoPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankAutoConfig {
    #[serde(default = "default_level_tag")]
    pub level_tag: String,

    #[serde(default = "default_setpoint_tag")]
    pub setpoint_tag: String,

    #[serde(default = "default_start_tag")]
    pub start_tag: String,

    #[serde(default = "default_stop_tag")]
    pub stop_tag: String,

    #[serde(default = "default_fill_tag")]
    pub fill_valve_tag: String,

    #[serde(default = "default_drain_tag")]
    pub drain_valve_tag: String,

    /// Optional read-only tag mirroring the controller mode.
    #[serde(default = "default_auto_mode_tag")]
    pub auto_mode_tag: Option<String>,

    #[serde(default = "default_fill_rate")]
    pub fill_rate: f64,

    #[serde(default = "default_drain_rate")]
    pub drain_rate: f64,
}

fn default_level_tag() -> String {
    "tank_level".to_string()
}

fn default_setpoint_tag() -> String {
    "set_point".to_string()
}

fn default_start_tag() -> String {
    "start".to_string()
}

fn default_stop_tag() -> String {
    "stop".to_string()
}

fn default_fill_tag() -> String {
    "fill_valve".to_string()
}

fn default_drain_tag() -> String {
    "drain_valve".to_string()
}

fn default_auto_mode_tag() -> Option<String> {
    Some("auto_mode".to_string())
}

fn default_fill_rate() -> f64 {
    DEFAULT_FILL_RATE
}

fn default_drain_rate() -> f64 {
    DEFAULT_DRAIN_RATE
}

impl Default for TankAutoConfig {
    fn default() -> Self {
        Self {
            level_tag: default_level_tag(),
            setpoint_tag: default_setpoint_tag(),
            start_tag: default_start_tag(),
            stop_tag: default_stop_tag(),
            fill_valve_tag: default_fill_tag(),
            drain_valve_tag: default_drain_tag(),
            auto_mode_tag: default_auto_mode_tag(),
            fill_rate: DEFAULT_FILL_RATE,
            drain_rate: DEFAULT_DRAIN_RATE,
        }
    }
}

impl TankAutoConfig {
    pub fn referenced_tags(&self) -> Vec<(&str, ValueKind)> {
        let mut refs = vec![
            (self.level_tag.as_str(), ValueKind::Float),
            (self.setpoint_tag.as_str(), ValueKind::Float),
            (self.start_tag.as_str(), ValueKind::Bool),
            (self.stop_tag.as_str(), ValueKind::Bool),
            (self.fill_valve_tag.as_str(), ValueKind::Bool),
            (self.drain_valve_tag.as_str(), ValueKind::Bool),
        ];
        if let Some(tag) = &self.auto_mode_tag {
            refs.push((tag.as_str(), ValueKind::Bool));
        }
        refs
    }
}

/// Start/stop controlled tank with level integration.
///
/// Per tick:
/// 1. `start` (edge) enters [`ControlMode::Auto`]; `stop` (edge) enters
///    [`ControlMode::Manual`] and closes both valves. Both are reset to false
///    once consumed; `stop` wins if both are set.
/// 2. In auto mode the fill valve opens below the setpoint, otherwise the
///    drain valve opens.
/// 3. The level moves by the fill rate (fill open) or the drain rate (drain
///    open, fill closed), then is clamped to `[0, 100]`.
#[derive(Debug, Clone)]
pub struct TankAutoPolicy {
    config: TankAutoConfig,
    mode: ControlMode,
}

impl TankAutoPolicy {
    pub fn new(config: TankAutoConfig) -> Self {
        Self {
            config,
            mode: ControlMode::Manual,
        }
    }

    #[inline]
    pub fn mode(&self) -> ControlMode {
        self.mode
    }
}

/// Clamp a level into `[LEVEL_MIN, LEVEL_MAX]`; NaN maps to `LEVEL_MIN`.
pub fn clamp_level(level: f64) -> f64 {
    if level.is_nan() {
        LEVEL_MIN
    } else {
        level.clamp(LEVEL_MIN, LEVEL_MAX)
    }
}

impl ControlPolicy for TankAutoPolicy {
    fn name(&self) -> &'static str {
        "tank_auto"
    }

    fn apply(&mut self, tags: &mut TagTable) -> Result<()> {
        let cfg = &self.config;

        if tags.get_bool(&cfg.start_tag)? {
            self.mode = ControlMode::Auto;
            tags.set(&cfg.start_tag, false)?;
        }

        if tags.get_bool(&cfg.stop_tag)? {
            self.mode = ControlMode::Manual;
            tags.set(&cfg.fill_valve_tag, false)?;
            tags.set(&cfg.drain_valve_tag, false)?;
            tags.set(&cfg.stop_tag, false)?;
        }

        let mut level = tags.get_f64(&cfg.level_tag)?;

        if self.mode == ControlMode::Auto {
            let filling = level < tags.get_f64(&cfg.setpoint_tag)?;
            tags.set(&cfg.fill_valve_tag, filling)?;
            tags.set(&cfg.drain_valve_tag, !filling)?;
        }

        if tags.get_bool(&cfg.fill_valve_tag)? {
            level += cfg.fill_rate;
        } else if tags.get_bool(&cfg.drain_valve_tag)? {
            level -= cfg.drain_rate;
        }
        tags.set(&cfg.level_tag, clamp_level(level))?;

        if let Some(tag) = &cfg.auto_mode_tag {
            tags.set(tag, self.mode == ControlMode::Auto)?;
        }
        Ok(())
    }
}
