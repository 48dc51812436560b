//! Anomaly-injection policy.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::data::ValueKind;
use crate::core::error::{Result, SimError};
use crate::store::TagTable;

/// Default per-tick anomaly probability while injection is enabled.
pub const DEFAULT_ANOMALY_PROBABILITY: f64 = 0.05;

/// Tags and probability driving anomaly injection.
///
/// - `enabled_tag`: while true, each tick is anomalous with `probability`.
/// - `trigger_tag`: edge trigger; forces one anomalous tick and is reset to
///   false when consumed.
/// - `active_tag`: optional read-only flag written every tick with the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySpec {
    #[serde(default = "default_enabled_tag")]
    pub enabled_tag: String,

    #[serde(default = "default_trigger_tag")]
    pub trigger_tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_tag: Option<String>,

    #[serde(default = "default_probability")]
    pub probability: f64,
}

fn default_enabled_tag() -> String {
    "anomaly_enabled".to_string()
}

fn default_trigger_tag() -> String {
    "anomaly_triggered".to_string()
}

fn default_probability() -> f64 {
    DEFAULT_ANOMALY_PROBABILITY
}

impl Default for AnomalySpec {
    fn default() -> Self {
        Self {
            enabled_tag: default_enabled_tag(),
            trigger_tag: default_trigger_tag(),
            active_tag: None,
            probability: DEFAULT_ANOMALY_PROBABILITY,
        }
    }
}

impl AnomalySpec {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(SimError::config(format!(
                "anomaly probability must be within [0, 1], got {}",
                self.probability
            )));
        }
        Ok(())
    }

    /// Tags this policy reads or writes, with their required kinds.
    pub fn referenced_tags(&self) -> Vec<(&str, ValueKind)> {
        let mut refs = vec![
            (self.enabled_tag.as_str(), ValueKind::Bool),
            (self.trigger_tag.as_str(), ValueKind::Bool),
        ];
        if let Some(active) = &self.active_tag {
            refs.push((active.as_str(), ValueKind::Bool));
        }
        refs
    }

    /// Decide whether this tick is anomalous, consuming the manual trigger.
    pub fn evaluate<R: Rng + ?Sized>(&self, tags: &mut TagTable, rng: &mut R) -> Result<bool> {
        let enabled = tags.get_bool(&self.enabled_tag)?;
        let triggered = tags.get_bool(&self.trigger_tag)?;

        let mut anomaly = enabled && rng.gen_bool(self.probability);
        if triggered {
            anomaly = true;
            tags.set(&self.trigger_tag, false)?;
        }

        if let Some(active) = &self.active_tag {
            tags.set(active, anomaly)?;
        }
        Ok(anomaly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::TagSpec;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn table() -> TagTable {
        TagTable::from_specs(&[
            TagSpec::new("anomaly_enabled", false).writable(),
            TagSpec::new("anomaly_triggered", false).writable(),
            TagSpec::new("anomaly_active", false),
        ])
        .unwrap()
    }

    fn spec() -> AnomalySpec {
        AnomalySpec {
            active_tag: Some("anomaly_active".into()),
            ..AnomalySpec::default()
        }
    }

    #[test]
    fn test_disabled_never_fires() {
        let mut tags = table();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            assert!(!spec().evaluate(&mut tags, &mut rng).unwrap());
        }
    }

    #[test]
    fn test_trigger_is_edge_and_resets() {
        let mut tags = table();
        let mut rng = StdRng::seed_from_u64(3);
        tags.set("anomaly_triggered", true).unwrap();

        assert!(spec().evaluate(&mut tags, &mut rng).unwrap());
        assert!(!tags.get_bool("anomaly_triggered").unwrap());
        assert!(tags.get_bool("anomaly_active").unwrap());

        assert!(!spec().evaluate(&mut tags, &mut rng).unwrap());
        assert!(!tags.get_bool("anomaly_active").unwrap());
    }

    #[test]
    fn test_enabled_rate_is_roughly_probability() {
        let mut tags = table();
        tags.set("anomaly_enabled", true).unwrap();
        let mut rng = StdRng::seed_from_u64(11);

        let hits = (0..20_000)
            .filter(|_| spec().evaluate(&mut tags, &mut rng).unwrap())
            .count();
        let rate = hits as f64 / 20_000.0;
        assert!((0.03..0.07).contains(&rate), "rate {}", rate);
    }

    #[test]
    fn test_probability_validation() {
        let mut spec = spec();
        spec.probability = 1.5;
        assert!(spec.validate().is_err());
        spec.probability = 0.0;
        assert!(spec.validate().is_ok());
    }
}
