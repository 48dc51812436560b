//! Simulation engine.
//!
//! Advances every generated tag once per tick:
//!
//! 1. evaluate the anomaly policy (Bernoulli draw and/or manual trigger),
//! 2. draw each generator from its nominal or anomalous range,
//! 3. write the results into the tag table.
//!
//! Level-driven actuators are handled afterwards by the station's
//! [`ControlPolicy`](crate::core::traits::ControlPolicy).

mod anomaly;
mod generator;

pub use anomaly::{AnomalySpec, DEFAULT_ANOMALY_PROBABILITY};
pub use generator::{GeneratorSpec, Range};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::core::data::ValueKind;
use crate::core::error::{Result, SimError};
use crate::store::TagTable;

/// Simulation section of a station configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub generators: Vec<GeneratorSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<AnomalySpec>,
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        for generator in &self.generators {
            generator.validate()?;
        }
        if let Some(anomaly) = &self.anomaly {
            anomaly.validate()?;
        }
        Ok(())
    }

    /// Tags read or written by the engine, with their required kinds.
    pub fn referenced_tags(&self) -> Vec<(&str, ValueKind)> {
        let mut refs: Vec<(&str, ValueKind)> = self
            .generators
            .iter()
            .map(|g| (g.tag.as_str(), ValueKind::Float))
            .collect();
        if let Some(anomaly) = &self.anomaly {
            refs.extend(anomaly.referenced_tags());
        }
        refs
    }
}

/// Mutable per-run state owned by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationState {
    /// Completed ticks.
    pub tick: u64,
    /// Whether the most recent tick was anomalous.
    pub anomaly_active: bool,
    /// Anomalous ticks so far.
    pub anomaly_count: u64,
}

/// Per-tick generator driver.
#[derive(Debug)]
pub struct SimulationEngine {
    config: SimulationConfig,
    rng: StdRng,
    state: SimulationState,
}

impl SimulationEngine {
    /// Create an engine. A fixed `seed` makes runs reproducible; otherwise
    /// the generator is seeded from entropy.
    pub fn new(config: SimulationConfig, seed: Option<u64>) -> Result<Self> {
        config.validate()?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            rng,
            state: SimulationState::default(),
        })
    }

    /// Check every referenced tag against the registry schema.
    pub fn validate_against(&self, tags: &TagTable) -> Result<()> {
        for (name, kind) in self.config.referenced_tags() {
            tags.expect_kind(name, kind)
                .map_err(|e| SimError::config(format!("simulation: {}", e)))?;
        }
        Ok(())
    }

    #[inline]
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    #[inline]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Advance all generated tags by one tick. Returns whether the tick was anomalous.
    pub fn step(&mut self, tags: &mut TagTable) -> Result<bool> {
        let anomaly = match &self.config.anomaly {
            Some(policy) => policy.evaluate(tags, &mut self.rng)?,
            None => false,
        };

        for generator in &self.config.generators {
            let value = generator.range(anomaly).sample(&mut self.rng);
            tags.set(&generator.tag, value)?;
        }

        self.state.tick += 1;
        self.state.anomaly_active = anomaly;
        if anomaly {
            self.state.anomaly_count += 1;
        }
        Ok(anomaly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::TagSpec;

    fn table() -> TagTable {
        TagTable::from_specs(&[
            TagSpec::new("flow_in", 0.0).writable(),
            TagSpec::new("pump1_vibration", 0.0),
            TagSpec::new("anomaly_enabled", false).writable(),
            TagSpec::new("anomaly_triggered", false).writable(),
        ])
        .unwrap()
    }

    fn config() -> SimulationConfig {
        SimulationConfig {
            generators: vec![
                GeneratorSpec::uniform("flow_in", 100.0, 200.0),
                GeneratorSpec::uniform("pump1_vibration", 0.1, 1.5).with_anomalous(5.0, 10.0),
            ],
            anomaly: Some(AnomalySpec::default()),
        }
    }

    #[test]
    fn test_step_writes_generated_values() {
        let mut tags = table();
        let mut engine = SimulationEngine::new(config(), Some(42)).unwrap();

        assert!(!engine.step(&mut tags).unwrap());
        let flow = tags.get_f64("flow_in").unwrap();
        assert!((100.0..=200.0).contains(&flow));
        assert_eq!(engine.state().tick, 1);
    }

    #[test]
    fn test_triggered_tick_uses_anomalous_range() {
        let mut tags = table();
        let mut engine = SimulationEngine::new(config(), Some(42)).unwrap();
        tags.set("anomaly_triggered", true).unwrap();

        assert!(engine.step(&mut tags).unwrap());
        let vib = tags.get_f64("pump1_vibration").unwrap();
        assert!((5.0..=10.0).contains(&vib));
        assert_eq!(engine.state().anomaly_count, 1);

        assert!(!engine.step(&mut tags).unwrap());
        let vib = tags.get_f64("pump1_vibration").unwrap();
        assert!((0.1..=1.5).contains(&vib));
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = table();
        let mut b = table();
        let mut ea = SimulationEngine::new(config(), Some(42)).unwrap();
        let mut eb = SimulationEngine::new(config(), Some(42)).unwrap();
        for _ in 0..10 {
            ea.step(&mut a).unwrap();
            eb.step(&mut b).unwrap();
            assert_eq!(a.get("flow_in").unwrap(), b.get("flow_in").unwrap());
        }
    }

    #[test]
    fn test_validate_against_schema() {
        let engine = SimulationEngine::new(config(), Some(42)).unwrap();
        assert!(engine.validate_against(&table()).is_ok());

        let bad = TagTable::from_specs(&[TagSpec::new("flow_in", false)]).unwrap();
        assert!(matches!(
            engine.validate_against(&bad),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = config();
        cfg.generators.push(GeneratorSpec::uniform("x", 5.0, 1.0));
        assert!(SimulationEngine::new(cfg, None).is_err());
    }
}
