//! Per-tag value generators.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};

/// Closed interval `[min, max]` for uniform draws.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Reject empty or non-finite intervals, including spans that overflow.
    pub fn validate(&self) -> Result<()> {
        if !self.min.is_finite()
            || !self.max.is_finite()
            || self.min > self.max
            || !(self.max - self.min).is_finite()
        {
            return Err(SimError::config(format!(
                "Invalid range [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }

    /// Uniform draw rounded to two decimals, kept inside the interval.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let raw = rng.gen_range(self.min..=self.max);
        round2(raw).clamp(self.min, self.max)
    }
}

#[inline]
fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Generator for one unconstrained float tag.
///
/// ```toml
/// [[generators]]
/// tag = "pump1_vibration"
/// nominal = { min = 0.1, max = 1.5 }
/// anomalous = { min = 5.0, max = 10.0 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSpec {
    /// Target tag (must be a float tag).
    pub tag: String,

    /// Range used on normal ticks.
    pub nominal: Range,

    /// Range substituted on anomalous ticks. Tags without one keep
    /// drawing from `nominal`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomalous: Option<Range>,
}

impl GeneratorSpec {
    pub fn uniform(tag: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            tag: tag.into(),
            nominal: Range::new(min, max),
            anomalous: None,
        }
    }

    #[must_use]
    pub fn with_anomalous(mut self, min: f64, max: f64) -> Self {
        self.anomalous = Some(Range::new(min, max));
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.nominal
            .validate()
            .and_then(|_| self.anomalous.as_ref().map_or(Ok(()), Range::validate))
            .map_err(|e| SimError::config(format!("generator '{}': {}", self.tag, e)))
    }

    /// Range in effect for this tick.
    #[inline]
    pub fn range(&self, anomaly: bool) -> &Range {
        match (&self.anomalous, anomaly) {
            (Some(r), true) => r,
            _ => &self.nominal,
        }
    }
}
