//! Immutable point-in-time copies of registry state.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::core::data::Value;

/// A frozen copy of a set of tags, taken under the registry lock.
///
/// Built once per publish cycle and never mutated, so serialization can run
/// while the next tick is already updating the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    taken_at: DateTime<Utc>,
    values: IndexMap<String, Value>,
}

impl TelemetrySnapshot {
    pub(crate) fn new(values: IndexMap<String, Value>) -> Self {
        Self {
            taken_at: Utc::now(),
            values,
        }
    }

    /// Time the snapshot was taken.
    #[inline]
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Value of a tag in the snapshot.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).copied()
    }

    /// Number of tags captured.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if nothing was captured.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(tag, value)` pairs in capture order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
