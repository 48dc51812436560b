//! Data types for the process simulator.
//!
//! A station is described by a static schema of tags. Each tag holds a single
//! typed value (float or bool) whose kind is fixed when the tag is created.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};

/// The value held by a tag.
///
/// Serialized untagged so that `0.0` and `false` in a config file or a JSON
/// record map directly onto the right variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Analog value (flows, levels, temperatures, setpoints).
    Float(f64),

    /// Digital value (valve/pump states, command bits, flags).
    Bool(bool),
}

impl Value {
    /// The kind of this value.
    #[inline]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Float(_) => ValueKind::Float,
            Self::Bool(_) => ValueKind::Bool,
        }
    }

    /// Get the value as f64, only if it is a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Bool(_) => None,
        }
    }

    /// Get the value as bool, only if it is a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Float(_) => None,
        }
    }

    /// Coerce this value into `kind`.
    ///
    /// Used when values arrive from outside the process (gateway reads) and
    /// the remote type does not exactly match the local tag. A float becomes
    /// a bool when it is non-zero; a bool becomes `1.0` or `0.0`.
    pub fn coerce(self, kind: ValueKind) -> Self {
        match (self, kind) {
            (Self::Float(v), ValueKind::Bool) => Self::Bool(v != 0.0),
            (Self::Bool(v), ValueKind::Float) => Self::Float(if v { 1.0 } else { 0.0 }),
            (v, _) => v,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{:.2}", v),
            Self::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// The declared type of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// 64-bit float.
    Float,
    /// Boolean.
    Bool,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float => write!(f, "float"),
            Self::Bool => write!(f, "bool"),
        }
    }
}

/// Schema entry for a single tag.
///
/// The kind of the tag is the kind of `initial`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSpec {
    /// Stable key used for every registry access.
    pub name: String,

    /// Browse/display name on the OPC UA server (defaults to `name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browse_name: Option<String>,

    /// Initial value.
    pub initial: Value,

    /// Whether external clients may write this tag.
    #[serde(default)]
    pub writable: bool,
}

impl TagSpec {
    /// Create a read-only tag spec.
    pub fn new(name: impl Into<String>, initial: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            browse_name: None,
            initial: initial.into(),
            writable: false,
        }
    }

    /// Mark the tag writable.
    #[must_use]
    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    /// Set the browse name.
    #[must_use]
    pub fn with_browse_name(mut self, browse_name: impl Into<String>) -> Self {
        self.browse_name = Some(browse_name.into());
        self
    }

    /// Declared kind.
    #[inline]
    pub fn kind(&self) -> ValueKind {
        self.initial.kind()
    }

    /// Browse name, falling back to the tag name.
    pub fn display_name(&self) -> &str {
        self.browse_name.as_deref().unwrap_or(&self.name)
    }
}

/// A live tag in the registry.
///
/// The kind is fixed at construction; [`Tag::assign`] refuses values of any
/// other kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    browse_name: Option<String>,
    value: Value,
    writable: bool,
    updated_at: DateTime<Utc>,
}

impl Tag {
    /// Create a tag holding `value`.
    pub fn new(name: impl Into<String>, value: impl Into<Value>, writable: bool) -> Self {
        Self {
            name: name.into(),
            browse_name: None,
            value: value.into(),
            writable,
            updated_at: Utc::now(),
        }
    }

    /// Build a tag from its schema entry.
    pub fn from_spec(spec: &TagSpec) -> Self {
        let mut tag = Self::new(spec.name.clone(), spec.initial, spec.writable);
        tag.browse_name = spec.browse_name.clone();
        tag
    }

    /// Tag name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Browse name on the OPC UA server, falling back to the tag name.
    pub fn browse_name(&self) -> &str {
        self.browse_name.as_deref().unwrap_or(&self.name)
    }

    /// Current value.
    #[inline]
    pub fn value(&self) -> Value {
        self.value
    }

    /// Declared kind.
    #[inline]
    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    /// Whether external clients may write this tag.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Time of the last successful assignment.
    #[inline]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Replace the value, keeping the declared kind.
    pub fn assign(&mut self, value: Value) -> Result<()> {
        if value.kind() != self.kind() {
            return Err(SimError::TypeMismatch {
                tag: self.name.clone(),
                expected: self.kind(),
                actual: value.kind(),
            });
        }
        self.value = value;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        let v = Value::from(42.5);
        assert_eq!(v.as_f64(), Some(42.5));
        assert_eq!(v.as_bool(), None);
        assert_eq!(v.kind(), ValueKind::Float);

        let v = Value::from(true);
        assert_eq!(v.as_bool(), Some(true));
        assert_eq!(v.as_f64(), None);
        assert_eq!(v.kind(), ValueKind::Bool);
    }

    #[test]
    fn test_value_coerce() {
        assert_eq!(Value::Float(2.0).coerce(ValueKind::Bool), Value::Bool(true));
        assert_eq!(Value::Float(0.0).coerce(ValueKind::Bool), Value::Bool(false));
        assert_eq!(Value::Bool(true).coerce(ValueKind::Float), Value::Float(1.0));
        assert_eq!(Value::Float(3.5).coerce(ValueKind::Float), Value::Float(3.5));
    }

    #[test]
    fn test_value_untagged_serde() {
        let v: Value = serde_json::from_str("12.5").unwrap();
        assert_eq!(v, Value::Float(12.5));
        let v: Value = serde_json::from_str("false").unwrap();
        assert_eq!(v, Value::Bool(false));
        assert_eq!(serde_json::to_string(&Value::Bool(true)).unwrap(), "true");
    }

    #[test]
    fn test_tag_assign_keeps_kind() {
        let mut tag = Tag::new("level", 10.0, true);
        let before = tag.updated_at();

        tag.assign(Value::Float(20.0)).unwrap();
        assert_eq!(tag.value(), Value::Float(20.0));
        assert!(tag.updated_at() >= before);

        let err = tag.assign(Value::Bool(true)).unwrap_err();
        assert!(matches!(err, SimError::TypeMismatch { .. }));
        assert_eq!(tag.value(), Value::Float(20.0));
    }

    #[test]
    fn test_tag_spec_builder() {
        let spec = TagSpec::new("flow_in", 0.0)
            .writable()
            .with_browse_name("Flow_In_LPM");
        assert!(spec.writable);
        assert_eq!(spec.kind(), ValueKind::Float);
        assert_eq!(spec.display_name(), "Flow_In_LPM");

        let spec = TagSpec::new("auto_mode", false);
        assert_eq!(spec.display_name(), "auto_mode");
    }
}
