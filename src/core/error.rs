//! Error types for the process simulator.

use thiserror::Error;

use crate::core::data::ValueKind;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors raised by the registry, the simulation and the I/O adapters.
#[derive(Debug, Error)]
pub enum SimError {
    /// A tag name that is not part of the schema.
    #[error("Tag not found: {tag}")]
    NotFound { tag: String },

    /// A value whose kind differs from the tag's declared kind.
    #[error("Type mismatch on tag {tag}: expected {expected}, got {actual}")]
    TypeMismatch {
        tag: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// An external write to a tag that is not writable.
    #[error("Tag is read-only: {tag}")]
    ReadOnly { tag: String },

    /// Telemetry or gateway transport failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Error reported by the OPC UA stack, passed through as text.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Create a not-found error.
    pub fn not_found(tag: impl Into<String>) -> Self {
        Self::NotFound { tag: tag.into() }
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Transport failures are recovered locally (log + reconnect).
    #[inline]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Registry misuse from inside the process: a schema/code bug, not a runtime condition.
    #[inline]
    pub fn is_programming_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::TypeMismatch { .. })
    }
}

impl From<reqwest::Error> for SimError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<toml::de::Error> for SimError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(SimError::not_found("x").is_programming_error());
        assert!(SimError::TypeMismatch {
            tag: "x".into(),
            expected: ValueKind::Float,
            actual: ValueKind::Bool,
        }
        .is_programming_error());
        assert!(SimError::transport("refused").is_transport());
        assert!(!SimError::transport("refused").is_programming_error());
        assert!(!SimError::config("bad").is_transport());
    }

    #[test]
    fn test_error_display() {
        let err = SimError::TypeMismatch {
            tag: "tank_level".into(),
            expected: ValueKind::Float,
            actual: ValueKind::Bool,
        };
        assert_eq!(
            err.to_string(),
            "Type mismatch on tag tank_level: expected float, got bool"
        );
        assert_eq!(SimError::not_found("foo").to_string(), "Tag not found: foo");
    }
}
