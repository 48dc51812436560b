//! Core traits at the seams of a station.
//!
//! # Trait Map
//!
//! ```text
//! Tick loop (sequential per tick)
//! ├── SimulationEngine      // concrete, generates nominal/anomalous values
//! ├── ControlPolicy         // reads command tags, drives actuator tags
//! └── TelemetryTransport    // ships a snapshot record to a collector
//!
//! Background tasks
//! └── RemoteSource          // gateway bridging: reads remote nodes
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::data::Value;
use crate::core::error::Result;
use crate::store::TagTable;
use crate::telemetry::TelemetryRecord;

/// Connection state of an outbound link (telemetry collector, remote endpoint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,

    /// Attempting to connect.
    Connecting,

    /// Connected and operational.
    Connected,

    /// Last attempt failed; the next cycle will reconnect.
    Error,
}

impl ConnectionState {
    /// Check if currently connected.
    #[inline]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if a (re)connect attempt is due.
    #[inline]
    pub const fn can_retry(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Error => "Error",
        };
        write!(f, "{}", s)
    }
}

/// A control policy run once per tick after the simulation step.
///
/// Policies see the whole tag table inside the tick transaction, so a pair of
/// actuator tags is never observed half-updated.
pub trait ControlPolicy: Send {
    /// Short policy name for logs.
    fn name(&self) -> &'static str;

    /// Consume command tags and drive actuator tags.
    fn apply(&mut self, tags: &mut TagTable) -> Result<()>;
}

/// Outbound link to a telemetry collector.
#[async_trait]
pub trait TelemetryTransport: Send {
    /// Collector address, for logs.
    fn endpoint(&self) -> &str;

    /// Current link state.
    fn connection_state(&self) -> ConnectionState;

    /// Open (or reopen) the link.
    async fn connect(&mut self) -> Result<()>;

    /// Submit one record. Fails with [`SimError::Transport`](crate::SimError::Transport)
    /// on any network error, non-success status or timeout.
    async fn send(&mut self, record: &TelemetryRecord) -> Result<()>;

    /// Tear the link down.
    async fn close(&mut self);
}

/// A remote endpoint that tag values can be pulled from.
#[async_trait]
pub trait RemoteSource: Send {
    /// Remote address, for logs.
    fn endpoint(&self) -> &str;

    /// Current link state.
    fn connection_state(&self) -> ConnectionState;

    /// Open the session.
    async fn connect(&mut self) -> Result<()>;

    /// Close the session.
    async fn disconnect(&mut self) -> Result<()>;

    /// Read the given node identifiers.
    ///
    /// Returns one entry per requested node, in order. `None` marks a node
    /// whose value was unavailable (bad status, unsupported type).
    async fn read_values(&mut self, node_ids: &[String]) -> Result<Vec<Option<Value>>>;
}
