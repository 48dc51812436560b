//! Telemetry relay.
//!
//! Once per tick the station snapshots the published tags, turns the snapshot
//! into a flat JSON record and hands it to a [`TelemetryTransport`]. Failures
//! are logged and trigger a reconnect on the next tick; they never stop the
//! tick loop.
//!
//! # Example
//!
//! ```rust,ignore
//! use procsim::telemetry::{HttpTransport, TelemetryConfig, TelemetrySink};
//!
//! let config: TelemetryConfig = toml::from_str(r#"
//!     url = "http://localhost:3000"
//!     path = "/api/factory_tank"
//!     [fields]
//!     tank_level = "tank_level"
//! "#)?;
//! let mut sink = TelemetrySink::new(Box::new(HttpTransport::new(&config)), &config);
//! let snapshot = registry.snapshot(&sink.tags())?;
//! sink.publish(&snapshot).await;
//! ```

mod http;

pub use http::HttpTransport;

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::data::Value;
use crate::core::error::{Result, SimError};
use crate::core::traits::TelemetryTransport;
use crate::store::{TagTable, TelemetrySnapshot};

/// Telemetry section of a station configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Collector base URL, e.g. `https://collector.example.com`.
    pub url: String,

    /// Request path on the collector.
    #[serde(default = "default_path")]
    pub path: String,

    /// Request timeout; expiry counts as a transport failure.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Published record layout: JSON field name -> tag name.
    pub fields: IndexMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

fn default_path() -> String {
    "/api/factory_tank".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

impl TelemetryConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(SimError::config(format!(
                "telemetry url must start with http:// or https://, got '{}'",
                self.url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(SimError::config("telemetry timeout_ms must be > 0"));
        }
        if self.fields.is_empty() {
            return Err(SimError::config("telemetry needs at least one field"));
        }
        Ok(())
    }

    /// Check that every mapped tag exists.
    pub fn validate_against(&self, tags: &TagTable) -> Result<()> {
        for (field, tag) in &self.fields {
            if !tags.contains(tag) {
                return Err(SimError::config(format!(
                    "telemetry field '{}' refers to unknown tag '{}'",
                    field, tag
                )));
            }
        }
        Ok(())
    }

    /// Full collector URL.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Flat JSON object sent to the collector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TelemetryRecord(serde_json::Map<String, serde_json::Value>);

impl TelemetryRecord {
    /// Lay out a snapshot according to a field mapping.
    ///
    /// Tags missing from the snapshot are skipped; a non-finite float
    /// becomes `null`.
    pub fn from_snapshot(snapshot: &TelemetrySnapshot, fields: &IndexMap<String, String>) -> Self {
        let mut map = serde_json::Map::with_capacity(fields.len());
        for (field, tag) in fields {
            if let Some(value) = snapshot.get(tag) {
                map.insert(field.clone(), to_json(value));
            }
        }
        Self(map)
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.0.get(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> serde_json::Map<String, serde_json::Value> {
        self.0
    }
}

fn to_json(value: Value) -> serde_json::Value {
    match value {
        Value::Float(v) => serde_json::Number::from_f64(v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Bool(v) => serde_json::Value::Bool(v),
    }
}

/// Result of one publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Record accepted by the collector.
    Sent,
    /// Connect or send failed; the link was torn down for the next tick.
    Failed,
}

/// Publish counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryStats {
    pub sent: u64,
    pub failures: u64,
    /// Connect attempts made after a failure.
    pub reconnects: u64,
}

/// Snapshot publisher with reconnect-on-failure.
pub struct TelemetrySink {
    transport: Box<dyn TelemetryTransport>,
    fields: IndexMap<String, String>,
    timeout: Duration,
    stats: TelemetryStats,
}

impl TelemetrySink {
    pub fn new(transport: Box<dyn TelemetryTransport>, config: &TelemetryConfig) -> Self {
        Self {
            transport,
            fields: config.fields.clone(),
            timeout: config.timeout(),
            stats: TelemetryStats::default(),
        }
    }

    /// Tags to include in the per-tick snapshot.
    pub fn tags(&self) -> Vec<&str> {
        self.fields.values().map(String::as_str).collect()
    }

    #[inline]
    pub fn stats(&self) -> TelemetryStats {
        self.stats
    }

    #[inline]
    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    /// Serialize and submit one snapshot.
    ///
    /// Bounded by the configured timeout. Never returns an error: failures
    /// are logged, counted and followed by a teardown so that the next call
    /// starts from a fresh connection.
    pub async fn publish(&mut self, snapshot: &TelemetrySnapshot) -> PublishOutcome {
        let record = TelemetryRecord::from_snapshot(snapshot, &self.fields);

        if self.transport.connection_state().can_retry() {
            if let Err(e) = self.transport.connect().await {
                warn!(endpoint = %self.transport.endpoint(), error = %e, "Telemetry connect failed");
                self.stats.failures += 1;
                return PublishOutcome::Failed;
            }
            if self.stats.failures > 0 {
                self.stats.reconnects += 1;
            }
        }

        let result = match tokio::time::timeout(self.timeout, self.transport.send(&record)).await {
            Ok(result) => result,
            Err(_) => Err(SimError::transport(format!(
                "request timed out after {:?}",
                self.timeout
            ))),
        };

        match result {
            Ok(()) => {
                self.stats.sent += 1;
                debug!(endpoint = %self.transport.endpoint(), fields = record.len(), "Telemetry published");
                PublishOutcome::Sent
            }
            Err(e) => {
                warn!(endpoint = %self.transport.endpoint(), error = %e, "Telemetry publish failed, reconnecting");
                self.stats.failures += 1;
                self.transport.close().await;
                PublishOutcome::Failed
            }
        }
    }

    /// Close the outbound link.
    pub async fn close(&mut self) {
        self.transport.close().await;
    }
}
