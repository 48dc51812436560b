//! Gateway bridging.
//!
//! Periodically reads a fixed set of remote nodes through a
//! [`RemoteSource`] and writes the values into local tags. A remote that is
//! down is never fatal: the failure is logged, the session is dropped and the
//! next interval tries to connect again.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::core::error::{Result, SimError};
use crate::core::traits::RemoteSource;
use crate::store::{Registry, TagTable};

// ============================================================================
// Configuration
// ============================================================================

/// Remote node to local tag mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMapping {
    /// Remote node identifier, e.g. `ns=2;s=Channel1.Device1.Tag1`.
    pub node_id: String,

    /// Local tag receiving the value.
    pub tag: String,
}

impl NodeMapping {
    pub fn new(node_id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            tag: tag.into(),
        }
    }
}

/// `[gateway]` section of a station configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Remote endpoint URL.
    pub endpoint_url: String,

    /// Poll interval in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Per-read timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub nodes: Vec<NodeMapping>,
}

fn default_enabled() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    5000
}

fn default_request_timeout() -> u64 {
    3000
}

impl GatewayConfig {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            endpoint_url: endpoint_url.into(),
            poll_interval_ms: default_poll_interval(),
            request_timeout_ms: default_request_timeout(),
            nodes: Vec::new(),
        }
    }

    /// Add a node mapping.
    pub fn with_node(mut self, node_id: impl Into<String>, tag: impl Into<String>) -> Self {
        self.nodes.push(NodeMapping::new(node_id, tag));
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint_url.is_empty() {
            return Err(SimError::config("gateway: endpoint_url is empty"));
        }
        if self.poll_interval_ms == 0 {
            return Err(SimError::config("gateway: poll_interval_ms must be > 0"));
        }
        if self.request_timeout_ms == 0 {
            return Err(SimError::config("gateway: request_timeout_ms must be > 0"));
        }
        Ok(())
    }

    /// Check that every mapped tag exists.
    ///
    /// Any kind is accepted; remote values are coerced on write.
    pub fn validate_against(&self, tags: &TagTable) -> Result<()> {
        for node in &self.nodes {
            if !tags.contains(&node.tag) {
                return Err(SimError::config(format!(
                    "gateway: node {} maps to unknown tag {}",
                    node.node_id, node.tag
                )));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[inline]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// ============================================================================
// Bridge
// ============================================================================

/// Gateway counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStats {
    /// Successful poll cycles.
    pub polls: u64,
    /// Failed connect or read attempts.
    pub failures: u64,
    /// Tag values written.
    pub values_written: u64,
    /// Values skipped (unavailable remotely).
    pub values_skipped: u64,
}

/// Result of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Values read; `written` tags updated.
    Updated { written: usize },
    /// The remote was unreachable or the read failed.
    Unavailable,
}

/// Polls a remote source into the registry.
pub struct GatewayBridge<S: RemoteSource> {
    source: S,
    registry: Arc<Registry>,
    nodes: Vec<NodeMapping>,
    node_ids: Vec<String>,
    interval: Duration,
    stats: GatewayStats,
}

impl<S: RemoteSource> GatewayBridge<S> {
    pub fn new(source: S, registry: Arc<Registry>, config: &GatewayConfig) -> Self {
        let node_ids = config.nodes.iter().map(|n| n.node_id.clone()).collect();
        Self {
            source,
            registry,
            nodes: config.nodes.clone(),
            node_ids,
            interval: config.poll_interval(),
            stats: GatewayStats::default(),
        }
    }

    #[inline]
    pub fn stats(&self) -> GatewayStats {
        self.stats
    }

    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run one poll cycle: connect if needed, read, write into the registry.
    ///
    /// Remote failures are logged and reported as
    /// [`PollOutcome::Unavailable`]; only a local registry error is returned.
    /// The session is dropped on transport failures and kept otherwise.
    pub async fn poll_once(&mut self) -> Result<PollOutcome> {
        if self.source.connection_state().can_retry() {
            if let Err(e) = self.source.connect().await {
                self.stats.failures += 1;
                warn!(
                    endpoint = %self.source.endpoint(),
                    error = %e,
                    "Gateway unavailable, serving local data only"
                );
                return Ok(PollOutcome::Unavailable);
            }
        }

        let values = match self.source.read_values(&self.node_ids).await {
            Ok(values) => values,
            Err(e) => {
                self.stats.failures += 1;
                warn!(endpoint = %self.source.endpoint(), error = %e, "Gateway read failed");
                if e.is_transport() {
                    let _ = self.source.disconnect().await;
                }
                return Ok(PollOutcome::Unavailable);
            }
        };

        let nodes = &self.nodes;
        let (written, skipped) = self.registry.update(|tags| {
            let mut written = 0;
            let mut skipped = 0;
            for (node, value) in nodes.iter().zip(values) {
                let Some(value) = value else {
                    skipped += 1;
                    continue;
                };
                let value = value.coerce(tags.kind_of(&node.tag)?);
                tags.set(&node.tag, value)?;
                debug!(node = %node.node_id, tag = %node.tag, value = %value, "Gateway value");
                written += 1;
            }
            Ok((written, skipped))
        })?;

        if skipped > 0 {
            warn!(skipped, "Some gateway nodes returned no usable value");
        }

        self.stats.polls += 1;
        self.stats.values_written += written as u64;
        self.stats.values_skipped += skipped as u64;
        Ok(PollOutcome::Updated { written })
    }

    /// Poll on a fixed interval until `shutdown` flips to `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<GatewayStats> {
        info!(
            endpoint = %self.source.endpoint(),
            nodes = self.nodes.len(),
            interval_ms = self.interval.as_millis() as u64,
            "Gateway bridge started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await?;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let _ = self.source.disconnect().await;
        info!(
            polls = self.stats.polls,
            failures = self.stats.failures,
            "Gateway bridge stopped"
        );
        Ok(self.stats)
    }
}
