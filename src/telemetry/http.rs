//! HTTP JSON transport for telemetry records.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::core::error::{Result, SimError};
use crate::core::traits::{ConnectionState, TelemetryTransport};

use super::{TelemetryConfig, TelemetryRecord};

/// POSTs each record as `application/json` to a fixed collector URL.
///
/// The underlying `reqwest::Client` keeps one pooled keep-alive connection to
/// the collector. [`close`](TelemetryTransport::close) drops the client so the
/// next [`connect`](TelemetryTransport::connect) starts from a fresh socket.
pub struct HttpTransport {
    endpoint: String,
    timeout: Duration,
    client: Option<reqwest::Client>,
    state: ConnectionState,
}

impl HttpTransport {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            endpoint: config.endpoint(),
            timeout: config.timeout(),
            client: None,
            state: ConnectionState::Disconnected,
        }
    }
}

#[async_trait]
impl TelemetryTransport for HttpTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn connection_state(&self) -> ConnectionState {
        self.state
    }

    async fn connect(&mut self) -> Result<()> {
        self.state = ConnectionState::Connecting;
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .pool_max_idle_per_host(1)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                self.state = ConnectionState::Error;
                SimError::transport(format!("failed to build HTTP client: {}", e))
            })?;
        self.client = Some(client);
        self.state = ConnectionState::Connected;
        Ok(())
    }

    async fn send(&mut self, record: &TelemetryRecord) -> Result<()> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| SimError::transport("not connected"))?;

        let response = match client.post(&self.endpoint).json(record).send().await {
            Ok(r) => r,
            Err(e) => {
                self.state = ConnectionState::Error;
                return Err(e.into());
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            self.state = ConnectionState::Error;
            return Err(SimError::transport(format!("HTTP {}: {}", status, body)));
        }

        debug!(status = %status, body = %body, "Collector response");
        Ok(())
    }

    async fn close(&mut self) {
        self.client = None;
        self.state = ConnectionState::Disconnected;
    }
}
