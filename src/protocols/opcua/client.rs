//! OPC UA client side of the gateway bridge.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opcua::client::{ClientBuilder, IdentityToken, Session};
use opcua::crypto::SecurityPolicy;
use opcua::types::{
    AttributeId, MessageSecurityMode, QualifiedName, ReadValueId, TimestampsToReturn, UAString,
    UserTokenPolicy,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::data::Value;
use crate::core::error::{Result, SimError};
use crate::core::traits::{ConnectionState, RemoteSource};

use super::{parse_node_address, variant_to_value};

// ============================================================================
// Configuration
// ============================================================================

/// Client session settings.
#[derive(Debug, Clone)]
pub struct OpcUaClientConfig {
    /// Server endpoint URL (e.g., "opc.tcp://localhost:49320/...").
    pub endpoint_url: String,

    /// Application name reported to the server.
    pub application_name: String,

    /// Application URI reported to the server.
    pub application_uri: String,

    /// Per-request timeout for reads.
    pub request_timeout: Duration,

    /// Session retry limit passed to the client.
    pub session_retry_limit: u32,
}

impl Default for OpcUaClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "opc.tcp://localhost:4840".to_string(),
            application_name: "procsim-gateway".to_string(),
            application_uri: "urn:procsim:gateway".to_string(),
            request_timeout: Duration::from_secs(5),
            session_retry_limit: 3,
        }
    }
}

impl OpcUaClientConfig {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            ..Default::default()
        }
    }

    /// Set per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set application identity.
    pub fn with_application(mut self, name: impl Into<String>, uri: impl Into<String>) -> Self {
        self.application_name = name.into();
        self.application_uri = uri.into();
        self
    }
}

// ============================================================================
// Remote source
// ============================================================================

/// Anonymous, unsecured client session reading node values on demand.
pub struct OpcUaRemoteSource {
    config: OpcUaClientConfig,
    session: Option<Arc<Session>>,
    event_loop: Option<JoinHandle<opcua::types::StatusCode>>,
    state: ConnectionState,
}

impl OpcUaRemoteSource {
    pub fn new(config: OpcUaClientConfig) -> Self {
        Self {
            config,
            session: None,
            event_loop: None,
            state: ConnectionState::Disconnected,
        }
    }
}

#[async_trait]
impl RemoteSource for OpcUaRemoteSource {
    fn endpoint(&self) -> &str {
        &self.config.endpoint_url
    }

    fn connection_state(&self) -> ConnectionState {
        self.state
    }

    async fn connect(&mut self) -> Result<()> {
        self.state = ConnectionState::Connecting;

        let mut client = ClientBuilder::new()
            .application_name(&self.config.application_name)
            .application_uri(&self.config.application_uri)
            .session_retry_limit(self.config.session_retry_limit as i32)
            .create_sample_keypair(true)
            .trust_server_certs(true)
            .client()
            .map_err(|e| {
                self.state = ConnectionState::Error;
                SimError::config(e.join(", "))
            })?;

        let connect = client.connect_to_matching_endpoint(
            (
                self.config.endpoint_url.as_str(),
                SecurityPolicy::None.to_uri(),
                MessageSecurityMode::None,
                UserTokenPolicy::anonymous(),
            ),
            IdentityToken::Anonymous,
        );
        let (session, event_loop) = match tokio::time::timeout(self.config.request_timeout, connect).await {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => {
                self.state = ConnectionState::Error;
                return Err(SimError::transport(format!("{}: {}", self.config.endpoint_url, e)));
            }
            Err(_) => {
                self.state = ConnectionState::Error;
                return Err(SimError::transport(format!(
                    "{}: connect timed out",
                    self.config.endpoint_url
                )));
            }
        };

        self.event_loop = Some(event_loop.spawn());

        let connected = tokio::time::timeout(self.config.request_timeout, session.wait_for_connection())
            .await
            .unwrap_or(false);
        if !connected {
            self.disconnect().await?;
            self.state = ConnectionState::Error;
            return Err(SimError::transport(format!(
                "{}: session did not become active",
                self.config.endpoint_url
            )));
        }

        info!(endpoint = %self.config.endpoint_url, "Gateway session connected");
        self.session = Some(session);
        self.state = ConnectionState::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            let _ = session.disconnect().await;
        }
        if let Some(handle) = self.event_loop.take() {
            handle.abort();
        }
        self.state = ConnectionState::Disconnected;
        Ok(())
    }

    async fn read_values(&mut self, nodes: &[String]) -> Result<Vec<Option<Value>>> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| SimError::transport("gateway session not connected"))?;

        let requests = nodes
            .iter()
            .map(|address| {
                Ok(ReadValueId {
                    node_id: parse_node_address(address)?,
                    attribute_id: AttributeId::Value as u32,
                    index_range: UAString::null(),
                    data_encoding: QualifiedName::null(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let read = session.read(&requests, TimestampsToReturn::Neither, 0.0);
        let results = match tokio::time::timeout(self.config.request_timeout, read).await {
            Ok(Ok(results)) => results,
            Ok(Err(status)) => {
                self.state = ConnectionState::Error;
                return Err(SimError::transport(format!("read failed: {}", status)));
            }
            Err(_) => {
                self.state = ConnectionState::Error;
                return Err(SimError::transport("read timed out"));
            }
        };

        let values = nodes
            .iter()
            .zip(results.iter())
            .map(|(address, data)| {
                if let Some(status) = data.status {
                    if !status.is_good() {
                        warn!(node = %address, status = %status, "Bad status from gateway");
                        return None;
                    }
                }
                let value = data.value.as_ref().and_then(variant_to_value);
                if value.is_none() {
                    debug!(node = %address, "Unsupported or empty value from gateway");
                }
                value
            })
            .collect();

        Ok(values)
    }
}
