//! OPC UA protocol adapter.
//!
//! Built on `async-opcua`:
//!
//! - [`TagServer`]: exposes every registry tag as a variable under one object
//!   node; writability follows the tag's writable flag.
//! - [`OpcUaRemoteSource`]: client session used by the gateway bridge to read
//!   remote nodes into local tags.
//!
//! # Example
//!
//! ```rust,ignore
//! use procsim::protocols::opcua::TagServer;
//!
//! let server = TagServer::new(config.server.clone(), Arc::clone(&registry));
//! tokio::spawn(server.run(shutdown_rx));
//! ```

pub mod client;
pub mod server;

pub use client::{OpcUaClientConfig, OpcUaRemoteSource};
pub use server::TagServer;

use opcua::types::{DataTypeId, NodeId, StatusCode, Variant};

use crate::core::data::{Value, ValueKind};
use crate::core::error::{Result, SimError};

/// Parsed `opc.tcp://host:port/path` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointUrl {
    pub host: String,
    pub port: u16,
    pub path: String,
}

/// Default OPC UA TCP port.
pub const DEFAULT_PORT: u16 = 4840;

impl EndpointUrl {
    /// Parse an endpoint URL. The port defaults to 4840 and the path to `/`.
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url.strip_prefix("opc.tcp://").ok_or_else(|| {
            SimError::config(format!(
                "Invalid OPC UA endpoint: {}. Expected 'opc.tcp://host:port/path'",
                url
            ))
        })?;

        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| SimError::config(format!("Invalid port in endpoint: {}", url)))?;
                (host, port)
            }
            None => (authority, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(SimError::config(format!("Missing host in endpoint: {}", url)));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }
}

impl std::fmt::Display for EndpointUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "opc.tcp://{}:{}{}", self.host, self.port, self.path)
    }
}

/// Split `"ns=2;s=Tag"` into namespace index and identifier part.
///
/// A missing `ns=` prefix means namespace 0.
pub fn split_node_id(address: &str) -> Result<(u16, &str)> {
    match address.strip_prefix("ns=").and_then(|r| r.split_once(';')) {
        Some((ns, identifier)) => {
            let ns = ns
                .parse::<u16>()
                .map_err(|_| SimError::config(format!("Invalid namespace index: {}", address)))?;
            Ok((ns, identifier))
        }
        None => Ok((0, address)),
    }
}

/// Parse NodeId from its identifier part.
fn parse_node_id(identifier: &str, namespace_index: u16) -> NodeId {
    // Support multiple formats:
    // - "i=1234" -> Numeric identifier
    // - "s=Temperature" -> String identifier
    // - Just a string -> String identifier
    if let Some(id_str) = identifier.strip_prefix("i=") {
        if let Ok(id) = id_str.parse::<u32>() {
            return NodeId::new(namespace_index, id);
        }
    } else if let Some(s_str) = identifier.strip_prefix("s=") {
        return NodeId::new(namespace_index, s_str.to_string());
    }

    NodeId::new(namespace_index, identifier.to_string())
}

/// Parse a full node address such as `"ns=2;s=Channel1.Device1.Tag1"`.
pub fn parse_node_address(address: &str) -> Result<NodeId> {
    let (ns, identifier) = split_node_id(address)?;
    Ok(parse_node_id(identifier, ns))
}

/// Convert a tag value to an OPC UA variant.
pub(crate) fn value_to_variant(value: Value) -> Variant {
    match value {
        Value::Float(v) => Variant::Double(v),
        Value::Bool(v) => Variant::Boolean(v),
    }
}

/// Convert an OPC UA variant to a tag value.
///
/// All numeric variants become floats; unsupported variants yield `None`.
pub(crate) fn variant_to_value(variant: &Variant) -> Option<Value> {
    let value = match variant {
        Variant::Boolean(v) => Value::Bool(*v),
        Variant::SByte(v) => Value::Float(*v as f64),
        Variant::Byte(v) => Value::Float(*v as f64),
        Variant::Int16(v) => Value::Float(*v as f64),
        Variant::UInt16(v) => Value::Float(*v as f64),
        Variant::Int32(v) => Value::Float(*v as f64),
        Variant::UInt32(v) => Value::Float(*v as f64),
        Variant::Int64(v) => Value::Float(*v as f64),
        Variant::UInt64(v) => Value::Float(*v as f64),
        Variant::Float(v) => Value::Float(*v as f64),
        Variant::Double(v) => Value::Float(*v),
        _ => return None,
    };
    Some(value)
}

/// OPC UA data type of a tag kind.
pub(crate) fn data_type_of(kind: ValueKind) -> DataTypeId {
    match kind {
        ValueKind::Float => DataTypeId::Double,
        ValueKind::Bool => DataTypeId::Boolean,
    }
}

/// Status code reported to a client for a rejected write.
pub(crate) fn status_for_error(error: &SimError) -> StatusCode {
    match error {
        SimError::NotFound { .. } => StatusCode::BadNodeIdUnknown,
        SimError::TypeMismatch { .. } => StatusCode::BadTypeMismatch,
        SimError::ReadOnly { .. } => StatusCode::BadNotWritable,
        _ => StatusCode::BadInternalError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_parsing() {
        let ep = EndpointUrl::parse("opc.tcp://0.0.0.0:4840/pumping_station/server/").unwrap();
        assert_eq!(ep.host, "0.0.0.0");
        assert_eq!(ep.port, 4840);
        assert_eq!(ep.path, "/pumping_station/server/");

        let ep = EndpointUrl::parse("opc.tcp://localhost").unwrap();
        assert_eq!(ep.port, DEFAULT_PORT);
        assert_eq!(ep.path, "/");
        assert_eq!(ep.to_string(), "opc.tcp://localhost:4840/");

        assert!(EndpointUrl::parse("http://localhost:4840").is_err());
        assert!(EndpointUrl::parse("opc.tcp://host:notaport").is_err());
        assert!(EndpointUrl::parse("opc.tcp://:4840").is_err());
    }

    #[test]
    fn test_split_node_id() {
        assert_eq!(
            split_node_id("ns=2;s=Channel1.Device1.Tag1").unwrap(),
            (2, "s=Channel1.Device1.Tag1")
        );
        assert_eq!(split_node_id("i=85").unwrap(), (0, "i=85"));
        assert!(split_node_id("ns=x;i=1").is_err());
    }

    #[test]
    fn test_node_id_parsing() {
        let node_id = parse_node_address("ns=2;i=1234").unwrap();
        assert_eq!(node_id, NodeId::new(2, 1234u32));

        let node_id = parse_node_address("ns=2;s=Channel1.Device1.Tag1").unwrap();
        assert_eq!(node_id, NodeId::new(2, "Channel1.Device1.Tag1".to_string()));

        let node_id = parse_node_id("Temperature", 3);
        assert_eq!(node_id.namespace, 3);
    }

    #[test]
    fn test_variant_conversion() {
        assert_eq!(
            variant_to_value(&Variant::Double(25.5)),
            Some(Value::Float(25.5))
        );
        assert_eq!(
            variant_to_value(&Variant::Boolean(true)),
            Some(Value::Bool(true))
        );
        assert_eq!(
            variant_to_value(&Variant::Int32(100)),
            Some(Value::Float(100.0))
        );
        assert_eq!(variant_to_value(&Variant::Empty), None);

        assert_eq!(value_to_variant(Value::Float(1.5)), Variant::Double(1.5));
        assert_eq!(value_to_variant(Value::Bool(false)), Variant::Boolean(false));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for_error(&SimError::ReadOnly { tag: "x".into() }),
            StatusCode::BadNotWritable
        );
        assert_eq!(
            status_for_error(&SimError::not_found("x")),
            StatusCode::BadNodeIdUnknown
        );
    }
}
