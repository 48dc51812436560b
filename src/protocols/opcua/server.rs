//! OPC UA server exposing the tag registry.
//!
//! One object node is created under the Objects folder and every tag becomes
//! a variable component of it. Values are served live from the registry
//! through read callbacks; client writes go through
//! [`Registry::write_external`], which enforces the writable flag and the tag
//! kind.

use std::sync::Arc;

use opcua::nodes::{ObjectBuilder, VariableBuilder};
use opcua::server::diagnostics::NamespaceMetadata;
use opcua::server::node_manager::memory::{simple_node_manager, SimpleNodeManager};
use opcua::server::{ServerBuilder, ServerEndpoint, ServerHandle, ANONYMOUS_USER_TOKEN_ID};
use opcua::types::{DataValue, NodeId, ObjectId, StatusCode};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::core::error::{Result, SimError};
use crate::station::ServerConfig;
use crate::store::Registry;

use super::{data_type_of, status_for_error, value_to_variant, variant_to_value, EndpointUrl};

const NODE_MANAGER_NAME: &str = "procsim";

/// OPC UA server bound to a registry.
pub struct TagServer {
    config: ServerConfig,
    registry: Arc<Registry>,
}

impl TagServer {
    pub fn new(config: ServerConfig, registry: Arc<Registry>) -> Self {
        Self { config, registry }
    }

    /// Node id of a tag variable within the server namespace.
    pub fn tag_node_id(namespace: u16, tag: &str) -> NodeId {
        NodeId::new(namespace, tag.to_string())
    }

    /// Build the server, populate the address space and serve until
    /// `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let endpoint = EndpointUrl::parse(&self.config.endpoint_url)?;
        let (server, handle) = self.build(&endpoint)?;
        self.populate(&handle)?;

        info!(
            endpoint = %endpoint,
            server = %self.config.server_name,
            object = %self.config.object_name,
            tags = self.registry.len(),
            "OPC UA server started"
        );

        let cancel = handle.clone();
        let watcher = tokio::spawn(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            debug!("Stopping OPC UA server");
            cancel.cancel();
        });

        let result = server.run().await;
        watcher.abort();

        match result {
            Ok(()) => {
                info!("OPC UA server stopped");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "OPC UA server failed");
                Err(SimError::Protocol(e))
            }
        }
    }

    fn build(&self, endpoint: &EndpointUrl) -> Result<(opcua::server::Server, ServerHandle)> {
        let mut builder = ServerBuilder::new_anonymous(&self.config.server_name)
            .application_uri(format!("urn:{}", self.config.server_name))
            .product_uri(format!("urn:{}", self.config.server_name))
            .host(endpoint.host.clone())
            .port(endpoint.port)
            .discovery_urls(vec![endpoint.to_string()])
            .create_sample_keypair(true)
            .with_node_manager(simple_node_manager(
                NamespaceMetadata {
                    namespace_uri: self.config.namespace_uri.clone(),
                    ..Default::default()
                },
                NODE_MANAGER_NAME,
            ));

        if endpoint.path != "/" {
            builder = builder.add_endpoint(
                "path",
                ServerEndpoint::new_none(
                    endpoint.path.as_str(),
                    &[ANONYMOUS_USER_TOKEN_ID.to_string()],
                ),
            );
        }

        builder.build().map_err(SimError::Protocol)
    }

    fn populate(&self, handle: &ServerHandle) -> Result<()> {
        let manager = handle
            .node_managers()
            .get_of_type::<SimpleNodeManager>()
            .ok_or_else(|| SimError::Protocol("node manager not registered".into()))?;
        let ns = handle.get_namespace_index(&self.config.namespace_uri).ok_or_else(|| {
            SimError::Protocol(format!(
                "namespace {} not registered",
                self.config.namespace_uri
            ))
        })?;

        let object_id = NodeId::new(ns, self.config.object_name.clone());
        let tags = self.registry.tags();
        {
            let mut space = manager.address_space().write();
            let object_name = self.config.object_name.as_str();
            ObjectBuilder::new(&object_id, object_name, object_name)
                .organized_by(ObjectId::ObjectsFolder)
                .insert(&mut *space);

            for tag in &tags {
                let node_id = Self::tag_node_id(ns, tag.name());
                let mut variable =
                    VariableBuilder::new(&node_id, tag.browse_name(), tag.browse_name())
                        .data_type(data_type_of(tag.kind()))
                        .value(value_to_variant(tag.value()))
                        .component_of(object_id.clone());
                if tag.is_writable() {
                    variable = variable.writable();
                }
                variable.insert(&mut *space);
            }
        }

        for tag in &tags {
            let node_id = Self::tag_node_id(ns, tag.name());

            let registry = Arc::clone(&self.registry);
            let name = tag.name().to_string();
            manager
                .inner()
                .add_read_callback(node_id.clone(), move |_, _, _| {
                    registry
                        .get(&name)
                        .map(|v| DataValue::new_now(value_to_variant(v)))
                        .map_err(|e| status_for_error(&e))
                });

            let registry = Arc::clone(&self.registry);
            let name = tag.name().to_string();
            manager
                .inner()
                .add_write_callback(node_id, move |data: DataValue, _| {
                    let Some(value) = data.value.as_ref().and_then(variant_to_value) else {
                        warn!(tag = %name, "Rejected write with unsupported value");
                        return StatusCode::BadTypeMismatch;
                    };
                    match registry.write_external(&name, value) {
                        Ok(()) => {
                            info!(tag = %name, value = %value, "External write");
                            StatusCode::Good
                        }
                        Err(e) => {
                            warn!(tag = %name, error = %e, "Rejected external write");
                            status_for_error(&e)
                        }
                    }
                });
        }

        Ok(())
    }
}
