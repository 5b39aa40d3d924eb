//! Commissioned nodes, their endpoints, and the bridge view over them.

use super::clusters::{BasicInformationAttribute, ClusterClient, ClusterKind, DescriptorAttribute};
use crate::error::{BridgeError, Result};
use log::debug;
use std::fmt;
use std::sync::Arc;

/// Endpoint number of the aggregator on a bridge node.
pub const AGGREGATOR_ENDPOINT: u16 = 1;

/// Endpoint number of the root node endpoint.
pub const ROOT_ENDPOINT: u16 = 0;

/// A logical sub-device on a remote node.
pub trait Endpoint: Send + Sync {
    /// Stable endpoint number within the node.
    fn number(&self) -> u16;

    /// Primary device type identifier.
    fn device_type(&self) -> u32;

    fn cluster_client(&self, cluster: ClusterKind) -> Option<Arc<dyn ClusterClient>>;

    fn has_cluster(&self, cluster: ClusterKind) -> bool {
        self.cluster_client(cluster).is_some()
    }

    /// Endpoints composed under this one (aggregator children).
    fn child_endpoints(&self) -> Vec<Arc<dyn Endpoint>>;
}

/// A commissioned remote node.
pub trait Node: Send + Sync {
    fn node_id(&self) -> u64;

    fn is_connected(&self) -> bool;

    fn endpoint(&self, number: u16) -> Option<Arc<dyn Endpoint>>;

    fn root_cluster_client(&self, cluster: ClusterKind) -> Option<Arc<dyn ClusterClient>> {
        self.endpoint(ROOT_ENDPOINT)?.cluster_client(cluster)
    }
}

/// A bridge node exposing bridged devices under its aggregator endpoint.
#[derive(Clone)]
pub struct MatterBridge {
    pub node_id: u64,
    pub vendor_name: String,
    pub product_name: String,
    pub label: String,
    /// Label with spaces replaced, used as the entity id prefix
    pub identifier: String,
    node: Arc<dyn Node>,
    aggregator: Arc<dyn Endpoint>,
}

impl fmt::Debug for MatterBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatterBridge")
            .field("node_id", &format_args!("{:016x}", self.node_id))
            .field("vendor_name", &self.vendor_name)
            .field("product_name", &self.product_name)
            .field("label", &self.label)
            .field("identifier", &self.identifier)
            .finish()
    }
}

impl MatterBridge {
    pub fn new(
        node: Arc<dyn Node>,
        aggregator: Arc<dyn Endpoint>,
        vendor_name: impl Into<String>,
        product_name: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        let label = label.into();
        Self {
            node_id: node.node_id(),
            vendor_name: vendor_name.into(),
            product_name: product_name.into(),
            identifier: bridge_identifier(&label),
            label,
            node,
            aggregator,
        }
    }

    /// Build the bridge view of a node from its root basic information.
    pub async fn from_node(node: Arc<dyn Node>) -> Result<Self> {
        let node_id = node.node_id();
        let aggregator = node
            .endpoint(AGGREGATOR_ENDPOINT)
            .ok_or(BridgeError::MissingAggregator(node_id))?;
        let basic_info = node
            .root_cluster_client(ClusterKind::BasicInformation)
            .ok_or(BridgeError::ClusterNotFound(ClusterKind::BasicInformation.id()))?;

        let vendor_name = read_text(&*basic_info, BasicInformationAttribute::VendorName).await?;
        let product_name = read_text(&*basic_info, BasicInformationAttribute::ProductName).await?;
        let label = read_text(&*basic_info, BasicInformationAttribute::NodeLabel).await?;

        Ok(Self::new(
            node,
            aggregator,
            vendor_name.unwrap_or_default(),
            product_name.unwrap_or_default(),
            label.unwrap_or_default(),
        ))
    }

    pub fn is_connected(&self) -> bool {
        self.node.is_connected()
    }

    pub fn node(&self) -> &Arc<dyn Node> {
        &self.node
    }

    pub fn aggregator(&self) -> &Arc<dyn Endpoint> {
        &self.aggregator
    }

    /// Child endpoints of the aggregator that are still listed in its
    /// descriptor parts list. Returns `None` when the aggregator has no
    /// descriptor.
    pub fn bridged_endpoints(&self) -> Option<Vec<Arc<dyn Endpoint>>> {
        let descriptor = self.aggregator.cluster_client(ClusterKind::Descriptor)?;
        let children = self.aggregator.child_endpoints();

        let parts = descriptor.cached_attribute(DescriptorAttribute::PartsList as u32);
        let Some(parts) = parts.as_list() else {
            return Some(children);
        };

        Some(
            children
                .into_iter()
                .filter(|endpoint| {
                    let listed = parts.contains(&i64::from(endpoint.number()));
                    if !listed {
                        debug!(
                            "[Inventory] Skipping endpoint {} of {}: not in aggregator parts list",
                            endpoint.number(),
                            self.label
                        );
                    }
                    listed
                })
                .collect(),
        )
    }
}

/// Bridge identifier derived from its label.
pub fn bridge_identifier(label: &str) -> String {
    label.replace(' ', "_")
}

/// Read a text attribute of the basic information clusters.
pub(crate) async fn read_text(
    client: &dyn ClusterClient,
    attribute: BasicInformationAttribute,
) -> Result<Option<String>> {
    let value = client.read_attribute(attribute as u32, false).await?;
    Ok(value.as_text().map(str::to_string))
}
