//! Identity and naming of a bridged endpoint.

use crate::error::{BridgeError, Result};
use crate::matter::clusters::{BasicInformationAttribute, ClusterKind};
use crate::matter::node::{read_text, Endpoint, MatterBridge};

/// Separator between bridge identifier and entity identifier in entity ids.
pub const ENTITY_ID_SEPARATOR: char = '|';

/// Vendor whose bridges expose a unique product name per endpoint.
const OPENHAB_VENDOR: &str = "openHAB";
/// Product whose bridges expose a unique serial number per endpoint.
const MATTERHUB_PRODUCT: &str = "MatterHub";

/// Immutable identity of one bridged endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub product_name: Option<String>,
    pub node_label: Option<String>,
    pub serial_number: Option<String>,
    /// Key of the endpoint within its bridge
    pub entity_identifier: String,
    /// `{bridge identifier}|{entity identifier}`
    pub entity_id: String,
    pub label: String,
}

impl DeviceInfo {
    /// Read the bridged basic information of `endpoint` and derive its identity.
    pub async fn read(endpoint: &dyn Endpoint, bridge: &MatterBridge) -> Result<Self> {
        let client = endpoint
            .cluster_client(ClusterKind::BridgedDeviceBasicInformation)
            .ok_or(BridgeError::MissingBasicInformation(endpoint.number()))?;

        let product_name = read_text(&*client, BasicInformationAttribute::ProductName).await?;
        let node_label = read_text(&*client, BasicInformationAttribute::NodeLabel).await?;
        let serial_number = read_text(&*client, BasicInformationAttribute::SerialNumber).await?;

        Ok(Self::derive(
            bridge,
            endpoint.number(),
            product_name,
            node_label,
            serial_number,
        ))
    }

    pub fn derive(
        bridge: &MatterBridge,
        endpoint_number: u16,
        product_name: Option<String>,
        node_label: Option<String>,
        serial_number: Option<String>,
    ) -> Self {
        let product_name = product_name.filter(|s| !s.is_empty());
        let node_label = node_label.filter(|s| !s.is_empty());
        let serial_number = serial_number.filter(|s| !s.is_empty());

        let entity_identifier = match (&product_name, &serial_number) {
            (Some(product), _) if bridge.vendor_name == OPENHAB_VENDOR => product.replace(' ', "_"),
            (_, Some(serial)) if bridge.product_name == MATTERHUB_PRODUCT => serial.clone(),
            _ => endpoint_number.to_string(),
        };

        let entity_id = format!(
            "{}{}{}",
            bridge.identifier, ENTITY_ID_SEPARATOR, entity_identifier
        );

        let label = match &node_label {
            Some(node_label) => format!("{}: {}", bridge.label, node_label),
            None => format!("{}: {}", bridge.label, endpoint_number),
        };

        Self {
            product_name,
            node_label,
            serial_number,
            entity_identifier,
            entity_id,
            label,
        }
    }
}

/// Split an entity id into bridge identifier and entity identifier.
pub fn split_entity_id(entity_id: &str) -> Option<(&str, &str)> {
    entity_id.split_once(ENTITY_ID_SEPARATOR)
}
