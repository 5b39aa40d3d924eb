//! Bridge inventory: which entities exist for which bridge, and which of them
//! the controller is subscribed to.
//!
//! Topology changes are reconciled against the controller registry with as
//! little churn as possible. Failures are handled per endpoint; one broken
//! device never aborts the pass for its siblings.

use super::diff::diff_keys;
use crate::config::{ConverterSettings, DriverSettings};
use crate::entity::{
    split_entity_id, AttributePolicy, CommandParams, EntityAdapter, StatusCode,
};
use crate::error::BridgeError;
use crate::matter::node::MatterBridge;
use crate::registry::EntityRegistry;
use futures_util::future::join_all;
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Adapters of one bridge keyed by entity identifier.
pub type DeviceMap = BTreeMap<String, Arc<EntityAdapter>>;

/// One bridge and the entities built from its endpoints.
pub struct BridgeDevices {
    pub bridge: MatterBridge,
    pub devices: DeviceMap,
}

pub struct BridgeInventory {
    registry: Arc<dyn EntityRegistry>,
    converter_settings: ConverterSettings,
    request_from_remote_on_subscribe: bool,
    /// Keyed by bridge identifier
    bridges: BTreeMap<String, BridgeDevices>,
    /// Survives reconciliation so re-added entities resume their subscription
    subscriptions: HashMap<String, bool>,
}

impl BridgeInventory {
    pub fn new(registry: Arc<dyn EntityRegistry>, settings: &DriverSettings) -> Self {
        Self {
            registry,
            converter_settings: settings.converter_settings(),
            request_from_remote_on_subscribe: settings.request_from_remote_on_subscribe,
            bridges: BTreeMap::new(),
            subscriptions: HashMap::new(),
        }
    }

    /// Enumerate a new bridge and offer its entities to the controller.
    pub async fn on_bridge_added(&mut self, bridge: MatterBridge) {
        info!(
            "[Inventory] Bridge added: {} ({})",
            bridge.label, bridge.identifier
        );
        match self.enumerate(&bridge, true).await {
            Some(devices) => {
                info!(
                    "[Inventory] {} entities on bridge {}",
                    devices.len(),
                    bridge.label
                );
                self.bridges.insert(
                    bridge.identifier.clone(),
                    BridgeDevices { bridge, devices },
                );
            }
            None => warn!(
                "[Inventory] Bridge {} has no aggregator descriptor, ignoring",
                bridge.label
            ),
        }
    }

    /// Tear down one bridge, or everything when `bridge` is `None`.
    pub fn on_bridge_removed(&mut self, bridge: Option<&MatterBridge>) {
        let Some(bridge) = bridge else {
            info!("[Inventory] Configuration cleared, removing all bridges");
            for entry in self.bridges.values() {
                for adapter in entry.devices.values() {
                    adapter.remove_all_listeners();
                }
            }
            self.bridges.clear();
            self.subscriptions.clear();
            self.registry.clear_configured_entities();
            self.registry.clear_available_entities();
            return;
        };

        let Some(entry) = self.bridges.remove(&bridge.identifier) else {
            debug!("[Inventory] Removed bridge {} was not known", bridge.label);
            return;
        };
        info!(
            "[Inventory] Bridge removed: {} ({} entities)",
            bridge.label,
            entry.devices.len()
        );
        for adapter in entry.devices.values() {
            self.forget_entity(adapter.entity_id());
            adapter.remove_all_listeners();
        }
    }

    /// Re-enumerate a bridge whose endpoint topology changed and apply the
    /// difference to the registry.
    pub async fn on_bridge_updated(&mut self, bridge: MatterBridge) {
        let Some(old) = self.bridges.remove(&bridge.identifier) else {
            info!(
                "[Inventory] Updated bridge {} was not known, adding it",
                bridge.label
            );
            return self.on_bridge_added(bridge).await;
        };
        info!("[Inventory] Bridge updated: {}", bridge.label);

        for adapter in old.devices.values() {
            adapter.remove_all_listeners();
        }

        let devices = self.enumerate(&bridge, false).await.unwrap_or_else(|| {
            warn!(
                "[Inventory] Bridge {} lost its aggregator descriptor",
                bridge.label
            );
            DeviceMap::new()
        });

        let diff = diff_keys(&old.devices, &devices);
        if diff.is_empty() {
            debug!("[Inventory] {}: no entities added or removed", bridge.label);
        }
        debug!(
            "[Inventory] {}: added {:?}, removed {:?}, unchanged {:?}",
            bridge.label, diff.added, diff.removed, diff.unchanged
        );

        for key in &diff.added {
            if let Some(adapter) = devices.get(key) {
                info!("[Inventory] New entity {}", adapter.entity_id());
                adapter.add_available_entity();
            }
        }

        for key in &diff.removed {
            if let Some(adapter) = old.devices.get(key) {
                info!("[Inventory] Entity {} is gone", adapter.entity_id());
                self.forget_entity(adapter.entity_id());
            }
        }

        for key in &diff.unchanged {
            let (Some(previous), Some(current)) = (old.devices.get(key), devices.get(key)) else {
                continue;
            };
            if previous.device_type() == current.device_type() {
                continue;
            }
            info!(
                "[Inventory] Entity {} changed device type 0x{:04X} -> 0x{:04X}",
                current.entity_id(),
                previous.device_type(),
                current.device_type()
            );
            self.registry.remove_configured_entity(current.entity_id());
            self.registry.remove_available_entity(current.entity_id());
            current.add_available_entity();
        }

        self.bridges.insert(
            bridge.identifier.clone(),
            BridgeDevices { bridge, devices },
        );
    }

    /// Attach listeners and push the current state of each entity.
    pub async fn on_subscribe(&mut self, entity_ids: &[String]) {
        let policy = AttributePolicy::subscribe(self.request_from_remote_on_subscribe);
        for entity_id in entity_ids {
            if let Some(adapter) = self.lookup(entity_id) {
                adapter.add_listeners();
                adapter.send_attributes(policy).await;
            }
            self.subscriptions.insert(entity_id.clone(), true);
            debug!("[Inventory] Subscribed entity: {}", entity_id);
        }
    }

    pub fn on_unsubscribe(&mut self, entity_ids: &[String]) {
        for entity_id in entity_ids {
            if let Some(adapter) = self.lookup(entity_id) {
                adapter.remove_all_listeners();
            }
            self.subscriptions.insert(entity_id.clone(), false);
            debug!("[Inventory] Unsubscribed entity: {}", entity_id);
        }
    }

    pub async fn on_command(
        &self,
        entity_id: &str,
        command_id: &str,
        params: Option<&CommandParams>,
    ) -> StatusCode {
        match self.lookup(entity_id) {
            Some(adapter) => adapter.dispatch_command(command_id, params).await,
            None => {
                warn!(
                    "[Inventory] Command {} for unknown entity {}",
                    command_id, entity_id
                );
                StatusCode::NotFound
            }
        }
    }

    /// Re-read every subscribed entity from the devices and push what changed.
    pub async fn refresh_subscribed(&self) {
        let adapters: Vec<Arc<EntityAdapter>> = self
            .adapters()
            .filter(|adapter| self.is_subscribed(adapter.entity_id()))
            .cloned()
            .collect();
        debug!("[Inventory] Refreshing {} subscribed entities", adapters.len());

        join_all(
            adapters
                .iter()
                .map(|adapter| adapter.send_attributes(AttributePolicy::REFRESH)),
        )
        .await;
    }

    pub fn is_subscribed(&self, entity_id: &str) -> bool {
        self.subscriptions.get(entity_id).copied().unwrap_or(false)
    }

    /// Find the adapter for a `bridge|entity` id.
    pub fn lookup(&self, entity_id: &str) -> Option<Arc<EntityAdapter>> {
        let (bridge_id, device_id) = split_entity_id(entity_id)?;
        self.bridges.get(bridge_id)?.devices.get(device_id).cloned()
    }

    pub fn bridge(&self, identifier: &str) -> Option<&BridgeDevices> {
        self.bridges.get(identifier)
    }

    pub fn adapters(&self) -> impl Iterator<Item = &Arc<EntityAdapter>> {
        self.bridges.values().flat_map(|entry| entry.devices.values())
    }

    fn forget_entity(&mut self, entity_id: &str) {
        self.registry.remove_configured_entity(entity_id);
        self.registry.remove_available_entity(entity_id);
        self.subscriptions.remove(entity_id);
    }

    /// Build adapters for every bridged endpoint. With `register`, each
    /// entity is offered to the controller as it is built.
    async fn enumerate(&self, bridge: &MatterBridge, register: bool) -> Option<DeviceMap> {
        let endpoints = bridge.bridged_endpoints()?;
        let mut devices = DeviceMap::new();

        for endpoint in endpoints {
            let number = endpoint.number();
            let adapter = match EntityAdapter::create(
                endpoint,
                bridge,
                self.converter_settings,
                self.registry.clone(),
            )
            .await
            {
                Ok(adapter) => adapter,
                Err(BridgeError::UnsupportedDeviceType(device_type)) => {
                    info!(
                        "[Inventory] Skipping endpoint {} of {}: device type 0x{:04X} not supported",
                        number, bridge.label, device_type
                    );
                    continue;
                }
                Err(e) => {
                    error!(
                        "[Inventory] Failed to set up endpoint {} of {}: {}",
                        number, bridge.label, e
                    );
                    continue;
                }
            };

            adapter.init_attributes(AttributePolicy::INITIAL).await;
            if register {
                adapter.add_available_entity();
            }
            if self.is_subscribed(adapter.entity_id()) {
                adapter.add_listeners();
            }

            let key = adapter.info().entity_identifier.clone();
            if devices.insert(key, adapter).is_some() {
                warn!(
                    "[Inventory] Duplicate entity identifier on {}, endpoint {} replaces the earlier one",
                    bridge.label, number
                );
            }
        }

        Some(devices)
    }
}
