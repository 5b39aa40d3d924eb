//! In-memory Matter node, endpoints and cluster clients.
//!
//! Values live in two layers like on a real controller: the local attribute
//! cache and the value the device would return on a forced remote read.

use crate::error::{BridgeError, Result};
use crate::matter::clusters::{
    AttributeId, AttributeListener, BasicInformationAttribute, ClusterClient, ClusterCommand,
    ClusterKind, ColorControlAttribute, DescriptorAttribute, LevelControlAttribute, ListenerId,
    OnOffAttribute, RawValue, WindowCoveringAttribute, FEATURE_MAP,
};
use crate::matter::device_types::MatterDeviceType;
use crate::matter::node::{Endpoint, MatterBridge, Node, AGGREGATOR_ENDPOINT, ROOT_ENDPOINT};
use async_trait::async_trait;
use log::trace;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A cluster client backed by in-memory attribute values.
pub struct SimulatedCluster {
    kind: ClusterKind,
    cache: Mutex<HashMap<AttributeId, RawValue>>,
    remote: Mutex<HashMap<AttributeId, RawValue>>,
    listeners: Mutex<HashMap<AttributeId, Vec<(ListenerId, AttributeListener)>>>,
    commands: Mutex<Vec<ClusterCommand>>,
    next_listener_id: AtomicU64,
    fail_reads: AtomicBool,
    fail_commands: AtomicBool,
    apply_commands: AtomicBool,
}

impl SimulatedCluster {
    pub fn new(kind: ClusterKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            cache: Mutex::new(HashMap::new()),
            remote: Mutex::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            commands: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            fail_reads: AtomicBool::new(false),
            fail_commands: AtomicBool::new(false),
            apply_commands: AtomicBool::new(false),
        })
    }

    /// Set the locally cached value without notifying listeners.
    pub fn set_cached(&self, attribute: AttributeId, value: RawValue) {
        self.cache.lock().insert(attribute, value);
    }

    /// Set the value a forced remote read returns.
    pub fn set_remote(&self, attribute: AttributeId, value: RawValue) {
        self.remote.lock().insert(attribute, value);
    }

    /// Simulate a device report: update both layers and notify listeners.
    pub fn report(&self, attribute: AttributeId, value: RawValue) {
        self.cache.lock().insert(attribute, value.clone());
        self.remote.lock().insert(attribute, value.clone());

        // Listeners may call back into this cluster
        let listeners: Vec<AttributeListener> = self
            .listeners
            .lock()
            .get(&attribute)
            .map(|l| l.iter().map(|(_, listener)| listener.clone()).collect())
            .unwrap_or_default();

        trace!(
            "[Sim] {:?}/0x{:04X} reported {:?} to {} listeners",
            self.kind,
            attribute,
            value,
            listeners.len()
        );
        for listener in listeners {
            listener(value.clone());
        }
    }

    pub fn listener_count(&self, attribute: AttributeId) -> usize {
        self.listeners.lock().get(&attribute).map_or(0, Vec::len)
    }

    pub fn has_listener(&self, attribute: AttributeId, id: ListenerId) -> bool {
        self.listeners
            .lock()
            .get(&attribute)
            .is_some_and(|l| l.iter().any(|(existing, _)| *existing == id))
    }

    /// Commands invoked so far, oldest first.
    pub fn commands(&self) -> Vec<ClusterCommand> {
        self.commands.lock().clone()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_commands(&self, fail: bool) {
        self.fail_commands.store(fail, Ordering::SeqCst);
    }

    /// Make invoked commands report their effect like a real device would.
    pub fn apply_commands(&self, apply: bool) {
        self.apply_commands.store(apply, Ordering::SeqCst);
    }

    fn cached_int(&self, attribute: AttributeId) -> Option<i64> {
        self.cache.lock().get(&attribute).and_then(RawValue::as_int)
    }

    fn apply(&self, command: &ClusterCommand) {
        use WindowCoveringAttribute::*;

        let lift = |position: i64| {
            self.report(TargetPositionLiftPercent100ths as u32, RawValue::Int(position));
            self.report(CurrentPositionLiftPercent100ths as u32, RawValue::Int(position));
        };

        match command {
            ClusterCommand::On => self.report(OnOffAttribute::OnOff as u32, RawValue::Bool(true)),
            ClusterCommand::Off => {
                self.report(OnOffAttribute::OnOff as u32, RawValue::Bool(false))
            }
            ClusterCommand::Toggle => {
                let on = self
                    .cache
                    .lock()
                    .get(&(OnOffAttribute::OnOff as u32))
                    .and_then(RawValue::as_bool)
                    .unwrap_or(false);
                self.report(OnOffAttribute::OnOff as u32, RawValue::Bool(!on));
            }
            ClusterCommand::MoveToLevel { level, .. } => self.report(
                LevelControlAttribute::CurrentLevel as u32,
                RawValue::Int(i64::from(*level)),
            ),
            ClusterCommand::MoveToColorTemperature { mireds, .. } => self.report(
                ColorControlAttribute::ColorTemperatureMireds as u32,
                RawValue::Int(i64::from(*mireds)),
            ),
            ClusterCommand::MoveToHueAndSaturation {
                hue, saturation, ..
            } => {
                self.report(
                    ColorControlAttribute::CurrentHue as u32,
                    RawValue::Int(i64::from(*hue)),
                );
                self.report(
                    ColorControlAttribute::CurrentSaturation as u32,
                    RawValue::Int(i64::from(*saturation)),
                );
            }
            ClusterCommand::UpOrOpen => lift(0),
            ClusterCommand::DownOrClose => lift(10_000),
            ClusterCommand::GoToLiftPercentage { percent_100ths } => {
                lift(i64::from(*percent_100ths))
            }
            ClusterCommand::StopMotion => {
                if let Some(current) = self.cached_int(CurrentPositionLiftPercent100ths as u32) {
                    self.report(TargetPositionLiftPercent100ths as u32, RawValue::Int(current));
                }
            }
            ClusterCommand::GoToTiltPercentage { percent_100ths } => {
                let value = RawValue::Int(i64::from(*percent_100ths));
                self.report(TargetPositionTiltPercent100ths as u32, value.clone());
                self.report(CurrentPositionTiltPercent100ths as u32, value);
            }
        }
    }
}

#[async_trait]
impl ClusterClient for SimulatedCluster {
    fn cluster(&self) -> ClusterKind {
        self.kind
    }

    async fn read_attribute(&self, attribute: AttributeId, force_remote: bool) -> Result<RawValue> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BridgeError::Protocol(format!(
                "read of {:?}/0x{:04X} timed out",
                self.kind, attribute
            )));
        }

        if force_remote {
            let remote = self.remote.lock().get(&attribute).cloned();
            if let Some(value) = remote {
                self.cache.lock().insert(attribute, value.clone());
                return Ok(value);
            }
        }
        Ok(self.cached_attribute(attribute))
    }

    fn cached_attribute(&self, attribute: AttributeId) -> RawValue {
        self.cache
            .lock()
            .get(&attribute)
            .cloned()
            .unwrap_or_default()
    }

    fn add_attribute_listener(
        &self,
        attribute: AttributeId,
        listener: AttributeListener,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .entry(attribute)
            .or_default()
            .push((id, listener));
        id
    }

    fn remove_attribute_listener(&self, attribute: AttributeId, id: ListenerId) {
        if let Some(listeners) = self.listeners.lock().get_mut(&attribute) {
            listeners.retain(|(existing, _)| *existing != id);
        }
    }

    async fn invoke(&self, command: ClusterCommand) -> Result<()> {
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(BridgeError::Protocol(format!("{:?} was not acknowledged", command)));
        }
        self.commands.lock().push(command.clone());
        if self.apply_commands.load(Ordering::SeqCst) {
            self.apply(&command);
        }
        Ok(())
    }
}

/// An endpoint with a fixed device type and a mutable set of clusters.
pub struct SimulatedEndpoint {
    number: u16,
    device_type: u32,
    clusters: RwLock<BTreeMap<ClusterKind, Arc<SimulatedCluster>>>,
    children: RwLock<Vec<Arc<SimulatedEndpoint>>>,
}

impl SimulatedEndpoint {
    /// An endpoint without any cluster.
    pub fn bare(number: u16, device_type: u32) -> Arc<Self> {
        Arc::new(Self {
            number,
            device_type,
            clusters: RwLock::new(BTreeMap::new()),
            children: RwLock::new(Vec::new()),
        })
    }

    /// A bridged device endpoint with an empty bridged basic information cluster.
    pub fn device(number: u16, device_type: MatterDeviceType) -> Arc<Self> {
        Self::bare(number, device_type.id()).with_cluster(ClusterKind::BridgedDeviceBasicInformation)
    }

    pub fn on_off_plug(number: u16) -> Arc<Self> {
        Self::device(number, MatterDeviceType::OnOffPlugInUnit).with_on_off(false)
    }

    pub fn generic_switch(number: u16) -> Arc<Self> {
        Self::device(number, MatterDeviceType::GenericSwitch).with_on_off(false)
    }

    /// A light of `device_type` with optional level and color control clusters.
    pub fn light(number: u16, device_type: u32, dimmable: bool, color: bool) -> Arc<Self> {
        let endpoint = Self::bare(number, device_type)
            .with_cluster(ClusterKind::BridgedDeviceBasicInformation)
            .with_on_off(false);
        if dimmable {
            endpoint.add_cluster(ClusterKind::LevelControl);
        }
        if color {
            endpoint.add_cluster(ClusterKind::ColorControl);
        }
        endpoint
    }

    pub fn temperature_sensor(number: u16) -> Arc<Self> {
        Self::device(number, MatterDeviceType::TemperatureSensor)
            .with_cluster(ClusterKind::TemperatureMeasurement)
    }

    pub fn humidity_sensor(number: u16) -> Arc<Self> {
        Self::device(number, MatterDeviceType::HumiditySensor)
            .with_cluster(ClusterKind::RelativeHumidityMeasurement)
    }

    /// A window covering advertising `feature_map` on its cluster.
    pub fn window_covering(number: u16, feature_map: i64) -> Arc<Self> {
        let endpoint = Self::device(number, MatterDeviceType::WindowCovering)
            .with_cluster(ClusterKind::WindowCovering);
        if let Some(cluster) = endpoint.cluster(ClusterKind::WindowCovering) {
            cluster.set_cached(FEATURE_MAP, RawValue::Int(feature_map));
        }
        endpoint
    }

    pub fn with_cluster(self: Arc<Self>, kind: ClusterKind) -> Arc<Self> {
        self.add_cluster(kind);
        self
    }

    fn with_on_off(self: Arc<Self>, on: bool) -> Arc<Self> {
        self.add_cluster(ClusterKind::OnOff)
            .set_cached(OnOffAttribute::OnOff as u32, RawValue::Bool(on));
        self
    }

    /// Fill the bridged basic information cluster.
    pub fn with_basic_info(
        self: Arc<Self>,
        product_name: Option<&str>,
        node_label: Option<&str>,
        serial_number: Option<&str>,
    ) -> Arc<Self> {
        let cluster = self.add_cluster(ClusterKind::BridgedDeviceBasicInformation);
        let fields = [
            (BasicInformationAttribute::ProductName, product_name),
            (BasicInformationAttribute::NodeLabel, node_label),
            (BasicInformationAttribute::SerialNumber, serial_number),
        ];
        for (attribute, value) in fields {
            if let Some(value) = value {
                cluster.set_cached(attribute as u32, RawValue::Text(value.to_string()));
            }
        }
        self
    }

    /// Add a cluster if missing and return it.
    pub fn add_cluster(&self, kind: ClusterKind) -> Arc<SimulatedCluster> {
        self.clusters
            .write()
            .entry(kind)
            .or_insert_with(|| SimulatedCluster::new(kind))
            .clone()
    }

    pub fn remove_cluster(&self, kind: ClusterKind) {
        self.clusters.write().remove(&kind);
    }

    pub fn cluster(&self, kind: ClusterKind) -> Option<Arc<SimulatedCluster>> {
        self.clusters.read().get(&kind).cloned()
    }

    /// Every cluster of this endpoint.
    pub fn clusters(&self) -> Vec<Arc<SimulatedCluster>> {
        self.clusters.read().values().cloned().collect()
    }

    /// Add or replace the child with the same endpoint number.
    pub fn set_child(&self, child: Arc<SimulatedEndpoint>) {
        let mut children = self.children.write();
        children.retain(|existing| existing.number != child.number);
        children.push(child);
        children.sort_by_key(|c| c.number);
    }

    pub fn remove_child(&self, number: u16) -> Option<Arc<SimulatedEndpoint>> {
        let mut children = self.children.write();
        let index = children.iter().position(|c| c.number == number)?;
        Some(children.remove(index))
    }

    pub fn children(&self) -> Vec<Arc<SimulatedEndpoint>> {
        self.children.read().clone()
    }
}

impl Endpoint for SimulatedEndpoint {
    fn number(&self) -> u16 {
        self.number
    }

    fn device_type(&self) -> u32 {
        self.device_type
    }

    fn cluster_client(&self, cluster: ClusterKind) -> Option<Arc<dyn ClusterClient>> {
        self.cluster(cluster)
            .map(|client| client as Arc<dyn ClusterClient>)
    }

    fn child_endpoints(&self) -> Vec<Arc<dyn Endpoint>> {
        self.children
            .read()
            .iter()
            .map(|child| child.clone() as Arc<dyn Endpoint>)
            .collect()
    }
}

/// A node whose endpoints are the root endpoint and the aggregator.
pub struct SimulatedNode {
    node_id: u64,
    connected: AtomicBool,
    root: Arc<SimulatedEndpoint>,
    aggregator: Arc<SimulatedEndpoint>,
}

impl Node for SimulatedNode {
    fn node_id(&self) -> u64 {
        self.node_id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn endpoint(&self, number: u16) -> Option<Arc<dyn Endpoint>> {
        let endpoint = match number {
            ROOT_ENDPOINT => self.root.clone(),
            AGGREGATOR_ENDPOINT => self.aggregator.clone(),
            _ => self
                .aggregator
                .children()
                .into_iter()
                .find(|child| child.number == number)?,
        };
        Some(endpoint as Arc<dyn Endpoint>)
    }
}

/// A simulated bridge node: root basic information plus an aggregator
/// whose children are the bridged devices.
#[derive(Clone)]
pub struct SimulatedBridge {
    node: Arc<SimulatedNode>,
}

impl SimulatedBridge {
    pub fn new(node_id: u64, vendor_name: &str, product_name: &str, label: &str) -> Self {
        let root = SimulatedEndpoint::bare(ROOT_ENDPOINT, 0x0016);
        let basic_info = root.add_cluster(ClusterKind::BasicInformation);
        for (attribute, value) in [
            (BasicInformationAttribute::VendorName, vendor_name),
            (BasicInformationAttribute::ProductName, product_name),
            (BasicInformationAttribute::NodeLabel, label),
        ] {
            basic_info.set_cached(attribute as u32, RawValue::Text(value.to_string()));
        }

        let aggregator =
            SimulatedEndpoint::bare(AGGREGATOR_ENDPOINT, MatterDeviceType::Aggregator.id())
                .with_cluster(ClusterKind::Descriptor);

        Self {
            node: Arc::new(SimulatedNode {
                node_id,
                connected: AtomicBool::new(true),
                root,
                aggregator,
            }),
        }
    }

    pub fn node(&self) -> Arc<dyn Node> {
        self.node.clone()
    }

    /// Bridge view of this node, as discovered by the driver.
    pub async fn bridge(&self) -> Result<MatterBridge> {
        MatterBridge::from_node(self.node()).await
    }

    /// Add a bridged device, replacing any with the same endpoint number.
    pub fn add_endpoint(&self, endpoint: Arc<SimulatedEndpoint>) {
        self.node.aggregator.set_child(endpoint);
    }

    pub fn remove_endpoint(&self, number: u16) -> Option<Arc<SimulatedEndpoint>> {
        self.node.aggregator.remove_child(number)
    }

    pub fn endpoint(&self, number: u16) -> Option<Arc<SimulatedEndpoint>> {
        self.node
            .aggregator
            .children()
            .into_iter()
            .find(|child| child.number == number)
    }

    pub fn endpoints(&self) -> Vec<Arc<SimulatedEndpoint>> {
        self.node.aggregator.children()
    }

    /// Set or clear the aggregator descriptor parts list.
    pub fn set_parts_list(&self, parts: Option<Vec<i64>>) {
        if let Some(descriptor) = self.node.aggregator.cluster(ClusterKind::Descriptor) {
            let value = parts.map_or(RawValue::Undefined, RawValue::List);
            descriptor.set_cached(DescriptorAttribute::PartsList as u32, value);
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.node.connected.store(connected, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_forced_read_refreshes_cache() {
        let cluster = SimulatedCluster::new(ClusterKind::OnOff);
        let attr = OnOffAttribute::OnOff as u32;
        cluster.set_cached(attr, RawValue::Bool(true));
        cluster.set_remote(attr, RawValue::Bool(false));

        assert_eq!(assert_ok!(cluster.read_attribute(attr, false).await), RawValue::Bool(true));
        assert_eq!(assert_ok!(cluster.read_attribute(attr, true).await), RawValue::Bool(false));
        assert_eq!(cluster.cached_attribute(attr), RawValue::Bool(false));

        cluster.fail_reads(true);
        assert_err!(cluster.read_attribute(attr, true).await);
    }

    #[tokio::test]
    async fn test_applied_commands_report_back() {
        let cluster = SimulatedCluster::new(ClusterKind::OnOff);
        let attr = OnOffAttribute::OnOff as u32;
        cluster.apply_commands(true);

        assert_ok!(cluster.invoke(ClusterCommand::On).await);
        assert_eq!(cluster.cached_attribute(attr), RawValue::Bool(true));
        assert_ok!(cluster.invoke(ClusterCommand::Toggle).await);
        assert_eq!(cluster.cached_attribute(attr), RawValue::Bool(false));

        cluster.fail_commands(true);
        assert_err!(cluster.invoke(ClusterCommand::On).await);
        assert_eq!(cluster.commands().len(), 2);
    }

    #[test]
    fn test_endpoint_replacement_and_lookup() {
        let sim = SimulatedBridge::new(9, "Acme", "Hub", "Hub");
        sim.add_endpoint(SimulatedEndpoint::on_off_plug(3));
        sim.add_endpoint(SimulatedEndpoint::temperature_sensor(3));
        assert_eq!(sim.endpoints().len(), 1);
        assert_eq!(
            sim.endpoint(3).unwrap().device_type(),
            MatterDeviceType::TemperatureSensor.id()
        );

        let node = sim.node();
        assert!(node.endpoint(3).is_some());
        assert!(node.endpoint(AGGREGATOR_ENDPOINT).is_some());
        assert!(node.root_cluster_client(ClusterKind::BasicInformation).is_some());

        assert!(sim.remove_endpoint(3).is_some());
        assert!(node.endpoint(3).is_none());
    }
}
