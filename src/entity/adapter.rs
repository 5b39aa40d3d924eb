//! Entity adapter: one bridged endpoint presented as one controller entity.
//!
//! State flow:
//! - features are negotiated once from the endpoint's clusters at construction
//! - the attribute snapshot is seeded from the protocol cache by
//!   [`EntityAdapter::init_attributes`] and afterwards only changes when the
//!   registry accepts a push
//! - listeners exist only while the controller is subscribed to the entity

use super::capabilities::{self, AttributeCapability, ConversionContext};
use super::classifier::{classify, Classification};
use super::device_info::DeviceInfo;
use super::model::{
    AttributeMap, AttributeValue, DeviceClass, Entity, EntityAttribute, EntityKind, Feature,
    FeatureSet, SENSOR_STATE_ON,
};
use super::subscription::AttributeSubscription;
use crate::config::ConverterSettings;
use crate::error::Result;
use crate::matter::clusters::{
    window_covering_features as wc, AttributeListener, ClusterKind, ListenerId, RawValue,
    FEATURE_MAP,
};
use crate::matter::node::{Endpoint, MatterBridge, Node};
use crate::registry::EntityRegistry;
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// How [`EntityAdapter::get_attribute`] obtains a value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributePolicy {
    /// Compare against the protocol stack cache instead of the adapter snapshot
    pub init_from_cache: bool,
    /// Perform a live read from the device
    pub request_from_remote: bool,
    /// Suppress values equal to the previously known one
    pub only_return_changed: bool,
}

impl AttributePolicy {
    /// Initial population when a bridge is enumerated.
    pub const INITIAL: Self = Self {
        init_from_cache: true,
        request_from_remote: false,
        only_return_changed: false,
    };

    /// Re-read after standby, pushing only what changed.
    pub const REFRESH: Self = Self {
        init_from_cache: false,
        request_from_remote: true,
        only_return_changed: true,
    };

    /// Full push when the controller subscribes.
    pub const fn subscribe(request_from_remote: bool) -> Self {
        Self {
            init_from_cache: false,
            request_from_remote,
            only_return_changed: false,
        }
    }
}

pub struct EntityAdapter {
    info: DeviceInfo,
    classification: Classification,
    device_type: u32,
    features: FeatureSet,
    endpoint: Arc<dyn Endpoint>,
    node: Arc<dyn Node>,
    settings: ConverterSettings,
    registry: Arc<dyn EntityRegistry>,
    /// Attributes offered with the entity descriptor
    initial_attributes: Mutex<AttributeMap>,
    /// Last values accepted by the registry
    snapshot: Mutex<AttributeMap>,
    listeners: Mutex<HashMap<EntityAttribute, AttributeSubscription>>,
    weak_self: Weak<EntityAdapter>,
}

impl EntityAdapter {
    /// Classify `endpoint`, read its identity and negotiate its features.
    pub async fn create(
        endpoint: Arc<dyn Endpoint>,
        bridge: &MatterBridge,
        settings: ConverterSettings,
        registry: Arc<dyn EntityRegistry>,
    ) -> Result<Arc<Self>> {
        let classification = classify(endpoint.device_type())?;
        let info = DeviceInfo::read(&*endpoint, bridge).await?;
        Ok(Self::new(
            endpoint,
            bridge.node().clone(),
            info,
            classification,
            settings,
            registry,
        ))
    }

    pub fn new(
        endpoint: Arc<dyn Endpoint>,
        node: Arc<dyn Node>,
        info: DeviceInfo,
        classification: Classification,
        settings: ConverterSettings,
        registry: Arc<dyn EntityRegistry>,
    ) -> Arc<Self> {
        let features = negotiate_features(classification.kind, &*endpoint);
        let device_type = endpoint.device_type();
        debug!(
            "[Entity] {} ({}) features: {:?}",
            info.entity_id, classification.kind, features
        );

        Arc::new_cyclic(|weak_self| Self {
            info,
            classification,
            device_type,
            features,
            endpoint,
            node,
            settings,
            registry,
            initial_attributes: Mutex::new(AttributeMap::new()),
            snapshot: Mutex::new(AttributeMap::new()),
            listeners: Mutex::new(HashMap::new()),
            weak_self: weak_self.clone(),
        })
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn entity_id(&self) -> &str {
        &self.info.entity_id
    }

    pub fn kind(&self) -> EntityKind {
        self.classification.kind
    }

    pub fn device_class(&self) -> Option<DeviceClass> {
        self.classification.device_class
    }

    /// Device type identifier the endpoint reported when the adapter was built.
    pub fn device_type(&self) -> u32 {
        self.device_type
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    pub fn endpoint(&self) -> &Arc<dyn Endpoint> {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.node.is_connected()
    }

    pub fn settings(&self) -> &ConverterSettings {
        &self.settings
    }

    /// Whether the negotiated feature set supports `attribute`.
    pub fn has_attribute(&self, attribute: EntityAttribute) -> bool {
        use EntityAttribute::*;
        match (self.kind(), attribute) {
            (EntityKind::Switch | EntityKind::Light, State) => self.has_feature(Feature::OnOff),
            (EntityKind::Light, Brightness) => self.has_feature(Feature::Dim),
            (EntityKind::Light, Hue | Saturation) => self.has_feature(Feature::Color),
            (EntityKind::Light, ColorTemperature) => self.has_feature(Feature::ColorTemperature),
            (EntityKind::Sensor, Value | Unit | State) => true,
            (EntityKind::Cover, State) => self.has_feature(Feature::Open),
            (EntityKind::Cover, Position) => self.has_feature(Feature::Position),
            (EntityKind::Cover, TiltPosition) => self.has_feature(Feature::TiltPosition),
            _ => false,
        }
    }

    fn supported_attributes(&self) -> impl Iterator<Item = EntityAttribute> + '_ {
        use EntityAttribute::*;
        [
            State,
            Brightness,
            Hue,
            Saturation,
            ColorTemperature,
            Value,
            Unit,
            Position,
            TiltPosition,
        ]
        .into_iter()
        .filter(|attribute| self.has_attribute(*attribute))
    }

    /// Attributes that do not come from the device.
    fn static_attribute(&self, attribute: EntityAttribute) -> Option<AttributeValue> {
        match (self.kind(), attribute) {
            (EntityKind::Sensor, EntityAttribute::Unit) => {
                let unit = match self.device_class() {
                    Some(DeviceClass::Humidity) => "%",
                    _ => self.settings.temperature_unit.symbol(),
                };
                Some(AttributeValue::text(unit))
            }
            (EntityKind::Sensor, EntityAttribute::State) => {
                Some(AttributeValue::text(SENSOR_STATE_ON))
            }
            _ => None,
        }
    }

    fn capability(&self, attribute: EntityAttribute) -> Option<&'static AttributeCapability> {
        capabilities::lookup(self.kind(), attribute, self.device_class())
    }

    fn conversion_context(&self) -> ConversionContext<'_> {
        ConversionContext {
            settings: self.settings,
            endpoint: &*self.endpoint,
        }
    }

    fn convert(&self, capability: &AttributeCapability, raw: &RawValue) -> AttributeMap {
        let mut attributes = (capability.convert)(raw, &self.conversion_context());
        attributes.retain(|attribute| self.has_attribute(attribute));
        attributes
    }

    /// Read one attribute according to `policy`.
    ///
    /// `None` means no meaningful value is available, which is distinct from
    /// a defined [`AttributeValue::Unknown`].
    pub async fn get_attribute(
        &self,
        attribute: EntityAttribute,
        policy: AttributePolicy,
    ) -> Option<AttributeValue> {
        if !self.has_attribute(attribute) {
            return None;
        }
        if let Some(value) = self.static_attribute(attribute) {
            if policy.only_return_changed
                && self.snapshot.lock().get(attribute) == Some(&value)
            {
                return None;
            }
            return Some(value);
        }
        let Some(capability) = self.capability(attribute) else {
            warn!(
                "[Entity] No capability for {} on entity {}",
                attribute.readable(),
                self.entity_id()
            );
            return None;
        };

        let cached = if policy.init_from_cache {
            capability
                .read_cached(&*self.endpoint)
                .and_then(|raw| self.convert(capability, &raw).remove(attribute))
        } else {
            self.snapshot.lock().get(attribute).cloned()
        };

        if policy.request_from_remote {
            let raw = match capability.read(&*self.endpoint, true).await {
                Ok(Some(raw)) => raw,
                Ok(None) => return None,
                Err(e) => {
                    warn!(
                        "[Entity] Failed to read {} on entity {}: {}",
                        attribute.readable(),
                        self.entity_id(),
                        e
                    );
                    return None;
                }
            };
            let remote = self.convert(capability, &raw).remove(attribute)?;

            if policy.only_return_changed && cached.as_ref() == Some(&remote) {
                debug!(
                    "[Entity] {} value has not changed on entity {}",
                    attribute.readable(),
                    self.entity_id()
                );
                return None;
            }
            debug!(
                "[Entity] Got remote {} value {} on entity {}",
                attribute.readable(),
                remote,
                self.entity_id()
            );
            return Some(remote);
        }

        let cached = cached.filter(|value| !value.is_empty())?;
        debug!(
            "[Entity] Got cached {} value {} on entity {}",
            attribute.readable(),
            cached,
            self.entity_id()
        );
        Some(cached)
    }

    /// Read every supported attribute; absent results are omitted.
    pub async fn get_all_attributes(&self, policy: AttributePolicy) -> AttributeMap {
        let mut attributes = AttributeMap::new();
        for attribute in self.supported_attributes() {
            if let Some(value) = self.get_attribute(attribute, policy).await {
                attributes.insert(attribute, value);
            }
        }
        attributes
    }

    /// Populate the attributes offered with the entity descriptor and seed
    /// the snapshot with them.
    pub async fn init_attributes(&self, policy: AttributePolicy) {
        let attributes = self.get_all_attributes(policy).await;
        self.snapshot.lock().extend(attributes.clone());
        *self.initial_attributes.lock() = attributes;
    }

    /// Entity descriptor as registered with the controller.
    pub fn entity(&self) -> Entity {
        Entity {
            id: self.info.entity_id.clone(),
            name: self.info.label.clone(),
            kind: self.kind(),
            device_class: self.device_class(),
            features: self.features.clone(),
            attributes: self.initial_attributes.lock().clone(),
        }
    }

    /// Offer the entity to the controller.
    pub fn add_available_entity(&self) -> bool {
        self.registry.add_available_entity(self.entity())
    }

    /// Last values accepted by the registry.
    pub fn snapshot(&self) -> AttributeMap {
        self.snapshot.lock().clone()
    }

    /// Push attributes to the registry, committing them locally only if accepted.
    pub fn update_entity_attributes(&self, attributes: AttributeMap) -> bool {
        if !self
            .registry
            .update_entity_attributes(self.entity_id(), &attributes)
        {
            debug!(
                "[Entity] Registry rejected attribute update for {}",
                self.entity_id()
            );
            return false;
        }
        self.snapshot.lock().extend(attributes);
        true
    }

    /// Read all attributes with `policy` and push whatever came back.
    pub async fn send_attributes(&self, policy: AttributePolicy) {
        let attributes = self.get_all_attributes(policy).await;
        if !attributes.is_empty() {
            self.update_entity_attributes(attributes);
        }
    }

    fn on_attribute_changed(&self, attribute: EntityAttribute, raw: RawValue) {
        let Some(capability) = self.capability(attribute) else {
            return;
        };
        let mut attributes = self.convert(capability, &raw);

        debug!(
            "[Entity] {} update value {:?} on entity {}",
            attribute.readable(),
            raw,
            self.entity_id()
        );

        if self.kind() == EntityKind::Light
            && attribute == EntityAttribute::State
            && raw.as_bool() == Some(false)
            && self.has_attribute(EntityAttribute::Brightness)
        {
            attributes.insert(EntityAttribute::Brightness, 0.0);
            debug!(
                "[Entity] Light turned off, setting brightness to 0 on entity {}",
                self.entity_id()
            );
        }

        self.update_entity_attributes(attributes);
    }

    /// Attach a change listener for `attribute`, replacing any existing one.
    ///
    /// Returns false (and logs) if the attribute has no protocol source.
    pub fn add_listener(&self, attribute: EntityAttribute) -> bool {
        let Some(capability) = self.capability(attribute) else {
            warn!(
                "[Entity] Could not add {} listener on entity {}",
                attribute.readable(),
                self.entity_id()
            );
            return false;
        };

        let mut listeners = self.listeners.lock();
        if listeners.remove(&attribute).is_some() {
            debug!(
                "[Entity] Existing {} listener removed on entity {}",
                attribute.readable(),
                self.entity_id()
            );
        }

        let weak = self.weak_self.clone();
        let listener: AttributeListener = Arc::new(move |raw| {
            if let Some(adapter) = weak.upgrade() {
                adapter.on_attribute_changed(attribute, raw);
            }
        });

        match capability.subscribe(&*self.endpoint, listener) {
            Some(subscription) => {
                listeners.insert(attribute, subscription);
                true
            }
            None => {
                warn!(
                    "[Entity] Endpoint has no {:?} cluster for {} on entity {}",
                    capability.path.cluster,
                    attribute.readable(),
                    self.entity_id()
                );
                false
            }
        }
    }

    /// Attach listeners for every supported protocol-backed attribute.
    pub fn add_listeners(&self) {
        debug!("[Entity] Adding attribute listeners for {}", self.entity_id());
        for &attribute in capabilities::protocol_attributes(self.kind()) {
            if self.has_attribute(attribute) {
                self.add_listener(attribute);
            }
        }
    }

    /// Detach every listener. Safe to call when none are attached.
    pub fn remove_all_listeners(&self) {
        let removed = std::mem::take(&mut *self.listeners.lock());
        if !removed.is_empty() {
            debug!(
                "[Entity] Removing {} attribute listeners for {}",
                removed.len(),
                self.entity_id()
            );
        }
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.lock().is_empty()
    }

    pub fn listener_id(&self, attribute: EntityAttribute) -> Option<ListenerId> {
        self.listeners.lock().get(&attribute).map(|s| s.id())
    }
}

/// Derive the feature set from the clusters an endpoint exposes.
pub fn negotiate_features(kind: EntityKind, endpoint: &dyn Endpoint) -> FeatureSet {
    let mut features = FeatureSet::new();
    match kind {
        EntityKind::Switch => {
            if endpoint.has_cluster(ClusterKind::OnOff) {
                features.extend([Feature::OnOff, Feature::Toggle]);
            }
        }
        EntityKind::Light => {
            if endpoint.has_cluster(ClusterKind::ColorControl) {
                features.extend([Feature::Color, Feature::ColorTemperature]);
            }
            if endpoint.has_cluster(ClusterKind::LevelControl) {
                features.insert(Feature::Dim);
            }
            if endpoint.has_cluster(ClusterKind::OnOff) {
                features.extend([Feature::OnOff, Feature::Toggle]);
            }
        }
        EntityKind::Sensor => {}
        EntityKind::Cover => {
            if let Some(client) = endpoint.cluster_client(ClusterKind::WindowCovering) {
                features.extend([Feature::Open, Feature::Close, Feature::Stop]);

                let map = client.cached_attribute(FEATURE_MAP).as_int().unwrap_or(0);
                if map & wc::POSITION_AWARE_LIFT != 0 {
                    features.insert(Feature::Position);
                }
                if map & wc::TILT != 0 {
                    features.extend([Feature::Tilt, Feature::TiltStop]);
                }
                if map & wc::POSITION_AWARE_TILT != 0 {
                    features.insert(Feature::TiltPosition);
                }
            }
        }
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matter::clusters::{
        ColorControlAttribute, LevelControlAttribute, MeasurementAttribute, OnOffAttribute,
        WindowCoveringAttribute,
    };
    use crate::simulation::{RecordingRegistry, SimulatedBridge, SimulatedEndpoint};

    const ON_OFF: u32 = OnOffAttribute::OnOff as u32;
    const LEVEL: u32 = LevelControlAttribute::CurrentLevel as u32;

    async fn adapter_for(
        endpoint: Arc<SimulatedEndpoint>,
        registry: Arc<RecordingRegistry>,
    ) -> (SimulatedBridge, Arc<EntityAdapter>) {
        adapter_with(endpoint, registry, ConverterSettings::default()).await
    }

    async fn adapter_with(
        endpoint: Arc<SimulatedEndpoint>,
        registry: Arc<RecordingRegistry>,
        settings: ConverterSettings,
    ) -> (SimulatedBridge, Arc<EntityAdapter>) {
        let sim = SimulatedBridge::new(1, "Acme", "Hub", "Hub");
        sim.add_endpoint(endpoint.clone());
        let bridge = sim.bridge().await.unwrap();
        let adapter = EntityAdapter::create(endpoint, &bridge, settings, registry)
            .await
            .unwrap();
        (sim, adapter)
    }

    #[tokio::test]
    async fn test_switch_end_to_end() {
        let endpoint = SimulatedEndpoint::on_off_plug(3);
        let on_off = endpoint.cluster(ClusterKind::OnOff).unwrap();
        on_off.set_cached(ON_OFF, RawValue::Bool(true));

        let registry = Arc::new(RecordingRegistry::new());
        let (_sim, adapter) = adapter_for(endpoint, registry.clone()).await;
        assert_eq!(adapter.device_class(), Some(DeviceClass::Outlet));

        adapter.init_attributes(AttributePolicy::INITIAL).await;
        let entity = adapter.entity();
        assert_eq!(entity.id, "Hub|3");
        assert_eq!(
            entity.attributes.get(EntityAttribute::State),
            Some(&AttributeValue::text("ON"))
        );
        assert!(adapter.add_available_entity());
        assert!(registry.is_available("Hub|3"));

        on_off.set_remote(ON_OFF, RawValue::Bool(false));
        adapter.send_attributes(AttributePolicy::REFRESH).await;
        adapter.send_attributes(AttributePolicy::REFRESH).await;

        let updates = registry.updates_for("Hub|3");
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].get(EntityAttribute::State),
            Some(&AttributeValue::text("OFF"))
        );
        assert_eq!(
            adapter.snapshot().get(EntityAttribute::State),
            Some(&AttributeValue::text("OFF"))
        );
    }

    #[tokio::test]
    async fn test_add_listener_is_idempotent() {
        let endpoint = SimulatedEndpoint::on_off_plug(3);
        let on_off = endpoint.cluster(ClusterKind::OnOff).unwrap();
        let registry = Arc::new(RecordingRegistry::new());
        let (_sim, adapter) = adapter_for(endpoint, registry.clone()).await;

        assert!(adapter.add_listener(EntityAttribute::State));
        let first = adapter.listener_id(EntityAttribute::State).unwrap();
        assert!(adapter.add_listener(EntityAttribute::State));
        let second = adapter.listener_id(EntityAttribute::State).unwrap();

        assert_ne!(first, second);
        assert_eq!(on_off.listener_count(ON_OFF), 1);
        assert!(!on_off.has_listener(ON_OFF, first));
        assert!(on_off.has_listener(ON_OFF, second));

        on_off.report(ON_OFF, RawValue::Bool(true));
        assert_eq!(registry.updates_for("Hub|3").len(), 1);

        adapter.remove_all_listeners();
        assert_eq!(on_off.listener_count(ON_OFF), 0);
        assert!(!adapter.has_listeners());
        adapter.remove_all_listeners();
    }

    #[tokio::test]
    async fn test_add_listener_without_capability() {
        let endpoint = SimulatedEndpoint::on_off_plug(3);
        let registry = Arc::new(RecordingRegistry::new());
        let (_sim, adapter) = adapter_for(endpoint, registry).await;
        assert!(!adapter.add_listener(EntityAttribute::Brightness));
        assert!(!adapter.has_listeners());
    }

    #[tokio::test]
    async fn test_feature_gated_attributes() {
        // Outlet that happens to carry a level control cluster
        let endpoint = SimulatedEndpoint::on_off_plug(3).with_cluster(ClusterKind::LevelControl);
        let registry = Arc::new(RecordingRegistry::new());
        let (_sim, adapter) = adapter_for(endpoint, registry).await;
        assert!(adapter.has_attribute(EntityAttribute::State));
        assert!(!adapter.has_attribute(EntityAttribute::Brightness));
        assert!(!adapter.has_attribute(EntityAttribute::Position));

        let light = SimulatedEndpoint::light(4, 256, false, false);
        let registry = Arc::new(RecordingRegistry::new());
        let (_sim, adapter) = adapter_for(light, registry).await;
        assert!(adapter.has_attribute(EntityAttribute::State));
        assert!(!adapter.has_attribute(EntityAttribute::Brightness));
        assert!(!adapter.has_attribute(EntityAttribute::Hue));
        assert!(!adapter.has_attribute(EntityAttribute::ColorTemperature));

        let cover = SimulatedEndpoint::window_covering(6, wc::LIFT);
        let registry = Arc::new(RecordingRegistry::new());
        let (_sim, adapter) = adapter_for(cover, registry).await;
        assert!(adapter.has_attribute(EntityAttribute::State));
        assert!(!adapter.has_attribute(EntityAttribute::Position));
        assert!(!adapter.has_attribute(EntityAttribute::TiltPosition));
        assert!(!adapter.has_attribute(EntityAttribute::Brightness));
        assert!(adapter.endpoint().has_cluster(ClusterKind::WindowCovering));
    }

    #[tokio::test]
    async fn test_cover_features_from_feature_map() {
        let cover = SimulatedEndpoint::window_covering(
            6,
            wc::LIFT | wc::TILT | wc::POSITION_AWARE_LIFT | wc::POSITION_AWARE_TILT,
        );
        let registry = Arc::new(RecordingRegistry::new());
        let (_sim, adapter) = adapter_for(cover, registry).await;
        for feature in [
            Feature::Open,
            Feature::Close,
            Feature::Stop,
            Feature::Position,
            Feature::Tilt,
            Feature::TiltStop,
            Feature::TiltPosition,
        ] {
            assert!(adapter.has_feature(feature), "{:?}", feature);
        }
    }

    #[tokio::test]
    async fn test_light_off_forces_brightness_zero() {
        let endpoint = SimulatedEndpoint::light(4, 257, true, false);
        let on_off = endpoint.cluster(ClusterKind::OnOff).unwrap();
        endpoint
            .cluster(ClusterKind::LevelControl)
            .unwrap()
            .set_cached(LEVEL, RawValue::Int(199));
        let registry = Arc::new(RecordingRegistry::new());
        let (_sim, adapter) = adapter_for(endpoint, registry.clone()).await;

        adapter.init_attributes(AttributePolicy::INITIAL).await;
        adapter.add_available_entity();
        assert_eq!(
            adapter.snapshot().get(EntityAttribute::Brightness),
            Some(&AttributeValue::Number(200.0))
        );

        adapter.add_listeners();
        on_off.report(ON_OFF, RawValue::Bool(false));

        let updates = registry.updates_for("Hub|4");
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].get(EntityAttribute::State),
            Some(&AttributeValue::text("OFF"))
        );
        assert_eq!(
            updates[0].get(EntityAttribute::Brightness),
            Some(&AttributeValue::Number(0.0))
        );

        on_off.report(ON_OFF, RawValue::Bool(true));
        let updates = registry.updates_for("Hub|4");
        assert!(!updates[1].contains(EntityAttribute::Brightness));
    }

    #[tokio::test]
    async fn test_rejected_push_keeps_snapshot() {
        let endpoint = SimulatedEndpoint::on_off_plug(3);
        let on_off = endpoint.cluster(ClusterKind::OnOff).unwrap();
        on_off.set_cached(ON_OFF, RawValue::Bool(true));
        let registry = Arc::new(RecordingRegistry::new());
        let (_sim, adapter) = adapter_for(endpoint, registry.clone()).await;
        adapter.init_attributes(AttributePolicy::INITIAL).await;
        adapter.add_available_entity();
        adapter.add_listeners();

        registry.reject_updates(true);
        on_off.report(ON_OFF, RawValue::Bool(false));
        assert_eq!(
            adapter.snapshot().get(EntityAttribute::State),
            Some(&AttributeValue::text("ON"))
        );

        registry.reject_updates(false);
        on_off.report(ON_OFF, RawValue::Bool(false));
        assert_eq!(
            adapter.snapshot().get(EntityAttribute::State),
            Some(&AttributeValue::text("OFF"))
        );
    }

    #[tokio::test]
    async fn test_undefined_is_unknown_not_absent() {
        let endpoint = SimulatedEndpoint::light(4, 269, true, true);
        let registry = Arc::new(RecordingRegistry::new());
        let (_sim, adapter) = adapter_for(endpoint, registry).await;

        let hue = adapter
            .get_attribute(EntityAttribute::Hue, AttributePolicy::INITIAL)
            .await;
        assert_eq!(hue, Some(AttributeValue::Unknown));

        // nothing in the adapter snapshot yet
        let hue = adapter
            .get_attribute(EntityAttribute::Hue, AttributePolicy::default())
            .await;
        assert_eq!(hue, None);
    }

    #[tokio::test]
    async fn test_color_light_attributes() {
        let endpoint = SimulatedEndpoint::light(4, 269, true, true);
        let color = endpoint.cluster(ClusterKind::ColorControl).unwrap();
        color.set_cached(ColorControlAttribute::CurrentHue as u32, RawValue::Int(127));
        color.set_cached(ColorControlAttribute::CurrentSaturation as u32, RawValue::Int(99));
        color.set_cached(
            ColorControlAttribute::ColorTemperatureMireds as u32,
            RawValue::Int(500),
        );
        let registry = Arc::new(RecordingRegistry::new());
        let (_sim, adapter) = adapter_for(endpoint, registry).await;

        let attrs = adapter.get_all_attributes(AttributePolicy::INITIAL).await;
        assert_eq!(attrs.get(EntityAttribute::Hue), Some(&AttributeValue::Number(180.0)));
        assert_eq!(
            attrs.get(EntityAttribute::Saturation),
            Some(&AttributeValue::Number(100.0))
        );
        assert_eq!(
            attrs.get(EntityAttribute::ColorTemperature),
            Some(&AttributeValue::Number(100.0))
        );
    }

    #[tokio::test]
    async fn test_sensor_static_attributes() {
        let endpoint = SimulatedEndpoint::temperature_sensor(8);
        endpoint
            .cluster(ClusterKind::TemperatureMeasurement)
            .unwrap()
            .set_cached(MeasurementAttribute::MeasuredValue as u32, RawValue::Int(2000));
        let registry = Arc::new(RecordingRegistry::new());
        let settings = ConverterSettings {
            temperature_unit: crate::config::TemperatureUnit::Fahrenheit,
            ..ConverterSettings::default()
        };
        let (_sim, adapter) = adapter_with(endpoint, registry, settings).await;

        let attrs = adapter.get_all_attributes(AttributePolicy::INITIAL).await;
        assert_eq!(attrs.get(EntityAttribute::Value), Some(&AttributeValue::Number(68.0)));
        assert_eq!(attrs.get(EntityAttribute::Unit), Some(&AttributeValue::text("°F")));
        assert_eq!(attrs.get(EntityAttribute::State), Some(&AttributeValue::text("ON")));

        let humidity = SimulatedEndpoint::humidity_sensor(9);
        let registry = Arc::new(RecordingRegistry::new());
        let (_sim, adapter) = adapter_for(humidity, registry).await;
        assert_eq!(
            adapter
                .get_attribute(EntityAttribute::Unit, AttributePolicy::INITIAL)
                .await,
            Some(AttributeValue::text("%"))
        );
    }

    #[tokio::test]
    async fn test_sensor_refresh_skips_unchanged_static_attributes() {
        let endpoint = SimulatedEndpoint::temperature_sensor(8);
        let measurement = endpoint.cluster(ClusterKind::TemperatureMeasurement).unwrap();
        measurement.set_cached(MeasurementAttribute::MeasuredValue as u32, RawValue::Int(2000));
        let registry = Arc::new(RecordingRegistry::new());
        let (_sim, adapter) = adapter_for(endpoint, registry.clone()).await;
        adapter.init_attributes(AttributePolicy::INITIAL).await;

        adapter.send_attributes(AttributePolicy::REFRESH).await;
        adapter.send_attributes(AttributePolicy::REFRESH).await;
        assert!(registry.updates_for("Hub|8").is_empty());

        measurement.set_remote(MeasurementAttribute::MeasuredValue as u32, RawValue::Int(2150));
        adapter.send_attributes(AttributePolicy::REFRESH).await;
        let updates = registry.updates_for("Hub|8");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].len(), 1);
        assert_eq!(
            updates[0].get(EntityAttribute::Value),
            Some(&AttributeValue::Number(21.5))
        );
    }

    #[tokio::test]
    async fn test_cover_position_update_carries_state() {
        let cover = SimulatedEndpoint::window_covering(6, wc::LIFT | wc::POSITION_AWARE_LIFT);
        let wc_cluster = cover.cluster(ClusterKind::WindowCovering).unwrap();
        wc_cluster.set_cached(
            WindowCoveringAttribute::TargetPositionLiftPercent100ths as u32,
            RawValue::Int(10_000),
        );
        let registry = Arc::new(RecordingRegistry::new());
        let (_sim, adapter) = adapter_for(cover, registry.clone()).await;
        adapter.add_listeners();
        assert!(adapter.listener_id(EntityAttribute::Position).is_some());
        assert!(adapter.listener_id(EntityAttribute::TiltPosition).is_none());

        wc_cluster.report(
            WindowCoveringAttribute::CurrentPositionLiftPercent100ths as u32,
            RawValue::Int(10_000),
        );
        let updates = registry.updates_for("Hub|6");
        assert_eq!(
            updates[0].get(EntityAttribute::Position),
            Some(&AttributeValue::Number(100.0))
        );
        assert_eq!(
            updates[0].get(EntityAttribute::State),
            Some(&AttributeValue::text("CLOSED"))
        );
    }

    #[tokio::test]
    async fn test_remote_read_failure_is_absent() {
        let endpoint = SimulatedEndpoint::on_off_plug(3);
        endpoint.cluster(ClusterKind::OnOff).unwrap().fail_reads(true);
        let registry = Arc::new(RecordingRegistry::new());
        let (_sim, adapter) = adapter_for(endpoint, registry).await;
        assert_eq!(
            adapter
                .get_attribute(EntityAttribute::State, AttributePolicy::subscribe(true))
                .await,
            None
        );
    }

    #[tokio::test]
    async fn test_drop_detaches_listeners() {
        let endpoint = SimulatedEndpoint::on_off_plug(3);
        let on_off = endpoint.cluster(ClusterKind::OnOff).unwrap();
        let registry = Arc::new(RecordingRegistry::new());
        let (_sim, adapter) = adapter_for(endpoint, registry).await;
        adapter.add_listeners();
        assert_eq!(on_off.listener_count(ON_OFF), 1);
        drop(adapter);
        assert_eq!(on_off.listener_count(ON_OFF), 0);
    }
}
