//! Attribute capability table.
//!
//! Each (entity kind, attribute, device class) triple maps to the protocol
//! attribute that backs it and the converter producing canonical values.
//! Reading live, reading from the stack cache and attaching listeners are all
//! derived from that one attribute path.

use super::converters;
use super::model::{AttributeMap, DeviceClass, EntityAttribute, EntityKind};
use super::subscription::AttributeSubscription;
use crate::config::ConverterSettings;
use crate::error::{BridgeError, Result};
use crate::matter::clusters::{
    AttributeListener, AttributePath, ClusterClient, ClusterKind, ColorControlAttribute,
    LevelControlAttribute, MeasurementAttribute, OnOffAttribute, RawValue,
    WindowCoveringAttribute,
};
use crate::matter::node::Endpoint;
use std::sync::Arc;

/// What a converter may look at besides the raw value.
pub struct ConversionContext<'a> {
    pub settings: ConverterSettings,
    pub endpoint: &'a dyn Endpoint,
}

impl ConversionContext<'_> {
    /// Value the protocol stack holds locally for another attribute.
    pub fn cached(&self, path: AttributePath) -> RawValue {
        self.endpoint
            .cluster_client(path.cluster)
            .map(|client| client.cached_attribute(path.attribute))
            .unwrap_or_default()
    }
}

/// Converts one protocol value into one or more canonical attributes.
pub type Converter = fn(&RawValue, &ConversionContext<'_>) -> AttributeMap;

/// Protocol source and converter of one entity attribute.
#[derive(Clone, Copy)]
pub struct AttributeCapability {
    pub path: AttributePath,
    pub convert: Converter,
}

impl AttributeCapability {
    pub fn client(&self, endpoint: &dyn Endpoint) -> Option<Arc<dyn ClusterClient>> {
        endpoint.cluster_client(self.path.cluster)
    }

    /// Read the attribute, live when `force_remote` is set.
    ///
    /// Returns `Ok(None)` when the endpoint has no client for the cluster.
    pub async fn read(&self, endpoint: &dyn Endpoint, force_remote: bool) -> Result<Option<RawValue>> {
        let Some(client) = self.client(endpoint) else {
            return Ok(None);
        };
        let value = client
            .read_attribute(self.path.attribute, force_remote)
            .await?;
        Ok(Some(value))
    }

    /// Last value held by the protocol stack, without a round-trip.
    pub fn read_cached(&self, endpoint: &dyn Endpoint) -> Option<RawValue> {
        self.client(endpoint)
            .map(|client| client.cached_attribute(self.path.attribute))
    }

    /// Attach a change listener. The returned subscription detaches on drop.
    pub fn subscribe(
        &self,
        endpoint: &dyn Endpoint,
        listener: AttributeListener,
    ) -> Option<AttributeSubscription> {
        let client = self.client(endpoint)?;
        Some(AttributeSubscription::attach(
            client,
            self.path.attribute,
            listener,
        ))
    }
}

struct CapabilityEntry {
    kind: EntityKind,
    attribute: EntityAttribute,
    /// `None` applies to every device class of the kind
    device_class: Option<DeviceClass>,
    capability: AttributeCapability,
}

const fn entry(
    kind: EntityKind,
    attribute: EntityAttribute,
    device_class: Option<DeviceClass>,
    path: AttributePath,
    convert: Converter,
) -> CapabilityEntry {
    CapabilityEntry {
        kind,
        attribute,
        device_class,
        capability: AttributeCapability { path, convert },
    }
}

const ON_OFF: AttributePath = AttributePath::new(ClusterKind::OnOff, OnOffAttribute::OnOff as u32);
const CURRENT_LEVEL: AttributePath = AttributePath::new(
    ClusterKind::LevelControl,
    LevelControlAttribute::CurrentLevel as u32,
);
const CURRENT_HUE: AttributePath = AttributePath::new(
    ClusterKind::ColorControl,
    ColorControlAttribute::CurrentHue as u32,
);
const CURRENT_SATURATION: AttributePath = AttributePath::new(
    ClusterKind::ColorControl,
    ColorControlAttribute::CurrentSaturation as u32,
);
const COLOR_TEMPERATURE: AttributePath = AttributePath::new(
    ClusterKind::ColorControl,
    ColorControlAttribute::ColorTemperatureMireds as u32,
);
const TEMPERATURE: AttributePath = AttributePath::new(
    ClusterKind::TemperatureMeasurement,
    MeasurementAttribute::MeasuredValue as u32,
);
const HUMIDITY: AttributePath = AttributePath::new(
    ClusterKind::RelativeHumidityMeasurement,
    MeasurementAttribute::MeasuredValue as u32,
);
pub(crate) const TARGET_LIFT: AttributePath = AttributePath::new(
    ClusterKind::WindowCovering,
    WindowCoveringAttribute::TargetPositionLiftPercent100ths as u32,
);
pub(crate) const CURRENT_LIFT: AttributePath = AttributePath::new(
    ClusterKind::WindowCovering,
    WindowCoveringAttribute::CurrentPositionLiftPercent100ths as u32,
);
const CURRENT_TILT: AttributePath = AttributePath::new(
    ClusterKind::WindowCovering,
    WindowCoveringAttribute::CurrentPositionTiltPercent100ths as u32,
);

static CAPABILITIES: &[CapabilityEntry] = &[
    entry(EntityKind::Switch, EntityAttribute::State, None, ON_OFF, on_off_state),
    entry(EntityKind::Light, EntityAttribute::State, None, ON_OFF, on_off_state),
    entry(EntityKind::Light, EntityAttribute::Brightness, None, CURRENT_LEVEL, brightness),
    entry(EntityKind::Light, EntityAttribute::Hue, None, CURRENT_HUE, hue),
    entry(EntityKind::Light, EntityAttribute::Saturation, None, CURRENT_SATURATION, saturation),
    entry(
        EntityKind::Light,
        EntityAttribute::ColorTemperature,
        None,
        COLOR_TEMPERATURE,
        color_temperature,
    ),
    entry(
        EntityKind::Sensor,
        EntityAttribute::Value,
        Some(DeviceClass::Temperature),
        TEMPERATURE,
        temperature,
    ),
    entry(
        EntityKind::Sensor,
        EntityAttribute::Value,
        Some(DeviceClass::Humidity),
        HUMIDITY,
        humidity,
    ),
    entry(EntityKind::Cover, EntityAttribute::State, None, TARGET_LIFT, cover_target),
    entry(EntityKind::Cover, EntityAttribute::Position, None, CURRENT_LIFT, cover_position),
    entry(EntityKind::Cover, EntityAttribute::TiltPosition, None, CURRENT_TILT, cover_tilt),
];

/// Find the capability backing an entity attribute.
pub fn lookup(
    kind: EntityKind,
    attribute: EntityAttribute,
    device_class: Option<DeviceClass>,
) -> Option<&'static AttributeCapability> {
    let mut fallback = None;
    for e in CAPABILITIES
        .iter()
        .filter(|e| e.kind == kind && e.attribute == attribute)
    {
        match e.device_class {
            None => fallback = Some(&e.capability),
            Some(class) if Some(class) == device_class => return Some(&e.capability),
            Some(_) => {}
        }
    }
    fallback
}

/// Attributes of a kind that are backed by a protocol attribute.
pub fn protocol_attributes(kind: EntityKind) -> &'static [EntityAttribute] {
    use EntityAttribute::*;
    match kind {
        EntityKind::Switch => &[State],
        EntityKind::Light => &[State, Brightness, Hue, Saturation, ColorTemperature],
        EntityKind::Sensor => &[Value],
        EntityKind::Cover => &[State, Position, TiltPosition],
    }
}

/// Device classes a kind can carry (`None` for kinds without subclasses).
fn device_classes(kind: EntityKind) -> &'static [Option<DeviceClass>] {
    match kind {
        EntityKind::Switch => &[Some(DeviceClass::Outlet), Some(DeviceClass::Switch)],
        EntityKind::Sensor => &[Some(DeviceClass::Temperature), Some(DeviceClass::Humidity)],
        EntityKind::Light | EntityKind::Cover => &[None],
    }
}

/// Check that every protocol-backed attribute of every kind has an entry.
pub fn validate() -> Result<()> {
    let kinds = [
        EntityKind::Switch,
        EntityKind::Light,
        EntityKind::Sensor,
        EntityKind::Cover,
    ];
    for kind in kinds {
        for &device_class in device_classes(kind) {
            for &attribute in protocol_attributes(kind) {
                if lookup(kind, attribute, device_class).is_none() {
                    return Err(BridgeError::IncompleteCapabilities(format!(
                        "{} {} ({:?})",
                        kind, attribute, device_class
                    )));
                }
            }
        }
    }
    Ok(())
}

fn single(attribute: EntityAttribute, value: impl Into<super::model::AttributeValue>) -> AttributeMap {
    let mut map = AttributeMap::new();
    map.insert(attribute, value);
    map
}

fn on_off_state(raw: &RawValue, _: &ConversionContext<'_>) -> AttributeMap {
    single(EntityAttribute::State, converters::on_off_state(raw))
}

fn brightness(raw: &RawValue, _: &ConversionContext<'_>) -> AttributeMap {
    single(EntityAttribute::Brightness, converters::level_to_canonical(raw))
}

fn hue(raw: &RawValue, _: &ConversionContext<'_>) -> AttributeMap {
    single(EntityAttribute::Hue, converters::hue_to_degrees(raw))
}

fn saturation(raw: &RawValue, _: &ConversionContext<'_>) -> AttributeMap {
    single(EntityAttribute::Saturation, converters::level_to_canonical(raw))
}

fn color_temperature(raw: &RawValue, _: &ConversionContext<'_>) -> AttributeMap {
    single(
        EntityAttribute::ColorTemperature,
        converters::mireds_to_percent(raw),
    )
}

fn temperature(raw: &RawValue, ctx: &ConversionContext<'_>) -> AttributeMap {
    single(
        EntityAttribute::Value,
        converters::temperature_value(raw, ctx.settings.temperature_unit),
    )
}

fn humidity(raw: &RawValue, _: &ConversionContext<'_>) -> AttributeMap {
    single(EntityAttribute::Value, converters::humidity_value(raw))
}

fn cover_target(raw: &RawValue, ctx: &ConversionContext<'_>) -> AttributeMap {
    let current = ctx.cached(CURRENT_LIFT);
    single(
        EntityAttribute::State,
        converters::cover_state_from_raw(&current, raw, ctx.settings.cover_percent_inverted),
    )
}

// A position report also moves the cover state.
fn cover_position(raw: &RawValue, ctx: &ConversionContext<'_>) -> AttributeMap {
    let inverted = ctx.settings.cover_percent_inverted;
    let target = ctx.cached(TARGET_LIFT);
    let mut map = single(
        EntityAttribute::Position,
        converters::position_to_percent(raw, inverted),
    );
    map.insert(
        EntityAttribute::State,
        converters::cover_state_from_raw(raw, &target, inverted),
    );
    map
}

fn cover_tilt(raw: &RawValue, _: &ConversionContext<'_>) -> AttributeMap {
    single(
        EntityAttribute::TiltPosition,
        converters::position_to_percent(raw, false),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::model::AttributeValue;
    use crate::simulation::SimulatedEndpoint;

    #[test]
    fn test_table_is_complete() {
        assert!(validate().is_ok());
    }

    #[test]
    fn test_lookup_by_device_class() {
        let temp = lookup(
            EntityKind::Sensor,
            EntityAttribute::Value,
            Some(DeviceClass::Temperature),
        )
        .unwrap();
        assert_eq!(temp.path, TEMPERATURE);

        let humidity = lookup(
            EntityKind::Sensor,
            EntityAttribute::Value,
            Some(DeviceClass::Humidity),
        )
        .unwrap();
        assert_eq!(humidity.path, HUMIDITY);

        assert!(lookup(EntityKind::Sensor, EntityAttribute::Value, None).is_none());
        assert!(lookup(EntityKind::Switch, EntityAttribute::Brightness, None).is_none());
        assert_eq!(
            lookup(EntityKind::Switch, EntityAttribute::State, Some(DeviceClass::Outlet))
                .unwrap()
                .path,
            ON_OFF
        );
    }

    #[test]
    fn test_cover_position_emits_state() {
        let endpoint = SimulatedEndpoint::window_covering(5, 0x05);
        endpoint
            .cluster(ClusterKind::WindowCovering)
            .unwrap()
            .set_cached(TARGET_LIFT.attribute, RawValue::Int(8000));

        let ctx = ConversionContext {
            settings: ConverterSettings::default(),
            endpoint: &*endpoint,
        };
        let capability = lookup(EntityKind::Cover, EntityAttribute::Position, None).unwrap();
        let map = (capability.convert)(&RawValue::Int(3000), &ctx);

        assert_eq!(
            map.get(EntityAttribute::Position),
            Some(&AttributeValue::Number(30.0))
        );
        assert_eq!(
            map.get(EntityAttribute::State),
            Some(&AttributeValue::text("OPENING"))
        );
    }

    #[tokio::test]
    async fn test_read_without_cluster_is_none() {
        let endpoint = SimulatedEndpoint::on_off_plug(3);
        let capability = lookup(EntityKind::Light, EntityAttribute::Brightness, None).unwrap();
        assert!(capability.read(&*endpoint, false).await.unwrap().is_none());
        assert!(capability.read_cached(&*endpoint).is_none());
    }
}
