//! Canonical entity model consumed by the remote controller.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use strum::{AsRefStr, Display, EnumString};

/// Kind of entity presented to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Switch,
    Light,
    Sensor,
    Cover,
}

/// Device subclass for kinds that cover several physical device types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceClass {
    /// Switch entity backed by a plug-in unit
    Outlet,
    /// Switch entity backed by a generic switch
    Switch,
    Temperature,
    Humidity,
}

/// Optional capabilities negotiated once per entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Feature {
    OnOff,
    Toggle,
    Dim,
    Color,
    ColorTemperature,
    Open,
    Close,
    Stop,
    Position,
    Tilt,
    TiltStop,
    TiltPosition,
}

pub type FeatureSet = BTreeSet<Feature>;

/// Canonical attribute names.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityAttribute {
    State,
    Brightness,
    Hue,
    Saturation,
    ColorTemperature,
    Value,
    Unit,
    Position,
    TiltPosition,
}

impl EntityAttribute {
    /// Human readable name for log output ("color temperature").
    pub fn readable(self) -> String {
        self.as_ref().replace('_', " ")
    }
}

/// Canonical attribute value.
///
/// `Unknown` is a defined value meaning the device reported nothing usable.
/// A value that is not available at all is modelled as `Option::None` by callers.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Number(f64),
    Bool(bool),
    TextList(Vec<String>),
    Unknown,
}

impl AttributeValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Empty text and empty lists carry no information.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::TextList(l) => l.is_empty(),
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Unknown => Some(UNKNOWN),
            _ => None,
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
            Self::TextList(l) => write!(f, "[{}]", l.join(", ")),
            Self::Unknown => f.write_str(UNKNOWN),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::TextList(l) => l.serialize(serializer),
            Self::Unknown => serializer.serialize_str(UNKNOWN),
        }
    }
}

/// Attribute name to value, ordered for stable output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMap(BTreeMap<EntityAttribute, AttributeValue>);

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attribute: EntityAttribute, value: impl Into<AttributeValue>) {
        self.0.insert(attribute, value.into());
    }

    pub fn get(&self, attribute: EntityAttribute) -> Option<&AttributeValue> {
        self.0.get(&attribute)
    }

    pub fn remove(&mut self, attribute: EntityAttribute) -> Option<AttributeValue> {
        self.0.remove(&attribute)
    }

    pub fn contains(&self, attribute: EntityAttribute) -> bool {
        self.0.contains_key(&attribute)
    }

    pub fn extend(&mut self, other: AttributeMap) {
        self.0.extend(other.0);
    }

    pub fn retain(&mut self, mut keep: impl FnMut(EntityAttribute) -> bool) {
        self.0.retain(|k, _| keep(*k));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityAttribute, &AttributeValue)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }
}

impl FromIterator<(EntityAttribute, AttributeValue)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (EntityAttribute, AttributeValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for AttributeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k.as_ref(), v)?;
        }
        map.end()
    }
}

pub const UNKNOWN: &str = "UNKNOWN";

/// On/off state shared by switches and lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnOffState {
    On,
    Off,
    Unknown,
}

impl From<OnOffState> for AttributeValue {
    fn from(state: OnOffState) -> Self {
        match state {
            OnOffState::On => AttributeValue::text("ON"),
            OnOffState::Off => AttributeValue::text("OFF"),
            OnOffState::Unknown => AttributeValue::Unknown,
        }
    }
}

/// Cover motion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverState {
    Opening,
    Open,
    Closing,
    Closed,
    Unknown,
}

impl From<CoverState> for AttributeValue {
    fn from(state: CoverState) -> Self {
        match state {
            CoverState::Opening => AttributeValue::text("OPENING"),
            CoverState::Open => AttributeValue::text("OPEN"),
            CoverState::Closing => AttributeValue::text("CLOSING"),
            CoverState::Closed => AttributeValue::text("CLOSED"),
            CoverState::Unknown => AttributeValue::Unknown,
        }
    }
}

/// Sensor entities are always reported as "ON".
pub const SENSOR_STATE_ON: &str = "ON";

/// Entity descriptor registered with the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<DeviceClass>,
    pub features: FeatureSet,
    pub attributes: AttributeMap,
}

/// Result of a command dispatched to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusCode {
    Ok = 200,
    NotFound = 404,
    NotImplemented = 501,
    ServiceUnavailable = 503,
}

impl StatusCode {
    pub fn code(self) -> u16 {
        self as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_attribute_names() {
        assert_eq!(EntityAttribute::ColorTemperature.as_ref(), "color_temperature");
        assert_eq!(EntityAttribute::ColorTemperature.readable(), "color temperature");
        assert_eq!(
            EntityAttribute::from_str("tilt_position").unwrap(),
            EntityAttribute::TiltPosition
        );
        assert!(EntityAttribute::from_str("volume").is_err());
    }

    #[test]
    fn test_attribute_map_serializes_unknown_as_string() {
        let mut attrs = AttributeMap::new();
        attrs.insert(EntityAttribute::State, OnOffState::On);
        attrs.insert(EntityAttribute::Brightness, 42.0);
        attrs.insert(EntityAttribute::Hue, AttributeValue::Unknown);

        let json = serde_json::to_value(&attrs).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"state": "ON", "brightness": 42.0, "hue": "UNKNOWN"})
        );
    }

    #[test]
    fn test_empty_values() {
        assert!(AttributeValue::text("").is_empty());
        assert!(AttributeValue::TextList(vec![]).is_empty());
        assert!(!AttributeValue::Unknown.is_empty());
        assert!(!AttributeValue::Number(0.0).is_empty());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(StatusCode::Ok.code(), 200);
        assert_eq!(StatusCode::ServiceUnavailable.code(), 503);
    }
}
