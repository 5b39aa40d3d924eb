//! Cluster identifiers, attribute identifiers and the cluster client interface.
//!
//! The protocol stack itself is consumed, not implemented: every endpoint hands
//! out [`ClusterClient`]s that can read attributes (live or from the local
//! cache), register change listeners and invoke cluster commands.

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use strum::FromRepr;

/// Matter attribute identifier within a cluster.
pub type AttributeId = u32;

/// Global FeatureMap attribute, present on every cluster.
pub const FEATURE_MAP: AttributeId = 0xFFFC;

/// Clusters the entity engine knows how to use.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, FromRepr)]
#[repr(u32)]
pub enum ClusterKind {
    /// On/Off (0x0006)
    OnOff = 0x0006,
    /// Level Control (0x0008)
    LevelControl = 0x0008,
    /// Descriptor (0x001D)
    Descriptor = 0x001D,
    /// Basic Information (0x0028), root endpoint only
    BasicInformation = 0x0028,
    /// Bridged Device Basic Information (0x0039)
    BridgedDeviceBasicInformation = 0x0039,
    /// Window Covering (0x0102)
    WindowCovering = 0x0102,
    /// Color Control (0x0300)
    ColorControl = 0x0300,
    /// Temperature Measurement (0x0402)
    TemperatureMeasurement = 0x0402,
    /// Relative Humidity Measurement (0x0405)
    RelativeHumidityMeasurement = 0x0405,
}

impl ClusterKind {
    pub fn id(self) -> u32 {
        self as u32
    }
}

/// Attribute IDs for the OnOff cluster
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum OnOffAttribute {
    OnOff = 0x0000,
}

/// Attribute IDs for the LevelControl cluster
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum LevelControlAttribute {
    /// Current level, 0..=254 (nullable)
    CurrentLevel = 0x0000,
}

/// Attribute IDs for the ColorControl cluster
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum ColorControlAttribute {
    /// Current hue, 0..=254
    CurrentHue = 0x0000,
    /// Current saturation, 0..=254
    CurrentSaturation = 0x0001,
    /// Color temperature in mireds
    ColorTemperatureMireds = 0x0007,
}

/// Attribute IDs for the WindowCovering cluster
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum WindowCoveringAttribute {
    TargetPositionLiftPercent100ths = 0x000B,
    TargetPositionTiltPercent100ths = 0x000C,
    CurrentPositionLiftPercent100ths = 0x000E,
    CurrentPositionTiltPercent100ths = 0x000F,
}

/// WindowCovering FeatureMap bits.
pub mod window_covering_features {
    pub const LIFT: i64 = 0x01;
    pub const TILT: i64 = 0x02;
    pub const POSITION_AWARE_LIFT: i64 = 0x04;
    pub const POSITION_AWARE_TILT: i64 = 0x10;
}

/// Attribute IDs shared by the TemperatureMeasurement and
/// RelativeHumidityMeasurement clusters
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum MeasurementAttribute {
    /// Temperature in centidegrees Celsius, humidity in centi-percent
    MeasuredValue = 0x0000,
}

/// Attribute IDs shared by BasicInformation and BridgedDeviceBasicInformation
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum BasicInformationAttribute {
    VendorName = 0x0001,
    ProductName = 0x0003,
    NodeLabel = 0x0005,
    SerialNumber = 0x000F,
}

/// Attribute IDs for the Descriptor cluster
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum DescriptorAttribute {
    PartsList = 0x0003,
}

/// Fully qualified attribute location on an endpoint.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct AttributePath {
    pub cluster: ClusterKind,
    pub attribute: AttributeId,
}

impl AttributePath {
    pub const fn new(cluster: ClusterKind, attribute: AttributeId) -> Self {
        Self { cluster, attribute }
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/0x{:04X}", self.cluster, self.attribute)
    }
}

/// Protocol-native attribute value.
///
/// `Undefined` covers both "not yet read" and nullable attributes reporting null.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RawValue {
    #[default]
    Undefined,
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<i64>),
}

impl RawValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[i64]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }
}

/// Cluster commands issued by the entity engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCommand {
    On,
    Off,
    Toggle,
    MoveToLevel {
        level: u8,
        transition_time: u16,
    },
    MoveToColorTemperature {
        mireds: u16,
        transition_time: u16,
    },
    MoveToHueAndSaturation {
        hue: u8,
        saturation: u8,
        transition_time: u16,
    },
    UpOrOpen,
    DownOrClose,
    StopMotion,
    GoToLiftPercentage {
        percent_100ths: u16,
    },
    GoToTiltPercentage {
        percent_100ths: u16,
    },
}

impl ClusterCommand {
    /// Cluster the command belongs to.
    pub fn cluster(&self) -> ClusterKind {
        match self {
            Self::On | Self::Off | Self::Toggle => ClusterKind::OnOff,
            Self::MoveToLevel { .. } => ClusterKind::LevelControl,
            Self::MoveToColorTemperature { .. } | Self::MoveToHueAndSaturation { .. } => {
                ClusterKind::ColorControl
            }
            Self::UpOrOpen
            | Self::DownOrClose
            | Self::StopMotion
            | Self::GoToLiftPercentage { .. }
            | Self::GoToTiltPercentage { .. } => ClusterKind::WindowCovering,
        }
    }
}

/// Callback invoked by the protocol stack when an attribute value changes.
pub type AttributeListener = Arc<dyn Fn(RawValue) + Send + Sync>;

/// Handle returned when registering an [`AttributeListener`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(pub u64);

/// Client side of one cluster on one remote endpoint.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    fn cluster(&self) -> ClusterKind;

    /// Read an attribute. With `force_remote` the value is fetched from the
    /// device, otherwise the stack may answer from its own cache.
    async fn read_attribute(&self, attribute: AttributeId, force_remote: bool) -> Result<RawValue>;

    /// Last value the stack holds locally, without any round-trip.
    fn cached_attribute(&self, attribute: AttributeId) -> RawValue;

    fn add_attribute_listener(
        &self,
        attribute: AttributeId,
        listener: AttributeListener,
    ) -> ListenerId;

    fn remove_attribute_listener(&self, attribute: AttributeId, id: ListenerId);

    async fn invoke(&self, command: ClusterCommand) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_cluster_mapping() {
        assert_eq!(ClusterCommand::Toggle.cluster(), ClusterKind::OnOff);
        assert_eq!(
            ClusterCommand::MoveToLevel {
                level: 1,
                transition_time: 0
            }
            .cluster(),
            ClusterKind::LevelControl
        );
        assert_eq!(
            ClusterCommand::GoToTiltPercentage { percent_100ths: 0 }.cluster(),
            ClusterKind::WindowCovering
        );
    }

    #[test]
    fn test_cluster_ids() {
        assert_eq!(ClusterKind::from_repr(0x0300), Some(ClusterKind::ColorControl));
        assert_eq!(ClusterKind::WindowCovering.id(), 0x0102);
        assert_eq!(ClusterKind::from_repr(0x1234), None);
    }

    #[test]
    fn test_raw_value_accessors() {
        assert_eq!(RawValue::Bool(true).as_bool(), Some(true));
        assert_eq!(RawValue::Int(5).as_bool(), None);
        assert_eq!(RawValue::Int(5).as_int(), Some(5));
        assert_eq!(RawValue::Text("a".into()).as_text(), Some("a"));
        assert!(RawValue::default().is_undefined());
    }
}
