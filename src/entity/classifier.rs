//! Maps endpoint device types to entity kinds.

use super::model::{DeviceClass, EntityKind};
use crate::error::{BridgeError, Result};
use crate::matter::device_types::MatterDeviceType;

/// Entity kind and, where ambiguous, the device subclass of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: EntityKind,
    pub device_class: Option<DeviceClass>,
}

impl Classification {
    const fn new(kind: EntityKind, device_class: Option<DeviceClass>) -> Self {
        Self { kind, device_class }
    }
}

/// Classify a device type identifier.
///
/// Returns [`BridgeError::UnsupportedDeviceType`] for anything the engine
/// cannot present as an entity; callers skip such endpoints.
pub fn classify(device_type: u32) -> Result<Classification> {
    use MatterDeviceType::*;

    let classification = match MatterDeviceType::from_id(device_type) {
        Some(OnOffPlugInUnit) => {
            Classification::new(EntityKind::Switch, Some(DeviceClass::Outlet))
        }
        Some(GenericSwitch) => Classification::new(EntityKind::Switch, Some(DeviceClass::Switch)),
        Some(OnOffLight | DimmableLight | OnOffLightSwitch | ColorTemperatureLight
        | ExtendedColorLight) => Classification::new(EntityKind::Light, None),
        Some(TemperatureSensor) => {
            Classification::new(EntityKind::Sensor, Some(DeviceClass::Temperature))
        }
        Some(HumiditySensor) => {
            Classification::new(EntityKind::Sensor, Some(DeviceClass::Humidity))
        }
        Some(WindowCovering) => Classification::new(EntityKind::Cover, None),
        _ => return Err(BridgeError::UnsupportedDeviceType(device_type)),
    };

    Ok(classification)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switches() {
        let outlet = classify(266).unwrap();
        assert_eq!(outlet.kind, EntityKind::Switch);
        assert_eq!(outlet.device_class, Some(DeviceClass::Outlet));

        let switch = classify(15).unwrap();
        assert_eq!(switch.kind, EntityKind::Switch);
        assert_eq!(switch.device_class, Some(DeviceClass::Switch));
    }

    #[test]
    fn test_lights() {
        for id in [256, 257, 259, 268, 269] {
            let c = classify(id).unwrap();
            assert_eq!(c.kind, EntityKind::Light, "device type {}", id);
            assert_eq!(c.device_class, None);
        }
    }

    #[test]
    fn test_sensors_and_cover() {
        assert_eq!(
            classify(770).unwrap().device_class,
            Some(DeviceClass::Temperature)
        );
        assert_eq!(
            classify(775).unwrap().device_class,
            Some(DeviceClass::Humidity)
        );
        assert_eq!(classify(514).unwrap().kind, EntityKind::Cover);
    }

    #[test]
    fn test_unsupported() {
        assert!(matches!(
            classify(10),
            Err(BridgeError::UnsupportedDeviceType(10))
        ));
        assert!(classify(0xBEEF).is_err());
        assert!(classify(MatterDeviceType::Aggregator.id()).is_err());
    }
}
