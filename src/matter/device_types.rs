//! Device type identifiers reported by bridged Matter endpoints.
//!
//! Values follow the Matter Device Library specification. Only a subset is
//! mapped to entities; see [`crate::entity::classifier`].

use strum::FromRepr;

/// Matter device type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
#[repr(u32)]
pub enum MatterDeviceType {
    DoorLock = 10,
    /// Aggregator (0x000E), the bridge endpoint enumerating bridged devices
    Aggregator = 14,
    /// Generic Switch (0x000F)
    GenericSwitch = 15,
    PowerSource = 17,
    /// Bridged Node (0x0013), added alongside the functional device type
    BridgedNode = 19,
    /// Contact Sensor (0x0015)
    ContactSensor = 21,
    SolarPower = 23,
    BatteryStorage = 24,
    Fan = 43,
    AirQualitySensor = 44,
    AirPurifier = 45,
    WaterFreezeDetector = 65,
    WaterLeakDetector = 67,
    RainSensor = 68,
    RoomAirConditioner = 114,
    RoboticVacuumCleaner = 116,
    ThreadBorderRouter = 145,
    /// On/Off Light (0x0100)
    OnOffLight = 256,
    /// Dimmable Light (0x0101)
    DimmableLight = 257,
    /// On/Off Light Switch (0x0103)
    OnOffLightSwitch = 259,
    DimmerSwitch = 260,
    ColorDimmerSwitch = 261,
    LightSensor = 262,
    /// Occupancy Sensor (0x0107)
    OccupancySensor = 263,
    /// On/Off Plug-in Unit (0x010A)
    OnOffPlugInUnit = 266,
    DimmablePlugInUnit = 267,
    /// Color Temperature Light (0x010C)
    ColorTemperatureLight = 268,
    /// Extended Color Light (0x010D)
    ExtendedColorLight = 269,
    MountedOnOffControl = 271,
    MountedDimmableLoadControl = 272,
    /// Window Covering (0x0202)
    WindowCovering = 514,
    Thermostat = 769,
    /// Temperature Sensor (0x0302)
    TemperatureSensor = 770,
    /// Humidity Sensor (0x0307)
    HumiditySensor = 775,
    ElectricalSensor = 1296,
    OnOffSensor = 2128,
}

impl MatterDeviceType {
    /// Look up a device type by its numeric identifier.
    pub fn from_id(id: u32) -> Option<Self> {
        Self::from_repr(id)
    }

    pub const fn id(self) -> u32 {
        self as u32
    }
}
