use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Matter device type id {0} not supported at the moment")]
    UnsupportedDeviceType(u32),

    #[error("Endpoint {0} has no BridgedDeviceBasicInformation cluster")]
    MissingBasicInformation(u16),

    #[error("Node {0:016x} has no aggregator endpoint")]
    MissingAggregator(u64),

    #[error("Cluster 0x{0:04X} not present on endpoint")]
    ClusterNotFound(u32),

    #[error("Matter protocol error: {0}")]
    Protocol(String),

    #[error("Matter controller not ready after {0:?}")]
    NotReady(std::time::Duration),

    #[error("Driver event loop has stopped")]
    DriverStopped,

    #[error("Capability table incomplete: {0}")]
    IncompleteCapabilities(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidConfig { key: String, value: String },

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
