//! Consumed Matter interfaces: clusters, nodes, endpoints and device types.

pub mod clusters;
pub mod device_types;
pub mod node;

pub use clusters::{AttributePath, ClusterClient, ClusterCommand, ClusterKind, RawValue};
pub use device_types::MatterDeviceType;
pub use node::{Endpoint, MatterBridge, Node};
