//! In-memory stand-ins for a commissioned bridge and the controller registry.
//!
//! Used by the demo binary and throughout the tests.

mod activity;
mod node;
mod registry;

pub use activity::run_sensor_simulation;
pub use node::{SimulatedBridge, SimulatedCluster, SimulatedEndpoint, SimulatedNode};
pub use registry::{RecordingRegistry, RegistryCall};
