//! Bridge inventory and topology reconciliation.

pub mod diff;
pub mod inventory;

pub use diff::{diff_keys, KeyDiff};
pub use inventory::{BridgeDevices, BridgeInventory, DeviceMap};
