//! Controller entities built from bridged Matter endpoints.

pub mod adapter;
pub mod capabilities;
pub mod classifier;
pub mod commands;
pub mod converters;
pub mod device_info;
pub mod model;
pub mod subscription;

pub use adapter::{AttributePolicy, EntityAdapter};
pub use classifier::{classify, Classification};
pub use commands::CommandParams;
pub use device_info::{split_entity_id, DeviceInfo};
pub use model::{
    AttributeMap, AttributeValue, DeviceClass, Entity, EntityAttribute, EntityKind, Feature,
    StatusCode,
};
