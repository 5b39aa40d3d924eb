//! External entity registry of the remote controller.
//!
//! The controller keeps two entity lists: entities the integration offers
//! ("available") and entities the user has picked ("configured").

use crate::entity::model::{AttributeMap, Entity};

pub trait EntityRegistry: Send + Sync {
    /// Offer an entity to the controller. Returns false if rejected.
    fn add_available_entity(&self, entity: Entity) -> bool;

    fn remove_available_entity(&self, entity_id: &str) -> bool;

    fn remove_configured_entity(&self, entity_id: &str) -> bool;

    /// Push attribute values. Returns whether the controller accepted them.
    fn update_entity_attributes(&self, entity_id: &str, attributes: &AttributeMap) -> bool;

    fn clear_configured_entities(&self);

    fn clear_available_entities(&self);
}
