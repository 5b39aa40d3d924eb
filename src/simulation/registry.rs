//! Entity registry that records every call it receives.

use crate::entity::model::{AttributeMap, Entity};
use crate::registry::EntityRegistry;
use log::info;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

/// One call received by a [`RecordingRegistry`].
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryCall {
    AddAvailable(String),
    RemoveAvailable(String),
    RemoveConfigured(String),
    UpdateAttributes(String, AttributeMap),
    ClearConfigured,
    ClearAvailable,
}

#[derive(Default)]
pub struct RecordingRegistry {
    available: Mutex<BTreeMap<String, Entity>>,
    configured: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<RegistryCall>>,
    reject_updates: AtomicBool,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an entity as configured by the user.
    pub fn configure(&self, entity_id: &str) {
        self.configured.lock().insert(entity_id.to_string());
    }

    /// Make attribute pushes fail until called again with `false`.
    pub fn reject_updates(&self, reject: bool) {
        self.reject_updates.store(reject, Ordering::SeqCst);
    }

    pub fn is_available(&self, entity_id: &str) -> bool {
        self.available.lock().contains_key(entity_id)
    }

    pub fn is_configured(&self, entity_id: &str) -> bool {
        self.configured.lock().contains(entity_id)
    }

    pub fn available_ids(&self) -> Vec<String> {
        self.available.lock().keys().cloned().collect()
    }

    pub fn entity(&self, entity_id: &str) -> Option<Entity> {
        self.available.lock().get(entity_id).cloned()
    }

    pub fn calls(&self) -> Vec<RegistryCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Accepted and rejected attribute pushes for one entity, oldest first.
    pub fn updates_for(&self, entity_id: &str) -> Vec<AttributeMap> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RegistryCall::UpdateAttributes(id, attributes) if id == entity_id => {
                    Some(attributes.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: RegistryCall) {
        self.calls.lock().push(call);
    }
}

impl EntityRegistry for RecordingRegistry {
    fn add_available_entity(&self, entity: Entity) -> bool {
        self.record(RegistryCall::AddAvailable(entity.id.clone()));
        info!("[Registry] Available: {} ({})", entity.id, entity.name);
        self.available.lock().insert(entity.id.clone(), entity);
        true
    }

    fn remove_available_entity(&self, entity_id: &str) -> bool {
        self.record(RegistryCall::RemoveAvailable(entity_id.to_string()));
        self.available.lock().remove(entity_id).is_some()
    }

    fn remove_configured_entity(&self, entity_id: &str) -> bool {
        self.record(RegistryCall::RemoveConfigured(entity_id.to_string()));
        self.configured.lock().remove(entity_id)
    }

    fn update_entity_attributes(&self, entity_id: &str, attributes: &AttributeMap) -> bool {
        self.record(RegistryCall::UpdateAttributes(
            entity_id.to_string(),
            attributes.clone(),
        ));
        if self.reject_updates.load(Ordering::SeqCst) {
            return false;
        }
        info!(
            "[Registry] {} <- {}",
            entity_id,
            serde_json::to_string(attributes).unwrap_or_default()
        );
        true
    }

    fn clear_configured_entities(&self) {
        self.record(RegistryCall::ClearConfigured);
        self.configured.lock().clear();
    }

    fn clear_available_entities(&self) {
        self.record(RegistryCall::ClearAvailable);
        self.available.lock().clear();
    }
}
