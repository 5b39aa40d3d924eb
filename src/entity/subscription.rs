//! Owned attribute listener registrations.

use crate::matter::clusters::{AttributeId, AttributeListener, AttributePath, ClusterClient, ListenerId};
use log::trace;
use std::fmt;
use std::sync::Arc;

/// An attribute listener registered on a cluster client.
///
/// Dropping the subscription removes the listener from the client.
pub struct AttributeSubscription {
    client: Arc<dyn ClusterClient>,
    attribute: AttributeId,
    id: ListenerId,
}

impl AttributeSubscription {
    pub fn attach(
        client: Arc<dyn ClusterClient>,
        attribute: AttributeId,
        listener: AttributeListener,
    ) -> Self {
        let id = client.add_attribute_listener(attribute, listener);
        trace!(
            "[Entity] Listener {:?} attached to {}",
            id,
            AttributePath::new(client.cluster(), attribute)
        );
        Self {
            client,
            attribute,
            id,
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn path(&self) -> AttributePath {
        AttributePath::new(self.client.cluster(), self.attribute)
    }
}

impl fmt::Debug for AttributeSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeSubscription")
            .field("path", &self.path())
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for AttributeSubscription {
    fn drop(&mut self) {
        self.client.remove_attribute_listener(self.attribute, self.id);
        trace!("[Entity] Listener {:?} detached from {}", self.id, self.path());
    }
}
