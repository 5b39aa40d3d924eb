//! Single-task driver loop.
//!
//! Protocol events (bridge added, removed, changed) and controller events
//! (subscribe, unsubscribe, commands, standby) arrive on one channel and are
//! applied to the inventory strictly one at a time.

use crate::bridge::BridgeInventory;
use crate::config::DriverSettings;
use crate::entity::{CommandParams, StatusCode};
use crate::error::{BridgeError, Result};
use crate::matter::node::MatterBridge;
use crate::registry::EntityRegistry;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const EVENT_QUEUE_SIZE: usize = 64;

#[derive(Debug)]
pub enum DriverEvent {
    BridgeAdded(MatterBridge),
    /// `None` removes every bridge
    BridgeRemoved(Option<MatterBridge>),
    /// Endpoint topology of a known bridge changed
    BridgeUpdated(MatterBridge),
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
    Command {
        entity_id: String,
        command_id: String,
        params: Option<CommandParams>,
        reply: oneshot::Sender<StatusCode>,
    },
    ExitStandby,
}

impl DriverEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::BridgeAdded(_) => "bridge added",
            Self::BridgeRemoved(_) => "bridge removed",
            Self::BridgeUpdated(_) => "bridge updated",
            Self::Subscribe(_) => "subscribe",
            Self::Unsubscribe(_) => "unsubscribe",
            Self::Command { .. } => "command",
            Self::ExitStandby => "exit standby",
        }
    }
}

pub struct Driver {
    inventory: BridgeInventory,
}

impl Driver {
    pub fn new(registry: Arc<dyn EntityRegistry>, settings: &DriverSettings) -> Self {
        Self {
            inventory: BridgeInventory::new(registry, settings),
        }
    }

    pub fn inventory(&self) -> &BridgeInventory {
        &self.inventory
    }

    /// Spawn the event loop and return a handle for feeding it.
    pub fn spawn(self) -> (DriverHandle, JoinHandle<Self>) {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_SIZE);
        let task = tokio::spawn(self.run(rx));
        (DriverHandle { tx }, task)
    }

    /// Process events until every sender is dropped.
    pub async fn run(mut self, mut rx: mpsc::Receiver<DriverEvent>) -> Self {
        info!("[Driver] Event loop started");
        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }
        info!("[Driver] Event loop stopped");
        self
    }

    pub async fn handle(&mut self, event: DriverEvent) {
        debug!("[Driver] Handling {} event", event.name());
        match event {
            DriverEvent::BridgeAdded(bridge) => self.inventory.on_bridge_added(bridge).await,
            DriverEvent::BridgeRemoved(bridge) => self.inventory.on_bridge_removed(bridge.as_ref()),
            DriverEvent::BridgeUpdated(bridge) => self.inventory.on_bridge_updated(bridge).await,
            DriverEvent::Subscribe(entity_ids) => self.inventory.on_subscribe(&entity_ids).await,
            DriverEvent::Unsubscribe(entity_ids) => self.inventory.on_unsubscribe(&entity_ids),
            DriverEvent::Command {
                entity_id,
                command_id,
                params,
                reply,
            } => {
                let status = self
                    .inventory
                    .on_command(&entity_id, &command_id, params.as_ref())
                    .await;
                if reply.send(status).is_err() {
                    warn!(
                        "[Driver] Caller of {} on {} went away before the reply",
                        command_id, entity_id
                    );
                }
            }
            DriverEvent::ExitStandby => self.inventory.refresh_subscribed().await,
        }
    }
}

/// Cloneable sender side of a running [`Driver`].
#[derive(Clone)]
pub struct DriverHandle {
    tx: mpsc::Sender<DriverEvent>,
}

impl DriverHandle {
    pub async fn send(&self, event: DriverEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| BridgeError::DriverStopped)
    }

    /// Send a command and wait for its status code.
    pub async fn command(
        &self,
        entity_id: &str,
        command_id: &str,
        params: Option<CommandParams>,
    ) -> Result<StatusCode> {
        let (reply, rx) = oneshot::channel();
        self.send(DriverEvent::Command {
            entity_id: entity_id.to_string(),
            command_id: command_id.to_string(),
            params,
            reply,
        })
        .await?;
        rx.await.map_err(|_| BridgeError::DriverStopped)
    }
}

/// Poll `is_ready` every `interval` until it reports ready or `timeout` passes.
pub async fn wait_until_ready<F>(mut is_ready: F, interval: Duration, timeout: Duration) -> Result<()>
where
    F: FnMut() -> bool,
{
    let poll = async {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if is_ready() {
                return;
            }
            debug!("[Driver] Matter controller not ready yet");
        }
    };

    match tokio::time::timeout(timeout, poll).await {
        Ok(()) => Ok(()),
        Err(_) => {
            warn!("[Driver] Matter controller not ready after {:?}", timeout);
            Err(BridgeError::NotReady(timeout))
        }
    }
}
