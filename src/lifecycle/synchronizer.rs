//! Keeps the artifact store in step with inventory lifecycle events
//!
//! One message is handled at a time, and every message ends in one decision:
//!
//! | Outcome | When |
//! |---|---|
//! | drop (ack) | payload does not decode, unknown source, unknown type |
//! | ack | provisioning or teardown succeeded |
//! | nack | the store failed; the broker will redeliver |
//!
//! Provisioning and teardown are idempotent, so redelivered messages are safe.

use super::broker::MessageSource;
use super::types::{LifecycleEvent, Message};
use crate::error::Result;
use crate::storage::{ArtifactKind, ArtifactStore, TradingSystem};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Applies lifecycle events to the artifact store
pub struct LifecycleSynchronizer {
    store: Arc<ArtifactStore>,
}

impl LifecycleSynchronizer {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }

    /// Handle one message. Returns `true` to acknowledge it and `false` to
    /// request redelivery.
    ///
    /// Blocks on filesystem calls.
    pub fn handle_message(&self, message: &Message) -> bool {
        tracing::info!(source = %message.source, kind = %message.kind, "New message received");

        let event = match LifecycleEvent::decode(message) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(
                    entity = %String::from_utf8_lossy(&message.entity),
                    error = %e,
                    "Dropping badly formatted message"
                );
                return true;
            }
        };

        match event {
            LifecycleEvent::Create(ts) => self.add_trading_system(&ts),
            LifecycleEvent::Delete { owner, id } => self.delete_trading_system(&owner, id),
            LifecycleEvent::Unrecognized { source, kind } => {
                tracing::error!(%source, %kind, "Dropping message with unknown source/type");
                true
            }
        }
    }

    fn add_trading_system(&self, ts: &TradingSystem) -> bool {
        tracing::info!(owner = %ts.username, id = ts.id, "Trading system creation received");

        match self.provision(ts) {
            Ok(()) => {
                tracing::info!(owner = %ts.username, id = ts.id, "Trading system provisioned");
                true
            }
            Err(e) => {
                tracing::error!(
                    owner = %ts.username,
                    id = ts.id,
                    error = %e,
                    "Cannot provision trading system"
                );
                false
            }
        }
    }

    fn provision(&self, ts: &TradingSystem) -> Result<()> {
        self.store.provision(&ts.username, ts.id)?;
        self.store.write_info(ts)?;

        // Never overwrite documentation on a redelivered create
        match self
            .store
            .read_artifact(&ts.username, ts.id, ArtifactKind::Documentation)
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => self.store.write_documentation(&ts.username, ts.id, ""),
            Err(e) => Err(e),
        }
    }

    fn delete_trading_system(&self, owner: &str, id: u64) -> bool {
        tracing::info!(%owner, id, "Trading system deletion received");

        match self.store.teardown(owner, id) {
            Ok(()) => {
                tracing::info!(%owner, id, "Trading system removed");
                true
            }
            Err(e) => {
                tracing::error!(%owner, id, error = %e, "Cannot remove trading system");
                false
            }
        }
    }
}

/// Spawn the single consumer task for `source`.
///
/// The task runs until the source closes.
pub fn spawn_listener<S>(synchronizer: Arc<LifecycleSynchronizer>, mut source: S) -> JoinHandle<()>
where
    S: MessageSource + 'static,
{
    tracing::info!("Starting inventory message listener");

    tokio::spawn(async move {
        while let Some(delivery) = source.recv().await {
            let sync = synchronizer.clone();
            let message = delivery.message.clone();
            let ack = match tokio::task::spawn_blocking(move || sync.handle_message(&message)).await
            {
                Ok(ack) => ack,
                Err(e) => {
                    tracing::error!(error = %e, "Message handler panicked");
                    false
                }
            };

            if ack {
                source.ack(delivery).await;
            } else {
                tracing::warn!(attempt = delivery.attempt, "Requesting redelivery");
                source.nack(delivery).await;
            }
        }
        tracing::info!("Inventory message listener stopped");
    })
}
