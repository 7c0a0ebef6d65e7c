//! Message source abstraction and an in-process broker
//!
//! The listener only needs an at-least-once stream with per-message
//! acknowledgement. [`ChannelBroker`] provides that on top of a bounded
//! `tokio::sync::mpsc` channel: a negative acknowledgement puts the message
//! back on the queue after a delay.

use super::types::Message;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Default queue consumed by the lifecycle listener
pub const INVENTORY_TO_STORAGE: &str = "inventory-to-storage";

/// A message handed out by a [`MessageSource`]
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Message,
    /// 1 for the first delivery, incremented on each redelivery
    pub attempt: u32,
}

/// At-least-once message stream
#[async_trait]
pub trait MessageSource: Send {
    /// Next delivery, or `None` once the stream is closed
    async fn recv(&mut self) -> Option<Delivery>;

    /// Remove the message from the queue
    async fn ack(&mut self, delivery: Delivery);

    /// Ask for the message to be delivered again later
    async fn nack(&mut self, delivery: Delivery);
}

/// Publisher side of a [`ChannelBroker`]
#[derive(Clone)]
pub struct BrokerHandle {
    queue: String,
    tx: mpsc::Sender<Delivery>,
}

impl BrokerHandle {
    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub async fn publish(&self, message: Message) -> Result<()> {
        self.tx
            .send(Delivery {
                message,
                attempt: 1,
            })
            .await
            .map_err(|_| Error::Internal(format!("queue '{}' is closed", self.queue)))
    }
}

/// In-process queue with redelivery on nack
///
/// The stream closes when every [`BrokerHandle`] has been dropped and no
/// redelivery is pending.
pub struct ChannelBroker {
    queue: String,
    rx: mpsc::Receiver<Delivery>,
    redeliver: mpsc::WeakSender<Delivery>,
    redelivery_delay: Duration,
}

impl ChannelBroker {
    pub fn new(
        queue: impl Into<String>,
        capacity: usize,
        redelivery_delay: Duration,
    ) -> (Self, BrokerHandle) {
        let queue = queue.into();
        let (tx, rx) = mpsc::channel(capacity);
        let broker = Self {
            queue: queue.clone(),
            rx,
            redeliver: tx.downgrade(),
            redelivery_delay,
        };
        (broker, BrokerHandle { queue, tx })
    }
}

#[async_trait]
impl MessageSource for ChannelBroker {
    async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    async fn ack(&mut self, delivery: Delivery) {
        tracing::debug!(
            queue = %self.queue,
            source = %delivery.message.source,
            attempt = delivery.attempt,
            "Message acknowledged"
        );
    }

    async fn nack(&mut self, delivery: Delivery) {
        let Some(tx) = self.redeliver.upgrade() else {
            tracing::warn!(queue = %self.queue, "Queue closed, dropping message marked for redelivery");
            return;
        };

        let queue = self.queue.clone();
        let delay = self.redelivery_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let attempt = delivery.attempt + 1;
            let redelivery = Delivery {
                message: delivery.message,
                attempt,
            };
            if tx.send(redelivery).await.is_err() {
                tracing::warn!(queue = %queue, attempt, "Queue closed before redelivery");
            }
        });
    }
}
