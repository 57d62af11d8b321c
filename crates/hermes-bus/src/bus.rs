//! Fan-out bus over bounded tokio channels.
//!
//! Every subscriber gets its own bounded queue. Publishing tries a
//! non-blocking send first and only awaits queues that are full, so one slow
//! subscriber applies backpressure without blocking the others' fast path.

use std::sync::Arc;

use hermes_core::{Reply, ReplyReceiver};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

use crate::error::{BusError, BusResult};

/// Addressing and payload of a bus message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusEnvelope {
    /// Unit name.
    pub target_unit: String,
    /// Operation name.
    pub target_operation: String,
    /// Payload passed to the operation.
    #[serde(default)]
    pub data: Value,
    /// Caller metadata.
    #[serde(default)]
    pub meta: Value,
}

impl BusEnvelope {
    /// Addresses `unit.operation` with empty data and meta.
    #[must_use]
    pub fn new(unit: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            target_unit: unit.into(),
            target_operation: operation.into(),
            data: Value::Null,
            meta: Value::Null,
        }
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }

    /// `unit.operation`.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}.{}", self.target_unit, self.target_operation)
    }
}

/// An envelope with its reply callback.
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// Addressing and payload.
    pub envelope: BusEnvelope,
    /// Fires once with the result or a structured error.
    pub reply: Reply,
}

impl BusMessage {
    /// Wraps an envelope with a fresh reply channel.
    #[must_use]
    pub fn new(envelope: BusEnvelope) -> (Self, ReplyReceiver) {
        let (reply, rx) = Reply::channel(&envelope.target_unit, &envelope.target_operation);
        (Self { envelope, reply }, rx)
    }
}

/// Receiving end of a subscription.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<Arc<BusMessage>>,
}

impl Subscription {
    /// Next message, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Arc<BusMessage>> {
        self.rx.recv().await
    }

    /// Next message, or `None` when `shutdown` changes.
    pub async fn recv_or_shutdown(
        &mut self,
        shutdown: &watch::Receiver<bool>,
    ) -> Option<Arc<BusMessage>> {
        let mut shutdown = shutdown.clone();
        if *shutdown.borrow() {
            return None;
        }
        tokio::select! {
            _ = shutdown.changed() => None,
            msg = self.rx.recv() => msg,
        }
    }
}

type Senders = SmallVec<[mpsc::Sender<Arc<BusMessage>>; 4]>;

struct BusInner {
    subscribers: RwLock<Senders>,
    capacity: usize,
}

/// Cloneable handle for publishing and subscribing.
#[derive(Clone)]
pub struct BusHandle {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for BusHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusHandle")
            .field("capacity", &self.inner.capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Owner of the bus.
#[derive(Debug)]
pub struct Bus {
    handle: BusHandle,
}

impl Bus {
    /// Creates a bus whose subscriber queues hold `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let inner = BusInner {
            subscribers: RwLock::new(SmallVec::new()),
            capacity: capacity.max(1),
        };
        Self {
            handle: BusHandle {
                inner: Arc::new(inner),
            },
        }
    }

    /// A handle to this bus.
    #[must_use]
    pub fn handle(&self) -> BusHandle {
        self.handle.clone()
    }
}

impl BusHandle {
    /// Subscribes to every message.
    #[must_use]
    pub fn subscribe_all(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let mut subscribers = self.inner.subscribers.write();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.push(tx);
        Subscription { rx }
    }

    /// Live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// Delivers a message to every subscriber. Returns how many received it.
    ///
    /// With no subscriber the message is dropped, which fires its reply's
    /// fallback error.
    pub async fn publish(&self, message: BusMessage) -> BusResult<usize> {
        let target = message.envelope.target();
        let recipients: Senders = self
            .inner
            .subscribers
            .read()
            .iter()
            .filter(|tx| !tx.is_closed())
            .cloned()
            .collect();
        if recipients.is_empty() {
            tracing::warn!(%target, "bus message dropped: no subscribers");
            return Err(BusError::NoSubscribers { target });
        }

        let message = Arc::new(message);
        let mut delivered = 0usize;
        let mut pending: Senders = SmallVec::new();
        for tx in recipients {
            match tx.try_send(Arc::clone(&message)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => pending.push(tx),
                Err(TrySendError::Closed(_)) => {}
            }
        }
        for tx in pending {
            tracing::debug!(%target, "subscriber queue full, waiting");
            if tx.send(Arc::clone(&message)).await.is_ok() {
                delivered += 1;
            }
        }

        if delivered == 0 {
            return Err(BusError::NoSubscribers { target });
        }
        Ok(delivered)
    }

    /// Publishes an envelope and waits for its reply.
    pub async fn call(&self, envelope: BusEnvelope) -> BusResult<Value> {
        let target = envelope.target();
        let (message, rx) = BusMessage::new(envelope);
        self.publish(message).await?;
        rx.await.map_err(|_| BusError::ReplyLost { target })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_wire_format() {
        let envelope: BusEnvelope = serde_json::from_value(json!({
            "targetUnit": "school",
            "targetOperation": "list",
            "data": { "a": 1 }
        }))
        .unwrap();
        assert_eq!(envelope.target(), "school.list");
        assert_eq!(envelope.meta, Value::Null);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_fires_fallback() {
        let bus = Bus::new(4);
        let (message, rx) = BusMessage::new(BusEnvelope::new("ghost", "op"));
        let err = bus.handle().publish(message).await.unwrap_err();
        assert!(matches!(err, BusError::NoSubscribers { .. }));
        let reply = rx.await.unwrap();
        assert!(reply["error"].as_str().unwrap().contains("ghost.op"));
    }

    #[tokio::test]
    async fn test_fan_out_to_every_subscriber() {
        let bus = Bus::new(4);
        let handle = bus.handle();
        let mut a = handle.subscribe_all();
        let mut b = handle.subscribe_all();

        let (message, _rx) = BusMessage::new(BusEnvelope::new("u", "op"));
        assert_eq!(handle.publish(message).await.unwrap(), 2);
        assert_eq!(a.recv().await.unwrap().envelope.target_unit, "u");
        assert_eq!(b.recv().await.unwrap().envelope.target_operation, "op");
    }

    #[tokio::test]
    async fn test_closed_subscribers_are_pruned() {
        let bus = Bus::new(4);
        let handle = bus.handle();
        drop(handle.subscribe_all());
        let _live = handle.subscribe_all();
        assert_eq!(handle.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_full_queue_waits_for_room() {
        let bus = Bus::new(1);
        let handle = bus.handle();
        let mut sub = handle.subscribe_all();

        let (first, _r1) = BusMessage::new(BusEnvelope::new("u", "first"));
        handle.publish(first).await.unwrap();

        let publisher = {
            let handle = handle.clone();
            tokio::spawn(async move {
                let (second, _r2) = BusMessage::new(BusEnvelope::new("u", "second"));
                handle.publish(second).await
            })
        };
        assert_eq!(sub.recv().await.unwrap().envelope.target_operation, "first");
        assert_eq!(sub.recv().await.unwrap().envelope.target_operation, "second");
        assert_eq!(publisher.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recv_or_shutdown() {
        let bus = Bus::new(1);
        let mut sub = bus.handle().subscribe_all();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        assert!(sub.recv_or_shutdown(&rx).await.is_none());
    }
}
