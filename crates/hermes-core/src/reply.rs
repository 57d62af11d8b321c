//! Bus reply callback.
//!
//! A [`Reply`] fires at most once: the first [`Reply::send`] wins and later
//! calls are ignored. Clones share the same slot, so the bus front can keep a
//! copy while an interceptor works with another. When the last clone is
//! dropped without a reply having been sent, a structured error is sent in
//! its place, so every bus message gets exactly one reply.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// Receiving half of a reply.
pub type ReplyReceiver = oneshot::Receiver<Value>;

#[derive(Debug)]
struct ReplySlot {
    target: String,
    tx: Mutex<Option<oneshot::Sender<Value>>>,
}

impl Drop for ReplySlot {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.get_mut().take() {
            tracing::error!(target_op = %self.target, "bus message finished without a reply");
            let _ = tx.send(json!({
                "error": format!("No reply produced for {}", self.target)
            }));
        }
    }
}

/// Reply callback for one bus message.
#[derive(Debug, Clone)]
pub struct Reply {
    slot: Arc<ReplySlot>,
}

impl Reply {
    /// Creates a reply for a message addressed to `unit.operation`.
    #[must_use]
    pub fn channel(unit: &str, operation: &str) -> (Self, ReplyReceiver) {
        let (tx, rx) = oneshot::channel();
        let slot = ReplySlot {
            target: format!("{unit}.{operation}"),
            tx: Mutex::new(Some(tx)),
        };
        (
            Self {
                slot: Arc::new(slot),
            },
            rx,
        )
    }

    /// Sends the reply. Returns `false` if a reply was already sent.
    pub fn send(&self, value: Value) -> bool {
        let Some(tx) = self.slot.tx.lock().take() else {
            tracing::warn!(target_op = %self.slot.target, "reply already sent, dropping second reply");
            return false;
        };
        if tx.send(value).is_err() {
            tracing::debug!(target_op = %self.slot.target, "reply receiver dropped");
        }
        true
    }

    /// Sends `{ "error": message }`.
    pub fn send_error(&self, message: impl Into<String>) -> bool {
        self.send(json!({ "error": message.into() }))
    }

    /// Whether a reply has been sent.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.slot.tx.lock().is_none()
    }

    /// `unit.operation` the message was addressed to.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.slot.target
    }
}
