//! Terminal response writing.
//!
//! Every HTTP request owns one [`ResponseHandle`]. Middleware, operations and
//! the dispatch front all write through [`ResponseDispatcher::dispatch`], and
//! the handle accepts only the first write. Later attempts are logged and
//! dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use http::StatusCode;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::DispatchError;

/// Keys holding transport objects. They are removed from response data at
/// any depth before serialization.
pub const TRANSPORT_KEYS: [&str; 3] = ["req", "res", "socket"];

/// The response recorded by a [`ResponseHandle`].
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// JSON body.
    pub body: Value,
}

#[derive(Debug, Default)]
struct HandleState {
    sent: AtomicBool,
    slot: Mutex<Option<WrittenResponse>>,
}

/// Per-request response slot, shared by every stage of one request.
///
/// Cloning shares the slot.
#[derive(Debug, Clone, Default)]
pub struct ResponseHandle {
    state: Arc<HandleState>,
}

impl ResponseHandle {
    /// Creates an empty handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal response has been written.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.state.sent.load(Ordering::Acquire)
    }

    /// Writes a raw response. Returns `false` if one was already written.
    pub fn send(&self, status: StatusCode, body: Value) -> bool {
        if self
            .state
            .sent
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(%status, "response already sent, dropping second write");
            return false;
        }
        *self.state.slot.lock() = Some(WrittenResponse { status, body });
        true
    }

    /// Status of the written response, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.state.slot.lock().as_ref().map(|r| r.status)
    }

    /// Takes the written response out of the slot. The handle stays "sent".
    #[must_use]
    pub fn take(&self) -> Option<WrittenResponse> {
        self.state.slot.lock().take()
    }
}

/// Result envelope handed to the dispatcher.
///
/// On the wire it becomes `{ ok, data, errors, message }` with `data`
/// defaulting to `{}` and `message` to `""`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Explicit status code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    /// Error entries.
    #[serde(default)]
    pub errors: Vec<Value>,
    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    /// Successful envelope carrying `data`.
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            ..Self::default()
        }
    }

    /// Failed envelope with a status and message.
    #[must_use]
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            code: Some(status.as_u16()),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Failed envelope derived from a [`DispatchError`].
    ///
    /// `errors` lists field errors when there are any, otherwise the message
    /// itself. Internal details never reach the caller.
    #[must_use]
    pub fn from_error(error: &DispatchError) -> Self {
        let mut envelope = Self::error(error.status_code(), error.client_message());
        let fields = error.field_messages();
        envelope.errors = if fields.is_empty() {
            vec![Value::from(error.client_message())]
        } else {
            fields.into_iter().map(Value::from).collect()
        };
        envelope
    }

    /// Sets the status code.
    #[must_use]
    pub fn with_code(mut self, status: StatusCode) -> Self {
        self.code = Some(status.as_u16());
        self
    }

    /// Appends an error entry. A string becomes a one-element entry.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<Value>) -> Self {
        match error.into() {
            Value::Array(items) => self.errors.extend(items),
            other => self.errors.push(other),
        }
        self
    }

    /// Status: explicit `code`, else 200 when ok, else 400.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self.code {
            Some(code) => StatusCode::from_u16(code).unwrap_or_else(|_| {
                tracing::warn!(code, "invalid status code in envelope");
                StatusCode::INTERNAL_SERVER_ERROR
            }),
            None if self.ok => StatusCode::OK,
            None => StatusCode::BAD_REQUEST,
        }
    }

    /// Wire body with transport objects stripped from `data`.
    #[must_use]
    pub fn into_body(self) -> Value {
        json!({
            "ok": self.ok,
            "data": self.data.map(strip_transport).unwrap_or_else(|| json!({})),
            "errors": self.errors,
            "message": self.message.unwrap_or_default(),
        })
    }
}

/// The single writer of terminal responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseDispatcher;

impl ResponseDispatcher {
    /// Writes `envelope` to `handle` unless a response was already written.
    ///
    /// Returns `true` when this call produced the response.
    pub fn dispatch(handle: &ResponseHandle, envelope: Envelope) -> bool {
        if handle.is_sent() {
            tracing::warn!(
                ok = envelope.ok,
                message = envelope.message.as_deref().unwrap_or(""),
                "response already sent, dispatch ignored"
            );
            return false;
        }
        let status = envelope.status();
        handle.send(status, envelope.into_body())
    }

    /// Dispatches an error envelope built from `error`.
    pub fn dispatch_error(handle: &ResponseHandle, error: &DispatchError) -> bool {
        Self::dispatch(handle, Envelope::from_error(error))
    }
}

/// Removes [`TRANSPORT_KEYS`] from objects at any depth.
#[must_use]
pub fn strip_transport(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| !TRANSPORT_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k, strip_transport(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_transport).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_rules() {
        assert_eq!(Envelope::ok(json!({})).status(), StatusCode::OK);
        assert_eq!(Envelope::default().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Envelope::ok(json!({})).with_code(StatusCode::CREATED).status(),
            StatusCode::CREATED
        );
        let bogus = Envelope {
            code: Some(42),
            ..Envelope::default()
        };
        assert_eq!(bogus.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_wire_body_defaults() {
        let body = Envelope::default().into_body();
        assert_eq!(
            body,
            json!({"ok": false, "data": {}, "errors": [], "message": ""})
        );
    }

    #[test]
    fn test_with_error_normalizes_string() {
        let envelope = Envelope::error(StatusCode::BAD_REQUEST, "bad").with_error("name required");
        assert_eq!(envelope.errors, vec![json!("name required")]);
        let envelope = envelope.with_error(json!(["a", "b"]));
        assert_eq!(envelope.errors.len(), 3);
    }

    #[test]
    fn test_transport_keys_are_stripped_at_depth() {
        let data = json!({
            "school": {"name": "North", "res": {"socket": 1}},
            "req": "handle",
            "items": [{"socket": true, "id": 1}],
        });
        let body = Envelope::ok(data).into_body();
        assert_eq!(
            body["data"],
            json!({"school": {"name": "North"}, "items": [{"id": 1}]})
        );
    }

    #[test]
    fn test_dispatch_writes_once() {
        let handle = ResponseHandle::new();
        assert!(ResponseDispatcher::dispatch(
            &handle,
            Envelope::error(StatusCode::UNAUTHORIZED, "Unauthorized")
        ));
        assert!(!ResponseDispatcher::dispatch(&handle, Envelope::ok(json!({"late": true}))));

        let written = handle.take().unwrap();
        assert_eq!(written.status, StatusCode::UNAUTHORIZED);
        assert_eq!(written.body["message"], "Unauthorized");
        assert!(handle.is_sent());
    }

    #[test]
    fn test_clones_share_the_slot() {
        let handle = ResponseHandle::new();
        let clone = handle.clone();
        assert!(clone.send(StatusCode::OK, json!({})));
        assert!(handle.is_sent());
        assert_eq!(handle.status(), Some(StatusCode::OK));
    }

    #[test]
    fn test_error_envelope_hides_internal_detail() {
        let envelope = Envelope::from_error(&DispatchError::internal("db exploded"));
        assert_eq!(envelope.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope.message.as_deref(), Some("Internal server error"));
        assert_eq!(envelope.errors, vec![json!("Internal server error")]);
    }

    #[test]
    fn test_concurrent_dispatch_single_winner() {
        let handle = ResponseHandle::new();
        let winners: usize = std::thread::scope(|scope| {
            let joins: Vec<_> = (0..8)
                .map(|i| {
                    let handle = handle.clone();
                    scope.spawn(move || {
                        usize::from(ResponseDispatcher::dispatch(
                            &handle,
                            Envelope::ok(json!({ "writer": i })),
                        ))
                    })
                })
                .collect();
            joins.into_iter().map(|j| j.join().unwrap()).sum()
        });
        assert_eq!(winners, 1);
    }
}
