//! Per-request input.
//!
//! [`RequestParts`] is what middleware and operations see of an inbound call:
//! its id, headers, parsed JSON body and peer address.

use std::net::SocketAddr;

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::JsonMap;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps log lines for one request sortable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inbound request as seen by the dispatch layer.
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    request_id: RequestId,
    headers: HeaderMap,
    body: JsonMap,
    remote_addr: Option<SocketAddr>,
}

impl RequestParts {
    /// Creates request parts with a fresh id.
    #[must_use]
    pub fn new(headers: HeaderMap, body: JsonMap) -> Self {
        Self {
            request_id: RequestId::new(),
            headers,
            body,
            remote_addr: None,
        }
    }

    /// Sets the peer address.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Request id.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// All headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A header value as text. Non-UTF-8 values are treated as absent.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parsed JSON body.
    #[must_use]
    pub const fn body(&self) -> &JsonMap {
        &self.body
    }

    /// Consumes the parts, returning the body.
    #[must_use]
    pub fn into_body(self) -> JsonMap {
        self.body
    }

    /// Peer address, when known.
    #[must_use]
    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_request_id_is_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("token", HeaderValue::from_static("abc"));
        let parts = RequestParts::new(headers, JsonMap::new());
        assert_eq!(parts.header("Token"), Some("abc"));
        assert_eq!(parts.header("missing"), None);
    }

    #[test]
    fn test_body_access() {
        let body = json!({"name": "x"}).as_object().cloned().unwrap();
        let parts = RequestParts::new(HeaderMap::new(), body);
        assert_eq!(parts.body()["name"], "x");
        assert_eq!(parts.into_body().len(), 1);
    }
}
