//! Response wrapper with envelope accessors.

use bytes::Bytes;
use hermes_server::HttpResponse;
use http::{HeaderMap, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TestError;

/// A collected response.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Collects a front response.
    pub async fn from_http(response: HttpResponse) -> Result<Self, TestError> {
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| TestError::BodyRead(e.to_string()))?
            .to_bytes();
        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    /// Status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Status as a number.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8 text.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec()).map_err(|e| TestError::BodyRead(e.to_string()))
    }

    /// Body decoded as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Body as a JSON value, `null` when it is not JSON.
    #[must_use]
    pub fn value(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    /// Envelope `ok`.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.value()["ok"].as_bool().unwrap_or(false)
    }

    /// Envelope `data`.
    #[must_use]
    pub fn data(&self) -> Value {
        self.value()["data"].clone()
    }

    /// Envelope `message`.
    #[must_use]
    pub fn message(&self) -> String {
        self.value()["message"].as_str().unwrap_or_default().to_string()
    }

    /// Envelope `errors` as strings.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.value()["errors"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Asserts the status code.
    ///
    /// # Panics
    ///
    /// Panics with the body when the status differs.
    #[track_caller]
    pub fn assert_status(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status_code(),
            expected,
            "unexpected status, body: {}",
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts `ok: true` with a 2xx status.
    #[track_caller]
    pub fn assert_ok(&self) -> &Self {
        assert!(
            self.status.is_success() && self.ok(),
            "expected success, got {} {}",
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }
}
