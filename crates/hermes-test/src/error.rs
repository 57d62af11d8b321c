//! Test error types.

use thiserror::Error;

/// Errors raised by the test client.
#[derive(Debug, Error)]
pub enum TestError {
    /// Request could not be built.
    #[error("Request build error: {0}")]
    RequestBuild(String),
    /// Response body could not be read.
    #[error("Body read error: {0}")]
    BodyRead(String),
    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
