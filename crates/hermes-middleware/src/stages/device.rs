//! `__device`: client fingerprint.

use hermes_core::{BoxFuture, DispatchError, DispatchResult, RequestParts, ResponseHandle};
use http::header::USER_AGENT;
use serde::{Deserialize, Serialize};

use crate::middleware::{Accumulator, Flow, Middleware};

const UNKNOWN: &str = "unknown";

/// What `__device` contributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Client address: first `x-forwarded-for` hop, else the peer address.
    pub ip: String,
    /// `user-agent` header.
    pub agent: String,
}

impl DeviceInfo {
    /// Reads the fingerprint off a request.
    #[must_use]
    pub fn from_request(request: &RequestParts) -> Self {
        let ip = request
            .header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .or_else(|| request.remote_addr().map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| UNKNOWN.to_string());
        let agent = request
            .header(USER_AGENT.as_str())
            .unwrap_or(UNKNOWN)
            .to_string();
        Self { ip, agent }
    }
}

/// Never rejects.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceMiddleware;

impl Middleware for DeviceMiddleware {
    fn name(&self) -> &str {
        "device"
    }

    fn process<'a>(
        &'a self,
        request: &'a RequestParts,
        _accumulator: &'a Accumulator,
        _response: &'a ResponseHandle,
    ) -> BoxFuture<'a, DispatchResult<Flow>> {
        Box::pin(async move {
            serde_json::to_value(DeviceInfo::from_request(request))
                .map(Flow::Continue)
                .map_err(|e| DispatchError::internal_with_source("failed to encode device", e))
        })
    }
}
