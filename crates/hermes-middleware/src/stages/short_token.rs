//! `__shortToken`: verifies the session token and checks its role.

use std::sync::Arc;

use hermes_auth::{Role, TokenService};
use hermes_core::{BoxFuture, DispatchError, DispatchResult, RequestParts, ResponseHandle};

use super::{forbidden, unauthorized, TOKEN_HEADER};
use crate::middleware::{Accumulator, Flow, Middleware};

/// Rejects requests without a valid short token for a known role.
///
/// Responds 401 when the token is missing or does not verify, and 403 when
/// it carries no role or one outside [`Role`]. On success it contributes the
/// decoded claims.
#[derive(Debug, Clone)]
pub struct ShortTokenMiddleware {
    tokens: Arc<TokenService>,
}

impl ShortTokenMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub const fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }

    fn check(&self, request: &RequestParts) -> DispatchResult<Flow> {
        let Some(token) = request.header(TOKEN_HEADER) else {
            tracing::debug!(request_id = %request.request_id(), "short token missing");
            return Ok(Flow::Respond(unauthorized()));
        };

        let claims = match self.tokens.verify_short_token(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(request_id = %request.request_id(), error = %e, "short token rejected");
                return Ok(Flow::Respond(unauthorized()));
            }
        };

        let Some(role) = claims.role.as_deref() else {
            return Ok(Flow::Respond(forbidden("Forbidden: Role not specified")));
        };
        if role.parse::<Role>().is_err() {
            tracing::warn!(request_id = %request.request_id(), role, "short token carries unknown role");
            return Ok(Flow::Respond(forbidden("Forbidden: Invalid role")));
        }

        serde_json::to_value(&claims)
            .map(Flow::Continue)
            .map_err(|e| DispatchError::internal_with_source("failed to encode token claims", e))
    }
}

impl Middleware for ShortTokenMiddleware {
    fn name(&self) -> &str {
        "short_token"
    }

    fn process<'a>(
        &'a self,
        request: &'a RequestParts,
        _accumulator: &'a Accumulator,
        _response: &'a ResponseHandle,
    ) -> BoxFuture<'a, DispatchResult<Flow>> {
        Box::pin(async move { self.check(request) })
    }
}
