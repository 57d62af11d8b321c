//! `__longToken`: verifies the user's long token.

use std::sync::Arc;

use hermes_auth::TokenService;
use hermes_core::{BoxFuture, DispatchError, DispatchResult, RequestParts, ResponseHandle};

use super::{unauthorized, TOKEN_HEADER};
use crate::middleware::{Accumulator, Flow, Middleware};

/// Contributes the decoded long token, or responds 401.
#[derive(Debug, Clone)]
pub struct LongTokenMiddleware {
    tokens: Arc<TokenService>,
}

impl LongTokenMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub const fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }
}

impl Middleware for LongTokenMiddleware {
    fn name(&self) -> &str {
        "long_token"
    }

    fn process<'a>(
        &'a self,
        request: &'a RequestParts,
        _accumulator: &'a Accumulator,
        _response: &'a ResponseHandle,
    ) -> BoxFuture<'a, DispatchResult<Flow>> {
        Box::pin(async move {
            let claims = match request
                .header(TOKEN_HEADER)
                .map(|token| self.tokens.verify_long_token(token))
            {
                Some(Ok(claims)) => claims,
                Some(Err(e)) => {
                    tracing::debug!(request_id = %request.request_id(), error = %e, "long token rejected");
                    return Ok(Flow::Respond(unauthorized()));
                }
                None => return Ok(Flow::Respond(unauthorized())),
            };
            serde_json::to_value(&claims)
                .map(Flow::Continue)
                .map_err(|e| DispatchError::internal_with_source("failed to encode token claims", e))
        })
    }
}
