//! Built-in middleware.
//!
//! | Name           | Reads                  | Contributes                      |
//! |----------------|------------------------|----------------------------------|
//! | `__longToken`  | `token` header         | [`LongTokenClaims`]              |
//! | `__shortToken` | `token` header         | [`ShortTokenClaims`]             |
//! | `__device`     | peer address, `user-agent` | `{ "ip", "agent" }`          |
//!
//! [`LongTokenClaims`]: hermes_auth::LongTokenClaims
//! [`ShortTokenClaims`]: hermes_auth::ShortTokenClaims

mod device;
mod long_token;
mod short_token;

use std::sync::Arc;

use hermes_auth::TokenService;
use hermes_core::Envelope;
use http::StatusCode;

pub use device::{DeviceInfo, DeviceMiddleware};
pub use long_token::LongTokenMiddleware;
pub use short_token::ShortTokenMiddleware;

use crate::middleware::Middleware;
use crate::registry::MiddlewareRegistry;

/// Header carrying long and short tokens.
pub const TOKEN_HEADER: &str = "token";

/// Registry name of the short token middleware.
pub const SHORT_TOKEN: &str = "__shortToken";
/// Registry name of the long token middleware.
pub const LONG_TOKEN: &str = "__longToken";
/// Registry name of the device middleware.
pub const DEVICE: &str = "__device";

/// Registry with every built-in middleware.
///
/// Token middleware resolve an `Arc<TokenService>` from the shared context
/// when instantiated.
#[must_use]
pub fn standard_registry() -> MiddlewareRegistry {
    let mut registry = MiddlewareRegistry::new();
    registry
        .register(SHORT_TOKEN, |ctx| {
            let tokens = ctx.require::<TokenService>()?;
            Ok(Arc::new(ShortTokenMiddleware::new(tokens)) as Arc<dyn Middleware>)
        })
        .register(LONG_TOKEN, |ctx| {
            let tokens = ctx.require::<TokenService>()?;
            Ok(Arc::new(LongTokenMiddleware::new(tokens)) as Arc<dyn Middleware>)
        })
        .register_instance(DEVICE, Arc::new(DeviceMiddleware));
    registry
}

fn unauthorized() -> Envelope {
    Envelope::error(StatusCode::UNAUTHORIZED, "Unauthorized").with_error("Unauthorized")
}

fn forbidden(message: &str) -> Envelope {
    Envelope::error(StatusCode::FORBIDDEN, message).with_error(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_auth::TokenConfig;
    use hermes_core::SharedContext;
    use hermes_router::MiddlewareCatalog;

    #[test]
    fn test_standard_registry_names() {
        let registry = standard_registry();
        assert!(registry.contains(SHORT_TOKEN));
        assert!(registry.contains(LONG_TOKEN));
        assert!(registry.contains(DEVICE));
    }

    #[test]
    fn test_token_stages_need_token_service() {
        assert!(standard_registry().instantiate(&SharedContext::new()).is_err());

        let ctx = SharedContext::new().with(Arc::new(TokenService::new(&TokenConfig::new("l", "s"))));
        let set = standard_registry().instantiate(&ctx).unwrap();
        assert!(set.get(SHORT_TOKEN).is_some());
    }
}
