//! # Hermes
//!
//! **Declarative dispatch runtime for JSON services**
//!
//! Hermes turns a set of units into an API:
//!
//! - **Units** declare operations with a parameter manifest and the verbs
//!   they answer to
//! - **Middleware markers** (`__shortToken`, `__device`, ...) in a manifest
//!   become an ordered per-request chain, the bolt
//! - **One response per request**, written once through the dispatcher
//! - **Two fronts** over the same table: HTTP at `/api/{unit}/{operation}`
//!   and an in-process bus with request/reply
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hermes::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let unit = Unit::builder("greeter")
//!         .expose("post=hello")
//!         .operation("hello", "{ name }", |input| async move {
//!             let name = input.require_str("name")?.to_string();
//!             Ok(Outcome::Data(json!({ "greeting": format!("hello {name}") })))
//!         })
//!         .intercept_operations()
//!         .build();
//!
//!     let registry = MiddlewareRegistry::new();
//!     let table = DispatchTable::build([std::sync::Arc::new(unit)], &registry)?;
//!     let middleware = registry.instantiate(&SharedContext::new())?;
//!
//!     Server::builder()
//!         .http_addr("0.0.0.0:5111")
//!         .front(HttpFront::new(std::sync::Arc::new(table), middleware))
//!         .build()
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Request flow
//!
//! ```text
//! HTTP  → route (unit, verb, op) → bolt(stages…) → operation → dispatcher → response
//! Bus   → unit interceptor ───────────────────────→ operation → reply
//! ```

#![doc(html_root_url = "https://docs.rs/hermes/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use hermes_core as core;

// Re-export routing types
pub use hermes_router as router;

// Re-export middleware types
pub use hermes_middleware as middleware;

// Re-export token and password types
pub use hermes_auth as auth;

// Re-export bus types
pub use hermes_bus as bus;

// Re-export server types
pub use hermes_server as server;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use hermes::prelude::*;
///
/// let err = DispatchError::not_found("School not found");
/// assert_eq!(err.status_code().as_u16(), 404);
/// ```
pub mod prelude {
    pub use hermes_core::{
        DispatchError, DispatchResult, Envelope, ErrorCategory, JsonMap, RequestParts,
        ResponseDispatcher, ResponseHandle, SharedContext, Verb,
    };

    pub use hermes_router::{DispatchTable, OperationInput, Outcome, Unit};

    pub use hermes_middleware::{
        Accumulator, Flow, FnMiddleware, Middleware, MiddlewareRegistry, MiddlewareSet,
    };

    pub use hermes_auth::{Role, TokenConfig, TokenService};

    pub use hermes_bus::{Bus, BusEnvelope, BusFront, BusHandle};

    pub use hermes_server::{HttpFront, Server, ShutdownSignal};
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_prelude_assembles_a_table() {
        let unit = Unit::builder("greeter")
            .expose("post=hello")
            .operation("hello", "{ name }", |input| async move {
                let name = input.require_str("name")?.to_string();
                Ok(Outcome::Data(json!({ "greeting": format!("hello {name}") })))
            })
            .intercept_operations()
            .build();

        let registry = MiddlewareRegistry::new();
        let table = DispatchTable::build([Arc::new(unit)], &registry).unwrap();
        assert_eq!(table.len(), 1);

        let bus = Bus::new(8);
        let front = BusFront::spawn(bus.handle(), Arc::new(table));
        let reply = bus
            .handle()
            .call(BusEnvelope::new("greeter", "hello").with_data(json!({ "name": "ada" })))
            .await
            .unwrap();
        assert_eq!(reply, json!({ "greeting": "hello ada" }));
        front.shutdown().await;
    }
}
