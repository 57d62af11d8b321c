//! # Hermes Middleware
//!
//! Middleware registry and the per-operation chain executor ("bolt").
//!
//! Operations name the middleware they need through `__`-prefixed
//! parameters. At startup the [`MiddlewareRegistry`] builds every middleware
//! once from the shared context; per request a [`Bolt`] runs the operation's
//! stack strictly in order:
//!
//! ```text
//! Pending → Running(0) → Running(1) → … → Completed(accumulator)
//!                 │             │
//!                 ├─ Respond ───┴──→ ShortCircuited (response written)
//!                 └─ Err ──────────→ Failed
//! ```
//!
//! Each stage returns a [`Flow`]: continue with a contribution (stored in
//! the [`Accumulator`] under the middleware's name) or respond and stop.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use hermes_core::{RequestParts, ResponseHandle, SharedContext};
//! use hermes_middleware::{Bolt, BoltOutcome, Flow, FnMiddleware, MiddlewareRegistry};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let mut registry = MiddlewareRegistry::new();
//! registry.register_instance(
//!     "__tenant",
//!     Arc::new(FnMiddleware::new("tenant", |_req, _acc| async { Ok(Flow::Continue(json!("acme"))) })),
//! );
//!
//! let set = registry.instantiate(&SharedContext::new()).unwrap();
//! let bolt = set.bolt(&["__tenant".to_string()]).unwrap();
//! match bolt.run(&RequestParts::default(), &ResponseHandle::new()).await {
//!     BoltOutcome::Completed(acc) => assert_eq!(acc.get("__tenant"), Some(&json!("acme"))),
//!     other => panic!("unexpected {other:?}"),
//! }
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bolt;
pub mod middleware;
pub mod registry;
pub mod stages;

pub use bolt::{Bolt, BoltOutcome, BoltState};
pub use middleware::{Accumulator, Flow, FnMiddleware, Middleware};
pub use registry::{MiddlewareFactory, MiddlewareRegistry, MiddlewareSet, RegistryError};
