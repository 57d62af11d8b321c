//! Unit registry and dispatch table construction for Hermes.
//!
//! Units declare operations as `"verb=name"` strings and register one handler
//! per name together with a parameter manifest. At startup
//! [`DispatchTable::build`] reads every manifest through the signature
//! inspector, records which verbs reach which operations, and resolves each
//! `__`-prefixed parameter against the middleware catalog.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use hermes_core::Verb;
//! use hermes_router::{DispatchTable, Outcome, Unit};
//! use serde_json::json;
//!
//! let school = Unit::builder("school")
//!     .expose("get=get")
//!     .operation("get", "{ __shortToken, schoolId }", |_input| async {
//!         Ok(Outcome::Data(json!({})))
//!     })
//!     .build();
//!
//! let catalog: &[&str] = &["__shortToken"];
//! let table = DispatchTable::build([Arc::new(school)], catalog).unwrap();
//!
//! assert!(table.routing().allows("school", Verb::Get, "get"));
//! assert_eq!(table.requirements().get("school", "get"), ["__shortToken"]);
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod signature;
pub mod table;
pub mod unit;

pub use signature::{inspect, MissingCallableError, Signature};
pub use table::{
    DispatchTable, MiddlewareCatalog, MiddlewareRequirements, MiddlewareStack, Route,
    RoutingMatrix, TableError, MIDDLEWARE_MARKER,
};
pub use unit::{BusCall, InterceptorFn, Operation, OperationFn, OperationInput, Outcome, Unit, UnitBuilder};
