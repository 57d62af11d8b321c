//! # Hermes Core
//!
//! Core types shared by every layer of the Hermes dispatch runtime.
//!
//! - [`OperationDescriptor`] / [`Verb`] - `"verb=name"` operation declarations
//! - [`DispatchError`] - error taxonomy with HTTP status mapping
//! - [`Envelope`], [`ResponseHandle`], [`ResponseDispatcher`] - the single
//!   terminal writer for HTTP requests
//! - [`Reply`] - the bus reply callback, fired exactly once
//! - [`RequestParts`] / [`RequestId`] - per-request input
//! - [`SharedContext`] - typed service registry handed to middleware factories

#![doc(html_root_url = "https://docs.rs/hermes-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
pub mod descriptor;
pub mod di;
mod error;
pub mod reply;
pub mod response;

use std::future::Future;
use std::pin::Pin;

pub use context::{RequestId, RequestParts};
pub use descriptor::{DescriptorError, OperationDescriptor, Verb};
pub use di::{InjectionError, SharedContext};
pub use error::{DispatchError, DispatchResult, ErrorCategory, FieldErrors};
pub use reply::{Reply, ReplyReceiver};
pub use response::{Envelope, ResponseDispatcher, ResponseHandle, WrittenResponse};

/// A boxed, sendable future. Used at every dynamic seam (middleware,
/// operations, interceptors).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// JSON object type used for request bodies, accumulators and merged input.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;
