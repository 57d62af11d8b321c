//! # Hermes Server
//!
//! HTTP transport for the Hermes dispatch runtime.
//!
//! - [`HttpFront`] - resolves `/api/{unit}/{operation}` against the dispatch
//!   table, runs the operation's middleware bolt and invokes the operation
//! - [`Server`] - hyper HTTP/1.1 listener with per-request timeout, health
//!   endpoints and graceful shutdown
//!
//! ## Example
//!
//! ```rust,ignore
//! use hermes_server::{HttpFront, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let front = HttpFront::new(table, middleware);
//!     Server::builder()
//!         .http_addr("0.0.0.0:5111")
//!         .front(front)
//!         .build()
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod front;
pub mod health;
pub mod server;
pub mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::ServerError;
pub use front::{parse_body, split_api_path, HttpFront, HttpResponse, API_PREFIX};
pub use health::{HealthCheck, HealthStatus, ReadinessCheck, ReadinessStatus};
pub use server::{Server, ServerBuilder};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
