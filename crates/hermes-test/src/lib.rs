//! # Hermes Test
//!
//! Drives an [`HttpFront`](hermes_server::HttpFront) in memory. Requests go
//! through routing, the middleware bolt and the operation exactly as they
//! would behind the listener, without binding a port.
//!
//! ## Example
//!
//! ```ignore
//! use hermes_test::TestClient;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_requires_token() {
//!     let client = TestClient::new(front);
//!
//!     let response = client
//!         .post("/api/school/create")
//!         .json(&json!({ "name": "North High" }))
//!         .send()
//!         .await;
//!
//!     response.assert_status(401);
//!     assert_eq!(response.message(), "Unauthorized");
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use response::TestResponse;
