//! # Hermes Bus
//!
//! The internal transport that runs parallel to HTTP. Messages carry
//! `{ targetUnit, targetOperation, data, meta }` plus a [`Reply`] callback
//! that fires exactly once per message.
//!
//! - [`Bus`] / [`BusHandle`] - bounded fan-out to every subscriber
//! - [`BusFront`] - subscribes to everything and hands each message to the
//!   target unit's interceptor
//!
//! ```
//! use std::sync::Arc;
//! use hermes_bus::{Bus, BusEnvelope, BusFront};
//! use hermes_router::{DispatchTable, Outcome, Unit};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let unit = Unit::builder("math")
//!     .expose("post=double")
//!     .operation("double", "{ n }", |input| async move {
//!         let n = input.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
//!         Ok(Outcome::Data(json!(n * 2)))
//!     })
//!     .intercept_operations()
//!     .build();
//! let catalog: &[&str] = &[];
//! let table = Arc::new(DispatchTable::build([Arc::new(unit)], catalog).unwrap());
//!
//! let bus = Bus::new(64);
//! let front = BusFront::spawn(bus.handle(), table);
//! let reply = bus
//!     .handle()
//!     .call(BusEnvelope::new("math", "double").with_data(json!({ "n": 21 })))
//!     .await
//!     .unwrap();
//! assert_eq!(reply, json!(42));
//! front.shutdown().await;
//! # });
//! ```
//!
//! [`Reply`]: hermes_core::Reply

#![doc(html_root_url = "https://docs.rs/hermes-bus/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bus;
mod error;
pub mod front;

pub use bus::{Bus, BusEnvelope, BusHandle, BusMessage, Subscription};
pub use error::{BusError, BusResult};
pub use front::BusFront;
