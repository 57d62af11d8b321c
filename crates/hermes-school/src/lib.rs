//! # Hermes School
//!
//! School management service on the Hermes dispatch runtime.
//!
//! | Unit        | Operations                                                       |
//! |-------------|------------------------------------------------------------------|
//! | `token`     | `v1_createShortToken`                                            |
//! | `user`      | `create`, `login`, `update`                                      |
//! | `school`    | `create`, `get`, `update`, `delete`, `list`, `assignSchoolAdmin` |
//! | `classroom` | `create`, `get`, `update`, `delete`, `list`                      |
//! | `student`   | `create`, `get`, `update`, `delete`, `list`                      |
//!
//! Every operation is reachable at `/api/{unit}/{operation}` with the verb it
//! declares, and over the bus as `{unit}.{operation}`.
//!
//! ## Roles
//!
//! - `superadmin` manages users and schools
//! - `school_admin` manages classrooms and students of its own school
//! - `student` reads
//!
//! ## Example
//!
//! ```rust,ignore
//! use hermes_config::ConfigLoader;
//! use hermes_school::App;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().with_env_prefix("HERMES").load()?;
//!     App::build(config).await?.run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-school/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod app;
mod error;
pub mod schemas;
pub mod store;
pub mod units;
pub mod validation;

pub use app::{default_store, App};
pub use error::AppError;
pub use store::{MemoryStore, Record, RecordStore, StoreError, StoreResult};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
