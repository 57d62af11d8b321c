//! Typed configuration for Hermes.
//!
//! Configuration is layered, later layers overriding earlier ones:
//!
//! 1. Defaults built into the types
//! 2. A TOML or JSON file
//! 3. Environment variables `HERMES__SECTION__KEY` (a `.env` file is read
//!    first when requested)
//!
//! Unknown keys in files are rejected. [`HermesConfig::validate`] runs last
//! and fails when a token secret is missing, so a misconfigured process never
//! starts serving.
//!
//! # Example
//!
//! ```no_run
//! use hermes_config::ConfigLoader;
//!
//! # fn main() -> Result<(), hermes_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()
//!     .with_optional_file("hermes.toml")?
//!     .with_env_prefix("HERMES")
//!     .load()?;
//!
//! println!("listening on {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # File format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:5111"
//! shutdown_timeout_secs = 30
//! request_timeout_ms = 30000
//!
//! [bus]
//! enabled = true
//! capacity = 1024
//!
//! [auth]
//! long_token_secret = "..."
//! short_token_secret = "..."
//!
//! [bootstrap]
//! superadmin_username = "root"
//! superadmin_email = "root@example.com"
//! superadmin_password = "..."
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::HermesConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{
    AuthConfig, BootstrapConfig, BusConfig, LoggingConfig, MetricsSection, ServerSection,
    TelemetrySection,
};

pub use hermes_telemetry::LogFormat;
