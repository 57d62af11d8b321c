//! Startup errors.

use hermes_config::ConfigError;
use hermes_core::DispatchError;
use hermes_middleware::RegistryError;
use hermes_router::TableError;
use hermes_server::ServerError;
use thiserror::Error;

/// Failures assembling or running the service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Middleware could not be built.
    #[error(transparent)]
    Middleware(#[from] RegistryError),

    /// A unit declaration is inconsistent.
    #[error("dispatch table error: {0}")]
    Table(#[from] TableError),

    /// Seeding the store failed.
    #[error("bootstrap failed: {0}")]
    Bootstrap(#[source] DispatchError),

    /// The HTTP server failed.
    #[error("server error: {0}")]
    Server(#[from] ServerError),
}
