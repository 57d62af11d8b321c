//! Server errors.

use thiserror::Error;

/// Errors that stop the listener.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The bind address is invalid or taken.
    #[error("bind error: {0}")]
    Bind(String),

    /// I/O error while serving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
