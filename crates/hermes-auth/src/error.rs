//! Authentication errors.

use thiserror::Error;

/// Result alias for credential operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Failures from token and password primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Token `exp` is in the past.
    #[error("token expired")]
    TokenExpired,
    /// Signature does not match the secret.
    #[error("invalid token signature")]
    InvalidSignature,
    /// Token could not be decoded.
    #[error("malformed token")]
    MalformedToken,
    /// Signing failed.
    #[error("failed to generate token")]
    TokenGenerationFailed,
    /// Password hashing failed.
    #[error("failed to hash password")]
    HashingFailed,
    /// Stored hash could not be parsed.
    #[error("invalid credentials")]
    InvalidCredentials,
}
