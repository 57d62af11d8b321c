//! Credentials for Hermes.
//!
//! - [`TokenService`] signs and verifies long tokens (one per user, long
//!   lived) and short tokens (one per device session).
//! - [`password`] hashes and verifies user passwords with Argon2id.
//! - [`Role`] is the closed set of roles a token may carry.

#![doc(html_root_url = "https://docs.rs/hermes-auth/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod password;
mod role;
pub mod token;

pub use error::{AuthError, AuthResult};
pub use role::Role;
pub use token::{LongTokenClaims, ShortTokenClaims, TokenConfig, TokenService};
