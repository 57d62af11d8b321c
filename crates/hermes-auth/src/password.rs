//! Password hashing and opaque identifiers.
//!
//! Passwords are stored as Argon2id PHC strings only.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{AuthError, AuthResult};

/// Length of generated user keys.
pub const USER_KEY_LEN: usize = 21;

/// Hashes a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::HashingFailed)
}

/// Checks a password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> AuthResult<bool> {
    let parsed = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Random URL-safe key identifying a user across tokens.
#[must_use]
pub fn generate_user_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(USER_KEY_LEN)
        .map(char::from)
        .collect()
}

/// Stable device id: hex SHA-256 of the device fingerprint.
#[must_use]
pub fn device_id(fingerprint: &str) -> String {
    let digest = Sha256::digest(fingerprint.as_bytes());
    format!("{digest:x}")
}
