//! Long and short token management.
//!
//! A long token identifies a user and is issued at login or account
//! creation. A short token is minted from a long token for one device
//! session and is what the `__shortToken` middleware verifies on every call.
//! The two kinds are signed with separate secrets, so one can never be
//! replayed as the other.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Claims of a long token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongTokenClaims {
    /// User id.
    pub user_id: String,
    /// Stable per-user key.
    pub user_key: String,
    /// User role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// School the user belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    /// Issued at (Unix seconds).
    #[serde(default)]
    pub iat: i64,
    /// Expiration (Unix seconds).
    #[serde(default)]
    pub exp: i64,
}

impl LongTokenClaims {
    /// Claims for a user; timestamps are set at signing.
    #[must_use]
    pub fn new(user_id: impl Into<String>, user_key: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_key: user_key.into(),
            role: None,
            school_id: None,
            iat: 0,
            exp: 0,
        }
    }

    /// Sets the role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Sets the school.
    #[must_use]
    pub fn with_school(mut self, school_id: Option<String>) -> Self {
        self.school_id = school_id;
        self
    }
}

/// Claims of a short token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortTokenClaims {
    /// User id.
    pub user_id: String,
    /// Stable per-user key.
    pub user_key: String,
    /// User role, copied from the long token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// School the user belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    /// Session identifier.
    pub session_id: String,
    /// Hash of the device fingerprint.
    pub device_id: String,
    /// Issued at (Unix seconds).
    #[serde(default)]
    pub iat: i64,
    /// Expiration (Unix seconds).
    #[serde(default)]
    pub exp: i64,
}

/// Token secrets and lifetimes.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Secret for long tokens.
    pub long_secret: String,
    /// Secret for short tokens.
    pub short_secret: String,
    /// Long token lifetime.
    pub long_ttl: Duration,
    /// Short token lifetime.
    pub short_ttl: Duration,
}

impl TokenConfig {
    /// Secrets with the default lifetimes: one year and 72 hours.
    #[must_use]
    pub fn new(long_secret: impl Into<String>, short_secret: impl Into<String>) -> Self {
        Self {
            long_secret: long_secret.into(),
            short_secret: short_secret.into(),
            long_ttl: Duration::days(365),
            short_ttl: Duration::hours(72),
        }
    }
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signs and verifies long and short tokens.
pub struct TokenService {
    long: KeyPair,
    short: KeyPair,
    long_ttl: Duration,
    short_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("long_ttl", &self.long_ttl)
            .field("short_ttl", &self.short_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Creates a service from its configuration.
    #[must_use]
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            long: KeyPair::from_secret(&config.long_secret),
            short: KeyPair::from_secret(&config.short_secret),
            long_ttl: config.long_ttl,
            short_ttl: config.short_ttl,
        }
    }

    /// Signs a long token.
    pub fn gen_long_token(&self, mut claims: LongTokenClaims) -> AuthResult<String> {
        let now = Utc::now();
        claims.iat = now.timestamp();
        claims.exp = (now + self.long_ttl).timestamp();
        sign(&claims, &self.long)
    }

    /// Signs a short token for a device session derived from `long`.
    pub fn gen_short_token(
        &self,
        long: &LongTokenClaims,
        session_id: impl Into<String>,
        device_id: impl Into<String>,
    ) -> AuthResult<String> {
        let now = Utc::now();
        let claims = ShortTokenClaims {
            user_id: long.user_id.clone(),
            user_key: long.user_key.clone(),
            role: long.role.clone(),
            school_id: long.school_id.clone(),
            session_id: session_id.into(),
            device_id: device_id.into(),
            iat: now.timestamp(),
            exp: (now + self.short_ttl).timestamp(),
        };
        sign(&claims, &self.short)
    }

    /// Verifies a long token.
    pub fn verify_long_token(&self, token: &str) -> AuthResult<LongTokenClaims> {
        verify(token, &self.long)
    }

    /// Verifies a short token.
    pub fn verify_short_token(&self, token: &str) -> AuthResult<ShortTokenClaims> {
        verify(token, &self.short)
    }
}

fn sign<T: Serialize>(claims: &T, keys: &KeyPair) -> AuthResult<String> {
    encode(&Header::default(), claims, &keys.encoding).map_err(|e| {
        tracing::error!(error = %e, "token signing failed");
        AuthError::TokenGenerationFailed
    })
}

fn verify<T: DeserializeOwned>(token: &str, keys: &KeyPair) -> AuthResult<T> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<T>(token, &keys.decoding, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            _ => AuthError::MalformedToken,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(&TokenConfig::new("long-secret-for-tests", "short-secret-for-tests"))
    }

    fn long_claims() -> LongTokenClaims {
        LongTokenClaims::new("u-1", "key-1")
            .with_role("school_admin")
            .with_school(Some("s-1".to_string()))
    }

    #[test]
    fn test_long_token_round_trip() {
        let svc = service();
        let token = svc.gen_long_token(long_claims()).unwrap();
        let claims = svc.verify_long_token(&token).unwrap();
        assert_eq!(claims.user_id, "u-1");
        assert_eq!(claims.role.as_deref(), Some("school_admin"));
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_short_token_carries_role_and_device() {
        let svc = service();
        let token = svc.gen_short_token(&long_claims(), "sess-1", "dev-1").unwrap();
        let claims = svc.verify_short_token(&token).unwrap();
        assert_eq!(claims.session_id, "sess-1");
        assert_eq!(claims.device_id, "dev-1");
        assert_eq!(claims.school_id.as_deref(), Some("s-1"));
        assert_eq!(claims.exp - claims.iat, 72 * 3600);
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        let svc = service();
        let long = svc.gen_long_token(long_claims()).unwrap();
        assert_eq!(
            svc.verify_short_token(&long).unwrap_err(),
            AuthError::InvalidSignature
        );
    }

    #[test]
    fn test_expired_token() {
        let mut config = TokenConfig::new("l", "s");
        config.long_ttl = Duration::hours(-2);
        let svc = TokenService::new(&config);
        let token = svc.gen_long_token(long_claims()).unwrap();
        assert_eq!(svc.verify_long_token(&token).unwrap_err(), AuthError::TokenExpired);
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert_eq!(
            service().verify_short_token("not-a-token").unwrap_err(),
            AuthError::MalformedToken
        );
    }
}
