//! Root configuration type.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::schema::{AuthConfig, BootstrapConfig, BusConfig, ServerSection, TelemetrySection};

/// Complete Hermes configuration.
///
/// ```
/// use hermes_config::HermesConfig;
///
/// let config = HermesConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:5111");
/// assert!(config.validate().is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct HermesConfig {
    /// HTTP listener.
    #[serde(default)]
    pub server: ServerSection,

    /// Internal bus.
    #[serde(default)]
    pub bus: BusConfig,

    /// Token secrets.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging and metrics.
    #[serde(default)]
    pub telemetry: TelemetrySection,

    /// Startup seed data.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl HermesConfig {
    /// Checks everything a process needs before it may serve.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;

        for (field, value) in [
            ("auth.long_token_secret", &self.auth.long_token_secret),
            ("auth.short_token_secret", &self.auth.short_token_secret),
        ] {
            if value.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::missing_field(field));
            }
        }

        if self.bus.capacity == 0 {
            return Err(ConfigError::invalid_value("bus.capacity", "must be at least 1"));
        }

        if self.telemetry.metrics.enabled
            && self.telemetry.metrics.addr.parse::<SocketAddr>().is_err()
        {
            return Err(ConfigError::invalid_value(
                "telemetry.metrics.addr",
                format!("invalid socket address: {}", self.telemetry.metrics.addr),
            ));
        }

        Ok(())
    }

    /// The parsed bind address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.http_addr.parse().map_err(|_| {
            ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            )
        })
    }

    /// Long-token secret. Empty until validated.
    #[must_use]
    pub fn long_token_secret(&self) -> &str {
        self.auth.long_token_secret.as_deref().unwrap_or_default()
    }

    /// Short-token secret. Empty until validated.
    #[must_use]
    pub fn short_token_secret(&self) -> &str {
        self.auth.short_token_secret.as_deref().unwrap_or_default()
    }
}
