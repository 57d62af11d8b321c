//! Configuration sections.

use std::time::Duration;

use hermes_telemetry::{LogConfig, LogFormat, MetricsConfig};
use serde::{Deserialize, Serialize};

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Bind address.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Drain budget after shutdown, in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Per-request budget, in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Name reported by `/health`.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_ms: default_request_timeout(),
            service_name: default_service_name(),
        }
    }
}

impl ServerSection {
    /// Shutdown timeout as a duration.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Request timeout as a duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:5111".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_service_name() -> String {
    "hermes".to_string()
}

/// Internal bus settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Whether the bus front subscribes at startup.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Per-subscriber queue capacity.
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_bus_capacity(),
        }
    }
}

fn default_bus_capacity() -> usize {
    1024
}

/// Token secrets and lifetimes.
///
/// The secrets have no defaults; a process without them refuses to start.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Secret signing long tokens.
    #[serde(default)]
    pub long_token_secret: Option<String>,

    /// Secret signing short tokens.
    #[serde(default)]
    pub short_token_secret: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |s: &Option<String>| s.as_ref().map(|_| "<redacted>");
        f.debug_struct("AuthConfig")
            .field("long_token_secret", &redact(&self.long_token_secret))
            .field("short_token_secret", &redact(&self.short_token_secret))
            .finish()
    }
}

/// Superadmin seeded into an empty user store at startup.
///
/// All three fields must be set for a seed to happen.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct BootstrapConfig {
    /// Username of the seeded superadmin.
    #[serde(default)]
    pub superadmin_username: Option<String>,

    /// Email of the seeded superadmin.
    #[serde(default)]
    pub superadmin_email: Option<String>,

    /// Password of the seeded superadmin.
    #[serde(default)]
    pub superadmin_password: Option<String>,
}

impl BootstrapConfig {
    /// `(username, email, password)` when fully configured.
    #[must_use]
    pub fn superadmin(&self) -> Option<(&str, &str, &str)> {
        match (
            self.superadmin_username.as_deref(),
            self.superadmin_email.as_deref(),
            self.superadmin_password.as_deref(),
        ) {
            (Some(username), Some(email), Some(password)) => Some((username, email, password)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for BootstrapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapConfig")
            .field("superadmin_username", &self.superadmin_username)
            .field("superadmin_email", &self.superadmin_email)
            .field("superadmin_password", &self.superadmin_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Whether to install a subscriber.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directives.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` or `pretty`.
    #[serde(default)]
    pub format: LogFormat,

    /// ANSI colors for the pretty format.
    #[serde(default)]
    pub ansi_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::Json,
            ansi_enabled: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Whether the exporter runs.
    #[serde(default)]
    pub enabled: bool,

    /// Scrape address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

/// Logging and metrics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics.
    #[serde(default)]
    pub metrics: MetricsSection,
}

impl TelemetrySection {
    /// Telemetry settings for `service_name`.
    #[must_use]
    pub fn to_telemetry_config(&self, service_name: &str) -> hermes_telemetry::TelemetryConfig {
        hermes_telemetry::TelemetryConfig::default()
            .with_service_name(service_name)
            .with_logging(LogConfig {
                enabled: self.logging.enabled,
                level: self.logging.level.clone(),
                format: self.logging.format,
                ansi: self.logging.ansi_enabled,
                ..LogConfig::default()
            })
            .with_metrics(MetricsConfig {
                enabled: self.metrics.enabled,
                addr: self.metrics.addr.clone(),
                ..MetricsConfig::default()
            })
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_durations() {
        let server = ServerSection::default();
        assert_eq!(server.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(server.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_auth_debug_redacts_secrets() {
        let auth = AuthConfig {
            long_token_secret: Some("hunter2".to_string()),
            short_token_secret: None,
        };
        let debug = format!("{auth:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_telemetry_mapping() {
        let section = TelemetrySection {
            logging: LoggingConfig {
                format: LogFormat::Pretty,
                ..LoggingConfig::default()
            },
            metrics: MetricsSection {
                enabled: true,
                ..MetricsSection::default()
            },
        };
        let config = section.to_telemetry_config("school");
        assert_eq!(config.service_name, "school");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.metrics.enabled);
    }
}
