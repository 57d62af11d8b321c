//! Combined telemetry configuration.

use crate::logging::LogConfig;
use crate::metrics::MetricsConfig;

/// Configuration for logging and metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// Service name, logged at startup.
    pub service_name: String,
    /// Logging.
    pub logging: LogConfig,
    /// Metrics.
    pub metrics: MetricsConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "hermes".to_string(),
            logging: LogConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl TelemetryConfig {
    /// Sets the service name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Sets the logging configuration.
    #[must_use]
    pub fn with_logging(mut self, logging: LogConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Sets the metrics configuration.
    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsConfig) -> Self {
        self.metrics = metrics;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_style_setters() {
        let config = TelemetryConfig::default()
            .with_service_name("school")
            .with_logging(LogConfig::development());
        assert_eq!(config.service_name, "school");
        assert_eq!(config.logging.level, "debug");
        assert!(!config.metrics.enabled);
    }
}
