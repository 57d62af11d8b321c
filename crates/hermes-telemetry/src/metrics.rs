//! Prometheus metrics.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `hermes_requests_total` | Counter | `unit`, `operation`, `status` |
//! | `hermes_request_duration_seconds` | Histogram | `unit` |
//! | `hermes_bus_messages_total` | Counter | `unit`, `operation`, `outcome` |
//! | `hermes_middleware_short_circuits_total` | Counter | `stage` |
//!
//! The counters are recorded by the crates that own them; this module only
//! installs the exporter and describes them.

use std::net::SocketAddr;

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Request duration histogram name.
pub const REQUEST_DURATION: &str = "hermes_request_duration_seconds";

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Whether the exporter runs.
    pub enabled: bool,
    /// Scrape address.
    pub addr: String,
    /// Request duration buckets, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime when enabled.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    describe_metrics();
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(())
}

/// Registers descriptions for the standard metrics.
pub fn describe_metrics() {
    describe_counter!(
        "hermes_requests_total",
        Unit::Count,
        "HTTP calls answered, by unit, operation and status"
    );
    describe_histogram!(
        REQUEST_DURATION,
        Unit::Seconds,
        "HTTP call latency from routing to response"
    );
    describe_counter!(
        "hermes_bus_messages_total",
        Unit::Count,
        "Bus messages handled, by unit, operation and outcome"
    );
    describe_counter!(
        "hermes_middleware_short_circuits_total",
        Unit::Count,
        "Requests answered by a middleware stage"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_by_default() {
        let config = MetricsConfig::default();
        assert!(!config.enabled);
        assert!(init_metrics(&config).is_ok());
    }

    #[test]
    fn test_invalid_address() {
        let config = MetricsConfig {
            enabled: true,
            addr: "not-an-address".to_string(),
            ..MetricsConfig::default()
        };
        assert!(matches!(
            init_metrics(&config),
            Err(TelemetryError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_describe_without_recorder() {
        describe_metrics();
    }
}
