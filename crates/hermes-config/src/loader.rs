//! Layered configuration loader.

use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, HermesConfig, LogFormat};

/// Builds a [`HermesConfig`] from defaults, a file and the environment.
///
/// Environment variables use `PREFIX__SECTION__KEY`, for example
/// `HERMES__SERVER__HTTP_ADDR=127.0.0.1:8080` or
/// `HERMES__TELEMETRY__LOGGING__LEVEL=debug`.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: HermesConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Starts from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a TOML or JSON file, chosen by extension. The file replaces the
    /// current values; keys it omits take their defaults.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        self.config = parse(&content, &format)?;
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Parses configuration text in `format` (`toml` or `json`).
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, &format.to_lowercase())?;
        Ok(self)
    }

    /// Enables `PREFIX__SECTION__KEY` overrides.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Reads `.env` into the process environment when present. Variables
    /// already set are kept.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        let _ = dotenvy::dotenv();
        self
    }

    /// Applies environment overrides and validates.
    pub fn load(self) -> Result<HermesConfig, ConfigError> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides without validating.
    pub fn load_unvalidated(mut self) -> Result<HermesConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            apply_overrides(&mut self.config, &prefix, env::vars())?;
        }
        Ok(self.config)
    }
}

fn parse(content: &str, format: &str) -> Result<HermesConfig, ConfigError> {
    match format {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

fn apply_overrides<I>(config: &mut HermesConfig, prefix: &str, vars: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let head = format!("{prefix}__");
    for (key, value) in vars {
        if let Some(path) = key.strip_prefix(&head) {
            let parts: Vec<&str> = path.split("__").collect();
            apply_var(config, &key, &parts, &value)?;
        }
    }
    Ok(())
}

fn apply_var(
    config: &mut HermesConfig,
    key: &str,
    parts: &[&str],
    value: &str,
) -> Result<(), ConfigError> {
    match parts {
        ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
        ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
            config.server.shutdown_timeout_secs = parse_int(key, value)?;
        }
        ["SERVER", "REQUEST_TIMEOUT_MS"] => {
            config.server.request_timeout_ms = parse_int(key, value)?;
        }
        ["SERVER", "SERVICE_NAME"] => config.server.service_name = value.to_string(),

        ["BUS", "ENABLED"] => config.bus.enabled = parse_bool(key, value)?,
        ["BUS", "CAPACITY"] => config.bus.capacity = parse_int(key, value)?,

        ["AUTH", "LONG_TOKEN_SECRET"] => config.auth.long_token_secret = Some(value.to_string()),
        ["AUTH", "SHORT_TOKEN_SECRET"] => config.auth.short_token_secret = Some(value.to_string()),

        ["BOOTSTRAP", "SUPERADMIN_USERNAME"] => {
            config.bootstrap.superadmin_username = Some(value.to_string());
        }
        ["BOOTSTRAP", "SUPERADMIN_EMAIL"] => config.bootstrap.superadmin_email = Some(value.to_string()),
        ["BOOTSTRAP", "SUPERADMIN_PASSWORD"] => {
            config.bootstrap.superadmin_password = Some(value.to_string());
        }

        ["TELEMETRY", "LOGGING", "ENABLED"] => {
            config.telemetry.logging.enabled = parse_bool(key, value)?;
        }
        ["TELEMETRY", "LOGGING", "LEVEL"] => config.telemetry.logging.level = value.to_string(),
        ["TELEMETRY", "LOGGING", "FORMAT"] => {
            config.telemetry.logging.format = match value.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                _ => return Err(ConfigError::env_parse_error(key, "expected 'json' or 'pretty'")),
            };
        }
        ["TELEMETRY", "LOGGING", "ANSI_ENABLED"] => {
            config.telemetry.logging.ansi_enabled = parse_bool(key, value)?;
        }
        ["TELEMETRY", "METRICS", "ENABLED"] => {
            config.telemetry.metrics.enabled = parse_bool(key, value)?;
        }
        ["TELEMETRY", "METRICS", "ADDR"] => config.telemetry.metrics.addr = value.to_string(),

        _ => return Err(ConfigError::env_parse_error(key, "unknown configuration key")),
    }
    Ok(())
}

fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_parse_error(key, "expected boolean")),
    }
}
