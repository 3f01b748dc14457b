//! Application configuration module
//!
//! Configuration is layered: built-in defaults, then an optional TOML file
//! named by `PULSECHAT_CONFIG`, then environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the TOML config file
pub const CONFIG_PATH_VAR: &str = "PULSECHAT_CONFIG";

const DEFAULT_BIND: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_OFFLINE_GRACE_SECS: u64 = 30;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10;
const DEFAULT_STATUS_TTL_SECS: u64 = 3600;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Bind address
    pub bind_address: String,
    /// Port to listen on
    pub port: u16,
    /// Quiet period between the last session closing and the offline broadcast
    pub offline_grace_secs: u64,
    /// Interval of the deferred-offline sweep
    pub sweep_interval_secs: u64,
    /// TTL of cached presence entries
    pub status_ttl_secs: u64,
    /// Structured JSON log output
    pub json_logs: bool,
    /// PostgreSQL URL; in-memory store when absent
    pub database_url: Option<String>,
    /// Redis URL; in-memory coordination when absent
    pub redis_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            offline_grace_secs: DEFAULT_OFFLINE_GRACE_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            status_ttl_secs: DEFAULT_STATUS_TTL_SECS,
            json_logs: false,
            database_url: None,
            redis_url: None,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Load from the process environment: defaults < TOML file < env vars
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::load`] with an injectable variable lookup
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_VAR) {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| ConfigError::Io(format!("{}: {}", path, e)))?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("PULSECHAT_BIND") {
            self.bind_address = bind;
        }
        if let Some(port) = lookup("PULSECHAT_PORT") {
            self.port = parse_var("PULSECHAT_PORT", &port)?;
        }
        if let Some(grace) = lookup("PULSECHAT_OFFLINE_GRACE_SECS") {
            self.offline_grace_secs = parse_var("PULSECHAT_OFFLINE_GRACE_SECS", &grace)?;
        }
        if let Some(interval) = lookup("PULSECHAT_SWEEP_INTERVAL_SECS") {
            self.sweep_interval_secs = parse_var("PULSECHAT_SWEEP_INTERVAL_SECS", &interval)?;
        }
        if let Some(ttl) = lookup("PULSECHAT_STATUS_TTL_SECS") {
            self.status_ttl_secs = parse_var("PULSECHAT_STATUS_TTL_SECS", &ttl)?;
        }
        if let Some(json) = lookup("PULSECHAT_JSON_LOGS") {
            self.json_logs = parse_var("PULSECHAT_JSON_LOGS", &json)?;
        }
        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
            self.database_url = Some(url);
        }
        if let Some(url) = lookup("REDIS_URL").filter(|v| !v.is_empty()) {
            self.redis_url = Some(url);
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::MissingValue("bind_address"));
        }
        if self.offline_grace_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "offline_grace_secs",
                message: "grace period must be greater than zero".to_string(),
            });
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sweep_interval_secs",
                message: "sweep interval must be greater than zero".to_string(),
            });
        }
        if self.status_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "status_ttl_secs",
                message: "status TTL must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// `host:port` to bind the listener to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn offline_grace(&self) -> Duration {
        Duration::from_secs(self.offline_grace_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.status_ttl_secs)
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: name,
        message: format!("cannot parse `{}`", raw),
    })
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    bind_address: Option<String>,
    port: Option<u16>,
    offline_grace_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    status_ttl_secs: Option<u64>,
    json_logs: Option<bool>,
    database_url: Option<String>,
    redis_url: Option<String>,
}

impl AppConfigBuilder {
    pub fn bind_address(mut self, bind: impl Into<String>) -> Self {
        self.bind_address = Some(bind.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn offline_grace_secs(mut self, secs: u64) -> Self {
        self.offline_grace_secs = Some(secs);
        self
    }

    pub fn sweep_interval_secs(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = Some(secs);
        self
    }

    pub fn status_ttl_secs(mut self, secs: u64) -> Self {
        self.status_ttl_secs = Some(secs);
        self
    }

    pub fn json_logs(mut self, enabled: bool) -> Self {
        self.json_logs = Some(enabled);
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    /// Build the configuration, filling unset fields with defaults
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let defaults = AppConfig::default();
        let config = AppConfig {
            bind_address: self.bind_address.unwrap_or(defaults.bind_address),
            port: self.port.unwrap_or(defaults.port),
            offline_grace_secs: self.offline_grace_secs.unwrap_or(defaults.offline_grace_secs),
            sweep_interval_secs: self.sweep_interval_secs.unwrap_or(defaults.sweep_interval_secs),
            status_ttl_secs: self.status_ttl_secs.unwrap_or(defaults.status_ttl_secs),
            json_logs: self.json_logs.unwrap_or(defaults.json_logs),
            database_url: self.database_url,
            redis_url: self.redis_url,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("cannot read config file {0}")]
    Io(String),
    #[error("invalid config file: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::load_with(env(&[])).unwrap();
        assert_eq!(config.listen_addr(), "0.0.0.0:3000");
        assert_eq!(config.offline_grace(), Duration::from_secs(30));
        assert_eq!(config.sweep_interval(), Duration::from_secs(10));
        assert_eq!(config.status_ttl(), Duration::from_secs(3600));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::load_with(env(&[
            ("PULSECHAT_PORT", "8080"),
            ("PULSECHAT_OFFLINE_GRACE_SECS", "5"),
            ("PULSECHAT_JSON_LOGS", "true"),
            ("REDIS_URL", "redis://127.0.0.1/"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.offline_grace_secs, 5);
        assert!(config.json_logs);
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1/"));
    }

    #[test]
    fn test_bad_env_value() {
        let err = AppConfig::load_with(env(&[("PULSECHAT_PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "PULSECHAT_PORT", .. }));
    }

    #[test]
    fn test_toml_keeps_defaults_for_missing_keys() {
        let config = AppConfig::from_toml_str("port = 4000\nsweep_interval_secs = 2\n").unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.sweep_interval_secs, 2);
        assert_eq!(config.offline_grace_secs, DEFAULT_OFFLINE_GRACE_SECS);
    }

    #[test]
    fn test_builder_validates() {
        let err = AppConfig::builder().offline_grace_secs(0).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "offline_grace_secs", .. }));

        let config = AppConfig::builder().port(0).sweep_interval_secs(1).build().unwrap();
        assert_eq!(config.port, 0);
    }
}
