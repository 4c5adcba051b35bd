//! Configuration types for httpsink

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, SinkError};

/// Default listen port
pub const DEFAULT_PORT: u16 = 50111;

/// Default network interface
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default interval between TTL sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network interface to listen on
    pub host: String,
    /// Port to listen on (0 picks a free port)
    pub port: u16,
    /// Maximum live captures, 0 means unbounded
    pub capacity: usize,
    /// Maximum capture age before eviction, unset disables eviction
    #[serde(with = "humantime_serde")]
    pub ttl: Option<Duration>,
    /// How often the eviction sweep runs
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Downstream base URL every capture is mirrored to
    pub proxy: Option<String>,
    /// Client-level timeout for mirror sends
    #[serde(with = "humantime_serde")]
    pub mirror_timeout: Option<Duration>,
    /// Resource limits
    pub limits: LimitsConfig,
    /// Fixed response returned for accepted captures
    pub response: Option<CannedResponse>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            capacity: 0,
            ttl: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            proxy: None,
            mirror_timeout: None,
            limits: LimitsConfig::default(),
            response: None,
        }
    }
}

/// Resource limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: 16 * 1024 * 1024, // 16 MB
        }
    }
}

/// Canned response for accepted captures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CannedResponse {
    /// Status code
    #[serde(default = "default_status")]
    pub status: u16,
    /// Response headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Response body
    #[serde(default)]
    pub body: String,
}

fn default_status() -> u16 {
    200
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SinkError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| SinkError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Address the server binds to
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Effective TTL, treating a zero duration as disabled
    #[must_use]
    pub fn effective_ttl(&self) -> Option<Duration> {
        self.ttl.filter(|ttl| !ttl.is_zero())
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(SinkError::ConfigError("host cannot be empty".to_string()));
        }

        if self.sweep_interval.is_zero() {
            return Err(SinkError::ConfigError(
                "sweep_interval must be greater than zero".to_string(),
            ));
        }

        if self.limits.max_request_size == 0 {
            return Err(SinkError::ConfigError(
                "max_request_size must be > 0".to_string(),
            ));
        }

        if let Some(proxy) = &self.proxy {
            if !proxy.starts_with("http://") {
                return Err(SinkError::ConfigError(format!(
                    "proxy must be an http:// URL, got '{proxy}'"
                )));
            }
        }

        if let Some(response) = &self.response {
            if hyper::StatusCode::from_u16(response.status).is_err() {
                return Err(SinkError::ConfigError(format!(
                    "response.status {} is not a valid HTTP status",
                    response.status
                )));
            }
        }

        Ok(())
    }
}
