//! Emulator configuration with validation.
//!
//! Read from a JSON file (`appsettings.json` by default). Every section is
//! optional; missing fields take their defaults.

use eg_01_push_delivery::RetryPolicy;
use eg_02_pull_delivery::{PullSettings, DEFAULT_MAX_WAIT_SECS};
use serde::{Deserialize, Serialize};
use shared_bus::DEFAULT_LOCK_DURATION_SECS;
use shared_types::TopicsConfig;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Default listener port.
pub const DEFAULT_PORT: u16 = 6500;

/// Longest accepted lock duration (one day).
pub const MAX_LOCK_DURATION_SECS: u64 = 86_400;

/// Longest accepted receive long-poll (one hour).
pub const MAX_WAIT_SECS_LIMIT: u64 = 3_600;

/// Main emulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
    /// HTTP listener
    pub server: ServerConfig,
    /// Pull delivery timing
    pub pull: PullConfig,
    /// Outbound push delivery
    pub delivery: DeliveryConfig,
    /// How often the config file is checked for changes (0 disables reload)
    pub reload_interval_ms: u64,
    /// Topic name to subscriber list
    pub topics: TopicsConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            pull: PullConfig::default(),
            delivery: DeliveryConfig::default(),
            reload_interval_ms: 2_000,
            topics: TopicsConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Parse a configuration document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        serde_json::from_slice(bytes).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_slice(&bytes)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if self.pull.lock_duration_secs == 0 {
            return Err(ConfigError::InvalidTimeout(
                "lockDurationSecs cannot be 0".into(),
            ));
        }
        if self.pull.lock_duration_secs > MAX_LOCK_DURATION_SECS {
            return Err(ConfigError::InvalidTimeout(format!(
                "lockDurationSecs cannot exceed {MAX_LOCK_DURATION_SECS}"
            )));
        }
        if self.pull.max_wait_secs > MAX_WAIT_SECS_LIMIT {
            return Err(ConfigError::InvalidTimeout(format!(
                "maxWaitSecs cannot exceed {MAX_WAIT_SECS_LIMIT}"
            )));
        }

        if self.delivery.max_attempts == 0 {
            return Err(ConfigError::InvalidLimit("maxAttempts cannot be 0".into()));
        }

        if self.delivery.attempt_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "attemptTimeoutMs cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Get HTTP listener address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    pub fn reload_interval(&self) -> Option<Duration> {
        (self.reload_interval_ms > 0).then(|| Duration::from_millis(self.reload_interval_ms))
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 6500)
    pub port: u16,
    /// Largest accepted request body
    pub max_body_bytes: usize,
    /// How long shutdown waits for push deliveries to stop
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: DEFAULT_PORT,
            max_body_bytes: 1024 * 1024,
            shutdown_grace_ms: 5_000,
        }
    }
}

impl ServerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Pull delivery timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PullConfig {
    /// How long a received event stays locked
    pub lock_duration_secs: u64,
    /// Internal cap on one receive
    pub max_wait_secs: u64,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            lock_duration_secs: DEFAULT_LOCK_DURATION_SECS,
            max_wait_secs: DEFAULT_MAX_WAIT_SECS,
        }
    }
}

impl PullConfig {
    pub fn settings(&self) -> PullSettings {
        PullSettings {
            lock_duration: Duration::from_secs(self.lock_duration_secs),
            max_wait: Duration::from_secs(self.max_wait_secs),
        }
    }
}

/// Outbound push delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeliveryConfig {
    pub max_attempts: u32,
    pub attempt_timeout_ms: u64,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            attempt_timeout_ms: policy.attempt_timeout.as_millis() as u64,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
        }
    }
}

impl DeliveryConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read configuration: {0}")]
    Io(String),
    /// Document is not valid configuration JSON
    #[error("cannot parse configuration: {0}")]
    Parse(String),
    /// Listener port is 0
    #[error("server port cannot be 0")]
    InvalidPort,
    /// Invalid count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}
