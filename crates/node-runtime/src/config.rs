//! Configuration loading: file location, parsing and environment overrides.

use anyhow::{Context, Result};
use eg_03_api_gateway::GatewayConfig;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File read when neither the command line nor the environment names one.
pub const DEFAULT_CONFIG_FILE: &str = "appsettings.json";

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "EG_CONFIG";

/// Environment variable overriding `server.host`.
pub const HOST_ENV: &str = "EG_HOST";

/// Environment variable overriding `server.port`.
pub const PORT_ENV: &str = "EG_PORT";

/// Pick the configuration file: first CLI argument, then `EG_CONFIG`, then
/// `appsettings.json`.
pub fn config_path(
    mut args: impl Iterator<Item = String>,
    lookup: impl Fn(&str) -> Option<String>,
) -> PathBuf {
    args.next()
        .or_else(|| lookup(CONFIG_PATH_ENV))
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
}

/// Load the configuration at `path`, then apply environment overrides.
///
/// A missing file is not an error: the emulator starts with defaults and no
/// topics. A file that exists but does not parse is.
pub fn load_config(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<GatewayConfig> {
    let mut config = if path.exists() {
        let config = GatewayConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?;
        info!(
            path = %path.display(),
            topics = config.topics.topic_count(),
            "Loaded configuration"
        );
        config
    } else {
        warn!(path = %path.display(), "Configuration file not found, using defaults");
        GatewayConfig::default()
    };

    apply_env_overrides(&mut config, lookup);
    Ok(config)
}

/// Override listener settings from the environment. Unparseable values are
/// logged and ignored.
pub fn apply_env_overrides(config: &mut GatewayConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(host) = lookup(HOST_ENV) {
        match host.parse() {
            Ok(h) => config.server.host = h,
            Err(_) => warn!(value = %host, "{HOST_ENV} is not an IP address"),
        }
    }
    if let Some(port) = lookup(PORT_ENV) {
        match port.parse() {
            Ok(p) => config.server.port = p,
            Err(_) => warn!(value = %port, "{PORT_ENV} is not a port number"),
        }
    }
}
