//! Configuration loading for signal-hub.
//!
//! Configuration is loaded from a TOML file (default: `signal-hub.toml`).
//! Every section and field is optional.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for signal-hub.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Listener and WebSocket configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Registry behavior.
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Abuse limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// HTTP endpoints configuration.
    #[serde(default)]
    pub http: HttpConfig,
    /// Maintenance task configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Listener and WebSocket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (default: 0.0.0.0:7860).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Path of the WebSocket endpoint (default: /ws).
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
    /// Largest accepted WebSocket message in bytes (default: 4MB).
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Frames queued per connection before senders wait (default: 64).
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

/// What cleanup removes when a registered connection closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupPolicy {
    /// Remove whatever entry is stored under the closing client's id,
    /// even one a newer connection has since claimed.
    #[default]
    ByKey,
    /// Remove the entry only while it still points at the closing connection.
    OwnerOnly,
}

/// Registry behavior.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
    /// Cleanup policy on disconnect (default: by-key).
    #[serde(default)]
    pub cleanup_policy: CleanupPolicy,
}

/// Abuse limits. A value of 0 disables the corresponding limit.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum simultaneously open connections (default: 10000).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Upgrades allowed per peer IP per minute (default: 0, unlimited).
    #[serde(default)]
    pub connections_per_ip_per_minute: u32,
    /// Frames allowed per connection per minute (default: 0, unlimited).
    #[serde(default)]
    pub messages_per_minute: u32,
    /// Seconds a connection may stay unregistered (default: 0, no timeout).
    #[serde(default)]
    pub registration_timeout_secs: u64,
}

/// HTTP endpoints configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Enable metrics endpoint (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

/// Maintenance task configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Interval in seconds (default: 300).
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
    /// Enable maintenance task (default: true).
    #[serde(default = "default_cleanup_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:7860".to_string()
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_max_message_size() -> usize {
    4 * 1024 * 1024 // 4MB
}

fn default_outbound_buffer() -> usize {
    64
}

fn default_max_connections() -> usize {
    10_000
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_cleanup_interval() -> u64 {
    300 // 5 minutes
}

fn default_cleanup_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            ws_path: default_ws_path(),
            max_message_size: default_max_message_size(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            connections_per_ip_per_minute: 0,
            messages_per_minute: 0,
            registration_timeout_secs: 0,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
            enabled: default_cleanup_enabled(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the hub cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.server.ws_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "server.ws_path",
                reason: format!("must start with '/', got {:?}", self.server.ws_path),
            });
        }
        if self.server.outbound_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "server.outbound_buffer",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cleanup.enabled && self.cleanup.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "cleanup.interval_secs",
                reason: "must be > 0 when cleanup is enabled".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
