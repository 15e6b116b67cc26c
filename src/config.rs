//! Configuration module for Gatehouse.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::{GatehouseError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Credential storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Base directory all relative store paths are resolved against.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// User credential file.
    #[serde(default = "default_users_file")]
    pub users_file: String,
    /// Service account credential file.
    #[serde(default = "default_service_accounts_file")]
    pub service_accounts_file: String,
    /// Directory scanned for `*.serviceaccount.json` files at startup.
    #[serde(default = "default_provisioning_dir")]
    pub provisioning_dir: String,
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_users_file() -> String {
    "store/users.json".to_string()
}

fn default_service_accounts_file() -> String {
    "store/serviceaccounts.json".to_string()
}

fn default_provisioning_dir() -> String {
    "provisioning".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            users_file: default_users_file(),
            service_accounts_file: default_service_accounts_file(),
            provisioning_dir: default_provisioning_dir(),
        }
    }
}

impl StoreConfig {
    fn resolve(&self, path: &str) -> PathBuf {
        Path::new(&self.data_dir).join(path)
    }

    /// Full path of the user credential file.
    pub fn users_path(&self) -> PathBuf {
        self.resolve(&self.users_file)
    }

    /// Full path of the service account credential file.
    pub fn service_accounts_path(&self) -> PathBuf {
        self.resolve(&self.service_accounts_file)
    }

    /// Full path of the provisioning directory.
    pub fn provisioning_path(&self) -> PathBuf {
        self.resolve(&self.provisioning_dir)
    }
}

/// Browser session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Idle timeout in seconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_cookie_name() -> String {
    "gatehouse_session".to_string()
}

fn default_idle_timeout() -> u64 {
    3600 // 1 hour
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

/// Grants of a single user.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserPermissionsConfig {
    /// Groups the user belongs to.
    pub groups: Vec<String>,
    /// Permission nodes granted directly.
    pub permissions: Vec<String>,
}

/// Static permission configuration.
///
/// ```toml
/// [permissions.groups]
/// ANONYMOUS = ["web.login"]
/// ADMIN = ["*"]
///
/// [permissions.users."6f1c2d1e-8a5b-4a8e-9a57-1f5b0c3a2d10"]
/// groups = ["ADMIN"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Permission nodes per group.
    pub groups: HashMap<String, Vec<String>>,
    /// Grants per user id.
    pub users: HashMap<String, UserPermissionsConfig>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/gatehouse.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Credential storage configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,
    /// Static permissions.
    #[serde(default)]
    pub permissions: PermissionsConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(GatehouseError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| GatehouseError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `GATEHOUSE_BIND_HOST`: Override the listen address
    /// - `GATEHOUSE_BIND_PORT`: Override the listen port (ignored if not a number)
    /// - `GATEHOUSE_DATA_DIR`: Override the store base directory
    pub fn apply_env_overrides(&mut self) {
        if let Some(host) = non_empty_var("GATEHOUSE_BIND_HOST") {
            self.server.host = host;
        }
        if let Some(port) = non_empty_var("GATEHOUSE_BIND_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(dir) = non_empty_var("GATEHOUSE_DATA_DIR") {
            self.store.data_dir = dir;
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - the port is 0
    /// - the session cookie name is empty
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(GatehouseError::Config("server.port must not be 0".to_string()));
        }
        if self.session.cookie_name.trim().is_empty() {
            return Err(GatehouseError::Config(
                "session.cookie_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
