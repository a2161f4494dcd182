//! Configuration module for canary-watch.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `CANARY_` and use double
//! underscores to separate nested levels:
//! - `CANARY_ALERT__TOKEN_URL=https://...` sets `alert.token_url`
//! - `CANARY_WATCH__LINGER_MS=250` sets `watch.linger_ms`
//! - `CANARY_WATCH__RECURSIVE=true` sets `watch.recursive`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::alert::{BackoffSchedule, DEFAULT_BACKOFF_MS, DEFAULT_SUCCESS_STATUS};
use crate::watcher::DEFAULT_QUIET_PERIOD;

/// Directory holding the settings file, searched for from the current directory up.
pub const CONFIG_DIR: &str = ".canary-watch";
/// Settings file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "settings.toml";
/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "CANARY_";

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Path {path} does not exist")]
    PathNotFound { path: PathBuf },

    #[error("Token url '{url}' is invalid: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("Backoff schedule must contain at least one entry")]
    EmptyBackoffSchedule,

    #[error("Success status {status} is not a valid HTTP status")]
    InvalidStatus { status: u16 },

    #[error("Request timeout must be greater than zero")]
    InvalidTimeout,

    #[error("Configuration file already exists at {path}. Use --force to overwrite")]
    AlreadyExists { path: PathBuf },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// What to watch and how long to linger
    #[serde(default)]
    pub watch: WatchConfig,

    /// Where and how to deliver alerts
    #[serde(default)]
    pub alert: AlertConfig,

    /// Log filtering
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WatchConfig {
    /// File or directory to monitor for changes
    #[serde(default = "default_watch_path")]
    pub path: PathBuf,

    /// Also watch subdirectories
    #[serde(default)]
    pub recursive: bool,

    /// Time to wait for new events before pinging the token url
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AlertConfig {
    /// Canary token url pinged on events
    #[serde(default)]
    pub token_url: String,

    /// Wait before each attempt, in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: Vec<u64>,

    /// Status code that counts as a successful ping
    #[serde(default = "default_success_status")]
    pub success_status: u16,

    /// Upper bound for a single request
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for all modules
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_watch_path() -> PathBuf {
    PathBuf::from("/tmp")
}
fn default_linger_ms() -> u64 {
    DEFAULT_QUIET_PERIOD.as_millis() as u64
}
fn default_backoff_ms() -> Vec<u64> {
    DEFAULT_BACKOFF_MS.to_vec()
}
fn default_success_status() -> u16 {
    DEFAULT_SUCCESS_STATUS
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            watch: WatchConfig::default(),
            alert: AlertConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            path: default_watch_path(),
            recursive: false,
            linger_ms: default_linger_ms(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            token_url: String::new(),
            backoff_ms: default_backoff_ms(),
            success_status: default_success_status(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: BTreeMap::new(),
        }
    }
}

/// Validated settings for one watch session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub path: PathBuf,
    pub recursive: bool,
    /// Target of the HEAD requests
    pub endpoint: Url,
    /// Debounce window per path
    pub quiet_period: Duration,
    pub schedule: BackoffSchedule,
    pub success_status: u16,
    /// Bound on each individual request
    pub request_timeout: Duration,
}

impl SessionConfig {
    /// Session with default timing for the given path and endpoint.
    pub fn new(path: impl Into<PathBuf>, endpoint: Url) -> Self {
        Self {
            path: path.into(),
            recursive: false,
            endpoint,
            quiet_period: DEFAULT_QUIET_PERIOD,
            schedule: BackoffSchedule::default(),
            success_status: DEFAULT_SUCCESS_STATUS,
            request_timeout: Duration::from_millis(default_request_timeout_ms()),
        }
    }
}

/// Parse and check a canary token url.
pub fn parse_token_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    Ok(url)
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));

        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels, single underscore
            // stays part of the field name
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Find the settings file by looking for the config directory
    /// from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join(CONFIG_FILE))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, ConfigError> {
        let config_path = PathBuf::from(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err(ConfigError::AlreadyExists { path: config_path });
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }

    /// Check that the settings describe a runnable session
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session_config().map(|_| ())
    }

    /// Convert into the runtime session form, validating along the way
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        if !self.watch.path.exists() {
            return Err(ConfigError::PathNotFound {
                path: self.watch.path.clone(),
            });
        }

        let endpoint = parse_token_url(&self.alert.token_url)?;

        if self.alert.backoff_ms.is_empty() {
            return Err(ConfigError::EmptyBackoffSchedule);
        }
        if !(100..=599).contains(&self.alert.success_status) {
            return Err(ConfigError::InvalidStatus {
                status: self.alert.success_status,
            });
        }
        if self.alert.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        Ok(SessionConfig {
            path: self.watch.path.clone(),
            recursive: self.watch.recursive,
            endpoint,
            quiet_period: Duration::from_millis(self.watch.linger_ms),
            schedule: BackoffSchedule::from_millis(&self.alert.backoff_ms),
            success_status: self.alert.success_status,
            request_timeout: Duration::from_millis(self.alert.request_timeout_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use tempfile::TempDir;

    fn runnable(dir: &TempDir) -> Settings {
        let mut settings = Settings::default();
        settings.watch.path = dir.path().to_path_buf();
        settings.alert.token_url = "https://canarytokens.example/abc".to_string();
        settings
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.watch.path, PathBuf::from("/tmp"));
        assert_eq!(settings.watch.linger_ms, 1000);
        assert_eq!(settings.alert.backoff_ms, vec![0, 250, 500, 1000, 2000, 4000]);
        assert_eq!(settings.alert.success_status, 200);
        assert!(settings.alert.token_url.is_empty());
    }

    #[test]
    fn test_load_from_toml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "settings.toml",
                r#"
version = 2

[watch]
path = "/var/bait"
linger_ms = 250

[alert]
token_url = "http://canary.test/t"
backoff_ms = [0, 100]
"#,
            )?;

            let settings = Settings::load_from("settings.toml").map_err(|e| e.to_string())?;
            assert_eq!(settings.version, 2);
            assert_eq!(settings.watch.path, PathBuf::from("/var/bait"));
            assert_eq!(settings.watch.linger_ms, 250);
            assert_eq!(settings.alert.backoff_ms, vec![0, 100]);
            // Untouched values keep their defaults
            assert!(!settings.watch.recursive);
            assert_eq!(settings.alert.request_timeout_ms, 10_000);
            assert_eq!(settings.logging.default, "info");
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            std::fs::create_dir(CONFIG_DIR).map_err(|e| e.to_string())?;
            jail.create_file(
                format!("{CONFIG_DIR}/{CONFIG_FILE}"),
                r#"
[watch]
linger_ms = 250

[alert]
token_url = "http://from-file.test/t"
"#,
            )?;
            jail.set_env("CANARY_WATCH__LINGER_MS", "750");
            jail.set_env("CANARY_ALERT__SUCCESS_STATUS", "204");

            let settings = Settings::load().map_err(|e| e.to_string())?;
            assert_eq!(settings.watch.linger_ms, 750);
            assert_eq!(settings.alert.success_status, 204);
            assert_eq!(settings.alert.token_url, "http://from-file.test/t");
            Ok(())
        });
    }

    #[test]
    fn test_save_and_reload() {
        Jail::expect_with(|jail| {
            let path = jail.directory().join("nested").join(CONFIG_FILE);

            let mut settings = Settings::default();
            settings.watch.recursive = true;
            settings.alert.backoff_ms = vec![0, 10, 20];
            settings
                .logging
                .modules
                .insert("reqwest".to_string(), "warn".to_string());
            settings.save(&path).map_err(|e| e.to_string())?;

            let loaded = Settings::load_from(&path).map_err(|e| e.to_string())?;
            assert_eq!(loaded, settings);
            Ok(())
        });
    }

    #[test]
    fn test_init_refuses_overwrite() {
        Jail::expect_with(|_jail| {
            let path = Settings::init_config_file(false).map_err(|e| e.to_string())?;
            assert!(path.exists());

            let err = Settings::init_config_file(false).unwrap_err();
            assert!(matches!(err, ConfigError::AlreadyExists { .. }));

            Settings::init_config_file(true).map_err(|e| e.to_string())?;
            Ok(())
        });
    }

    #[test]
    fn test_session_config_conversion() {
        let dir = TempDir::new().unwrap();
        let mut settings = runnable(&dir);
        settings.watch.linger_ms = 0;
        settings.alert.backoff_ms = vec![0, 250, 500];

        let session = settings.session_config().unwrap();
        assert_eq!(session.path, dir.path());
        assert_eq!(session.quiet_period, Duration::ZERO);
        assert_eq!(session.schedule, BackoffSchedule::from_millis(&[0, 250, 500]));
        assert_eq!(session.endpoint.as_str(), "https://canarytokens.example/abc");
        assert_eq!(session.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_validate_rejects_missing_path() {
        let dir = TempDir::new().unwrap();
        let mut settings = runnable(&dir);
        settings.watch.path = dir.path().join("gone");

        assert!(matches!(
            settings.validate(),
            Err(ConfigError::PathNotFound { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_alert_settings() {
        let dir = TempDir::new().unwrap();

        let mut settings = runnable(&dir);
        settings.alert.token_url = String::new();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidEndpoint { .. })
        ));

        let mut settings = runnable(&dir);
        settings.alert.backoff_ms.clear();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::EmptyBackoffSchedule)
        ));

        let mut settings = runnable(&dir);
        settings.alert.success_status = 42;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidStatus { status: 42 })
        ));

        let mut settings = runnable(&dir);
        settings.alert.request_timeout_ms = 0;
        assert!(matches!(settings.validate(), Err(ConfigError::InvalidTimeout)));
    }

    #[test]
    fn test_parse_token_url() {
        assert!(parse_token_url("https://canarytokens.com/abc/index.html").is_ok());
        assert!(parse_token_url("not a url").is_err());
        assert!(parse_token_url("ftp://canary.test/x").is_err());
        assert!(parse_token_url("/relative/only").is_err());
    }
}
