//! Configuration module for gator.
//!
//! The configuration lives in a single TOML file. Besides static settings it
//! also records the currently logged-in user, so `register` and `login` write
//! it back with [`Config::save`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{GatorError, Result};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "GATOR_CONFIG";

/// Environment variable overriding the database path.
pub const DATABASE_PATH_ENV: &str = "GATOR_DATABASE_PATH";

/// Default config file name, placed in the home directory.
const DEFAULT_CONFIG_FILE: &str = ".gatorconfig.toml";

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "gator.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Session state persisted between invocations.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Name of the logged-in user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user_name: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file. Logs always go to stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Feed aggregation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregatorConfig {
    /// User agent sent with every feed request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Deadline for one whole fetch (request, body and parse).
    #[serde(default = "default_fetch_deadline")]
    pub fetch_deadline_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
}

fn default_user_agent() -> String {
    "gator".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    20
}

fn default_total_timeout() -> u64 {
    30
}

fn default_fetch_deadline() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: default_total_timeout(),
            fetch_deadline_secs: default_fetch_deadline(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
        }
    }
}

impl AggregatorConfig {
    /// Reject settings that would make every fetch fail.
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("read_timeout_secs", self.read_timeout_secs),
            ("total_timeout_secs", self.total_timeout_secs),
            ("fetch_deadline_secs", self.fetch_deadline_secs),
        ];
        for (name, secs) in durations {
            if secs == 0 {
                return Err(GatorError::Config(format!(
                    "aggregator.{name} must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logged-in user.
    #[serde(default)]
    pub session: SessionConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Aggregator configuration.
    #[serde(default)]
    pub aggregator: AggregatorConfig,
}

impl Config {
    /// Resolve the config file path.
    ///
    /// `GATOR_CONFIG` wins; otherwise `$HOME/.gatorconfig.toml`, falling back
    /// to the working directory when `HOME` is unset.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
        match std::env::var("HOME") {
            Ok(home) if !home.is_empty() => Path::new(&home).join(DEFAULT_CONFIG_FILE),
            _ => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(GatorError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration, using defaults when the file does not exist, and
    /// apply environment variable overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = if path.as_ref().exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| GatorError::Config(format!("config parse error: {e}")))?;
        config.aggregator.validate()?;
        Ok(config)
    }

    /// Write the configuration back to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| GatorError::Config(format!("config serialize error: {e}")))?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `GATOR_DATABASE_PATH`: Override the database file path
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(DATABASE_PATH_ENV) {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
    }

    /// Set the logged-in user.
    pub fn set_user(&mut self, name: impl Into<String>) {
        self.session.current_user_name = Some(name.into());
    }

    /// Name of the logged-in user, if any.
    pub fn current_user(&self) -> Option<&str> {
        self.session.current_user_name.as_deref()
    }
}
