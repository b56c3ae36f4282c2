//! Configuration management for the PhoneDrop server.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/phonedrop/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("port must be non-zero")]
    InvalidPort,

    #[error("browse_root is not a directory: {0}")]
    InvalidBrowseRoot(String),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the PhoneDrop server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,

    /// Filesystem configuration.
    pub files: FilesConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind (default `0.0.0.0`, the whole LAN).
    pub bind: String,

    /// Port to listen on.
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Filesystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilesConfig {
    /// Directory a browse request resolves against when no path is given.
    pub browse_root: PathBuf,

    /// Directory receiving all uploads; created at startup if missing.
    pub inbox_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            browse_root: default_browse_root(),
            inbox_dir: default_inbox_dir(),
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("phonedrop")
        .join("config.toml")
}

/// Returns the default browsing root: the invoking user's home directory.
fn default_browse_root() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the default inbox: a `PhoneDrop` folder under the user's
/// downloads directory.
fn default_inbox_dir() -> PathBuf {
    dirs::download_dir()
        .unwrap_or_else(|| default_browse_root().join("Downloads"))
        .join("PhoneDrop")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - PHONEDROP_PORT: Override the listening port
    /// - PHONEDROP_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    /// - PHONEDROP_BROWSE_ROOT: Override the default browsing root
    /// - PHONEDROP_INBOX_DIR: Override the upload inbox directory
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("PHONEDROP_PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring non-numeric PHONEDROP_PORT: {}", port),
            }
        }

        if let Ok(level) = std::env::var("PHONEDROP_LOG_LEVEL") {
            if !level.is_empty() {
                self.server.log_level = level;
            }
        }

        if let Ok(root) = std::env::var("PHONEDROP_BROWSE_ROOT") {
            if !root.is_empty() {
                self.files.browse_root = PathBuf::from(root);
            }
        }

        if let Ok(dir) = std::env::var("PHONEDROP_INBOX_DIR") {
            if !dir.is_empty() {
                self.files.inbox_dir = PathBuf::from(dir);
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if !self.files.browse_root.is_dir() {
            return Err(ConfigError::InvalidBrowseRoot(
                self.files.browse_root.display().to_string(),
            ));
        }

        let level = self.server.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.server.log_level.clone()));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    ///
    /// The default path is `~/.config/phonedrop/config.toml`.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
