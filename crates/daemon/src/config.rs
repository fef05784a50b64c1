//! Configuration management for the PathGate daemon.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/pathgate/config.toml`.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::files::PermissionLevel;

/// Default address the HTTP server binds to.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("bind_addr must be a socket address like 127.0.0.1:8080, got {0}")]
    InvalidBindAddr(String),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("root must be set")]
    MissingRoot,

    #[error("default_page_size must be between 1 and 10000, got {0}")]
    InvalidPageSize(usize),

    #[error("page_size_options must be between 1 and 10000, got {0}")]
    InvalidPageSizeOption(usize),

    #[error("max_file_size must be greater than 0, got {0}")]
    InvalidMaxFileSize(u64),

    #[error("max_request_size ({request}) must be at least max_file_size ({file})")]
    RequestSmallerThanFile { request: u64, file: u64 },

    #[error("blocked extension must not be empty or contain a path separator: {0:?}")]
    InvalidBlockedExtension(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the PathGate daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,

    /// Root directory and file filtering.
    pub storage: StorageConfig,

    /// Directory listing configuration.
    pub listing: ListingConfig,

    /// Upload limits.
    pub upload: UploadConfig,

    /// Permission gate settings.
    pub permissions: PermissionsConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: String,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Root directory and file filtering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory every operation is confined to.
    pub root: PathBuf,

    /// Include dot-files in listings and archives.
    pub show_hidden: bool,

    /// Extensions never listed, served, archived or accepted (no leading dot).
    pub blocked_extensions: Vec<String>,

    /// File names hidden from every listing, archive and mutation.
    pub reserved_names: Vec<String>,

    /// Directory for temporary archives. Defaults to the system temp dir.
    pub temp_dir: Option<PathBuf>,
}

/// Directory listing configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListingConfig {
    /// Page size used when a request does not choose one.
    pub default_page_size: usize,

    /// Page sizes offered to clients in every listing response.
    pub page_size_options: Vec<usize>,
}

/// Upload limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum size of a single uploaded file in bytes (default: 100MB).
    pub max_file_size: u64,

    /// Maximum size of a whole upload request body in bytes (default: 512MB).
    pub max_request_size: u64,

    /// Replace existing files instead of reporting a conflict.
    pub overwrite: bool,
}

/// Permission gate settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Access level granted to every request.
    pub level: PermissionLevel,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            show_hidden: false,
            blocked_extensions: default_blocked_extensions(),
            reserved_names: default_reserved_names(),
            temp_dir: None,
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            page_size_options: vec![25, 50, 100, 250],
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 100 * 1024 * 1024,    // 100MB
            max_request_size: 512 * 1024 * 1024, // 512MB
            overwrite: false,
        }
    }
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            level: PermissionLevel::Read,
        }
    }
}

/// Extensions that could execute on a web server or in a browser.
fn default_blocked_extensions() -> Vec<String> {
    [
        "php", "php3", "php4", "php5", "php7", "php8", "phtml", "phar", "phps", "cgi", "pl",
        "py", "sh", "bash", "exe", "bat", "cmd", "com", "jsp", "asp", "aspx", "htaccess",
        "htpasswd",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// The entrypoint and the stores the outer application keeps next to the data.
fn default_reserved_names() -> Vec<String> {
    ["index.php", "config.json", "users.json", "pathgate.toml"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pathgate")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - PATHGATE_ROOT: Override the root directory
    /// - PATHGATE_BIND: Override the listen address
    /// - PATHGATE_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("PATHGATE_ROOT") {
            if !root.is_empty() {
                tracing::info!("Overriding root from environment: {}", root);
                self.storage.root = PathBuf::from(root);
            }
        }

        if let Ok(bind) = std::env::var("PATHGATE_BIND") {
            if !bind.is_empty() {
                tracing::info!("Overriding bind_addr from environment: {}", bind);
                self.server.bind_addr = bind;
            }
        }

        if let Ok(level) = std::env::var("PATHGATE_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.server.log_level = level;
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::InvalidBindAddr(self.server.bind_addr.clone()));
        }

        let level = self.server.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.server.log_level.clone()));
        }

        if self.storage.root.as_os_str().is_empty() {
            return Err(ConfigError::MissingRoot);
        }

        for ext in &self.storage.blocked_extensions {
            let trimmed = ext.trim().trim_start_matches('.');
            if trimmed.is_empty() || trimmed.contains('/') || trimmed.contains('\\') {
                return Err(ConfigError::InvalidBlockedExtension(ext.clone()));
            }
        }

        let page_size = self.listing.default_page_size;
        if page_size < 1 || page_size > 10_000 {
            return Err(ConfigError::InvalidPageSize(page_size));
        }
        if let Some(&bad) = self
            .listing
            .page_size_options
            .iter()
            .find(|&&option| option < 1 || option > 10_000)
        {
            return Err(ConfigError::InvalidPageSizeOption(bad));
        }

        if self.upload.max_file_size == 0 {
            return Err(ConfigError::InvalidMaxFileSize(self.upload.max_file_size));
        }

        if self.upload.max_request_size < self.upload.max_file_size {
            return Err(ConfigError::RequestSmallerThanFile {
                request: self.upload.max_request_size,
                file: self.upload.max_file_size,
            });
        }

        Ok(())
    }

    /// Parsed listen address. Call [`Config::validate`] first.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind_addr
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.server.bind_addr))
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
    /// The default path is `~/.config/pathgate/config.toml`.
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
