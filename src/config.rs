// Configuration File Support
//
// Configuration for the picotool MCP server. TOML format with environment
// variable overrides; command-line flags are applied on top in main.rs.
// The default file lives in the platform config directory:
// ~/.config/picotool-mcp/config.toml on Linux.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// picotool invocation settings
    pub picotool: PicotoolConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// picotool settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PicotoolConfig {
    /// Explicit binary path; `PATH` is searched when unset
    pub path: Option<PathBuf>,

    /// Kill commands running longer than this; 0 disables the limit
    pub timeout_secs: u64,
}

impl PicotoolConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Config {
    /// Load configuration from the default config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from_path(Self::config_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment overrides are applied and the result is validated.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?
        } else {
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("org", "raspberrypi", "picotool-mcp") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("picotool-mcp")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// - PICOTOOL_MCP_LOG_LEVEL
    /// - PICOTOOL_MCP_LOG_FORMAT
    /// - PICOTOOL_PATH
    /// - PICOTOOL_MCP_TIMEOUT_SECS
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("PICOTOOL_MCP_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("PICOTOOL_MCP_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(path) = std::env::var("PICOTOOL_PATH") {
            if !path.is_empty() {
                self.picotool.path = Some(PathBuf::from(path));
            }
        }
        if let Ok(secs) = std::env::var("PICOTOOL_MCP_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                self.picotool.timeout_secs = secs;
            }
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if let Some(path) = &self.picotool.path {
            if path.as_os_str().is_empty() {
                anyhow::bail!("picotool path must not be empty");
            }
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}
