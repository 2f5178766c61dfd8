//! Poll settings and configuration errors
//!
//! Settings are read from an optional TOML file (by default
//! `<config dir>/dtop/config.toml`). Every field has a default, so a missing
//! file or a partial one is valid. Command-line flags are applied on top by
//! the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitoring::{FreeLayout, VramSource};

/// Error type for loading the alias table or the settings file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("Failed to read {}: {reason}", path.display())]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        reason: String,
    },

    /// An SSH client config option has an invalid value
    #[error("Invalid SSH config at line {line}: {reason}")]
    SshConfig {
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// The settings file is not valid TOML for [`PollSettings`]
    #[error("Invalid settings: {0}")]
    Settings(String),
}

/// Bounds applied by the `effective_*` accessors
const CONCURRENCY_RANGE: (usize, usize) = (1, 64);
const HOST_TIMEOUT_RANGE: (u64, u64) = (1, 600);
const CONNECT_TIMEOUT_RANGE: (u64, u64) = (1, 120);
const COMMAND_TIMEOUT_RANGE: (u64, u64) = (1, 600);

/// Settings for one polling run (stored in `config.toml`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Hosts polled at the same time (1–64, default: 8)
    pub concurrency: usize,
    /// Budget for one host's whole pipeline in seconds (1–600, default: 30)
    pub host_timeout_secs: u64,
    /// TCP connect timeout in seconds (1–120, default: 10)
    pub connect_timeout_secs: u64,
    /// Limit for a single remote command in seconds (1–600, default: none)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
    /// Which `free` column holds used memory
    pub free_layout: FreeLayout,
    /// How VRAM utilization is read from `nvidia-smi`
    pub vram_source: VramSource,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            concurrency: 8,
            host_timeout_secs: 30,
            connect_timeout_secs: 10,
            command_timeout_secs: None,
            free_layout: FreeLayout::default(),
            vram_source: VramSource::default(),
        }
    }
}

impl PollSettings {
    /// Default settings file location, if the platform has a config dir
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dtop").join("config.toml"))
    }

    /// Loads settings from `path`; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read or
    /// [`ConfigError::Settings`] if it is not valid TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Settings file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let settings = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), ?settings, "Loaded settings");
        Ok(settings)
    }

    /// Parses settings from TOML text
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Settings`] if the text is not valid TOML or a
    /// field has the wrong type.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Settings(e.to_string()))
    }

    /// Concurrency clamped to 1–64
    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency
            .clamp(CONCURRENCY_RANGE.0, CONCURRENCY_RANGE.1)
    }

    /// Per-host timeout clamped to 1–600 seconds
    #[must_use]
    pub fn effective_host_timeout(&self) -> Duration {
        Duration::from_secs(
            self.host_timeout_secs
                .clamp(HOST_TIMEOUT_RANGE.0, HOST_TIMEOUT_RANGE.1),
        )
    }

    /// Connect timeout clamped to 1–120 seconds
    #[must_use]
    pub fn effective_connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.connect_timeout_secs
                .clamp(CONNECT_TIMEOUT_RANGE.0, CONNECT_TIMEOUT_RANGE.1),
        )
    }

    /// Command timeout clamped to 1–600 seconds, if one is set
    #[must_use]
    pub fn effective_command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(|secs| {
            Duration::from_secs(secs.clamp(COMMAND_TIMEOUT_RANGE.0, COMMAND_TIMEOUT_RANGE.1))
        })
    }
}
