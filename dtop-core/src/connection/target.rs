//! Resolved per-host connection parameters

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::alias::AliasTable;

/// Port used when neither the caller nor an alias names one
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Everything needed to open one remote session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    /// Host name or address to connect to
    pub hostname: String,
    /// Login name
    pub username: String,
    /// SSH port
    pub port: u16,
    /// Private key to offer, if configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<PathBuf>,
}

impl ConnectionTarget {
    /// Creates a target on the default port with no identity file
    #[must_use]
    pub fn new(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            username: username.into(),
            port: DEFAULT_SSH_PORT,
            identity_file: None,
        }
    }

    /// Merges caller-supplied values with the alias matching `hostname`.
    ///
    /// Alias fields that are present replace the caller's; the rest pass
    /// through. Without a matching alias the caller values are used unchanged
    /// and the port is [`DEFAULT_SSH_PORT`].
    #[must_use]
    pub fn resolve(aliases: &AliasTable, hostname: &str, username: &str) -> Self {
        let alias = aliases.lookup(hostname);
        Self {
            hostname: alias.hostname.unwrap_or_else(|| hostname.to_string()),
            username: alias.username.unwrap_or_else(|| username.to_string()),
            port: alias.port.unwrap_or(DEFAULT_SSH_PORT),
            identity_file: alias.identity_file,
        }
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.hostname, self.port)
    }
}
