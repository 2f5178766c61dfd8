//! Remote command sessions
//!
//! This module resolves per-host connection parameters ([`ConnectionTarget`]),
//! defines the [`Connector`] / [`RemoteSession`] seam used by the collector,
//! and provides two implementations: [`SshConnector`] on top of the system
//! OpenSSH client, and [`ScriptedConnector`] which replays canned output.

mod scripted;
mod session;
mod ssh;
mod target;

use thiserror::Error;

pub use scripted::{ScriptedConnector, ScriptedHost};
pub use session::{CommandOutput, Connector, RemoteSession};
pub use ssh::{MAX_OUTPUT_BYTES, SshConnector, SshSession};
pub use target::{ConnectionTarget, DEFAULT_SSH_PORT};

/// Error type for opening sessions and running commands
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The server rejected our credentials or host key
    #[error("Authentication failed for {host}: {reason}")]
    AuthenticationFailed {
        /// Host the login was attempted on
        host: String,
        /// Message reported by the client
        reason: String,
    },

    /// Name resolution failed, the connection was refused, or it dropped
    #[error("Host {host} unreachable: {reason}")]
    Unreachable {
        /// Host that could not be reached
        host: String,
        /// Message reported by the client
        reason: String,
    },

    /// Connecting or running a command took too long
    #[error("Connection to {host} timed out after {secs} seconds")]
    Timeout {
        /// Host that did not answer in time
        host: String,
        /// Limit that elapsed
        secs: u64,
    },

    /// A command wrote more than the allowed amount to stdout
    #[error("Output of '{command}' exceeded {limit} bytes")]
    OutputTooLarge {
        /// Command that produced the output
        command: String,
        /// Byte limit
        limit: usize,
    },

    /// Local process or filesystem failure
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ConnectionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
