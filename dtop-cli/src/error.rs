//! CLI error types and exit codes.

use dtop_core::ConfigError;

/// Exit codes for CLI operations
pub mod exit_codes {
    /// General error - configuration, runtime, or output errors
    pub const GENERAL_ERROR: i32 = 1;
    /// One or more hosts could not be polled; every other host was still
    /// printed. Distinct from clap's usage error status 2.
    pub const HOST_FAILURE: i32 = 3;
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Settings file or SSH config could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// The async runtime could not be created
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Some hosts failed
    #[error("{failed} of {total} hosts failed")]
    HostsFailed {
        /// Number of failed hosts
        failed: usize,
        /// Number of requested hosts
        total: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl CliError {
    /// Returns the appropriate exit code for this error type.
    ///
    /// Exit codes:
    /// - 0: Success (not an error)
    /// - 1: General error (configuration, runtime, IO)
    /// - 2: Invalid arguments (reported by clap before this type exists)
    /// - 3: At least one host failed
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::HostsFailed { .. } => exit_codes::HOST_FAILURE,
            Self::Config(_) | Self::Runtime(_) | Self::Io(_) => exit_codes::GENERAL_ERROR,
        }
    }
}
