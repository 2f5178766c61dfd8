//! Crate-level error type
//!
//! Each module defines its own error enum; [`DtopError`] wraps them so a
//! host pipeline can use `?` across connection, parsing and configuration
//! steps.

use thiserror::Error;

use crate::config::ConfigError;
use crate::connection::ConnectionError;
use crate::monitoring::MonitoringError;

/// Any failure that can end a host poll or a run
#[derive(Debug, Error)]
pub enum DtopError {
    /// Opening the session or running a command failed
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Command output did not match the expected format
    #[error(transparent)]
    Monitoring(#[from] MonitoringError),

    /// Alias table or settings could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The whole host pipeline exceeded its time budget
    #[error("Host poll timed out after {0} seconds")]
    HostTimeout(u64),
}

/// Result type alias for dtop operations
pub type DtopResult<T> = Result<T, DtopError>;
