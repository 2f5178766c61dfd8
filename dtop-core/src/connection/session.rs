//! Connector and session traits

use std::borrow::Cow;

use async_trait::async_trait;

use super::{ConnectionError, ConnectionTarget};

/// Captured result of one remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Raw standard output
    pub stdout: Vec<u8>,
    /// Remote exit status, `None` if the command was killed by a signal
    pub exit_status: Option<i32>,
}

impl CommandOutput {
    /// Creates output with the given stdout and a zero exit status
    #[must_use]
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            exit_status: Some(0),
        }
    }

    /// Returns true if the command exited with status 0
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.exit_status, Some(0))
    }

    /// Stdout decoded as UTF-8, replacing invalid sequences
    #[must_use]
    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }
}

/// An open channel to one host that can run commands.
///
/// A session must be closed on every exit path. Implementations release
/// their resources in `Drop` as well, so a session abandoned by a timeout
/// or an early return is still cleaned up.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Host name this session was opened for
    fn host(&self) -> &str;

    /// Runs `command` and captures its stdout and exit status
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the channel fails, the command times
    /// out, or stdout exceeds the output limit.
    async fn execute(&self, command: &str) -> Result<CommandOutput, ConnectionError>;

    /// Releases the session. Calling it more than once has no effect.
    async fn close(&mut self);
}

/// Opens sessions to resolved targets
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establishes an authenticated session. Failures are not retried.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::AuthenticationFailed`,
    /// `ConnectionError::Unreachable` or `ConnectionError::Timeout`.
    async fn open(
        &self,
        target: &ConnectionTarget,
    ) -> Result<Box<dyn RemoteSession>, ConnectionError>;
}
