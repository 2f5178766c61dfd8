//! In-memory connector that replays canned command output
//!
//! Used by tests to drive the collector and the fleet poller without a
//! network. Every host is keyed by its resolved host name.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{CommandOutput, ConnectionError, ConnectionTarget, Connector, RemoteSession};

/// Exit status reported for commands the host has no script for
const COMMAND_NOT_FOUND: i32 = 127;

/// Behavior of one scripted host
#[derive(Debug, Clone, Default)]
pub struct ScriptedHost {
    outputs: HashMap<String, CommandOutput>,
    connect_error: Option<ConnectionError>,
    connect_latency: Duration,
    command_latency: Duration,
}

impl ScriptedHost {
    /// Creates a host that accepts connections and knows no commands
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `command` with `stdout` and exit status 0
    #[must_use]
    pub fn with_output(mut self, command: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.outputs.insert(
            command.into(),
            CommandOutput::success(stdout.into().into_bytes()),
        );
        self
    }

    /// Answers `command` with the given output and exit status
    #[must_use]
    pub fn with_exit_status(
        mut self,
        command: impl Into<String>,
        stdout: impl Into<String>,
        status: i32,
    ) -> Self {
        self.outputs.insert(
            command.into(),
            CommandOutput {
                stdout: stdout.into().into_bytes(),
                exit_status: Some(status),
            },
        );
        self
    }

    /// Makes every `open` fail with `error`
    #[must_use]
    pub fn with_connect_error(mut self, error: ConnectionError) -> Self {
        self.connect_error = Some(error);
        self
    }

    /// Delays `open` by `latency`
    #[must_use]
    pub const fn with_connect_latency(mut self, latency: Duration) -> Self {
        self.connect_latency = latency;
        self
    }

    /// Delays every command by `latency`
    #[must_use]
    pub const fn with_command_latency(mut self, latency: Duration) -> Self {
        self.command_latency = latency;
        self
    }
}

/// Connector over a fixed set of [`ScriptedHost`]s.
///
/// Counts opened and released sessions so tests can check that every
/// session is released on every exit path.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    hosts: HashMap<String, Arc<ScriptedHost>>,
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    /// Creates a connector with no hosts
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `host` under `hostname`
    #[must_use]
    pub fn with_host(mut self, hostname: impl Into<String>, host: ScriptedHost) -> Self {
        self.hosts.insert(hostname.into(), Arc::new(host));
        self
    }

    /// Number of sessions opened so far
    #[must_use]
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of sessions closed or dropped so far
    #[must_use]
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Sessions opened but not yet released
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.opened().saturating_sub(self.released())
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(
        &self,
        target: &ConnectionTarget,
    ) -> Result<Box<dyn RemoteSession>, ConnectionError> {
        let Some(host) = self.hosts.get(&target.hostname) else {
            return Err(ConnectionError::Unreachable {
                host: target.hostname.clone(),
                reason: "unknown host".to_string(),
            });
        };

        if !host.connect_latency.is_zero() {
            tokio::time::sleep(host.connect_latency).await;
        }

        if let Some(ref err) = host.connect_error {
            return Err(err.clone());
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            hostname: target.hostname.clone(),
            host: Arc::clone(host),
            released: Arc::clone(&self.released),
            closed: false,
        }))
    }
}

/// Session handed out by [`ScriptedConnector`]
#[derive(Debug)]
struct ScriptedSession {
    hostname: String,
    host: Arc<ScriptedHost>,
    released: Arc<AtomicUsize>,
    closed: bool,
}

impl ScriptedSession {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl RemoteSession for ScriptedSession {
    fn host(&self) -> &str {
        &self.hostname
    }

    async fn execute(&self, command: &str) -> Result<CommandOutput, ConnectionError> {
        if !self.host.command_latency.is_zero() {
            tokio::time::sleep(self.host.command_latency).await;
        }

        Ok(self
            .host
            .outputs
            .get(command)
            .cloned()
            .unwrap_or(CommandOutput {
                stdout: Vec::new(),
                exit_status: Some(COMMAND_NOT_FOUND),
            }))
    }

    async fn close(&mut self) {
        self.release();
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.release();
    }
}
