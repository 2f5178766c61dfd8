//! Sessions over the system OpenSSH client
//!
//! Each session is an OpenSSH ControlMaster connection whose control socket
//! lives in a private temporary directory. Commands are multiplexed over the
//! master with `ssh -S <socket>`, so authentication happens once per host.
//!
//! # Host keys
//!
//! Sessions are opened with `StrictHostKeyChecking=accept-new`: a host key
//! that is not yet known is accepted and written to `known_hosts`
//! (trust-on-first-use). A key that differs from a recorded one is still
//! rejected. This trades protection against a first-contact
//! man-in-the-middle for unattended polling of fresh machines.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::{CommandOutput, ConnectionError, ConnectionTarget, Connector, RemoteSession};

/// Upper bound on captured stdout per command (16 MiB)
pub const MAX_OUTPUT_BYTES: usize = 16 * 1024 * 1024;

/// Extra time granted to `ssh` beyond `ConnectTimeout` for authentication
const AUTH_GRACE: Duration = Duration::from_secs(5);

/// Exit status `ssh` uses for its own errors
const SSH_ERROR_STATUS: i32 = 255;

/// Lowercased stderr fragments that mean the login itself was refused
const AUTH_MARKERS: [&str; 4] = [
    "permission denied",
    "too many authentication failures",
    "no more authentication methods",
    "host key verification failed",
];

/// Opens [`SshSession`]s with the `ssh` binary found on `PATH`.
///
/// Targets arrive already resolved against the alias table, and `ssh`
/// applies its own config lookup on top. Pass the same file with
/// [`Self::with_config_file`] so both lookups read one config; otherwise
/// `ssh` falls back to `~/.ssh/config`.
#[derive(Debug, Clone)]
pub struct SshConnector {
    program: PathBuf,
    config_file: Option<PathBuf>,
    connect_timeout: Duration,
    command_timeout: Option<Duration>,
}

impl SshConnector {
    /// Creates a connector with the given TCP connect timeout
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            program: PathBuf::from("ssh"),
            config_file: None,
            connect_timeout,
            command_timeout: None,
        }
    }

    /// Sets a limit for every command run through the opened sessions
    #[must_use]
    pub const fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Makes every `ssh` invocation read `path` (`ssh -F`)
    #[must_use]
    pub fn with_config_file(mut self, path: Option<&Path>) -> Self {
        self.config_file = path.map(Path::to_path_buf);
        self
    }

    /// Uses a different `ssh` executable
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn master_command(&self, target: &ConnectionTarget, socket: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(ref config) = self.config_file {
            cmd.arg("-F").arg(config);
        }
        cmd.arg("-M")
            .arg("-N")
            .arg("-f")
            .arg("-S")
            .arg(socket)
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)))
            .arg("-p")
            .arg(target.port.to_string())
            .arg("-l")
            .arg(&target.username);

        if let Some(ref key) = target.identity_file {
            cmd.arg("-i").arg(key);
        }

        cmd.arg("--").arg(&target.hostname);
        cmd
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn open(
        &self,
        target: &ConnectionTarget,
    ) -> Result<Box<dyn RemoteSession>, ConnectionError> {
        let control_dir = tempfile::Builder::new().prefix("dtop-").tempdir()?;
        let socket = control_dir.path().join("ctl");
        let log_path = control_dir.path().join("master.log");
        // The backgrounded master keeps stderr open, so it goes to a file
        // rather than a pipe that would never reach EOF.
        let log = std::fs::File::create(&log_path)?;

        let mut cmd = self.master_command(target, &socket);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .kill_on_drop(true);

        tracing::debug!(destination = %target, "Opening SSH master connection");

        let limit = self.connect_timeout + AUTH_GRACE;
        let status = match tokio::time::timeout(limit, cmd.status()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ConnectionError::Timeout {
                    host: target.hostname.clone(),
                    secs: limit.as_secs(),
                });
            }
        };

        if !status.success() {
            let stderr = std::fs::read_to_string(&log_path).unwrap_or_default();
            let err = classify_ssh_failure(
                &target.hostname,
                status.code(),
                &stderr,
                self.connect_timeout.as_secs(),
            );
            tracing::debug!(destination = %target, error = %err, "SSH master connection failed");
            return Err(err);
        }

        tracing::debug!(destination = %target, "SSH master connection established");

        Ok(Box::new(SshSession {
            hostname: target.hostname.clone(),
            program: self.program.clone(),
            config_file: self.config_file.clone(),
            socket,
            command_timeout: self.command_timeout,
            closed: false,
            control_dir: Some(control_dir),
        }))
    }
}

/// One ControlMaster connection.
///
/// Dropping the session without [`RemoteSession::close`] still stops the
/// master and removes the control directory.
#[derive(Debug)]
pub struct SshSession {
    hostname: String,
    program: PathBuf,
    config_file: Option<PathBuf>,
    socket: PathBuf,
    command_timeout: Option<Duration>,
    closed: bool,
    // Removed only after the master has been told to exit
    control_dir: Option<TempDir>,
}

impl SshSession {
    /// `ssh` invocation talking to the master over the control socket
    fn client_command(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        if let Some(ref config) = self.config_file {
            cmd.arg("-F").arg(config);
        }
        cmd.arg("-S").arg(&self.socket);
        cmd
    }

    fn exit_command(&self) -> std::process::Command {
        let mut cmd = self.client_command();
        cmd.arg("-O")
            .arg("exit")
            .arg("--")
            .arg(&self.hostname)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, ConnectionError> {
        let mut child = Command::from(self.client_command())
            .arg("-o")
            .arg("ControlMaster=no")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-T")
            .arg("--")
            .arg(&self.hostname)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ConnectionError::Io("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ConnectionError::Io("stderr was not captured".to_string()))?;

        let (stdout, stderr) =
            tokio::join!(read_limited(stdout, MAX_OUTPUT_BYTES), read_limited(stderr, 64 * 1024));
        let stdout = stdout?;
        let stderr = stderr.unwrap_or_default();

        if stdout.len() > MAX_OUTPUT_BYTES {
            if let Err(e) = child.kill().await {
                tracing::debug!(error = %e, "Failed to kill oversized command");
            }
            return Err(ConnectionError::OutputTooLarge {
                command: command.to_string(),
                limit: MAX_OUTPUT_BYTES,
            });
        }

        let status = child.wait().await?;
        if status.code() == Some(SSH_ERROR_STATUS) {
            return Err(ConnectionError::Unreachable {
                host: self.hostname.clone(),
                reason: last_line(&String::from_utf8_lossy(&stderr))
                    .unwrap_or("connection lost")
                    .to_string(),
            });
        }

        Ok(CommandOutput {
            stdout,
            exit_status: status.code(),
        })
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    fn host(&self) -> &str {
        &self.hostname
    }

    async fn execute(&self, command: &str) -> Result<CommandOutput, ConnectionError> {
        tracing::trace!(host = %self.hostname, command, "Executing remote command");

        let Some(limit) = self.command_timeout else {
            return self.run(command).await;
        };

        tokio::time::timeout(limit, self.run(command))
            .await
            .map_err(|_| ConnectionError::Timeout {
                host: self.hostname.clone(),
                secs: limit.as_secs(),
            })?
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let result = Command::from(self.exit_command()).status().await;
        self.control_dir = None;

        match result {
            Ok(status) if status.success() => {
                tracing::debug!(host = %self.hostname, "SSH master connection closed");
            }
            Ok(status) => {
                tracing::debug!(host = %self.hostname, %status, "SSH master exit request failed");
            }
            Err(e) => {
                tracing::warn!(host = %self.hostname, error = %e, "Failed to run ssh -O exit");
            }
        }
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let mut cmd = self.exit_command();
        let host = self.hostname.clone();
        let control_dir = self.control_dir.take();
        let stop = move || {
            match cmd.status() {
                Ok(_) => tracing::debug!(host = %host, "SSH master stopped on drop"),
                Err(e) => {
                    tracing::warn!(host = %host, error = %e, "Failed to stop SSH master on drop");
                }
            }
            // The socket must outlive the exit request
            drop(control_dir);
        };

        // A timed-out host is dropped on a runtime thread; runtime shutdown
        // waits for blocking tasks, so the exit request still runs
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => drop(handle.spawn_blocking(stop)),
            Err(_) => stop(),
        }
    }
}

/// Reads at most `limit + 1` bytes so an overflow is detectable.
///
/// The reader is dropped on return, which closes the pipe and makes a
/// still-writing remote command fail instead of blocking.
async fn read_limited<R>(reader: R, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    reader.take(cap).read_to_end(&mut buf).await?;
    Ok(buf)
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rfind(|line| !line.is_empty())
}

/// Maps a failed `ssh` run to a connection error using its stderr
fn classify_ssh_failure(
    host: &str,
    code: Option<i32>,
    stderr: &str,
    connect_timeout_secs: u64,
) -> ConnectionError {
    let lowered = stderr.to_ascii_lowercase();
    let reason = last_line(stderr).map_or_else(
        || match code {
            Some(code) => format!("ssh exited with status {code}"),
            None => "ssh terminated by signal".to_string(),
        },
        str::to_string,
    );

    if AUTH_MARKERS.iter().any(|m| lowered.contains(m)) {
        ConnectionError::AuthenticationFailed {
            host: host.to_string(),
            reason,
        }
    } else if lowered.contains("timed out") {
        ConnectionError::Timeout {
            host: host.to_string(),
            secs: connect_timeout_secs,
        }
    } else {
        ConnectionError::Unreachable {
            host: host.to_string(),
            reason,
        }
    }
}
