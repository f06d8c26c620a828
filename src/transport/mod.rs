//! Remote transport abstraction.
//!
//! The engines talk to the managed host only through [`Transport`] and
//! [`Connection`]. [`SshTransport`] is the production implementation;
//! tests plug in an in-memory host.

mod pump;
mod ssh;

pub use ssh::SshTransport;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::RemoteShellError;
use crate::Result;

/// Extended-data stream number SSH uses for stderr.
pub(crate) const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// Credential used to authenticate with the host.
///
/// Exactly one kind is configured; the config layer enforces that.
#[derive(Clone)]
pub enum Credential {
    /// Password authentication.
    Password(String),
    /// Private key file, with an optional passphrase.
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::KeyFile { path, .. } => f.debug_struct("KeyFile").field("path", path).finish(),
        }
    }
}

/// Where and as whom to connect.
#[derive(Debug, Clone)]
pub struct SshTarget {
    /// Host name or address.
    pub host: String,
    /// Port number.
    pub port: u16,
    /// Login user.
    pub username: String,
    /// How to authenticate.
    pub credential: Credential,
    /// Bound on establishing and authenticating the connection.
    pub connect_timeout: Duration,
    /// Expected SHA-256 host key fingerprint. `None` accepts any key.
    pub host_key_fingerprint: Option<String>,
}

impl SshTarget {
    /// `user@host:port`, for logs.
    pub fn display_name(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Terminal size requested for an interactive shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtySize {
    /// Number of rows (height).
    pub rows: u16,
    /// Number of columns (width).
    pub cols: u16,
}

impl PtySize {
    /// Create a new PtySize with the given dimensions.
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }
}

impl Default for PtySize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

/// Captured result of one exec-channel invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    /// Exit status, if the host reported one.
    pub exit_status: Option<u32>,
    /// Standard output, decoded lossily.
    pub stdout: String,
    /// Standard error, decoded lossily.
    pub stderr: String,
}

impl RemoteOutput {
    /// Create an output with the given status and streams.
    pub fn new(exit_status: u32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_status: Some(exit_status),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Check if the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }

    /// Stdout followed by a labeled stderr section when stderr is non-empty.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !self.stderr.trim().is_empty() {
            text.push_str("\nStderr: ");
            text.push_str(&self.stderr);
        }
        text.trim().to_string()
    }

    /// Text reported for a failed command: stderr alone when nothing went
    /// to stdout, otherwise both streams as in [`combined`](Self::combined).
    pub fn failure_text(&self) -> String {
        if self.stdout.trim().is_empty() {
            self.stderr.trim().to_string()
        } else {
            self.combined()
        }
    }

    /// Turn a non-zero exit into [`RemoteShellError::CommandFailed`].
    pub fn into_result(self) -> Result<RemoteOutput> {
        if self.success() {
            Ok(self)
        } else {
            Err(RemoteShellError::CommandFailed {
                status: self.exit_status,
                output: self.failure_text(),
            })
        }
    }
}

/// The byte streams of an attached interactive shell.
pub struct ShellHandle {
    input: mpsc::Sender<Vec<u8>>,
    /// Terminal output.
    pub output: mpsc::Receiver<Vec<u8>>,
    /// Out-of-band error output. With a PTY attached most shells write
    /// errors to `output` instead.
    pub error: mpsc::Receiver<Vec<u8>>,
    task: Option<JoinHandle<()>>,
}

impl ShellHandle {
    /// Assemble a handle from its channels and the task feeding them.
    pub fn new(
        input: mpsc::Sender<Vec<u8>>,
        output: mpsc::Receiver<Vec<u8>>,
        error: mpsc::Receiver<Vec<u8>>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            input,
            output,
            error,
            task,
        }
    }

    /// Write bytes to the shell's input.
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        self.input
            .send(data.to_vec())
            .await
            .map_err(|_| RemoteShellError::ChannelClosed)
    }

    /// Drop everything already buffered on the output and error streams.
    ///
    /// Returns the number of bytes discarded.
    pub fn discard_pending(&mut self) -> usize {
        let mut discarded = 0;
        while let Ok(chunk) = self.output.try_recv() {
            discarded += chunk.len();
        }
        while let Ok(chunk) = self.error.try_recv() {
            discarded += chunk.len();
        }
        discarded
    }

    /// Close the shell. Dropping the input sender lets the pump send EOF;
    /// the pump task is then given a moment before it is aborted.
    pub async fn close(self) {
        let ShellHandle { input, task, .. } = self;
        drop(input);

        if let Some(task) = task {
            let abort = task.abort_handle();
            if tokio::time::timeout(Duration::from_secs(1), task).await.is_err() {
                abort.abort();
            }
        }
    }
}

/// Opens connections to the managed host.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish and authenticate a new, exclusively owned connection.
    async fn connect(&self) -> Result<Box<dyn Connection>>;
}

/// One authenticated connection to the managed host.
#[async_trait]
pub trait Connection: Send {
    /// Run one command to completion in a fresh remote process.
    ///
    /// A non-zero exit is not an error at this level; inspect
    /// [`RemoteOutput::exit_status`].
    async fn run(&mut self, command: &str) -> Result<RemoteOutput>;

    /// Attach an interactive shell with a pseudo-terminal.
    async fn spawn_shell(&mut self, term: &str, size: PtySize) -> Result<ShellHandle>;

    /// Close the connection.
    async fn close(&mut self) -> Result<()>;
}
