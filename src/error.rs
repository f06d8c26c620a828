//! Error types for remote-shell.

use std::time::Duration;

use thiserror::Error;

use crate::session::UserId;

/// Main error type for remote-shell operations.
///
/// Engines never hand these to their callers directly; they are folded
/// into a [`CommandOutcome`](crate::exec::CommandOutcome) at the engine
/// boundary.
#[derive(Error, Debug)]
pub enum RemoteShellError {
    /// The transport could not be established (DNS, TCP, handshake).
    #[error("connection failed: {0}")]
    Connect(String),

    /// The host rejected our credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The connection broke while a request was in flight.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote command exited with a non-zero status.
    #[error("command failed (exit status {}): {output}", exit_label(.status))]
    CommandFailed {
        status: Option<u32>,
        output: String,
    },

    /// The round trip exceeded its bound.
    #[error("command timed out after {} seconds", .0.as_secs_f32())]
    Timeout(Duration),

    /// A directory-change request was malformed.
    #[error("invalid cd command: {0}")]
    InvalidSyntax(String),

    /// The host refused to change into the requested directory.
    #[error("directory not found or inaccessible: {path}: {reason}")]
    DirectoryNotFound { path: String, reason: String },

    /// No session is registered for the user.
    #[error("no active session for user {0}")]
    NoActiveSession(UserId),

    /// The interactive shell's stream closed.
    #[error("shell channel closed")]
    ChannelClosed,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<russh::Error> for RemoteShellError {
    fn from(e: russh::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<russh_keys::Error> for RemoteShellError {
    fn from(e: russh_keys::Error) -> Self {
        Self::Auth(e.to_string())
    }
}

fn exit_label(status: &Option<u32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "unknown".to_string(),
    }
}

/// Convenience Result type for remote-shell operations.
pub type Result<T> = std::result::Result<T, RemoteShellError>;
