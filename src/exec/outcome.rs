//! The result shape engines hand back to the command router.

use std::fmt;

use crate::error::RemoteShellError;

/// Coarse classification of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connect, authentication or network failure.
    Transport,
    /// The command ran and exited non-zero.
    CommandFailed,
    /// The operation exceeded its bound.
    Timeout,
    /// Malformed directory-change request.
    InvalidSyntax,
    /// The host refused a directory change.
    DirectoryNotFound,
    /// No session exists for the user.
    NoActiveSession,
}

impl FailureKind {
    /// Classify an error.
    pub fn of(error: &RemoteShellError) -> Self {
        match error {
            RemoteShellError::CommandFailed { .. } => Self::CommandFailed,
            RemoteShellError::Timeout(_) => Self::Timeout,
            RemoteShellError::InvalidSyntax(_) => Self::InvalidSyntax,
            RemoteShellError::DirectoryNotFound { .. } => Self::DirectoryNotFound,
            RemoteShellError::NoActiveSession(_) => Self::NoActiveSession,
            RemoteShellError::Connect(_)
            | RemoteShellError::Auth(_)
            | RemoteShellError::Transport(_)
            | RemoteShellError::ChannelClosed
            | RemoteShellError::Io(_) => Self::Transport,
        }
    }
}

/// Success flag plus human-readable text.
///
/// This is the only thing an engine returns from a command; errors never
/// escape as faults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Output on success, a description of what went wrong otherwise.
    pub text: String,
    /// Why it failed, when it failed.
    pub failure: Option<FailureKind>,
}

impl CommandOutcome {
    /// A successful outcome.
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: text.into(),
            failure: None,
        }
    }

    /// A failed outcome.
    pub fn failure(kind: FailureKind, text: impl Into<String>) -> Self {
        Self {
            success: false,
            text: text.into(),
            failure: Some(kind),
        }
    }

    /// Build a failure from an error with extra leading context.
    pub fn failure_with_context(context: &str, error: RemoteShellError) -> Self {
        Self::failure(FailureKind::of(&error), format!("{}: {}", context, error))
    }

    /// Check if this failed for the given reason.
    pub fn failed_with(&self, kind: FailureKind) -> bool {
        self.failure == Some(kind)
    }

    /// Split into the `(success, text)` pair the router consumes.
    pub fn into_pair(self) -> (bool, String) {
        (self.success, self.text)
    }
}

impl From<RemoteShellError> for CommandOutcome {
    fn from(error: RemoteShellError) -> Self {
        Self::failure(FailureKind::of(&error), error.to_string())
    }
}

impl From<crate::Result<String>> for CommandOutcome {
    fn from(result: crate::Result<String>) -> Self {
        match result {
            Ok(text) => Self::success(text),
            Err(e) => e.into(),
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
