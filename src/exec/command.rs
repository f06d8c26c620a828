//! Classifying incoming commands and building the text sent to the host.

use std::time::Duration;

use tracing::debug;

use crate::error::RemoteShellError;
use crate::session::path::CdTarget;
use crate::transport::{Connection, RemoteOutput};
use crate::Result;

/// Characters that make a command line compound when unquoted.
const CONTROL_CHARS: &[char] = &[';', '&', '|', '\n'];

/// What an incoming command line asks the engine to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellRequest {
    /// Change the tracked directory to the given (unresolved) argument.
    ChangeDirectory(String),
    /// Run a command in the tracked directory.
    Run(String),
}

impl ShellRequest {
    /// Classify a command line.
    ///
    /// A line is a directory change when its first word is `cd` and it has
    /// no shell control operators or command substitution outside quotes.
    /// Compound lines such as `cd /tmp && ls` run as ordinary commands, so
    /// their `cd` does not persist. `cd 'R&D'` is a directory change.
    pub fn parse(command: &str) -> Result<Self> {
        let trimmed = command.trim();

        if !is_change_directory(trimmed) {
            return Ok(Self::Run(trimmed.to_string()));
        }

        let words = shlex::split(trimmed)
            .ok_or_else(|| RemoteShellError::InvalidSyntax("unbalanced quotes".into()))?;

        match words.as_slice() {
            [_cd] => Err(RemoteShellError::InvalidSyntax(
                "no directory specified".into(),
            )),
            [_cd, target] => Ok(Self::ChangeDirectory(target.clone())),
            _ => Err(RemoteShellError::InvalidSyntax(
                "expected exactly one directory".into(),
            )),
        }
    }
}

fn is_change_directory(line: &str) -> bool {
    line.split_whitespace().next() == Some("cd") && !is_compound(line)
}

/// Scan for operators the shell would act on: control characters outside
/// any quotes, and command substitution outside single quotes.
fn is_compound(line: &str) -> bool {
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Some('\''), '\'') => quote = None,
            (Some('\''), _) => {}
            (_, '\\') => {
                chars.next();
            }
            (_, '`') => return true,
            (_, '$') if chars.peek() == Some(&'(') => return true,
            (Some('"'), '"') => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, c) if CONTROL_CHARS.contains(&c) => return true,
            (None, _) => {}
        }
    }

    false
}

fn quote(text: &str) -> Result<String> {
    shlex::try_quote(text)
        .map(|quoted| quoted.into_owned())
        .map_err(|e| RemoteShellError::InvalidSyntax(e.to_string()))
}

/// `cd <target> && pwd`: moves into the target and reports where the host
/// actually ended up.
pub fn directory_probe(target: &CdTarget) -> Result<String> {
    let cd_arg = match target {
        CdTarget::Absolute(path) => quote(path)?,
        CdTarget::Home(rest) if rest.is_empty() => "~".to_string(),
        CdTarget::Home(rest) => format!("~/{}", quote(rest)?),
    };
    Ok(format!("cd {} && pwd", cd_arg))
}

/// `cd <cwd> && <command>`: replays the tracked directory into a fresh
/// remote process.
pub fn in_directory(cwd: &str, command: &str) -> Result<String> {
    Ok(format!("cd {} && {}", quote(cwd)?, command))
}

/// Run one command with a bound on the round trip.
///
/// On expiry the remote process may still be running; nothing is done to
/// stop it and the connection stays usable.
pub(crate) async fn run_bounded(
    connection: &mut dyn Connection,
    command: &str,
    timeout: Duration,
) -> Result<RemoteOutput> {
    debug!("remote exec: {}", command);
    tokio::time::timeout(timeout, connection.run(command))
        .await
        .map_err(|_| RemoteShellError::Timeout(timeout))?
}
