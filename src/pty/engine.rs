//! PTY session engine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time;
use tracing::{debug, error, info, warn};

use super::cleaner::clean_output;
use super::completion::{CompletionPolicy, ReadDecision, ReadEvent, ReadProgress};
use super::sanitizer::OutputSanitizer;
use super::ShellTuning;
use crate::error::RemoteShellError;
use crate::exec::{CommandOutcome, FailureKind};
use crate::session::{teardown, ManagedSession, SessionRegistry, UserId};
use crate::transport::{Connection, ShellHandle, Transport};
use crate::Result;

/// One user's interactive shell.
pub struct PtySession {
    owner: UserId,
    connection: Box<dyn Connection>,
    shell: Option<ShellHandle>,
}

impl PtySession {
    /// Write `command` and read until the policy is satisfied or `timeout`
    /// passes. Reaching `timeout` with some output returns what arrived.
    async fn run(
        &mut self,
        command: &str,
        policy: &dyn CompletionPolicy,
        strip_ansi: bool,
        timeout: Duration,
    ) -> Result<String> {
        let shell = self.shell.as_mut().ok_or(RemoteShellError::ChannelClosed)?;

        let stale = shell.discard_pending();
        if stale > 0 {
            debug!(user = %self.owner, "discarded {} bytes of stale output", stale);
        }

        let started = Instant::now();
        let framed = policy.frame(command);
        time::timeout(timeout, shell.write(format!("{}\n", framed.line).as_bytes()))
            .await
            .map_err(|_| RemoteShellError::Timeout(timeout))??;

        let mut accumulated = Vec::new();

        loop {
            let remaining = timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                if accumulated.is_empty() {
                    return Err(RemoteShellError::Timeout(timeout));
                }
                debug!(user = %self.owner, "call timeout reached, returning partial output");
                break;
            }

            let wait = policy.poll_interval().min(remaining);
            let event = match time::timeout(wait, shell.output.recv()).await {
                Ok(Some(chunk)) => {
                    accumulated.extend_from_slice(&chunk);
                    ReadEvent::Data
                }
                Ok(None) if accumulated.is_empty() => return Err(RemoteShellError::ChannelClosed),
                Ok(None) => break,
                Err(_) => ReadEvent::Idle,
            };

            let progress = ReadProgress {
                accumulated: &accumulated,
                elapsed: started.elapsed(),
                event,
                terminator: framed.terminator.as_deref(),
            };
            match policy.decide(&progress) {
                ReadDecision::Continue => {}
                ReadDecision::Done => break,
                ReadDecision::TimedOut => {
                    return Err(RemoteShellError::Timeout(started.elapsed()));
                }
            }
        }

        let mut errors = Vec::new();
        while let Ok(chunk) = shell.error.try_recv() {
            errors.extend_from_slice(&chunk);
        }

        let text = OutputSanitizer::decode(&accumulated, strip_ansi);
        let mut cleaned = clean_output(&text, &framed.line, framed.terminator.as_deref());

        let errors = OutputSanitizer::decode(&errors, strip_ansi);
        if !errors.trim().is_empty() {
            cleaned.push_str("\nStderr: ");
            cleaned.push_str(errors.trim());
        }

        Ok(cleaned)
    }
}

#[async_trait]
impl ManagedSession for PtySession {
    fn owner(&self) -> UserId {
        self.owner
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(shell) = self.shell.take() {
            shell.close().await;
        }
        self.connection.close().await
    }
}

/// Drives one interactive remote shell per user.
///
/// Unlike [`ExecEngine`](crate::exec::ExecEngine), sessions are never
/// created implicitly: `execute` for a user without a session fails.
pub struct PtyEngine {
    transport: Arc<dyn Transport>,
    sessions: SessionRegistry<PtySession>,
    tuning: ShellTuning,
    policy: Arc<dyn CompletionPolicy>,
}

impl PtyEngine {
    /// Create an engine with default tuning and the timing heuristic.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_tuning(transport, ShellTuning::default())
    }

    /// Create an engine with custom tuning and the timing heuristic it
    /// describes.
    pub fn with_tuning(transport: Arc<dyn Transport>, tuning: ShellTuning) -> Self {
        Self {
            transport,
            sessions: SessionRegistry::new(),
            policy: Arc::new(tuning.adaptive_completion()),
            tuning,
        }
    }

    /// Replace the completion policy.
    pub fn with_policy(mut self, policy: Arc<dyn CompletionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// The engine's tuning.
    pub fn tuning(&self) -> &ShellTuning {
        &self.tuning
    }

    /// Attach a fresh shell for `user`, replacing any existing session.
    ///
    /// Returns `false` if the connection or the shell could not be opened.
    pub async fn create_session(&self, user: UserId) -> bool {
        if let Some(previous) = self.sessions.remove(user) {
            debug!(user = %user, "replacing existing session");
            teardown(user, previous).await;
        }

        match self.open_session(user).await {
            Ok(session) => {
                let (_, replaced) = self.sessions.insert(session);
                if let Some(replaced) = replaced {
                    teardown(user, replaced).await;
                }
                true
            }
            Err(e) => {
                error!(user = %user, "interactive session creation failed: {}", e);
                false
            }
        }
    }

    async fn open_session(&self, user: UserId) -> Result<PtySession> {
        let mut connection = self.transport.connect().await?;

        let mut shell = match connection
            .spawn_shell(&self.tuning.term, self.tuning.size)
            .await
        {
            Ok(shell) => shell,
            Err(e) => {
                if let Err(close_err) = connection.close().await {
                    debug!("closing connection after failed shell request: {}", close_err);
                }
                return Err(e);
            }
        };

        time::sleep(self.tuning.settle).await;
        let banner = shell.discard_pending();
        debug!(user = %user, "shell settled, discarded {} bytes", banner);

        info!(user = %user, "interactive session created");
        Ok(PtySession {
            owner: user,
            connection,
            shell: Some(shell),
        })
    }

    /// Write a command to the user's shell and collect its output.
    ///
    /// `timeout` bounds the read together with the policy's own limit,
    /// whichever comes first. Either way the call only fails with a
    /// timeout when no output arrived at all.
    pub async fn execute(&self, user: UserId, command: &str, timeout: Duration) -> CommandOutcome {
        let Some(slot) = self.sessions.get(user) else {
            return RemoteShellError::NoActiveSession(user).into();
        };

        let mut session = slot.lock().await;
        let result = session
            .run(command, self.policy.as_ref(), self.tuning.strip_ansi, timeout)
            .await;

        let outcome = CommandOutcome::from(result);
        match outcome.failure {
            Some(FailureKind::Timeout) => {
                warn!(user = %user, "no output before timeout: {}", command)
            }
            Some(_) => warn!(user = %user, "interactive command failed: {}", outcome.text),
            None => {}
        }
        outcome
    }

    /// Close the user's session. A no-op if there is none.
    pub async fn close_session(&self, user: UserId) {
        self.sessions.close(user).await;
    }

    /// Close every session.
    pub async fn close_all_sessions(&self) {
        let closed = self.sessions.close_all().await;
        info!("closed {} interactive session(s)", closed);
    }

    /// Check if a user has a session.
    pub fn has_session(&self, user: UserId) -> bool {
        self.sessions.contains(user)
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
