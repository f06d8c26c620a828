//! Exec-channel session engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::command::{self, run_bounded, ShellRequest};
use super::outcome::{CommandOutcome, FailureKind};
use crate::error::RemoteShellError;
use crate::session::path::{self, CdTarget};
use crate::session::{
    teardown, ManagedSession, SessionContext, SessionRegistry, SessionSlot, StateProbe, UserId,
};
use crate::single_shot::SingleShotConnection;
use crate::transport::{Connection, Transport};
use crate::Result;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One user's exec-channel session.
pub struct ExecSession {
    owner: UserId,
    connection: Box<dyn Connection>,
    context: SessionContext,
}

impl ExecSession {
    /// The tracked state of this session.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    async fn execute(&mut self, command: &str, timeout: Duration) -> Result<String> {
        match ShellRequest::parse(command)? {
            ShellRequest::ChangeDirectory(target) => self.change_directory(&target, timeout).await,
            ShellRequest::Run(line) => self.run_in_cwd(&line, timeout).await,
        }
    }

    async fn change_directory(&mut self, target: &str, timeout: Duration) -> Result<String> {
        let resolved = path::resolve_target(self.context.cwd(), target);
        let probe = command::directory_probe(&resolved)?;

        let output = run_bounded(self.connection.as_mut(), &probe, timeout).await?;
        if !output.success() {
            return Err(directory_error(&resolved, output.failure_text()));
        }

        let confirmed = StateProbe::parse_cwd(&output.stdout)
            .ok_or_else(|| directory_error(&resolved, "host did not report a directory".into()))?;

        debug!(user = %self.owner, "cd {} -> {}", resolved, confirmed);
        self.context.confirm_cwd(confirmed.clone());

        Ok(format!("Changed directory to: {}", confirmed))
    }

    async fn run_in_cwd(&mut self, line: &str, timeout: Duration) -> Result<String> {
        let remote = command::in_directory(self.context.cwd(), line)?;
        let output = run_bounded(self.connection.as_mut(), &remote, timeout).await?;

        if !output.success() {
            warn!(
                user = %self.owner,
                "command exited with {:?}: {}", output.exit_status, line
            );
        }

        Ok(output.into_result()?.combined())
    }
}

fn directory_error(target: &CdTarget, reason: String) -> RemoteShellError {
    RemoteShellError::DirectoryNotFound {
        path: target.to_string(),
        reason,
    }
}

#[async_trait]
impl ManagedSession for ExecSession {
    fn owner(&self) -> UserId {
        self.owner
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.connection.close().await
    }
}

/// Emulates a persistent shell per user on top of stateless exec channels.
///
/// Each user gets one exclusively owned connection. The working directory
/// lives here rather than on the host, is replayed into every command, and
/// only changes when the host confirms a `cd`.
pub struct ExecEngine {
    transport: Arc<dyn Transport>,
    sessions: SessionRegistry<ExecSession>,
    single_shot: SingleShotConnection,
    probe_timeout: Duration,
}

impl ExecEngine {
    /// Create an engine that opens connections through `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            single_shot: SingleShotConnection::new(Arc::clone(&transport)),
            transport,
            sessions: SessionRegistry::new(),
            probe_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the bound on the initial `pwd` probe of a new session.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Open a fresh session for `user`, replacing any existing one.
    ///
    /// Returns `false` if the host could not be reached or the initial
    /// directory probe failed; no session is stored in that case.
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
                error!(user = %user, "session creation failed: {}", e);
                false
            }
        }
    }

    async fn open_session(&self, user: UserId) -> Result<ExecSession> {
        let mut connection = self.transport.connect().await?;

        let cwd = match self.probe_cwd(connection.as_mut()).await {
            Ok(cwd) => cwd,
            Err(e) => {
                if let Err(close_err) = connection.close().await {
                    debug!("closing connection after failed probe: {}", close_err);
                }
                return Err(e);
            }
        };

        info!(user = %user, "exec session created, starting in {}", cwd);
        Ok(ExecSession {
            owner: user,
            connection,
            context: SessionContext::new(cwd),
        })
    }

    async fn probe_cwd(&self, connection: &mut dyn Connection) -> Result<String> {
        let output = run_bounded(connection, StateProbe::cwd_command(), self.probe_timeout)
            .await?
            .into_result()?;
        StateProbe::parse_cwd(&output.stdout).ok_or_else(|| RemoteShellError::CommandFailed {
            status: output.exit_status,
            output: format!("unexpected pwd output: {:?}", output.stdout.trim()),
        })
    }

    /// Get the user's session, opening one if needed.
    async fn session_for(&self, user: UserId) -> Result<SessionSlot<ExecSession>> {
        if let Some(slot) = self.sessions.get(user) {
            return Ok(slot);
        }

        let session = self.open_session(user).await?;
        match self.sessions.insert_if_absent(session) {
            Ok(slot) => Ok(slot),
            Err((mut extra, existing)) => {
                // Another call for the same user won the race.
                if let Err(e) = extra.shutdown().await {
                    debug!(user = %user, "closing surplus session: {}", e);
                }
                Ok(existing)
            }
        }
    }

    /// Run a command in the user's session, creating it on first use.
    ///
    /// Calls for the same user are serialized; calls for different users
    /// run concurrently on their own connections.
    pub async fn execute(&self, user: UserId, command: &str, timeout: Duration) -> CommandOutcome {
        let slot = match self.session_for(user).await {
            Ok(slot) => slot,
            Err(e) => return CommandOutcome::failure_with_context("failed to create SSH session", e),
        };

        let mut session = slot.lock().await;
        let outcome: CommandOutcome = session.execute(command, timeout).await.into();

        if let Some(FailureKind::Timeout) = outcome.failure {
            warn!(user = %user, "command timed out after {:?}: {}", timeout, command);
        }
        outcome
    }

    /// The user's tracked working directory.
    pub async fn get_current_directory(&self, user: UserId) -> CommandOutcome {
        let Some(slot) = self.sessions.get(user) else {
            return RemoteShellError::NoActiveSession(user).into();
        };
        let cwd = slot.lock().await.context().cwd().to_string();
        CommandOutcome::success(cwd)
    }

    /// Close the user's session. A no-op if there is none.
    pub async fn close_session(&self, user: UserId) {
        self.sessions.close(user).await;
    }

    /// Close every session and the shared single-shot connection.
    pub async fn close_all_sessions(&self) {
        let closed = self.sessions.close_all().await;
        self.single_shot.close().await;
        info!("closed {} exec session(s)", closed);
    }

    /// Run a one-off command on the shared connection, without directory
    /// tracking.
    pub async fn execute_command(&self, command: &str, timeout: Duration) -> CommandOutcome {
        self.single_shot.execute_command(command, timeout).await
    }

    /// The shared single-shot connection.
    pub fn single_shot(&self) -> &SingleShotConnection {
        &self.single_shot
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
