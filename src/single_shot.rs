//! Shared connection for one-off commands.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::RemoteShellError;
use crate::exec::{run_bounded, CommandOutcome};
use crate::transport::{Connection, Transport};
use crate::Result;

/// One lazily opened connection shared by every caller that needs no
/// session state.
///
/// Calls are serialized on an internal lock, so concurrent callers queue
/// rather than interleave on the connection.
pub struct SingleShotConnection {
    transport: Arc<dyn Transport>,
    connection: Mutex<Option<Box<dyn Connection>>>,
}

impl SingleShotConnection {
    /// Create an unconnected instance.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            connection: Mutex::new(None),
        }
    }

    /// Establish the connection now instead of on first use.
    ///
    /// Returns `true` if a connection is open afterwards.
    pub async fn connect(&self) -> bool {
        let mut slot = self.connection.lock().await;
        if slot.is_some() {
            return true;
        }

        match self.transport.connect().await {
            Ok(connection) => {
                *slot = Some(connection);
                true
            }
            Err(e) => {
                error!("SSH connection failed: {}", e);
                false
            }
        }
    }

    /// Check if a connection is currently open.
    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Run one command with no directory tracking.
    ///
    /// Success and text follow the same rules as an ordinary command in an
    /// exec session: exit status decides success, stderr is appended under
    /// a label when present.
    pub async fn execute_command(&self, command: &str, timeout: Duration) -> CommandOutcome {
        let mut slot = self.connection.lock().await;
        self.run_locked(&mut slot, command, timeout).await.into()
    }

    async fn run_locked(
        &self,
        slot: &mut Option<Box<dyn Connection>>,
        command: &str,
        timeout: Duration,
    ) -> Result<String> {
        let mut connection = match slot.take() {
            Some(connection) => connection,
            None => self.transport.connect().await?,
        };

        match run_bounded(connection.as_mut(), command, timeout).await {
            Err(e @ RemoteShellError::Transport(_)) => {
                warn!("dropping single-shot connection after transport error: {}", e);
                if let Err(close_err) = connection.close().await {
                    debug!("closing broken connection: {}", close_err);
                }
                Err(e)
            }
            result => {
                *slot = Some(connection);
                Ok(result?.into_result()?.combined())
            }
        }
    }

    /// Close the connection if open. Errors are logged and dropped.
    pub async fn close(&self) {
        let connection = self.connection.lock().await.take();
        if let Some(mut connection) = connection {
            if let Err(e) = connection.close().await {
                warn!("error closing single-shot connection (ignored): {}", e);
            }
            info!("single-shot connection closed");
        }
    }
}
