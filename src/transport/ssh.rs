//! SSH transport built on russh.

use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use tracing::{debug, info, warn};

use super::pump::ShellPump;
use super::{
    Connection, Credential, PtySize, RemoteOutput, ShellHandle, SshTarget, Transport,
    SSH_EXTENDED_DATA_STDERR,
};
use crate::error::RemoteShellError;
use crate::Result;

/// Chunks buffered per direction between a shell channel and the engine.
const SHELL_CHANNEL_BUFFER: usize = 256;

/// Opens russh client connections to one configured host.
pub struct SshTransport {
    target: SshTarget,
    config: Arc<client::Config>,
}

impl SshTransport {
    /// Create a transport for the given target.
    pub fn new(target: SshTarget) -> Self {
        Self {
            target,
            config: Arc::new(client::Config::default()),
        }
    }

    /// The target this transport connects to.
    pub fn target(&self) -> &SshTarget {
        &self.target
    }

    async fn connect_inner(&self) -> Result<Handle<HostKeyCheck>> {
        let handler = HostKeyCheck {
            expected: self.target.host_key_fingerprint.clone(),
        };

        let mut handle = client::connect(
            Arc::clone(&self.config),
            (self.target.host.as_str(), self.target.port),
            handler,
        )
        .await
        .map_err(|e| RemoteShellError::Connect(e.to_string()))?;

        let authenticated = match &self.target.credential {
            Credential::Password(password) => {
                handle
                    .authenticate_password(&self.target.username, password)
                    .await?
            }
            Credential::KeyFile { path, passphrase } => {
                let key = russh_keys::load_secret_key(path, passphrase.as_deref())?;
                handle
                    .authenticate_publickey(&self.target.username, Arc::new(key))
                    .await?
            }
        };

        if !authenticated {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "authentication failed", "en")
                .await;
            return Err(RemoteShellError::Auth(format!(
                "host rejected credentials for {}",
                self.target.username
            )));
        }

        Ok(handle)
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let name = self.target.display_name();
        debug!("connecting to {}", name);

        let handle = tokio::time::timeout(self.target.connect_timeout, self.connect_inner())
            .await
            .map_err(|_| {
                RemoteShellError::Connect(format!(
                    "timed out after {}s connecting to {}",
                    self.target.connect_timeout.as_secs(),
                    name
                ))
            })??;

        info!("SSH connection established to {}", name);
        Ok(Box::new(SshConnection { handle }))
    }
}

/// russh client handler; only host key verification is customized.
struct HostKeyCheck {
    expected: Option<String>,
}

#[async_trait]
impl client::Handler for HostKeyCheck {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();
        match &self.expected {
            Some(expected) => {
                let expected = expected.trim_start_matches("SHA256:");
                let matches = expected == fingerprint;
                if !matches {
                    warn!(
                        "host key mismatch: expected SHA256:{}, got SHA256:{}",
                        expected, fingerprint
                    );
                }
                Ok(matches)
            }
            None => {
                warn!(
                    "accepting unverified host key SHA256:{} (no fingerprint configured)",
                    fingerprint
                );
                Ok(true)
            }
        }
    }
}

/// One authenticated russh session.
struct SshConnection {
    handle: Handle<HostKeyCheck>,
}

#[async_trait]
impl Connection for SshConnection {
    async fn run(&mut self, command: &str) -> Result<RemoteOutput> {
        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext } if ext == SSH_EXTENDED_DATA_STDERR => {
                    stderr.extend_from_slice(data)
                }
                ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
                _ => {}
            }
        }

        Ok(RemoteOutput {
            exit_status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    async fn spawn_shell(&mut self, term: &str, size: PtySize) -> Result<ShellHandle> {
        let channel = self.handle.channel_open_session().await?;
        channel
            .request_pty(
                true,
                term,
                u32::from(size.cols),
                u32::from(size.rows),
                0,
                0,
                &[],
            )
            .await?;
        channel.request_shell(true).await?;
        debug!("interactive shell attached ({}, {}x{})", term, size.cols, size.rows);

        Ok(ShellPump::spawn(channel, SHELL_CHANNEL_BUFFER))
    }

    async fn close(&mut self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "session closed", "en")
            .await?;
        Ok(())
    }
}
