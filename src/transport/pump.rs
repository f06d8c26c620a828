//! Bridges an interactive SSH channel to plain byte channels.
//!
//! The PTY engine reads with short timeouts and writes whole command lines.
//! Driving the russh channel from a dedicated task keeps those operations
//! cancel-safe: a read that times out just leaves bytes in the mpsc buffer.

use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::{ShellHandle, SSH_EXTENDED_DATA_STDERR};

/// Pump task state for one interactive channel.
pub(crate) struct ShellPump {
    channel: Channel<Msg>,
    input: mpsc::Receiver<Vec<u8>>,
    output: mpsc::Sender<Vec<u8>>,
    error: mpsc::Sender<Vec<u8>>,
}

impl ShellPump {
    /// Spawn a pump for `channel` and return the handle the engine uses.
    ///
    /// `buffer` bounds how many chunks may queue in each direction.
    pub(crate) fn spawn(channel: Channel<Msg>, buffer: usize) -> ShellHandle {
        let (input_tx, input_rx) = mpsc::channel(buffer);
        let (output_tx, output_rx) = mpsc::channel(buffer);
        let (error_tx, error_rx) = mpsc::channel(buffer);

        let pump = Self {
            channel,
            input: input_rx,
            output: output_tx,
            error: error_tx,
        };
        let task = tokio::spawn(pump.run());

        ShellHandle::new(input_tx, output_rx, error_rx, Some(task))
    }

    /// Run until either side goes away.
    ///
    /// Returns when:
    /// - the remote closes the channel or sends EOF
    /// - the input sender is dropped (the handle was closed)
    /// - the engine stopped reading output
    /// - writing to the channel fails
    async fn run(mut self) {
        loop {
            tokio::select! {
                input = self.input.recv() => match input {
                    Some(data) => {
                        trace!("shell pump: writing {} bytes", data.len());
                        if let Err(e) = self.channel.data(&data[..]).await {
                            warn!("shell pump: write failed: {}", e);
                            break;
                        }
                    }
                    None => {
                        debug!("shell pump: input closed, sending EOF");
                        let _ = self.channel.eof().await;
                        let _ = self.channel.close().await;
                        break;
                    }
                },
                msg = self.channel.wait() => match msg {
                    Some(ChannelMsg::Data { data }) => {
                        trace!("shell pump: read {} bytes", data.len());
                        if self.output.send(data.to_vec()).await.is_err() {
                            debug!("shell pump: output receiver dropped");
                            break;
                        }
                    }
                    Some(ChannelMsg::ExtendedData { data, ext }) if ext == SSH_EXTENDED_DATA_STDERR => {
                        trace!("shell pump: read {} stderr bytes", data.len());
                        let _ = self.error.send(data.to_vec()).await;
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        debug!("shell pump: remote shell exited with {}", exit_status);
                    }
                    Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                        debug!("shell pump: channel closed by remote");
                        break;
                    }
                    Some(_) => {}
                },
            }
        }
    }
}
