//! Session channels over `russh`.

use std::fmt;

use russh::client::Msg;
use russh::{Channel, ChannelMsg, Pty, Sig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, ExitStatus, Phase, Result};
use crate::transport::{PtyRequest, RemoteSession, StdStreams, TerminalModes};

/// Size of the buffer used when forwarding local input.
const INPUT_CHUNK: usize = 4096;

/// One session channel.
pub struct RusshSession {
    channel: Channel<Msg>,
    streams: Option<StdStreams>,
}

impl RusshSession {
    /// Wrap an open channel.
    #[must_use]
    pub const fn new(channel: Channel<Msg>) -> Self {
        Self {
            channel,
            streams: None,
        }
    }

    /// Wait for the reply to a request sent with `want_reply`.
    async fn await_reply(&mut self, phase: Phase) -> Result<()> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Success) => return Ok(()),
                Some(ChannelMsg::Failure) => {
                    return Err(Error::remote(phase, "request refused by server"));
                }
                Some(other) => {
                    tracing::trace!(?other, "Ignoring message while awaiting reply");
                }
                None => return Err(Error::remote(phase, "channel closed")),
            }
        }
    }
}

impl fmt::Debug for RusshSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RusshSession")
            .field("id", &self.channel.id())
            .field("attached", &self.streams.is_some())
            .finish()
    }
}

fn signal_name(signal: &Sig) -> String {
    match signal {
        Sig::Custom(name) => name.clone(),
        other => format!("{other:?}"),
    }
}

/// Encode terminal modes for the wire.
fn encode_modes(modes: &TerminalModes) -> Vec<(Pty, u32)> {
    let mut encoded = vec![
        (Pty::TTY_OP_ISPEED, modes.input_baud),
        (Pty::TTY_OP_OSPEED, modes.output_baud),
    ];
    if let Some(echo) = modes.echo {
        encoded.push((Pty::ECHO, u32::from(echo)));
    }
    encoded
}

impl RemoteSession for RusshSession {
    async fn combined_output(&mut self, command: &str) -> Result<Vec<u8>> {
        self.channel
            .exec(true, command)
            .await
            .map_err(|e| Error::remote(Phase::Exec, e.to_string()))?;

        let mut output = Vec::new();
        let mut status = ExitStatus::Missing;
        while let Some(msg) = self.channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } | ChannelMsg::ExtendedData { ref data, ext: 1 } => {
                    output.extend_from_slice(data);
                }
                ChannelMsg::ExitStatus { exit_status } => status = ExitStatus::Code(exit_status),
                ChannelMsg::ExitSignal { ref signal_name, .. } => {
                    status = ExitStatus::Signal(self::signal_name(signal_name));
                }
                ChannelMsg::Failure => {
                    return Err(Error::remote(Phase::Exec, "request refused by server"));
                }
                _ => {}
            }
        }

        tracing::debug!(command, %status, bytes = output.len(), "Remote command finished");
        status.check(output)
    }

    async fn request_pty(&mut self, request: &PtyRequest) -> Result<()> {
        self.channel
            .request_pty(
                true,
                &request.term,
                request.width,
                request.height,
                0,
                0,
                &encode_modes(&request.modes),
            )
            .await
            .map_err(|e| Error::remote(Phase::PtyRequest, e.to_string()))?;
        self.await_reply(Phase::PtyRequest).await
    }

    fn attach(&mut self, streams: StdStreams) {
        self.streams = Some(streams);
    }

    async fn shell(&mut self) -> Result<()> {
        self.channel
            .request_shell(true)
            .await
            .map_err(|e| Error::remote(Phase::ShellLaunch, e.to_string()))?;
        self.await_reply(Phase::ShellLaunch).await
    }

    async fn exec(&mut self, command: &str) -> Result<()> {
        self.channel
            .exec(true, command)
            .await
            .map_err(|e| Error::remote(Phase::Exec, e.to_string()))?;
        self.await_reply(Phase::Exec).await
    }

    async fn wait(&mut self) -> Result<()> {
        let Some(streams) = self.streams.as_mut() else {
            return Err(Error::remote(Phase::Wait, "no local streams attached"));
        };
        let wait_failed = |e: russh::Error| Error::remote(Phase::Wait, e.to_string());

        let mut buf = vec![0u8; INPUT_CHUNK];
        let mut stdin_open = true;
        let mut status = ExitStatus::Missing;

        loop {
            tokio::select! {
                read = streams.stdin.read(&mut buf), if stdin_open => match read {
                    Ok(0) => {
                        stdin_open = false;
                        self.channel.eof().await.map_err(wait_failed)?;
                    }
                    Ok(n) => self.channel.data(&buf[..n]).await.map_err(wait_failed)?,
                    Err(e) => return Err(Error::io_context("failed to read local input", e)),
                },
                msg = self.channel.wait() => match msg {
                    Some(ChannelMsg::Data { ref data }) => {
                        streams.stdout.write_all(data).await?;
                        streams.stdout.flush().await?;
                    }
                    Some(ChannelMsg::ExtendedData { ref data, ext: 1 }) => {
                        streams.stderr.write_all(data).await?;
                        streams.stderr.flush().await?;
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        status = ExitStatus::Code(exit_status);
                    }
                    Some(ChannelMsg::ExitSignal { ref signal_name, .. }) => {
                        status = ExitStatus::Signal(self::signal_name(signal_name));
                    }
                    Some(_) => {}
                    None => break,
                },
            }
        }

        tracing::debug!(%status, "Remote side finished");
        status.check(Vec::new()).map(drop)
    }

    async fn close(self) -> Result<()> {
        self.channel
            .close()
            .await
            .map_err(|e| Error::remote(Phase::SessionClose, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_modes_carry_only_baud_rates() {
        let modes = encode_modes(&TerminalModes::default());
        assert_eq!(
            modes,
            [(Pty::TTY_OP_ISPEED, 14_400), (Pty::TTY_OP_OSPEED, 14_400)]
        );
    }

    #[test]
    fn echo_is_encoded_when_set() {
        let modes = encode_modes(&TerminalModes::default().echo(false));
        assert_eq!(modes.last(), Some(&(Pty::ECHO, 0)));
        let modes = encode_modes(&TerminalModes::default().echo(true));
        assert_eq!(modes.last(), Some(&(Pty::ECHO, 1)));
    }

    #[test]
    fn signal_names() {
        assert_eq!(signal_name(&Sig::TERM), "TERM");
        assert_eq!(signal_name(&Sig::Custom("XCPU".into())), "XCPU");
    }
}
