//! Interactive sessions on a remote pseudo-terminal.
//!
//! Every interactive call follows the same lifecycle:
//!
//! 1. Open a session.
//! 2. Resolve the local terminal context.
//! 3. Request a remote pty with the local type and size.
//! 4. Switch the local terminal into raw mode.
//! 5. Attach the local standard streams.
//! 6. Launch the shell (or command).
//! 7. Wait for it to finish.
//! 8. Restore the local terminal, then close the session.
//!
//! Step 8 runs on every path that got past step 1. The first error among
//! steps 2 to 7 is returned; failures while cleaning up are only logged.

use skiff_tty::{FALLBACK_TERM, LocalTerminal, NativeTerminal, RawModeGuard};

use crate::error::Result;
use crate::transport::{
    Connection, PtyRequest, RemoteSession, StdStreams, TerminalModes, close_session,
};

/// Options for an interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOptions {
    /// Modes sent with the pty request.
    pub modes: TerminalModes,
    /// Terminal type used when the local terminal declares none.
    pub fallback_term: String,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            modes: TerminalModes::default(),
            fallback_term: FALLBACK_TERM.to_string(),
        }
    }
}

impl ShellOptions {
    /// Options for running a single command: remote echo is turned off.
    #[must_use]
    pub fn command() -> Self {
        Self {
            modes: TerminalModes::default().echo(false),
            ..Self::default()
        }
    }

    /// Set the terminal modes.
    #[must_use]
    pub const fn modes(mut self, modes: TerminalModes) -> Self {
        self.modes = modes;
        self
    }

    /// Set the fallback terminal type.
    #[must_use]
    pub fn fallback_term(mut self, term: impl Into<String>) -> Self {
        self.fallback_term = term.into();
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum Launch<'a> {
    Shell,
    Command(&'a str),
}

/// Run the remote default shell on the process's own terminal.
///
/// Local input is read through the process-wide [`InputPump`](crate::InputPump);
/// keys typed after the shell exits are kept for the next session.
///
/// # Errors
///
/// Returns the first error of the lifecycle; see the module docs.
pub async fn run_interactive_shell<C: Connection>(connection: &C) -> Result<()> {
    run_interactive_shell_with(
        connection,
        &NativeTerminal::stdin(),
        StdStreams::process(),
        &ShellOptions::default(),
    )
    .await
}

/// Run the remote default shell on `terminal`, forwarding `streams`.
///
/// # Errors
///
/// Returns the first error of the lifecycle; see the module docs.
pub async fn run_interactive_shell_with<C, T>(
    connection: &C,
    terminal: &T,
    streams: StdStreams,
    options: &ShellOptions,
) -> Result<()>
where
    C: Connection,
    T: LocalTerminal + ?Sized,
{
    drive(connection, terminal, streams, options, Launch::Shell).await
}

/// Run `command` on a remote pty attached to the process's own terminal.
///
/// Remote echo is off.
///
/// # Errors
///
/// Returns the first error of the lifecycle, including an unsuccessful
/// exit of `command`.
pub async fn run_interactive_command<C: Connection>(connection: &C, command: &str) -> Result<()> {
    run_interactive_command_with(
        connection,
        &NativeTerminal::stdin(),
        StdStreams::process(),
        &ShellOptions::command(),
        command,
    )
    .await
}

/// Run `command` on a remote pty attached to `terminal`.
///
/// # Errors
///
/// Returns the first error of the lifecycle, including an unsuccessful
/// exit of `command`.
pub async fn run_interactive_command_with<C, T>(
    connection: &C,
    terminal: &T,
    streams: StdStreams,
    options: &ShellOptions,
    command: &str,
) -> Result<()>
where
    C: Connection,
    T: LocalTerminal + ?Sized,
{
    drive(connection, terminal, streams, options, Launch::Command(command)).await
}

async fn drive<C, T>(
    connection: &C,
    terminal: &T,
    streams: StdStreams,
    options: &ShellOptions,
    launch: Launch<'_>,
) -> Result<()>
where
    C: Connection,
    T: LocalTerminal + ?Sized,
{
    let mut session = connection.open_session().await?;
    let result = interact(&mut session, terminal, streams, options, launch).await;
    close_session(session).await;
    result
}

/// Steps 2 to 7, plus the terminal half of step 8.
async fn interact<S, T>(
    session: &mut S,
    terminal: &T,
    streams: StdStreams,
    options: &ShellOptions,
    launch: Launch<'_>,
) -> Result<()>
where
    S: RemoteSession,
    T: LocalTerminal + ?Sized,
{
    let context = skiff_tty::resolve_context_with(terminal, &options.fallback_term)?;
    tracing::debug!(
        term = %context.term,
        width = context.width,
        height = context.height,
        "Requesting remote pty"
    );
    session
        .request_pty(&PtyRequest::from_context(&context, options.modes))
        .await?;

    let guard = RawModeGuard::enter(terminal)?;
    session.attach(streams);

    let launched = match launch {
        Launch::Shell => session.shell().await,
        Launch::Command(command) => session.exec(command).await,
    };
    let outcome = match launched {
        Ok(()) => session.wait().await,
        Err(e) => Err(e),
    };

    if let Err(e) = guard.restore() {
        tracing::warn!(error = %e, "Failed to restore local terminal");
    }
    outcome
}
