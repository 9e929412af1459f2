//! Non-interactive command execution.

use crate::error::Result;
use crate::transport::{Connection, RemoteSession, close_session};

/// Run `command` on a fresh session and return its merged stdout and stderr.
///
/// The session is closed on every path. A command that exits non-zero, is
/// killed by a signal or never reports a status fails with
/// [`Error::RemoteExit`](crate::Error::RemoteExit), which still carries the
/// captured output.
///
/// # Errors
///
/// Returns an error if the session cannot be opened or the command fails.
pub async fn run_command<C: Connection>(connection: &C, command: &str) -> Result<Vec<u8>> {
    let mut session = connection.open_session().await?;
    tracing::debug!(command, "Running remote command");

    let result = session.combined_output(command).await;
    close_session(session).await;
    result
}
