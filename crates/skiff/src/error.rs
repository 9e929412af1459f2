//! Error types for skiff.
//!
//! Every failure is classified so that callers (and the connect loop) can
//! tell a rejected credential from an unreachable host, and a protocol
//! refusal from a postcondition that did not hold.

use std::fmt;
use std::io;
use std::time::Duration;

use skiff_tty::TermError;

/// Step of a remote operation, used to prefix remote errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Opening a session channel.
    SessionOpen,
    /// Requesting a remote pseudo-terminal.
    PtyRequest,
    /// Launching the remote default shell.
    ShellLaunch,
    /// Starting a remote command.
    Exec,
    /// Waiting for the remote side to finish.
    Wait,
    /// Closing a session channel.
    SessionClose,
    /// Opening the SFTP subsystem.
    SftpOpen,
    /// Creating or truncating a remote file.
    Create,
    /// Writing remote file contents.
    Write,
    /// Setting remote permission bits.
    Chmod,
    /// Querying remote metadata without following links.
    Lstat,
    /// Opening a remote file for reading.
    Open,
    /// Reading remote file contents.
    Read,
    /// Removing a remote path.
    Remove,
    /// Renaming a remote path.
    Rename,
    /// Closing the SFTP subsystem.
    SftpClose,
}

impl Phase {
    /// Human readable name of the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SessionOpen => "session open",
            Self::PtyRequest => "pty request",
            Self::ShellLaunch => "shell launch",
            Self::Exec => "exec",
            Self::Wait => "wait",
            Self::SessionClose => "session close",
            Self::SftpOpen => "sftp open",
            Self::Create => "create",
            Self::Write => "write",
            Self::Chmod => "chmod",
            Self::Lstat => "lstat",
            Self::Open => "open",
            Self::Read => "read",
            Self::Remove => "remove",
            Self::Rename => "rename",
            Self::SftpClose => "sftp close",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutating file operation whose postcondition is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create, write and chmod of a remote file.
    Write,
    /// Removal of a remote path.
    Remove,
    /// Rename of a remote path.
    Move,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Write => "write",
            Self::Remove => "removal",
            Self::Move => "move",
        })
    }
}

/// How a remote process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    /// The process exited with the given code.
    Code(u32),
    /// The process was terminated by the named signal.
    Signal(String),
    /// The channel closed without an exit report.
    Missing,
}

impl ExitStatus {
    /// Check if the process exited successfully (exit code 0).
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self, Self::Code(0))
    }

    /// Pass `output` through on success, otherwise wrap it in
    /// [`Error::RemoteExit`].
    pub fn check(self, output: Vec<u8>) -> Result<Vec<u8>> {
        if self.success() {
            Ok(output)
        } else {
            Err(Error::RemoteExit {
                status: self,
                output,
            })
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exited with status {code}"),
            Self::Signal(signal) => write!(f, "was terminated by signal {signal}"),
            Self::Missing => f.write_str("exited without reporting a status"),
        }
    }
}

/// The main error type for skiff operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// The server rejected a credential method.
    #[error("authentication rejected for user '{user}' ({method}): {reason}")]
    AuthRejected {
        /// The user that tried to authenticate.
        user: String,
        /// Name of the credential method.
        method: &'static str,
        /// Why the method did not succeed.
        reason: String,
    },

    /// Transport-level connection failure.
    #[error("failed to connect to {address}: {reason}")]
    Connection {
        /// The dialed address.
        address: String,
        /// The reason for the failure.
        reason: String,
    },

    /// The server's host key was not accepted.
    #[error("host key verification failed for {address}")]
    HostKey {
        /// The dialed address.
        address: String,
    },

    /// The dial did not complete in time.
    #[error("connection to {address} timed out after {duration:?}")]
    Timeout {
        /// The dialed address.
        address: String,
        /// The configured dial timeout.
        duration: Duration,
    },

    /// The local terminal could not be inspected or reconfigured.
    #[error(transparent)]
    Terminal(#[from] TermError),

    /// A remote operation failed.
    #[error("{phase} failed: {reason}")]
    Remote {
        /// The phase that failed.
        phase: Phase,
        /// The reason reported by the transport or file protocol.
        reason: String,
    },

    /// A remote path does not exist.
    #[error("{phase} failed: no such file '{path}'")]
    NotFound {
        /// The phase that failed.
        phase: Phase,
        /// The missing path.
        path: String,
    },

    /// A remote command or shell did not exit successfully.
    #[error("remote command {status}")]
    RemoteExit {
        /// How the process ended.
        status: ExitStatus,
        /// Output captured before the failure.
        output: Vec<u8>,
    },

    /// The protocol reported success but the resulting state disagrees.
    #[error("postcondition violated after {operation} of '{path}': {detail}")]
    Postcondition {
        /// The verified operation.
        operation: Operation,
        /// The path that was verified.
        path: String,
        /// What the verification observed.
        detail: String,
    },

    /// I/O error with additional context.
    #[error("{context}: {source}")]
    IoWithContext {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Local I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an authentication rejection.
    pub fn auth_rejected(
        user: impl Into<String>,
        method: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::AuthRejected {
            user: user.into(),
            method,
            reason: reason.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connection {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Create a remote error for `phase`.
    pub fn remote(phase: Phase, reason: impl Into<String>) -> Self {
        Self::Remote {
            phase,
            reason: reason.into(),
        }
    }

    /// Create a not-found error for `phase`.
    pub fn not_found(phase: Phase, path: impl Into<String>) -> Self {
        Self::NotFound {
            phase,
            path: path.into(),
        }
    }

    /// Create a postcondition violation.
    pub fn postcondition(
        operation: Operation,
        path: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Postcondition {
            operation,
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: io::Error) -> Self {
        Self::IoWithContext {
            context: context.into(),
            source,
        }
    }

    /// Check if this is an authentication rejection.
    #[must_use]
    pub const fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::AuthRejected { .. })
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Check if a remote path was missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a postcondition violation.
    #[must_use]
    pub const fn is_postcondition(&self) -> bool {
        matches!(self, Self::Postcondition { .. })
    }

    /// The remote phase that failed, if any.
    #[must_use]
    pub const fn phase(&self) -> Option<Phase> {
        match self {
            Self::Remote { phase, .. } | Self::NotFound { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Output captured before a remote command failed.
    #[must_use]
    pub fn output(&self) -> Option<&[u8]> {
        match self {
            Self::RemoteExit { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Result type alias for skiff operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::config("no authentication methods");
        assert_eq!(
            err.to_string(),
            "configuration error: no authentication methods"
        );

        let err = Error::remote(Phase::PtyRequest, "request rejected by server");
        assert_eq!(err.to_string(), "pty request failed: request rejected by server");
        assert_eq!(err.phase(), Some(Phase::PtyRequest));

        let err = Error::not_found(Phase::Lstat, "/tmp/x");
        assert_eq!(err.to_string(), "lstat failed: no such file '/tmp/x'");
    }

    #[test]
    fn auth_rejection_predicate() {
        let err = Error::auth_rejected("deploy", "password", "server said no");
        assert!(err.is_auth_rejection());
        assert!(err.to_string().contains("deploy"));
        assert!(err.to_string().contains("password"));

        assert!(!Error::connection("h:22", "refused").is_auth_rejection());
    }

    #[test]
    fn postcondition_is_distinct() {
        let err = Error::postcondition(Operation::Remove, "/srv/a", "path is still present");
        assert!(err.is_postcondition());
        assert!(!err.is_not_found());
        assert_eq!(err.phase(), None);
        assert_eq!(
            err.to_string(),
            "postcondition violated after removal of '/srv/a': path is still present"
        );
    }

    #[test]
    fn exit_error_keeps_output() {
        let err = Error::RemoteExit {
            status: ExitStatus::Code(2),
            output: b"partial".to_vec(),
        };
        assert_eq!(err.output(), Some(&b"partial"[..]));
        assert_eq!(err.to_string(), "remote command exited with status 2");
    }

    #[test]
    fn exit_status_display() {
        assert!(ExitStatus::Code(0).success());
        assert!(!ExitStatus::Missing.success());
        assert_eq!(
            ExitStatus::Signal("KILL".into()).to_string(),
            "was terminated by signal KILL"
        );
    }

    #[test]
    fn exit_check() {
        assert_eq!(ExitStatus::Code(0).check(b"ok".to_vec()).unwrap(), b"ok");
        let err = ExitStatus::Missing.check(b"half".to_vec()).unwrap_err();
        assert_eq!(err.output(), Some(&b"half"[..]));
    }

    #[test]
    fn terminal_errors_convert() {
        let err: Error = TermError::NotATerminal { descriptor: 0 }.into();
        assert!(matches!(err, Error::Terminal(_)));
        assert!(err.to_string().contains("not a real terminal"));
    }
}
