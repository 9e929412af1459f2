//! Error types for the skiff-tty crate.
//!
//! This module provides a unified error type [`TermError`] that covers every
//! way inspecting or reconfiguring the local terminal can fail.

use std::io;

/// The error type for local terminal operations.
#[derive(Debug, thiserror::Error)]
pub enum TermError {
    /// The inspected stream is not an interactive terminal device.
    #[error("not a real terminal (descriptor {descriptor})")]
    NotATerminal {
        /// The descriptor that was inspected.
        descriptor: i32,
    },

    /// The OS terminal-size query failed.
    #[error("failed to query terminal size: {0}")]
    Size(#[source] io::Error),

    /// Failed to read terminal attributes.
    #[error("failed to get terminal attributes: {0}")]
    GetAttributes(#[source] io::Error),

    /// Failed to set terminal attributes.
    #[error("failed to set terminal attributes: {0}")]
    SetAttributes(#[source] io::Error),

    /// Any other I/O error on the terminal.
    #[error("terminal I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TermError {
    /// Returns true when the failure was caused by a missing terminal.
    #[must_use]
    pub const fn is_not_a_terminal(&self) -> bool {
        matches!(self, Self::NotATerminal { .. })
    }
}

/// A specialized Result type for terminal operations.
pub type Result<T> = std::result::Result<T, TermError>;

#[cfg(unix)]
impl From<rustix::io::Errno> for TermError {
    fn from(errno: rustix::io::Errno) -> Self {
        Self::Io(io::Error::from_raw_os_error(errno.raw_os_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TermError::NotATerminal { descriptor: 0 };
        assert_eq!(err.to_string(), "not a real terminal (descriptor 0)");
        assert!(err.is_not_a_terminal());
    }

    #[test]
    fn error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err: TermError = io_err.into();
        assert!(matches!(err, TermError::Io(_)));
        assert!(!err.is_not_a_terminal());
    }

    #[cfg(unix)]
    #[test]
    fn error_from_errno() {
        let err: TermError = rustix::io::Errno::NOTTY.into();
        match err {
            TermError::Io(e) => {
                assert_eq!(e.raw_os_error(), Some(rustix::io::Errno::NOTTY.raw_os_error()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
