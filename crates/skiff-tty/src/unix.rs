//! Unix terminal implementation.
//!
//! Terminal attributes go through `rustix::termios`: raw mode is the
//! `cfmakeraw` equivalent applied with `tcsetattr`, the window size comes
//! from `TIOCGWINSZ`.

use std::io::{self, Stdin};
use std::os::fd::{AsFd, AsRawFd};

use rustix::termios::{self, OptionalActions, Termios};

use crate::config::WindowSize;
use crate::error::{Result, TermError};
use crate::traits::LocalTerminal;

/// A terminal backed by a Unix file descriptor.
///
/// Defaults to standard input, which is the stream the interactive shell
/// forwards from.
#[derive(Debug)]
pub struct UnixTerminal<F = Stdin> {
    handle: F,
}

impl UnixTerminal<Stdin> {
    /// The process's standard input.
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(io::stdin())
    }
}

impl<F: AsFd> UnixTerminal<F> {
    /// Wrap any descriptor-bearing handle.
    pub const fn new(handle: F) -> Self {
        Self { handle }
    }
}

fn errno_to_io(errno: rustix::io::Errno) -> io::Error {
    io::Error::from_raw_os_error(errno.raw_os_error())
}

impl<F: AsFd + Send + Sync> LocalTerminal for UnixTerminal<F> {
    type Saved = Termios;

    fn descriptor(&self) -> i32 {
        self.handle.as_fd().as_raw_fd()
    }

    fn is_terminal(&self) -> bool {
        termios::isatty(self.handle.as_fd())
    }

    fn size(&self) -> Result<WindowSize> {
        let winsize = termios::tcgetwinsize(self.handle.as_fd())
            .map_err(|e| TermError::Size(errno_to_io(e)))?;

        Ok(WindowSize::with_pixels(
            winsize.ws_col,
            winsize.ws_row,
            winsize.ws_xpixel,
            winsize.ws_ypixel,
        ))
    }

    fn enter_raw(&self) -> Result<Termios> {
        let fd = self.handle.as_fd();
        let saved =
            termios::tcgetattr(fd).map_err(|e| TermError::GetAttributes(errno_to_io(e)))?;

        let mut raw = saved.clone();
        raw.make_raw();
        termios::tcsetattr(fd, OptionalActions::Now, &raw)
            .map_err(|e| TermError::SetAttributes(errno_to_io(e)))?;

        Ok(saved)
    }

    fn restore(&self, saved: &Termios) -> Result<()> {
        termios::tcsetattr(self.handle.as_fd(), OptionalActions::Now, saved)
            .map_err(|e| TermError::SetAttributes(errno_to_io(e)))
    }
}
