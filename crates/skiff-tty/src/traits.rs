//! Core trait for local terminal access.
//!
//! [`LocalTerminal`] is the seam between the interactive shell lifecycle and
//! the operating system. The native implementations live in the platform
//! modules; tests substitute in-memory terminals.

use crate::config::WindowSize;
use crate::error::Result;

/// A local terminal that can be inspected and switched into raw mode.
///
/// # Platform Behavior
///
/// - **Unix**: termios attributes and `TIOCGWINSZ` on a file descriptor.
/// - **Windows**: console modes through crossterm.
pub trait LocalTerminal: Send + Sync {
    /// Terminal state captured by [`enter_raw`](Self::enter_raw).
    type Saved: Send;

    /// Descriptor of the underlying stream.
    fn descriptor(&self) -> i32;

    /// Whether the stream is an interactive terminal device.
    fn is_terminal(&self) -> bool;

    /// The declared terminal type, if any.
    ///
    /// Reads `TERM` from the process environment by default.
    fn term(&self) -> Option<String> {
        std::env::var("TERM").ok()
    }

    /// Query the current window size from the OS.
    fn size(&self) -> Result<WindowSize>;

    /// Switch into raw mode, returning the state to restore later.
    fn enter_raw(&self) -> Result<Self::Saved>;

    /// Put back a state previously returned by [`enter_raw`](Self::enter_raw).
    fn restore(&self, saved: &Self::Saved) -> Result<()>;
}
