//! skiff-tty: local terminal context and scoped raw mode.
//!
//! This crate answers the two questions an interactive remote session asks
//! of the local machine: *what does my terminal look like* (descriptor,
//! type, dimensions) and *how do I put it into raw mode and get it back*.
//!
//! # Platform Support
//!
//! - **Unix**: termios via `rustix`
//! - **Other platforms**: console mode via `crossterm`
//!
//! # Quick Start
//!
//! ```ignore
//! use skiff_tty::{NativeTerminal, RawModeGuard, resolve_context};
//!
//! let terminal = NativeTerminal::stdin();
//! let ctx = resolve_context(&terminal)?;
//! println!("{} {}x{}", ctx.term, ctx.width, ctx.height);
//!
//! let guard = RawModeGuard::enter(&terminal)?;
//! // ... forward keystrokes ...
//! guard.restore()?;
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod unix;

#[cfg(not(unix))]
pub mod console;

// Re-export primary types
pub use config::{FALLBACK_TERM, TerminalContext, WindowSize};
pub use context::{RawModeGuard, resolve_context, resolve_context_with};
pub use error::{Result, TermError};
pub use traits::LocalTerminal;

/// The terminal implementation for the current platform.
#[cfg(unix)]
pub type NativeTerminal = unix::UnixTerminal;

/// The terminal implementation for the current platform.
#[cfg(not(unix))]
pub type NativeTerminal = console::ConsoleTerminal;

/// Resolve the context of the process's standard input.
///
/// # Errors
///
/// Returns an error if standard input is not a terminal or its size cannot
/// be queried.
pub fn stdin_context() -> Result<TerminalContext> {
    resolve_context(&NativeTerminal::stdin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_term() {
        assert_eq!(FALLBACK_TERM, "xterm");
    }

    #[test]
    fn stdin_context_matches_tty_state() {
        use std::io::IsTerminal;

        // Under a test harness stdin is usually not a terminal.
        let result = stdin_context();
        if std::io::stdin().is_terminal() {
            if let Err(e) = result {
                assert!(!e.is_not_a_terminal());
            }
        } else {
            assert!(result.unwrap_err().is_not_a_terminal());
        }
    }
}
