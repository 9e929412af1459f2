//! Console implementation for non-Unix platforms.
//!
//! crossterm tracks the original console mode itself, so the saved state is
//! only whether raw mode was already on.

use std::io::{self, IsTerminal};

use crate::config::WindowSize;
use crate::error::{Result, TermError};
use crate::traits::LocalTerminal;

/// The process console, reached through crossterm.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleTerminal;

impl ConsoleTerminal {
    /// The console attached to standard input.
    #[must_use]
    pub const fn stdin() -> Self {
        Self
    }
}

impl LocalTerminal for ConsoleTerminal {
    type Saved = bool;

    fn descriptor(&self) -> i32 {
        0
    }

    fn is_terminal(&self) -> bool {
        io::stdin().is_terminal()
    }

    fn size(&self) -> Result<WindowSize> {
        let (cols, rows) = crossterm::terminal::size().map_err(TermError::Size)?;
        Ok(WindowSize::new(cols, rows))
    }

    fn enter_raw(&self) -> Result<bool> {
        let was_raw =
            crossterm::terminal::is_raw_mode_enabled().map_err(TermError::GetAttributes)?;
        crossterm::terminal::enable_raw_mode().map_err(TermError::SetAttributes)?;
        Ok(was_raw)
    }

    fn restore(&self, was_raw: &bool) -> Result<()> {
        if *was_raw {
            return Ok(());
        }
        crossterm::terminal::disable_raw_mode().map_err(TermError::SetAttributes)
    }
}
