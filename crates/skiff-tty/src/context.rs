//! Terminal context resolution and scoped raw mode.

use crate::config::{FALLBACK_TERM, TerminalContext};
use crate::error::{Result, TermError};
use crate::traits::LocalTerminal;

/// Resolve the terminal context of `terminal`.
///
/// Fails with [`TermError::NotATerminal`] when the stream is not an
/// interactive terminal. An unset or empty `TERM` falls back to
/// [`FALLBACK_TERM`]. The size is queried live and passed through as
/// reported, `0x0` included; only a failed query is an error.
pub fn resolve_context<T: LocalTerminal + ?Sized>(terminal: &T) -> Result<TerminalContext> {
    resolve_context_with(terminal, FALLBACK_TERM)
}

/// Like [`resolve_context`], with `fallback_term` used when `TERM` is unset
/// or empty.
pub fn resolve_context_with<T: LocalTerminal + ?Sized>(
    terminal: &T,
    fallback_term: &str,
) -> Result<TerminalContext> {
    let descriptor = terminal.descriptor();
    if !terminal.is_terminal() {
        return Err(TermError::NotATerminal { descriptor });
    }

    let term = terminal
        .term()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback_term.to_string());
    let size = terminal.size()?;

    tracing::debug!(
        descriptor,
        term = %term,
        width = size.cols,
        height = size.rows,
        "Resolved terminal context"
    );

    Ok(TerminalContext {
        descriptor,
        term,
        width: size.cols,
        height: size.rows,
    })
}

/// Raw mode held for the lifetime of the guard.
///
/// The prior terminal state is captured on entry and put back either by
/// [`restore`](Self::restore) or, on any other exit path, by `Drop`.
#[must_use = "raw mode is restored as soon as the guard is dropped"]
pub struct RawModeGuard<'a, T: LocalTerminal + ?Sized> {
    terminal: &'a T,
    saved: Option<T::Saved>,
}

impl<'a, T: LocalTerminal + ?Sized> RawModeGuard<'a, T> {
    /// Switch `terminal` into raw mode.
    pub fn enter(terminal: &'a T) -> Result<Self> {
        let saved = terminal.enter_raw()?;
        tracing::debug!(descriptor = terminal.descriptor(), "Entered raw mode");
        Ok(Self {
            terminal,
            saved: Some(saved),
        })
    }

    /// Restore the captured state now, reporting any failure.
    pub fn restore(mut self) -> Result<()> {
        self.restore_inner()
    }

    fn restore_inner(&mut self) -> Result<()> {
        match self.saved.take() {
            Some(saved) => {
                self.terminal.restore(&saved)?;
                tracing::debug!(descriptor = self.terminal.descriptor(), "Restored terminal mode");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl<T: LocalTerminal + ?Sized> Drop for RawModeGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.restore_inner() {
            tracing::warn!(error = %e, "Failed to restore terminal mode");
        }
    }
}

impl<T: LocalTerminal + ?Sized> std::fmt::Debug for RawModeGuard<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawModeGuard")
            .field("descriptor", &self.terminal.descriptor())
            .field("active", &self.saved.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;

    use super::*;
    use crate::config::WindowSize;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Mode {
        Cooked,
        Raw,
    }

    struct ScriptedTerminal {
        tty: bool,
        term: Option<String>,
        size: Option<WindowSize>,
        fail_restore: bool,
        mode: Mutex<Mode>,
    }

    impl ScriptedTerminal {
        fn new() -> Self {
            Self {
                tty: true,
                term: Some("screen-256color".into()),
                size: Some(WindowSize::new(132, 43)),
                fail_restore: false,
                mode: Mutex::new(Mode::Cooked),
            }
        }

        fn mode(&self) -> Mode {
            *self.mode.lock().unwrap()
        }
    }

    impl LocalTerminal for ScriptedTerminal {
        type Saved = Mode;

        fn descriptor(&self) -> i32 {
            7
        }

        fn is_terminal(&self) -> bool {
            self.tty
        }

        fn term(&self) -> Option<String> {
            self.term.clone()
        }

        fn size(&self) -> Result<WindowSize> {
            self.size
                .ok_or_else(|| TermError::Size(io::Error::other("ioctl failed")))
        }

        fn enter_raw(&self) -> Result<Mode> {
            let mut mode = self.mode.lock().unwrap();
            let prior = *mode;
            *mode = Mode::Raw;
            Ok(prior)
        }

        fn restore(&self, saved: &Mode) -> Result<()> {
            if self.fail_restore {
                return Err(TermError::SetAttributes(io::Error::other("tcsetattr")));
            }
            *self.mode.lock().unwrap() = *saved;
            Ok(())
        }
    }

    #[test]
    fn resolves_declared_term_and_size() {
        let terminal = ScriptedTerminal::new();
        let ctx = resolve_context(&terminal).unwrap();
        assert_eq!(ctx.descriptor, 7);
        assert_eq!(ctx.term, "screen-256color");
        assert_eq!((ctx.width, ctx.height), (132, 43));
    }

    #[test]
    fn missing_term_falls_back() {
        let mut terminal = ScriptedTerminal::new();
        terminal.term = None;
        assert_eq!(resolve_context(&terminal).unwrap().term, FALLBACK_TERM);

        terminal.term = Some(String::new());
        assert_eq!(resolve_context(&terminal).unwrap().term, FALLBACK_TERM);
    }

    #[test]
    fn not_a_terminal() {
        let mut terminal = ScriptedTerminal::new();
        terminal.tty = false;
        let err = resolve_context(&terminal).unwrap_err();
        assert!(err.is_not_a_terminal());
        assert!(err.to_string().contains("not a real terminal"));
    }

    #[test]
    fn size_failure_is_not_defaulted() {
        let mut terminal = ScriptedTerminal::new();
        terminal.size = None;
        assert!(matches!(
            resolve_context(&terminal),
            Err(TermError::Size(_))
        ));
    }

    #[test]
    fn zero_size_is_passed_through() {
        let mut terminal = ScriptedTerminal::new();
        terminal.size = Some(WindowSize::new(0, 0));
        let context = resolve_context(&terminal).unwrap();
        assert_eq!((context.width, context.height), (0, 0));
    }

    #[test]
    fn custom_fallback_term() {
        let mut terminal = ScriptedTerminal::new();
        terminal.term = Some(String::new());
        assert_eq!(resolve_context_with(&terminal, "vt100").unwrap().term, "vt100");

        terminal.term = Some("screen".into());
        assert_eq!(resolve_context_with(&terminal, "vt100").unwrap().term, "screen");
    }

    #[test]
    fn guard_restores_on_drop() {
        let terminal = ScriptedTerminal::new();
        {
            let _guard = RawModeGuard::enter(&terminal).unwrap();
            assert_eq!(terminal.mode(), Mode::Raw);
        }
        assert_eq!(terminal.mode(), Mode::Cooked);
    }

    #[test]
    fn explicit_restore_reports_errors() {
        let mut terminal = ScriptedTerminal::new();
        terminal.fail_restore = true;
        let guard = RawModeGuard::enter(&terminal).unwrap();
        assert!(matches!(guard.restore(), Err(TermError::SetAttributes(_))));
    }

    #[test]
    fn explicit_restore_runs_once() {
        let terminal = ScriptedTerminal::new();
        let guard = RawModeGuard::enter(&terminal).unwrap();
        guard.restore().unwrap();
        assert_eq!(terminal.mode(), Mode::Cooked);
    }
}
