//! Terminal dimensions and the resolved terminal context.
//!
//! [`WindowSize`] mirrors the kernel `winsize` record and
//! [`TerminalContext`] is the snapshot handed to a remote pty request.

/// Terminal type used when the environment does not declare one.
pub const FALLBACK_TERM: &str = "xterm";

/// Terminal window size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Number of columns (characters per line).
    pub cols: u16,
    /// Number of rows (lines).
    pub rows: u16,
    /// Pixel width (optional, often 0).
    pub xpixel: u16,
    /// Pixel height (optional, often 0).
    pub ypixel: u16,
}

impl WindowSize {
    /// Create a new window size with the given dimensions.
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            xpixel: 0,
            ypixel: 0,
        }
    }

    /// Create a window size with pixel dimensions.
    #[must_use]
    pub const fn with_pixels(cols: u16, rows: u16, xpixel: u16, ypixel: u16) -> Self {
        Self {
            cols,
            rows,
            xpixel,
            ypixel,
        }
    }
}

impl From<(u16, u16)> for WindowSize {
    fn from((cols, rows): (u16, u16)) -> Self {
        Self::new(cols, rows)
    }
}

/// Snapshot of the local terminal taken right before a remote pty request.
///
/// The snapshot is never cached: every interactive session resolves a
/// fresh one, so a resize between sessions is picked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalContext {
    /// Descriptor of the inspected terminal stream.
    pub descriptor: i32,
    /// Terminal type (the `TERM` value, or [`FALLBACK_TERM`]).
    pub term: String,
    /// Width in columns.
    pub width: u16,
    /// Height in rows.
    pub height: u16,
}

impl TerminalContext {
    /// The context's dimensions as a [`WindowSize`].
    #[must_use]
    pub const fn window_size(&self) -> WindowSize {
        WindowSize::new(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_size_from_tuple() {
        let size = WindowSize::from((120, 40));
        assert_eq!(size.cols, 120);
        assert_eq!(size.rows, 40);
    }

    #[test]
    fn context_window_size() {
        let ctx = TerminalContext {
            descriptor: 0,
            term: FALLBACK_TERM.into(),
            width: 100,
            height: 30,
        };
        assert_eq!(ctx.window_size(), WindowSize::new(100, 30));
    }
}
