//! Transport and file-protocol seams.
//!
//! The operations in this crate are written against these traits rather
//! than against `russh` directly:
//!
//! - [`Dialer`]: one dial plus one authentication attempt.
//! - [`Connection`]: an authenticated connection that hands out sessions.
//! - [`RemoteSession`]: a single-use logical channel.
//! - [`FileProtocol`]: a single-use SFTP session.
//!
//! The production implementations live in [`crate::backend::ssh`].

mod stdin;

use std::fmt;
use std::future::Future;

use skiff_tty::TerminalContext;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::auth::AuthMethod;
use crate::config::ClientConfig;
use crate::error::Result;

pub use stdin::{InputPump, PumpReader};

/// Baud rate advertised for the remote pseudo-terminal, both directions.
pub const PTY_BAUD_RATE: u32 = 14_400;

/// One dial attempt: the base configuration plus exactly one method.
///
/// Built fresh for every attempt and never mutated.
#[derive(Debug, Clone, Copy)]
pub struct Attempt<'a> {
    /// Address as given by the caller.
    pub address: &'a str,
    /// Shared base configuration.
    pub config: &'a ClientConfig,
    /// The only method this attempt may use.
    pub method: &'a AuthMethod,
    /// Position of the method in the configured list.
    pub index: usize,
}

impl<'a> Attempt<'a> {
    /// Pair the base configuration with one method.
    #[must_use]
    pub const fn new(
        address: &'a str,
        config: &'a ClientConfig,
        method: &'a AuthMethod,
        index: usize,
    ) -> Self {
        Self {
            address,
            config,
            method,
            index,
        }
    }

    /// The login user.
    #[must_use]
    pub fn username(&self) -> &'a str {
        self.config.username()
    }
}

/// Opens authenticated connections.
pub trait Dialer: Send + Sync {
    /// Connection produced on success.
    type Connection: Connection;

    /// Dial and authenticate with the attempt's single method.
    ///
    /// A rejected credential must surface as
    /// [`Error::AuthRejected`](crate::Error::AuthRejected) and must not leave
    /// a transport open.
    fn dial(&self, attempt: &Attempt<'_>) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// An open, authenticated connection to one host.
pub trait Connection: Send + Sync {
    /// Logical session channel type.
    type Session: RemoteSession;
    /// File transfer session type.
    type Files: FileProtocol;

    /// Open a fresh session channel.
    fn open_session(&self) -> impl Future<Output = Result<Self::Session>> + Send;

    /// Open a fresh file transfer session.
    fn open_file_session(&self) -> impl Future<Output = Result<Self::Files>> + Send;

    /// Close the connection. Consumes the handle so it closes once.
    fn close(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}

/// A single-use logical channel.
pub trait RemoteSession: Send {
    /// Run `command` non-interactively, returning stdout and stderr merged.
    ///
    /// A failed command yields [`Error::RemoteExit`](crate::Error::RemoteExit)
    /// carrying whatever output was captured.
    fn combined_output(&mut self, command: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Request a remote pseudo-terminal.
    fn request_pty(&mut self, request: &PtyRequest) -> impl Future<Output = Result<()>> + Send;

    /// Bind local streams for a later [`wait`](Self::wait).
    fn attach(&mut self, streams: StdStreams);

    /// Launch the remote default shell.
    fn shell(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Launch `command` on the allocated pseudo-terminal.
    fn exec(&mut self, command: &str) -> impl Future<Output = Result<()>> + Send;

    /// Forward the attached streams until the remote side exits or closes.
    fn wait(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Close the channel.
    fn close(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}

/// A single-use file transfer session.
pub trait FileProtocol: Send {
    /// Create or truncate `path` and write all of `data`.
    fn create(&mut self, path: &str, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Set the permission bits of `path`.
    fn chmod(&mut self, path: &str, mode: u32) -> impl Future<Output = Result<()>> + Send;

    /// Query metadata of `path` without following a final symlink.
    ///
    /// A missing path yields [`Error::NotFound`](crate::Error::NotFound).
    fn lstat(&mut self, path: &str) -> impl Future<Output = Result<RemoteMetadata>> + Send;

    /// Read the whole of `path`.
    fn read(&mut self, path: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Remove a file or an empty directory.
    fn remove(&mut self, path: &str) -> impl Future<Output = Result<()>> + Send;

    /// Rename `from` to `to`.
    fn rename(&mut self, from: &str, to: &str) -> impl Future<Output = Result<()>> + Send;

    /// Close the session.
    fn close(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}

/// Close a session, logging instead of returning a failure.
pub(crate) async fn close_session<S: RemoteSession>(session: S) {
    if let Err(e) = session.close().await {
        tracing::debug!(error = %e, "Session close failed");
    }
}

/// Close a file session, logging instead of returning a failure.
pub(crate) async fn close_files<F: FileProtocol>(files: F) {
    if let Err(e) = files.close().await {
        tracing::debug!(error = %e, "SFTP session close failed");
    }
}

/// Terminal modes sent with a pty request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalModes {
    /// Input baud rate.
    pub input_baud: u32,
    /// Output baud rate.
    pub output_baud: u32,
    /// Remote echo flag; `None` leaves the server default.
    pub echo: Option<bool>,
}

impl Default for TerminalModes {
    fn default() -> Self {
        Self {
            input_baud: PTY_BAUD_RATE,
            output_baud: PTY_BAUD_RATE,
            echo: None,
        }
    }
}

impl TerminalModes {
    /// Set the remote echo flag.
    #[must_use]
    pub const fn echo(mut self, enabled: bool) -> Self {
        self.echo = Some(enabled);
        self
    }
}

/// Everything a remote pty request carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyRequest {
    /// Terminal type.
    pub term: String,
    /// Width in columns.
    pub width: u32,
    /// Height in rows.
    pub height: u32,
    /// Terminal modes.
    pub modes: TerminalModes,
}

impl PtyRequest {
    /// Build a request from a resolved terminal context.
    #[must_use]
    pub fn from_context(context: &TerminalContext, modes: TerminalModes) -> Self {
        Self {
            term: context.term.clone(),
            width: u32::from(context.width),
            height: u32::from(context.height),
            modes,
        }
    }
}

/// Boxed async reader for a local input stream.
pub type InputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed async writer for a local output stream.
pub type OutputStream = Box<dyn AsyncWrite + Send + Unpin>;

/// Local standard streams bound to a session.
pub struct StdStreams {
    /// Forwarded to the remote input.
    pub stdin: InputStream,
    /// Receives remote standard output.
    pub stdout: OutputStream,
    /// Receives remote standard error.
    pub stderr: OutputStream,
}

impl StdStreams {
    /// Bind arbitrary streams.
    pub fn new(
        stdin: impl AsyncRead + Send + Unpin + 'static,
        stdout: impl AsyncWrite + Send + Unpin + 'static,
        stderr: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }

    /// The process's own standard streams.
    ///
    /// Standard input comes from a single process-wide reader thread, so
    /// nothing is left blocked on it once the session ends. From the first
    /// call on, that thread owns standard input for the rest of the process.
    #[must_use]
    pub fn process() -> Self {
        Self::new(stdin::process_stdin(), tokio::io::stdout(), tokio::io::stderr())
    }
}

impl fmt::Debug for StdStreams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdStreams").finish_non_exhaustive()
    }
}

/// Kind of a remote path, from the file type bits of its mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Anything else, or no type bits reported.
    Other,
}

impl FileKind {
    /// Classify from a full `st_mode` value.
    #[must_use]
    pub const fn from_mode(mode: u32) -> Self {
        match mode & 0o170_000 {
            0o100_000 => Self::File,
            0o040_000 => Self::Directory,
            0o120_000 => Self::Symlink,
            _ => Self::Other,
        }
    }
}

/// Metadata of a remote path that exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMetadata {
    /// Final path component.
    pub name: String,
    /// Full mode as reported, including file type bits.
    pub permissions: u32,
    /// Size in bytes.
    pub size: u64,
    /// File kind.
    pub kind: FileKind,
}

impl RemoteMetadata {
    /// Build metadata for `path` from raw attributes.
    #[must_use]
    pub fn new(path: &str, permissions: u32, size: u64) -> Self {
        Self {
            name: crate::path::remote_base_name(path).to_string(),
            permissions,
            size,
            kind: FileKind::from_mode(permissions),
        }
    }

    /// Permission bits only (`0o7777`).
    #[must_use]
    pub const fn mode(&self) -> u32 {
        self.permissions & 0o7777
    }

    /// Check if this is a directory.
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.kind, FileKind::Directory)
    }
}
