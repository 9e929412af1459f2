//! skiff: a convenience layer over SSH for connecting, running commands,
//! driving interactive shells and transferring files.
//!
//! # Features
//!
//! - **Fail-soft authentication**: credential methods are tried one dial
//!   at a time, in order, until one is accepted
//! - **Interactive sessions** on a remote pty sized and typed from the local
//!   terminal, with the local mode restored on every path
//! - **Verified transfers** over SFTP: every mutation is followed by an
//!   `lstat` that must agree with it
//! - **Blocking facade** ([`SyncClient`]) for non-async programs
//!
//! # Example
//!
//! ```ignore
//! use skiff::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ClientConfig::new("deploy").with_agent().with_key("/home/me/.ssh/id_ed25519");
//!     let conn = skiff::connect("build-01", &config).await?;
//!
//!     let out = run_command(&conn, "uname -a").await?;
//!     print!("{}", String::from_utf8_lossy(&out));
//!
//!     copy_file(&conn, "target/release/app", "/opt/app/").await?;
//!     conn.close().await
//! }
//! ```

pub mod auth;
pub mod backend;
pub mod config;
pub mod connect;
pub mod error;
pub mod exec;
pub mod path;
pub mod prelude;
pub mod shell;
pub mod sync;
pub mod transfer;
pub mod transport;

pub use auth::{AuthMethod, Credentials, HostKeyVerification, PasswordPrompt};
pub use backend::ssh::{RusshConnection, RusshDialer};
pub use config::{ClientConfig, ConfigFile, DEFAULT_PORT, EnvConfig};
pub use connect::{connect, connect_with, parse_address};
pub use error::{Error, ExitStatus, Operation, Phase, Result};
pub use exec::run_command;
pub use path::resolve_destination_path;
pub use shell::{
    ShellOptions, run_interactive_command, run_interactive_command_with, run_interactive_shell,
    run_interactive_shell_with,
};
pub use sync::SyncClient;
pub use transfer::{copy_file, move_file, pull_file, read_file, remove_file, write_file};
pub use transport::{
    Attempt, Connection, Dialer, FileKind, FileProtocol, InputPump, PTY_BAUD_RATE, PtyRequest,
    PumpReader, RemoteMetadata, RemoteSession, StdStreams, TerminalModes,
};

// Terminal types used in the public API
pub use skiff_tty::{LocalTerminal, NativeTerminal, TerminalContext};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
