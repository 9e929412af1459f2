//! SSH backend built on `russh`.
//!
//! This module provides:
//!
//! - [`RusshDialer`] / [`RusshConnection`]: dial, authenticate with one
//!   method, hand out channels
//! - [`RusshSession`]: exec, pty, shell and stream forwarding on one channel
//! - [`SftpFiles`]: the SFTP subsystem via `russh-sftp`
//! - [`ClientHandler`]: host key verification against `known_hosts`

mod channel;
mod client;
mod host_keys;
mod sftp;

pub use channel::RusshSession;
pub use client::{RusshConnection, RusshDialer, load_private_key};
pub use host_keys::ClientHandler;
pub use sftp::SftpFiles;
