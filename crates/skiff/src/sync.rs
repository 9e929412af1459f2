//! Blocking wrapper over the async API.
//!
//! [`SyncClient`] owns a current-thread tokio runtime and blocks the caller
//! for every operation, for programs that are not async themselves.

use std::path::{Path, PathBuf};

use tokio::runtime::{Builder, Runtime};

use crate::backend::ssh::RusshConnection;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::transport::{Connection, Dialer, RemoteMetadata};

/// A blocking client for one connection.
pub struct SyncClient<C: Connection = RusshConnection> {
    /// The tokio runtime.
    runtime: Runtime,
    /// The connection all operations run on.
    connection: C,
}

fn build_runtime() -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::io_context("creating tokio runtime", e))
}

impl SyncClient {
    /// Connect to `address`, trying each configured method in turn.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built or no method
    /// succeeds.
    pub fn connect(address: &str, config: &ClientConfig) -> Result<Self> {
        let runtime = build_runtime()?;
        let connection = runtime.block_on(crate::connect(address, config))?;
        Ok(Self {
            runtime,
            connection,
        })
    }
}

impl<C: Connection> SyncClient<C> {
    /// Connect through a custom dialer.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built or no method
    /// succeeds.
    pub fn connect_with<D>(dialer: &D, address: &str, config: &ClientConfig) -> Result<Self>
    where
        D: Dialer<Connection = C>,
    {
        let runtime = build_runtime()?;
        let connection = runtime.block_on(crate::connect_with(dialer, address, config))?;
        Ok(Self {
            runtime,
            connection,
        })
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &C {
        &self.connection
    }

    /// Run a command and return its merged output.
    ///
    /// # Errors
    ///
    /// Returns an error if the session fails or the command exits
    /// unsuccessfully; the latter still carries the output.
    pub fn run_command(&self, command: &str) -> Result<Vec<u8>> {
        self.runtime
            .block_on(crate::exec::run_command(&self.connection, command))
    }

    /// Run the remote shell on the process's terminal.
    ///
    /// # Errors
    ///
    /// Returns the first error of the interactive lifecycle.
    pub fn run_interactive_shell(&self) -> Result<()> {
        self.runtime
            .block_on(crate::shell::run_interactive_shell(&self.connection))
    }

    /// Run a command on a remote pty attached to the process's terminal.
    ///
    /// # Errors
    ///
    /// Returns the first error of the interactive lifecycle.
    pub fn run_interactive_command(&self, command: &str) -> Result<()> {
        self.runtime
            .block_on(crate::shell::run_interactive_command(&self.connection, command))
    }

    /// Write `data` to `remote` with permission bits `mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if a transfer step fails or the file is missing
    /// afterwards.
    pub fn write_file(&self, data: &[u8], remote: &str, mode: u32) -> Result<()> {
        self.runtime
            .block_on(crate::transfer::write_file(&self.connection, data, remote, mode))
    }

    /// Copy a local file to `remote`.
    ///
    /// # Errors
    ///
    /// Returns an error if the local file cannot be read or the write fails.
    pub fn copy_file(&self, local: impl AsRef<Path>, remote: &str) -> Result<String> {
        self.runtime
            .block_on(crate::transfer::copy_file(&self.connection, local, remote))
    }

    /// Read a remote file and its metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be read.
    pub fn read_file(&self, remote: &str) -> Result<(Vec<u8>, RemoteMetadata)> {
        self.runtime
            .block_on(crate::transfer::read_file(&self.connection, remote))
    }

    /// Copy a remote file to `local`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or the local write fails.
    pub fn pull_file(&self, remote: &str, local: impl AsRef<Path>) -> Result<PathBuf> {
        self.runtime
            .block_on(crate::transfer::pull_file(&self.connection, remote, local))
    }

    /// Remove a remote path.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal fails or the path is still present.
    pub fn remove_file(&self, remote: &str) -> Result<()> {
        self.runtime
            .block_on(crate::transfer::remove_file(&self.connection, remote))
    }

    /// Rename a remote path.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails or the source is still present.
    pub fn move_file(&self, from: &str, to: &str) -> Result<()> {
        self.runtime
            .block_on(crate::transfer::move_file(&self.connection, from, to))
    }

    /// Close the connection and shut the runtime down.
    ///
    /// # Errors
    ///
    /// Returns an error if the disconnect fails.
    pub fn close(self) -> Result<()> {
        let Self {
            runtime,
            connection,
        } = self;
        runtime.block_on(connection.close())
    }
}

impl<C: Connection + std::fmt::Debug> std::fmt::Debug for SyncClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}
