//! SFTP file protocol over `russh-sftp`.

use std::fmt;

use russh_sftp::client::SftpSession;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::protocol::{FileAttributes, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Phase, Result};
use crate::transport::{FileProtocol, RemoteMetadata};

/// One SFTP session.
pub struct SftpFiles {
    sftp: SftpSession,
}

impl SftpFiles {
    /// Wrap an initialized session.
    #[must_use]
    pub const fn new(sftp: SftpSession) -> Self {
        Self { sftp }
    }
}

impl fmt::Debug for SftpFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SftpFiles").finish_non_exhaustive()
    }
}

/// Map an SFTP failure for `path` during `phase`.
fn sftp_error(phase: Phase, path: &str, error: &SftpError) -> Error {
    match error {
        SftpError::Status(status) if status.status_code == StatusCode::NoSuchFile => {
            Error::not_found(phase, path)
        }
        other => Error::remote(phase, format!("'{path}': {other}")),
    }
}

impl FileProtocol for SftpFiles {
    async fn create(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let mut file = self
            .sftp
            .create(path)
            .await
            .map_err(|e| sftp_error(Phase::Create, path, &e))?;
        file.write_all(data)
            .await
            .map_err(|e| Error::remote(Phase::Write, format!("'{path}': {e}")))?;
        file.shutdown()
            .await
            .map_err(|e| Error::remote(Phase::Write, format!("'{path}': {e}")))?;
        tracing::trace!(path, bytes = data.len(), "Remote file written");
        Ok(())
    }

    async fn chmod(&mut self, path: &str, mode: u32) -> Result<()> {
        let attributes = FileAttributes {
            permissions: Some(mode),
            ..FileAttributes::empty()
        };
        self.sftp
            .set_metadata(path, attributes)
            .await
            .map_err(|e| sftp_error(Phase::Chmod, path, &e))
    }

    async fn lstat(&mut self, path: &str) -> Result<RemoteMetadata> {
        let attributes = self
            .sftp
            .symlink_metadata(path)
            .await
            .map_err(|e| sftp_error(Phase::Lstat, path, &e))?;
        Ok(RemoteMetadata::new(
            path,
            attributes.permissions.unwrap_or(0),
            attributes.size.unwrap_or(0),
        ))
    }

    async fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut file = self
            .sftp
            .open(path)
            .await
            .map_err(|e| sftp_error(Phase::Open, path, &e))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .await
            .map_err(|e| Error::remote(Phase::Read, format!("'{path}': {e}")))?;
        Ok(data)
    }

    async fn remove(&mut self, path: &str) -> Result<()> {
        match self.sftp.remove_file(path).await {
            Ok(()) => Ok(()),
            Err(first) => {
                // remove_file refuses directories; retry as one if that is
                // what the path is.
                match self.lstat(path).await {
                    Ok(meta) if meta.is_dir() => self
                        .sftp
                        .remove_dir(path)
                        .await
                        .map_err(|e| sftp_error(Phase::Remove, path, &e)),
                    _ => Err(sftp_error(Phase::Remove, path, &first)),
                }
            }
        }
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        self.sftp
            .rename(from, to)
            .await
            .map_err(|e| sftp_error(Phase::Rename, from, &e))
    }

    async fn close(self) -> Result<()> {
        self.sftp
            .close()
            .await
            .map_err(|e| Error::remote(Phase::SftpClose, e.to_string()))
    }
}
