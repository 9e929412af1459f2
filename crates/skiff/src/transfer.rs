//! File transfer with verified postconditions.
//!
//! Every operation opens its own SFTP session and closes it before
//! returning, whatever the outcome. Mutating operations are followed by an
//! `lstat` that must agree with what the server reported; a disagreement is
//! an [`Error::Postcondition`], never a protocol error.

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Operation, Result};
use crate::path::{local_base_name, local_is_directory, remote_is_directory, resolve_destination_path};
use crate::transport::{Connection, FileProtocol, RemoteMetadata, close_files};

/// `lstat` must find `path` after a write.
async fn verify_present<F: FileProtocol>(files: &mut F, path: &str) -> Result<RemoteMetadata> {
    match files.lstat(path).await {
        Ok(meta) => Ok(meta),
        Err(e) if e.is_not_found() => Err(Error::postcondition(
            Operation::Write,
            path,
            "file is absent after transfer",
        )),
        Err(e) => Err(e),
    }
}

/// `lstat` must report `path` missing after `operation`.
async fn verify_absent<F: FileProtocol>(files: &mut F, path: &str, operation: Operation) -> Result<()> {
    match files.lstat(path).await {
        Err(e) if e.is_not_found() => Ok(()),
        Ok(_) => Err(Error::postcondition(operation, path, "path is still present")),
        Err(e) => Err(Error::postcondition(
            operation,
            path,
            format!("absence could not be confirmed: {e}"),
        )),
    }
}

/// Create or truncate `remote`, write `data` and set its permission bits.
///
/// # Errors
///
/// Returns the failing step's error, or [`Error::Postcondition`] if the
/// file is absent afterwards.
pub async fn write_file<C: Connection>(connection: &C, data: &[u8], remote: &str, mode: u32) -> Result<()> {
    let mut files = connection.open_file_session().await?;
    let result = write_on(&mut files, data, remote, mode).await;
    close_files(files).await;
    result
}

async fn write_on<F: FileProtocol>(files: &mut F, data: &[u8], remote: &str, mode: u32) -> Result<()> {
    tracing::debug!(path = remote, bytes = data.len(), "Writing remote file");
    files.create(remote, data).await?;
    files.chmod(remote, mode).await?;
    verify_present(files, remote).await?;
    tracing::info!(
        path = remote,
        bytes = data.len(),
        mode = %format_args!("{mode:o}"),
        "Remote file written"
    );
    Ok(())
}

/// Copy a local file to `remote`, keeping its permission bits.
///
/// A `remote` ending in `/` names a directory and receives the local base
/// name. Returns the remote path written.
///
/// # Errors
///
/// Returns an error if the local file is a directory or unreadable, or if
/// the remote write fails.
pub async fn copy_file<C: Connection>(connection: &C, local: impl AsRef<Path>, remote: &str) -> Result<String> {
    let local = local.as_ref();
    let context = |what: &str| format!("failed to {what} '{}'", local.display());

    let meta = tokio::fs::metadata(local)
        .await
        .map_err(|e| Error::io_context(context("stat"), e))?;
    if meta.is_dir() {
        return Err(Error::io_context(
            context("copy"),
            io::Error::new(io::ErrorKind::IsADirectory, "source is a directory"),
        ));
    }
    let name = local_base_name(local)
        .ok_or_else(|| Error::config(format!("'{}' has no file name", local.display())))?;

    let destination = resolve_destination_path(remote, &name, remote_is_directory(remote));
    let data = tokio::fs::read(local)
        .await
        .map_err(|e| Error::io_context(context("read"), e))?;

    write_file(connection, &data, &destination, local_mode(&meta)).await?;
    Ok(destination)
}

/// Read the whole of `remote` along with its metadata.
///
/// A missing file fails the initial `lstat` with
/// [`Error::NotFound`](crate::Error::NotFound).
///
/// # Errors
///
/// Returns an error if the file is missing or cannot be read.
pub async fn read_file<C: Connection>(connection: &C, remote: &str) -> Result<(Vec<u8>, RemoteMetadata)> {
    let mut files = connection.open_file_session().await?;
    let result = read_on(&mut files, remote).await;
    close_files(files).await;
    result
}

async fn read_on<F: FileProtocol>(files: &mut F, remote: &str) -> Result<(Vec<u8>, RemoteMetadata)> {
    let meta = files.lstat(remote).await?;
    let data = files.read(remote).await?;
    tracing::debug!(path = remote, bytes = data.len(), "Remote file read");
    Ok((data, meta))
}

/// Copy `remote` to a local file with the same permission bits.
///
/// A `local` ending in a separator names a directory and receives the
/// remote base name. Returns the local path written.
///
/// # Errors
///
/// Returns an error if the remote read or the local write fails.
pub async fn pull_file<C: Connection>(connection: &C, remote: &str, local: impl AsRef<Path>) -> Result<PathBuf> {
    let local = local.as_ref();
    let (data, meta) = read_file(connection, remote).await?;

    let base = local.to_string_lossy();
    let destination = if local_is_directory(&base) {
        PathBuf::from(resolve_destination_path(&base, &meta.name, true))
    } else {
        local.to_path_buf()
    };

    tokio::fs::write(&destination, &data)
        .await
        .map_err(|e| Error::io_context(format!("failed to write '{}'", destination.display()), e))?;
    set_local_mode(&destination, meta.mode()).await?;

    tracing::info!(
        remote,
        local = %destination.display(),
        bytes = data.len(),
        "Remote file pulled"
    );
    Ok(destination)
}

/// Remove a remote file or empty directory and confirm it is gone.
///
/// # Errors
///
/// Returns the removal error, or [`Error::Postcondition`] if the path is
/// still present or its absence cannot be confirmed.
pub async fn remove_file<C: Connection>(connection: &C, remote: &str) -> Result<()> {
    let mut files = connection.open_file_session().await?;
    let result = remove_on(&mut files, remote).await;
    close_files(files).await;
    result
}

async fn remove_on<F: FileProtocol>(files: &mut F, remote: &str) -> Result<()> {
    files.remove(remote).await?;
    verify_absent(files, remote, Operation::Remove).await?;
    tracing::info!(path = remote, "Remote path removed");
    Ok(())
}

/// Rename `from` to `to` and confirm `from` is gone.
///
/// Only the source is checked; the server is trusted to have created `to`.
///
/// # Errors
///
/// Returns the rename error, or [`Error::Postcondition`] if `from` is
/// still present or its absence cannot be confirmed.
pub async fn move_file<C: Connection>(connection: &C, from: &str, to: &str) -> Result<()> {
    let mut files = connection.open_file_session().await?;
    let result = move_on(&mut files, from, to).await;
    close_files(files).await;
    result
}

async fn move_on<F: FileProtocol>(files: &mut F, from: &str, to: &str) -> Result<()> {
    files.rename(from, to).await?;
    verify_absent(files, from, Operation::Move).await?;
    tracing::info!(from, to, "Remote path moved");
    Ok(())
}

#[cfg(unix)]
fn local_mode(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn local_mode(meta: &Metadata) -> u32 {
    if meta.permissions().readonly() { 0o444 } else { 0o644 }
}

#[cfg(unix)]
async fn set_local_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| Error::io_context(format!("failed to set mode of '{}'", path.display()), e))
}

#[cfg(not(unix))]
async fn set_local_mode(path: &Path, mode: u32) -> Result<()> {
    let mut permissions = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::io_context(format!("failed to stat '{}'", path.display()), e))?
        .permissions();
    permissions.set_readonly(mode & 0o222 == 0);
    tokio::fs::set_permissions(path, permissions)
        .await
        .map_err(|e| Error::io_context(format!("failed to set mode of '{}'", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Phase;
    use crate::test_utils::FakeConnection;

    #[tokio::test]
    async fn write_sets_contents_and_mode() {
        let conn = FakeConnection::new();
        write_file(&conn, b"#!/bin/sh\n", "/opt/run.sh", 0o750).await.unwrap();
        assert_eq!(conn.file("/opt/run.sh"), Some((b"#!/bin/sh\n".to_vec(), 0o750)));
        assert_eq!(conn.file_sessions(), (1, 1));
    }

    #[tokio::test]
    async fn write_overwrites_existing_file() {
        let conn = FakeConnection::new().with_file("/etc/motd", b"old banner", 0o644);
        write_file(&conn, b"new", "/etc/motd", 0o600).await.unwrap();
        assert_eq!(conn.file("/etc/motd"), Some((b"new".to_vec(), 0o600)));
    }

    #[tokio::test]
    async fn vanished_write_is_a_postcondition_error() {
        let conn = FakeConnection::new().drop_after_write();
        let err = write_file(&conn, b"x", "/tmp/x", 0o644).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Postcondition {
                operation: Operation::Write,
                ref path,
                ..
            } if path == "/tmp/x"
        ));
        assert!(!conn.exists("/tmp/x"));
        assert_eq!(conn.file_sessions(), (1, 1));
    }

    #[tokio::test]
    async fn chmod_failure_closes_session() {
        let conn = FakeConnection::new().fail_at(Phase::Chmod);
        let err = write_file(&conn, b"x", "/tmp/x", 0o644).await.unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Chmod));
        assert_eq!(conn.file_sessions(), (1, 1));
    }

    #[tokio::test]
    async fn copy_into_directory_appends_base_name() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("demo.rs");
        std::fs::write(&local, b"fn main() {}\n").unwrap();

        let conn = FakeConnection::new().with_dir("/home/deploy");
        let landed = copy_file(&conn, &local, "/home/deploy/").await.unwrap();
        assert_eq!(landed, "/home/deploy/demo.rs");
        assert_eq!(conn.file("/home/deploy/demo.rs").unwrap().0, b"fn main() {}\n");

        let landed = copy_file(&conn, &local, "/home/deploy/renamed.rs").await.unwrap();
        assert_eq!(landed, "/home/deploy/renamed.rs");
        assert!(conn.exists("/home/deploy/renamed.rs"));
    }

    #[tokio::test]
    async fn copy_rejects_directories_locally() {
        let dir = tempfile::tempdir().unwrap();
        let conn = FakeConnection::new();
        let err = copy_file(&conn, dir.path(), "/tmp/").await.unwrap_err();
        assert!(matches!(err, Error::IoWithContext { .. }));
        assert_eq!(conn.file_sessions(), (0, 0));
    }

    #[tokio::test]
    async fn copy_of_missing_file_fails_before_remote_work() {
        let conn = FakeConnection::new();
        let err = copy_file(&conn, "/definitely/not/here", "/tmp/").await.unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here"));
        assert_eq!(conn.file_sessions(), (0, 0));
    }

    #[tokio::test]
    async fn read_missing_file_is_not_found() {
        let conn = FakeConnection::new();
        let err = read_file(&conn, "/nope").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.phase(), Some(Phase::Lstat));
        assert_eq!(conn.file_sessions(), (1, 1));
    }

    #[tokio::test]
    async fn read_returns_metadata() {
        let conn = FakeConnection::new().with_file("/var/log/app.log", b"started\n", 0o640);
        let (data, meta) = read_file(&conn, "/var/log/app.log").await.unwrap();
        assert_eq!(data, b"started\n");
        assert_eq!(meta.name, "app.log");
        assert_eq!(meta.mode(), 0o640);
        assert_eq!(meta.size, 8);
    }

    #[tokio::test]
    async fn pull_into_directory_and_exact_path() {
        let dir = tempfile::tempdir().unwrap();
        let conn = FakeConnection::new().with_file("/srv/report.csv", b"a,b\n1,2\n", 0o600);

        let into_dir = format!("{}/", dir.path().display());
        let landed = pull_file(&conn, "/srv/report.csv", &into_dir).await.unwrap();
        assert_eq!(landed, dir.path().join("report.csv"));
        assert_eq!(std::fs::read(&landed).unwrap(), b"a,b\n1,2\n");

        let exact = dir.path().join("copy.csv");
        let landed = pull_file(&conn, "/srv/report.csv", &exact).await.unwrap();
        assert_eq!(landed, exact);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn copy_then_pull_preserves_bytes_and_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("tool.sh");
        std::fs::write(&source, b"#!/bin/sh\necho ok\n").unwrap();
        std::fs::set_permissions(&source, std::fs::Permissions::from_mode(0o751)).unwrap();

        let conn = FakeConnection::new().with_dir("/opt");
        let remote = copy_file(&conn, &source, "/opt/").await.unwrap();

        let back = dir.path().join("tool.back");
        pull_file(&conn, &remote, &back).await.unwrap();

        assert_eq!(std::fs::read(&back).unwrap(), b"#!/bin/sh\necho ok\n");
        let mode = std::fs::metadata(&back).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode, 0o751);
    }

    #[tokio::test]
    async fn remove_confirms_absence() {
        let conn = FakeConnection::new()
            .with_file("/tmp/a", b"", 0o644)
            .with_dir("/tmp/empty");
        remove_file(&conn, "/tmp/a").await.unwrap();
        remove_file(&conn, "/tmp/empty").await.unwrap();
        assert!(!conn.exists("/tmp/a"));
        assert!(!conn.exists("/tmp/empty"));
        assert_eq!(conn.file_sessions(), (2, 2));
    }

    #[tokio::test]
    async fn silent_remove_is_a_postcondition_error() {
        let conn = FakeConnection::new()
            .with_file("/tmp/a", b"", 0o644)
            .remove_is_noop();
        let err = remove_file(&conn, "/tmp/a").await.unwrap_err();
        assert!(err.is_postcondition());
        assert!(err.to_string().contains("still present"));
        assert_eq!(conn.file_sessions(), (1, 1));
    }

    #[tokio::test]
    async fn unconfirmed_absence_is_a_postcondition_error() {
        let conn = FakeConnection::new()
            .with_file("/tmp/a", b"", 0o644)
            .fail_at(Phase::Lstat);
        let err = remove_file(&conn, "/tmp/a").await.unwrap_err();
        assert!(err.is_postcondition());
        assert!(err.to_string().contains("could not be confirmed"));
    }

    #[tokio::test]
    async fn remove_missing_path_is_not_found() {
        let conn = FakeConnection::new();
        let err = remove_file(&conn, "/tmp/none").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.is_postcondition());
    }

    #[tokio::test]
    async fn move_renames_and_confirms() {
        let conn = FakeConnection::new().with_file("/tmp/a", b"data", 0o644);
        move_file(&conn, "/tmp/a", "/tmp/b").await.unwrap();
        assert!(!conn.exists("/tmp/a"));
        assert_eq!(conn.file("/tmp/b").unwrap().0, b"data");
    }

    #[tokio::test]
    async fn silent_move_is_a_postcondition_error() {
        let conn = FakeConnection::new()
            .with_file("/tmp/a", b"data", 0o644)
            .rename_is_noop();
        let err = move_file(&conn, "/tmp/a", "/tmp/b").await.unwrap_err();
        assert!(err.is_postcondition());
        assert_eq!(conn.file_sessions(), (1, 1));
    }
}
