//! End-to-end flows over the in-memory transport.
//!
//! Run with `cargo test --features test-utils`.

#![cfg(feature = "test-utils")]

use skiff::test_utils::{DialOutcome, FakeConnection, FakeDialer, FakeTerminal, memory_streams};
use skiff::{
    ClientConfig, Error, ExitStatus, Operation, ShellOptions, connect_with, copy_file, move_file,
    pull_file, read_file, remove_file, run_command, run_interactive_shell_with,
};

#[tokio::test]
async fn falls_through_rejected_methods() {
    let remote = FakeConnection::new()
        .with_command("whoami", b"deploy\n", ExitStatus::Code(0));
    let dialer = FakeDialer::new([DialOutcome::Reject, DialOutcome::Reject, DialOutcome::Accept])
        .with_remote(remote.clone());
    let config = ClientConfig::new("deploy")
        .with_password("old")
        .with_key("/nonexistent/id_ed25519")
        .with_password_prompt(|| Ok("typed".into()));

    let conn = connect_with(&dialer, "build-01:2222", &config).await.unwrap();
    assert_eq!(dialer.methods(), ["password", "publickey", "password-prompt"]);

    assert_eq!(run_command(&conn, "whoami").await.unwrap(), b"deploy\n");
    skiff::Connection::close(conn).await.unwrap();
    assert!(remote.is_closed());
}

#[tokio::test]
async fn last_rejection_is_reported() {
    let dialer = FakeDialer::new([DialOutcome::Reject, DialOutcome::Reject]);
    let config = ClientConfig::new("deploy")
        .with_password("a")
        .with_password("b");

    let err = connect_with(&dialer, "build-01", &config).await.unwrap_err();
    assert!(err.is_auth_rejection());
    assert!(err.to_string().contains("attempt 2 rejected"));
}

#[tokio::test]
async fn transport_failure_stops_the_loop() {
    let dialer = FakeDialer::new([DialOutcome::Unreachable, DialOutcome::Accept]);
    let config = ClientConfig::new("deploy")
        .with_password("a")
        .with_password("b");

    let err = connect_with(&dialer, "build-01", &config).await.unwrap_err();
    assert!(matches!(err, Error::Connection { .. }));
    assert_eq!(dialer.attempts(), 1);
}

#[tokio::test]
async fn copy_into_directory_then_pull_back() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("release.tar");
    std::fs::write(&local, b"payload").unwrap();

    let conn = FakeConnection::new().with_dir("/srv/releases");
    let remote = copy_file(&conn, &local, "/srv/releases/").await.unwrap();
    assert_eq!(remote, "/srv/releases/release.tar");

    let (data, meta) = read_file(&conn, &remote).await.unwrap();
    assert_eq!(data, b"payload");
    assert!(!meta.is_dir());

    let pulled = pull_file(&conn, &remote, format!("{}/", dir.path().join("out").display()))
        .await;
    // The local target directory does not exist yet.
    assert!(pulled.is_err());

    std::fs::create_dir(dir.path().join("out")).unwrap();
    let pulled = pull_file(&conn, &remote, format!("{}/", dir.path().join("out").display()))
        .await
        .unwrap();
    assert_eq!(pulled, dir.path().join("out").join("release.tar"));
    assert_eq!(std::fs::read(&pulled).unwrap(), b"payload");
}

#[tokio::test]
async fn move_then_remove() {
    let conn = FakeConnection::new().with_file("/tmp/a.log", b"x", 0o600);

    move_file(&conn, "/tmp/a.log", "/tmp/b.log").await.unwrap();
    assert!(!conn.exists("/tmp/a.log"));
    assert_eq!(conn.file("/tmp/b.log"), Some((b"x".to_vec(), 0o600)));

    remove_file(&conn, "/tmp/b.log").await.unwrap();
    assert!(!conn.exists("/tmp/b.log"));

    let err = remove_file(&conn, "/tmp/b.log").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn silent_removal_is_a_postcondition_failure() {
    let conn = FakeConnection::new()
        .with_file("/tmp/a.log", b"x", 0o600)
        .remove_is_noop();

    let err = remove_file(&conn, "/tmp/a.log").await.unwrap_err();
    assert!(err.is_postcondition());
    assert!(matches!(
        err,
        Error::Postcondition {
            operation: Operation::Remove,
            ..
        }
    ));
    assert_eq!(conn.file_sessions(), (1, 1));
}

#[tokio::test]
async fn shell_session_round_trip() {
    let conn = FakeConnection::new();
    let terminal = FakeTerminal::new().with_size(Some((100, 30)));
    let (streams, stdout, _) = memory_streams(b"ls\nexit\n");

    run_interactive_shell_with(&conn, &terminal, streams, &ShellOptions::default())
        .await
        .unwrap();

    assert_eq!(stdout.contents(), b"ls\nexit\n");
    let request = &conn.pty_requests()[0];
    assert_eq!((request.width, request.height), (100, 30));
    assert_eq!(request.modes.input_baud, skiff::PTY_BAUD_RATE);
    assert!(!terminal.is_raw());
}
