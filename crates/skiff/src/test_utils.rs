//! In-memory transport and terminal for tests.
//!
//! [`FakeDialer`] scripts the outcome of each dial, [`FakeConnection`]
//! keeps a remote filesystem and command table in memory, and
//! [`FakeTerminal`] tracks whether it is in raw mode. Failures can be
//! injected at any [`Phase`].

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use skiff_tty::{LocalTerminal, TermError, WindowSize};
use tokio::io::AsyncWrite;

use crate::error::{Error, ExitStatus, Phase, Result};
use crate::transport::{
    Attempt, Connection, Dialer, FileKind, FileProtocol, PtyRequest, RemoteMetadata,
    RemoteSession, StdStreams,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

const FILE_TYPE: u32 = 0o100_000;
const DIR_TYPE: u32 = 0o040_000;

/// Scripted result of one dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialOutcome {
    /// Authenticate successfully.
    Accept,
    /// Reject the credential.
    Reject,
    /// Fail at the transport level.
    Unreachable,
}

/// A dialer that replays scripted outcomes.
///
/// Dials beyond the script are rejected.
#[derive(Debug, Default)]
pub struct FakeDialer {
    outcomes: Mutex<VecDeque<DialOutcome>>,
    methods: Mutex<Vec<&'static str>>,
    remote: FakeConnection,
}

impl FakeDialer {
    /// Script the outcomes of successive dials.
    pub fn new(outcomes: impl IntoIterator<Item = DialOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Hand out `remote` on accepted dials.
    #[must_use]
    pub fn with_remote(mut self, remote: FakeConnection) -> Self {
        self.remote = remote;
        self
    }

    /// Number of dials made.
    pub fn attempts(&self) -> usize {
        lock(&self.methods).len()
    }

    /// Method names used by each dial, in order.
    pub fn methods(&self) -> Vec<&'static str> {
        lock(&self.methods).clone()
    }
}

impl Dialer for FakeDialer {
    type Connection = FakeConnection;

    async fn dial(&self, attempt: &Attempt<'_>) -> Result<FakeConnection> {
        lock(&self.methods).push(attempt.method.name());
        let outcome = lock(&self.outcomes)
            .pop_front()
            .unwrap_or(DialOutcome::Reject);

        match outcome {
            DialOutcome::Accept => Ok(self.remote.clone()),
            DialOutcome::Reject => Err(Error::auth_rejected(
                attempt.username(),
                attempt.method.name(),
                format!("attempt {} rejected", attempt.index + 1),
            )),
            DialOutcome::Unreachable => Err(Error::connection(attempt.address, "connection refused")),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    permissions: u32,
}

impl Entry {
    const fn is_dir(&self) -> bool {
        self.permissions & 0o170_000 == DIR_TYPE
    }
}

#[derive(Debug, Default)]
struct FakeRemote {
    entries: BTreeMap<String, Entry>,
    commands: HashMap<String, (Vec<u8>, ExitStatus)>,
    faults: HashSet<Phase>,
    remove_is_noop: bool,
    rename_is_noop: bool,
    drop_after_write: bool,
    sessions: (usize, usize),
    file_sessions: (usize, usize),
    pty_requests: Vec<PtyRequest>,
    closed: bool,
}

impl FakeRemote {
    fn check(&self, phase: Phase) -> Result<()> {
        if self.faults.contains(&phase) {
            Err(Error::remote(phase, "injected failure"))
        } else {
            Ok(())
        }
    }

    fn command(&self, command: &str) -> (Vec<u8>, ExitStatus) {
        self.commands.get(command).cloned().unwrap_or_else(|| {
            (
                format!("sh: {command}: not found\n").into_bytes(),
                ExitStatus::Code(127),
            )
        })
    }
}

/// An in-memory remote host.
///
/// Clones share the same state, so a test can keep one handle for
/// inspection while the code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeConnection {
    remote: Arc<Mutex<FakeRemote>>,
}

impl FakeConnection {
    /// An empty remote host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a regular file with permission bits `mode`.
    #[must_use]
    pub fn with_file(self, path: &str, data: &[u8], mode: u32) -> Self {
        lock(&self.remote).entries.insert(
            path.to_string(),
            Entry {
                data: data.to_vec(),
                permissions: FILE_TYPE | (mode & 0o7777),
            },
        );
        self
    }

    /// Seed a directory.
    #[must_use]
    pub fn with_dir(self, path: &str) -> Self {
        lock(&self.remote).entries.insert(
            path.trim_end_matches('/').to_string(),
            Entry {
                data: Vec::new(),
                permissions: DIR_TYPE | 0o755,
            },
        );
        self
    }

    /// Script the output and exit status of `command`.
    ///
    /// Unscripted commands exit 127.
    #[must_use]
    pub fn with_command(self, command: &str, output: &[u8], status: ExitStatus) -> Self {
        lock(&self.remote)
            .commands
            .insert(command.to_string(), (output.to_vec(), status));
        self
    }

    /// Fail every operation of `phase`.
    #[must_use]
    pub fn fail_at(self, phase: Phase) -> Self {
        lock(&self.remote).faults.insert(phase);
        self
    }

    /// Report success from remove without removing anything.
    #[must_use]
    pub fn remove_is_noop(self) -> Self {
        lock(&self.remote).remove_is_noop = true;
        self
    }

    /// Report success from rename without renaming anything.
    #[must_use]
    pub fn rename_is_noop(self) -> Self {
        lock(&self.remote).rename_is_noop = true;
        self
    }

    /// Lose a written file right after its chmod succeeds.
    #[must_use]
    pub fn drop_after_write(self) -> Self {
        lock(&self.remote).drop_after_write = true;
        self
    }

    /// Contents and permission bits of a remote file.
    pub fn file(&self, path: &str) -> Option<(Vec<u8>, u32)> {
        lock(&self.remote)
            .entries
            .get(path)
            .filter(|e| !e.is_dir())
            .map(|e| (e.data.clone(), e.permissions & 0o7777))
    }

    /// Whether anything exists at `path`.
    pub fn exists(&self, path: &str) -> bool {
        lock(&self.remote).entries.contains_key(path)
    }

    /// Session channels as `(opened, closed)`.
    pub fn sessions(&self) -> (usize, usize) {
        lock(&self.remote).sessions
    }

    /// SFTP sessions as `(opened, closed)`.
    pub fn file_sessions(&self) -> (usize, usize) {
        lock(&self.remote).file_sessions
    }

    /// Pty requests received, in order.
    pub fn pty_requests(&self) -> Vec<PtyRequest> {
        lock(&self.remote).pty_requests.clone()
    }

    /// Whether [`Connection::close`] was called.
    pub fn is_closed(&self) -> bool {
        lock(&self.remote).closed
    }
}

impl Connection for FakeConnection {
    type Session = FakeSession;
    type Files = FakeFiles;

    async fn open_session(&self) -> Result<FakeSession> {
        let mut remote = lock(&self.remote);
        remote.check(Phase::SessionOpen)?;
        remote.sessions.0 += 1;
        Ok(FakeSession {
            remote: Arc::clone(&self.remote),
            streams: None,
            launched: None,
        })
    }

    async fn open_file_session(&self) -> Result<FakeFiles> {
        let mut remote = lock(&self.remote);
        remote.check(Phase::SftpOpen)?;
        remote.file_sessions.0 += 1;
        Ok(FakeFiles {
            remote: Arc::clone(&self.remote),
        })
    }

    async fn close(self) -> Result<()> {
        lock(&self.remote).closed = true;
        Ok(())
    }
}

/// What a [`FakeSession`] was asked to run.
#[derive(Debug, Clone)]
enum Launched {
    Shell,
    Command(String),
}

/// Session channel on a [`FakeConnection`].
///
/// An interactive wait copies the attached input to the attached output,
/// followed by the output of the command if one was launched.
#[derive(Debug)]
pub struct FakeSession {
    remote: Arc<Mutex<FakeRemote>>,
    streams: Option<StdStreams>,
    launched: Option<Launched>,
}

impl FakeSession {
    fn check(&self, phase: Phase) -> Result<()> {
        lock(&self.remote).check(phase)
    }
}

impl RemoteSession for FakeSession {
    async fn combined_output(&mut self, command: &str) -> Result<Vec<u8>> {
        let (output, status) = {
            let remote = lock(&self.remote);
            remote.check(Phase::Exec)?;
            remote.command(command)
        };
        status.check(output)
    }

    async fn request_pty(&mut self, request: &PtyRequest) -> Result<()> {
        let mut remote = lock(&self.remote);
        remote.check(Phase::PtyRequest)?;
        remote.pty_requests.push(request.clone());
        Ok(())
    }

    fn attach(&mut self, streams: StdStreams) {
        self.streams = Some(streams);
    }

    async fn shell(&mut self) -> Result<()> {
        self.check(Phase::ShellLaunch)?;
        self.launched = Some(Launched::Shell);
        Ok(())
    }

    async fn exec(&mut self, command: &str) -> Result<()> {
        self.check(Phase::Exec)?;
        self.launched = Some(Launched::Command(command.to_string()));
        Ok(())
    }

    async fn wait(&mut self) -> Result<()> {
        let Some(streams) = self.streams.as_mut() else {
            return Err(Error::remote(Phase::Wait, "no local streams attached"));
        };
        tokio::io::copy(&mut streams.stdin, &mut streams.stdout).await?;

        let (output, status) = match &self.launched {
            Some(Launched::Command(command)) => lock(&self.remote).command(command),
            Some(Launched::Shell) => (Vec::new(), ExitStatus::Code(0)),
            None => return Err(Error::remote(Phase::Wait, "nothing was launched")),
        };
        tokio::io::AsyncWriteExt::write_all(&mut streams.stdout, &output).await?;

        lock(&self.remote).check(Phase::Wait)?;
        status.check(Vec::new()).map(drop)
    }

    async fn close(self) -> Result<()> {
        let mut remote = lock(&self.remote);
        remote.sessions.1 += 1;
        remote.check(Phase::SessionClose)
    }
}

/// SFTP session on a [`FakeConnection`].
#[derive(Debug)]
pub struct FakeFiles {
    remote: Arc<Mutex<FakeRemote>>,
}

impl FileProtocol for FakeFiles {
    async fn create(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let mut remote = lock(&self.remote);
        remote.check(Phase::Create)?;
        if remote.entries.get(path).is_some_and(Entry::is_dir) {
            return Err(Error::remote(Phase::Create, format!("'{path}' is a directory")));
        }
        remote.check(Phase::Write)?;
        let permissions = remote
            .entries
            .get(path)
            .map_or(FILE_TYPE | 0o644, |e| e.permissions);
        remote.entries.insert(
            path.to_string(),
            Entry {
                data: data.to_vec(),
                permissions,
            },
        );
        Ok(())
    }

    async fn chmod(&mut self, path: &str, mode: u32) -> Result<()> {
        let mut remote = lock(&self.remote);
        remote.check(Phase::Chmod)?;
        let entry = remote
            .entries
            .get_mut(path)
            .ok_or_else(|| Error::not_found(Phase::Chmod, path))?;
        entry.permissions = (entry.permissions & 0o170_000) | (mode & 0o7777);
        if remote.drop_after_write {
            remote.entries.remove(path);
        }
        Ok(())
    }

    async fn lstat(&mut self, path: &str) -> Result<RemoteMetadata> {
        let remote = lock(&self.remote);
        remote.check(Phase::Lstat)?;
        let entry = remote
            .entries
            .get(path.trim_end_matches('/'))
            .ok_or_else(|| Error::not_found(Phase::Lstat, path))?;
        Ok(RemoteMetadata::new(
            path,
            entry.permissions,
            entry.data.len() as u64,
        ))
    }

    async fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        let remote = lock(&self.remote);
        remote.check(Phase::Open)?;
        let entry = remote
            .entries
            .get(path)
            .ok_or_else(|| Error::not_found(Phase::Open, path))?;
        remote.check(Phase::Read)?;
        if entry.is_dir() {
            return Err(Error::remote(Phase::Read, format!("'{path}' is a directory")));
        }
        Ok(entry.data.clone())
    }

    async fn remove(&mut self, path: &str) -> Result<()> {
        let mut remote = lock(&self.remote);
        remote.check(Phase::Remove)?;
        let entry = remote
            .entries
            .get(path)
            .ok_or_else(|| Error::not_found(Phase::Remove, path))?;
        if entry.is_dir() {
            let prefix = format!("{path}/");
            if remote.entries.keys().any(|k| k.starts_with(&prefix)) {
                return Err(Error::remote(Phase::Remove, format!("'{path}' is not empty")));
            }
        }
        if !remote.remove_is_noop {
            remote.entries.remove(path);
        }
        Ok(())
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let mut remote = lock(&self.remote);
        remote.check(Phase::Rename)?;
        if !remote.entries.contains_key(from) {
            return Err(Error::not_found(Phase::Rename, from));
        }
        if !remote.rename_is_noop {
            if let Some(entry) = remote.entries.remove(from) {
                remote.entries.insert(to.to_string(), entry);
            }
        }
        Ok(())
    }

    async fn close(self) -> Result<()> {
        let mut remote = lock(&self.remote);
        remote.file_sessions.1 += 1;
        remote.check(Phase::SftpClose)
    }
}

#[derive(Debug)]
struct TerminalState {
    tty: bool,
    term: Option<String>,
    size: Option<(u16, u16)>,
    raw: bool,
    raw_fails: bool,
    restore_fails: bool,
}

/// A local terminal that only tracks its mode.
#[derive(Debug)]
pub struct FakeTerminal {
    state: Mutex<TerminalState>,
}

impl Default for FakeTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTerminal {
    /// An 80x24 `xterm-256color` terminal in cooked mode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TerminalState {
                tty: true,
                term: Some("xterm-256color".to_string()),
                size: Some((80, 24)),
                raw: false,
                raw_fails: false,
                restore_fails: false,
            }),
        }
    }

    /// Report that the stream is not a terminal.
    #[must_use]
    pub fn not_a_terminal(self) -> Self {
        lock(&self.state).tty = false;
        self
    }

    /// Set the declared terminal type.
    #[must_use]
    pub fn with_term(self, term: Option<&str>) -> Self {
        lock(&self.state).term = term.map(str::to_string);
        self
    }

    /// Set the window size; `None` makes the size query fail.
    #[must_use]
    pub fn with_size(self, size: Option<(u16, u16)>) -> Self {
        lock(&self.state).size = size;
        self
    }

    /// Fail to enter raw mode.
    #[must_use]
    pub fn raw_fails(self) -> Self {
        lock(&self.state).raw_fails = true;
        self
    }

    /// Fail to restore the saved mode.
    #[must_use]
    pub fn restore_fails(self) -> Self {
        lock(&self.state).restore_fails = true;
        self
    }

    /// Whether the terminal is currently raw.
    pub fn is_raw(&self) -> bool {
        lock(&self.state).raw
    }
}

impl LocalTerminal for FakeTerminal {
    type Saved = bool;

    fn descriptor(&self) -> i32 {
        0
    }

    fn is_terminal(&self) -> bool {
        lock(&self.state).tty
    }

    fn term(&self) -> Option<String> {
        lock(&self.state).term.clone()
    }

    fn size(&self) -> skiff_tty::Result<WindowSize> {
        lock(&self.state)
            .size
            .map(WindowSize::from)
            .ok_or_else(|| TermError::Size(io::Error::other("size query failed")))
    }

    fn enter_raw(&self) -> skiff_tty::Result<bool> {
        let mut state = lock(&self.state);
        if state.raw_fails {
            return Err(TermError::SetAttributes(io::Error::other("raw mode refused")));
        }
        let previous = state.raw;
        state.raw = true;
        Ok(previous)
    }

    fn restore(&self, saved: &bool) -> skiff_tty::Result<()> {
        let mut state = lock(&self.state);
        if state.restore_fails {
            return Err(TermError::SetAttributes(io::Error::other("restore refused")));
        }
        state.raw = *saved;
        Ok(())
    }
}

/// A cloneable in-memory writer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        lock(&self.0).clone()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        lock(&self.0).extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Streams reading from `input` and writing into the returned buffers.
#[must_use]
pub fn memory_streams(input: &[u8]) -> (StdStreams, SharedBuffer, SharedBuffer) {
    let stdout = SharedBuffer::default();
    let stderr = SharedBuffer::default();
    let streams = StdStreams::new(
        io::Cursor::new(input.to_vec()),
        stdout.clone(),
        stderr.clone(),
    );
    (streams, stdout, stderr)
}
