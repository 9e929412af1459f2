//! Local input shared by successive interactive sessions.
//!
//! A blocking read on standard input cannot be cancelled. Instead of
//! starting one per session, a single named thread reads the input and
//! queues chunks; each session borrows the queue through a [`PumpReader`]
//! and hands it back, with any unread bytes, when dropped. Input typed
//! after one session ends is delivered to the next one, and no runtime
//! ever waits on a parked read at shutdown.

use std::io::{self, Read};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;

const CHUNK: usize = 4096;

type Chunks = mpsc::Receiver<io::Result<Vec<u8>>>;

#[derive(Debug, Default)]
struct Handoff {
    chunks: Option<Chunks>,
    leftover: Vec<u8>,
}

fn lock(slot: &Mutex<Handoff>) -> MutexGuard<'_, Handoff> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A reader thread whose output is lent to one session at a time.
#[derive(Debug, Clone)]
pub struct InputPump {
    slot: Arc<Mutex<Handoff>>,
}

impl InputPump {
    /// Start a thread named `name` that forwards everything read from
    /// `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<R>(name: &str, mut source: R) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(1);

        std::thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let mut buf = vec![0u8; CHUNK];
                loop {
                    let chunk = match source.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => Ok(buf[..n].to_vec()),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => Err(e),
                    };
                    let failed = chunk.is_err();
                    if tx.blocking_send(chunk).is_err() || failed {
                        break;
                    }
                }
            })?;

        Ok(Self {
            slot: Arc::new(Mutex::new(Handoff {
                chunks: Some(rx),
                leftover: Vec::new(),
            })),
        })
    }

    /// A pump that is already at end of input.
    #[must_use]
    pub fn closed() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Handoff::default())),
        }
    }

    /// Borrow the input until the returned reader is dropped.
    ///
    /// While one reader is alive, further readers see end of input.
    #[must_use]
    pub fn reader(&self) -> PumpReader {
        let Handoff { chunks, leftover } = std::mem::take(&mut *lock(&self.slot));
        PumpReader {
            slot: Arc::clone(&self.slot),
            chunks,
            leftover,
        }
    }
}

/// The process's standard input, pumped by a single thread.
pub(crate) fn process_stdin() -> PumpReader {
    static STDIN: OnceLock<InputPump> = OnceLock::new();

    STDIN
        .get_or_init(|| {
            InputPump::spawn("skiff-stdin", io::stdin()).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to start stdin reader");
                InputPump::closed()
            })
        })
        .reader()
}

/// Async view of an [`InputPump`], returned to the pump on drop.
#[derive(Debug)]
pub struct PumpReader {
    slot: Arc<Mutex<Handoff>>,
    chunks: Option<Chunks>,
    leftover: Vec<u8>,
}

impl AsyncRead for PumpReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if this.leftover.is_empty() {
            let Some(chunks) = this.chunks.as_mut() else {
                return Poll::Ready(Ok(()));
            };
            match ready!(chunks.poll_recv(cx)) {
                Some(Ok(chunk)) => this.leftover = chunk,
                Some(Err(e)) => return Poll::Ready(Err(e)),
                None => return Poll::Ready(Ok(())),
            }
        }

        let n = this.leftover.len().min(buf.remaining());
        buf.put_slice(&this.leftover[..n]);
        this.leftover.drain(..n);
        Poll::Ready(Ok(()))
    }
}

impl Drop for PumpReader {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        if slot.chunks.is_none() {
            slot.chunks = self.chunks.take();
            slot.leftover = std::mem::take(&mut self.leftover);
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test]
    async fn unread_input_carries_over_to_next_reader() {
        let pump = InputPump::spawn("test-pump", io::Cursor::new(b"first\nsecond\n".to_vec())).unwrap();

        let mut line = [0u8; 6];
        {
            let mut session = pump.reader();
            session.read_exact(&mut line).await.unwrap();
        }
        assert_eq!(&line, b"first\n");

        let mut rest = Vec::new();
        pump.reader().read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"second\n");
    }

    #[tokio::test]
    async fn concurrent_reader_sees_end_of_input() {
        let pump = InputPump::spawn("test-pump", io::Cursor::new(b"keys".to_vec())).unwrap();
        let _active = pump.reader();

        let mut other = Vec::new();
        pump.reader().read_to_end(&mut other).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn closed_pump_is_empty() {
        let mut data = Vec::new();
        InputPump::closed().reader().read_to_end(&mut data).await.unwrap();
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn source_errors_surface_once() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("device gone"))
            }
        }

        let pump = InputPump::spawn("test-pump", Broken).unwrap();
        let mut reader = pump.reader();
        let mut buf = [0u8; 8];
        assert!(reader.read(&mut buf).await.is_err());
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    }
}
