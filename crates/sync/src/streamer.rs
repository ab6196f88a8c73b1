// SPDX-License-Identifier: MIT

use parking_lot::Mutex;
use std::io::{self, Write};
use tokio::sync::mpsc;

/// A node's stdout/stderr pipes are gone; further writes are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("write to closed stream")]
pub struct StreamClosed;

/// Two MPSC byte streams per node (spec.md §4.2). A runner writes through
/// [`Streamer`]; the driver drains the paired [`StreamReader`] in
/// declaration order so output from concurrently-running nodes still
/// prints one layer at a time.
pub struct Streamer {
    stdout: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    stderr: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
}

/// The drain side of a [`Streamer`], held by the driver.
pub struct StreamReader {
    stdout: mpsc::UnboundedReceiver<Vec<u8>>,
    stderr: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Streamer {
    pub fn pair() -> (Streamer, StreamReader) {
        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
        let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();
        (
            Streamer {
                stdout: Mutex::new(Some(stdout_tx)),
                stderr: Mutex::new(Some(stderr_tx)),
            },
            StreamReader {
                stdout: stdout_rx,
                stderr: stderr_rx,
            },
        )
    }

    pub fn write_stdout(&self, bytes: &[u8]) -> Result<(), StreamClosed> {
        Self::send(&self.stdout, bytes)
    }

    pub fn write_stderr(&self, bytes: &[u8]) -> Result<(), StreamClosed> {
        Self::send(&self.stderr, bytes)
    }

    fn send(slot: &Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>, bytes: &[u8]) -> Result<(), StreamClosed> {
        let guard = slot.lock();
        match guard.as_ref() {
            Some(tx) => tx.send(bytes.to_vec()).map_err(|_| StreamClosed),
            None => Err(StreamClosed),
        }
    }

    /// Flushes and closes both pipes. Concurrent readers observe EOF only
    /// after every already-buffered chunk has been delivered, since
    /// dropping the sender half doesn't discard queued items.
    pub fn close(&self) {
        self.stdout.lock().take();
        self.stderr.lock().take();
    }
}

impl StreamReader {
    /// Drains both streams until closed, writing each chunk to its sink as
    /// it arrives. Relative order is preserved within a stream; not
    /// guaranteed across stdout/stderr.
    pub async fn drain_into(
        mut self,
        stdout_sink: &mut dyn Write,
        stderr_sink: &mut dyn Write,
    ) -> io::Result<()> {
        let mut stdout_open = true;
        let mut stderr_open = true;
        while stdout_open || stderr_open {
            tokio::select! {
                chunk = self.stdout.recv(), if stdout_open => {
                    match chunk {
                        Some(bytes) => stdout_sink.write_all(&bytes)?,
                        None => stdout_open = false,
                    }
                }
                chunk = self.stderr.recv(), if stderr_open => {
                    match chunk {
                        Some(bytes) => stderr_sink.write_all(&bytes)?,
                        None => stderr_open = false,
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drains_buffered_writes_after_close() {
        let (streamer, reader) = Streamer::pair();
        streamer.write_stdout(b"hello ").unwrap();
        streamer.write_stdout(b"world").unwrap();
        streamer.write_stderr(b"warn").unwrap();
        streamer.close();

        let mut out = Vec::new();
        let mut err = Vec::new();
        reader.drain_into(&mut out, &mut err).await.unwrap();
        assert_eq!(out, b"hello world");
        assert_eq!(err, b"warn");
    }

    #[test]
    fn write_after_close_errors() {
        let (streamer, _reader) = Streamer::pair();
        streamer.close();
        assert_eq!(streamer.write_stdout(b"x"), Err(StreamClosed));
    }
}
