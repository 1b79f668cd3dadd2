//! In-memory scripted transport
//!
//! Every frame written (a command line ending in CR LF, or a message body
//! ending in `0x1A`) is handed to a [`Responder`], and its answer is queued for
//! reading. Reads hand out at most `chunk_limit` bytes at a time and report
//! `SmsError::Timeout` immediately once the queue is empty, so a drain loop
//! finishes without waiting.

use crate::stream::{already_open, not_connected, StreamAccessor, TransportLayer};
use atsms_core::{SmsError, SmsResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CTRL_Z: u8 = 0x1A;

/// Produces the device answer for one written frame
pub trait Responder: Send {
    fn respond(&mut self, frame: &[u8]) -> Vec<u8>;
}

impl<F> Responder for F
where
    F: FnMut(&[u8]) -> Vec<u8> + Send,
{
    fn respond(&mut self, frame: &[u8]) -> Vec<u8> {
        self(frame)
    }
}

/// Shared record of the frames written to a [`MemoryTransport`]
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MemoryLog {
    fn push(&self, frame: Vec<u8>) {
        if let Ok(mut frames) = self.frames.lock() {
            frames.push(frame);
        }
    }

    /// Raw frames, in write order
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().map(|f| f.clone()).unwrap_or_default()
    }

    /// Frames as text with the CR LF / `0x1A` terminator removed
    pub fn lines(&self) -> Vec<String> {
        self.frames()
            .iter()
            .map(|frame| {
                let text = String::from_utf8_lossy(frame);
                text.trim_end_matches(['\r', '\n', CTRL_Z as char]).to_string()
            })
            .collect()
    }

    /// Number of frames starting with `prefix`
    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.lines().iter().filter(|l| l.starts_with(prefix)).count()
    }

    pub fn clear(&self) {
        if let Ok(mut frames) = self.frames.lock() {
            frames.clear();
        }
    }
}

/// Scripted in-memory transport
pub struct MemoryTransport {
    responder: Mutex<Box<dyn Responder>>,
    pending: Vec<u8>,
    inbound: VecDeque<u8>,
    log: MemoryLog,
    chunk_limit: usize,
    reset_after: Option<usize>,
    timeout: Option<Duration>,
    closed: bool,
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("pending", &self.pending.len())
            .field("inbound", &self.inbound.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl MemoryTransport {
    /// Create a new memory transport answering through `responder`
    pub fn new(responder: impl Responder + 'static) -> Self {
        Self {
            responder: Mutex::new(Box::new(responder)),
            pending: Vec::new(),
            inbound: VecDeque::new(),
            log: MemoryLog::default(),
            chunk_limit: 16,
            reset_after: None,
            timeout: None,
            closed: true,
        }
    }

    /// Limit the number of bytes handed out per read
    pub fn with_chunk_limit(mut self, chunk_limit: usize) -> Self {
        self.chunk_limit = chunk_limit.max(1);
        self
    }

    /// Simulate a connection reset once `frames` frames have been written
    pub fn with_reset_after(mut self, frames: usize) -> Self {
        self.reset_after = Some(frames);
        self
    }

    /// Handle on the written frames, usable after the transport moved away
    pub fn log(&self) -> MemoryLog {
        self.log.clone()
    }

    fn next_frame_end(&self) -> Option<usize> {
        self.pending
            .iter()
            .enumerate()
            .find_map(|(i, &b)| match b {
                CTRL_Z => Some(i + 1),
                b'\n' if i > 0 && self.pending[i - 1] == b'\r' => Some(i + 1),
                _ => None,
            })
    }

    fn dispatch_frames(&mut self) {
        while let Some(end) = self.next_frame_end() {
            let frame: Vec<u8> = self.pending.drain(..end).collect();
            let answer = match self.responder.lock() {
                Ok(mut responder) => responder.respond(&frame),
                Err(_) => Vec::new(),
            };
            self.log.push(frame);
            self.inbound.extend(answer);
        }
    }

    fn is_reset(&self) -> bool {
        self.reset_after
            .is_some_and(|limit| self.log.frames().len() >= limit)
    }
}

#[async_trait]
impl TransportLayer for MemoryTransport {
    async fn open(&mut self) -> SmsResult<()> {
        if !self.closed {
            return Err(already_open());
        }
        self.closed = false;
        Ok(())
    }

    fn endpoint(&self) -> String {
        "memory://".to_string()
    }
}

#[async_trait]
impl StreamAccessor for MemoryTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> SmsResult<()> {
        self.timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> SmsResult<usize> {
        if self.closed {
            return Err(not_connected("Memory stream"));
        }
        if self.is_reset() {
            self.closed = true;
            return Err(SmsError::Transport(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Connection reset by peer",
            )));
        }
        if self.inbound.is_empty() {
            return Err(SmsError::Timeout);
        }
        let n = buf.len().min(self.chunk_limit).min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> SmsResult<usize> {
        if self.closed {
            return Err(not_connected("Memory stream"));
        }
        self.pending.extend_from_slice(buf);
        self.dispatch_frames();
        Ok(buf.len())
    }

    async fn flush(&mut self) -> SmsResult<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> SmsResult<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_memory_round_trip() {
        let mut transport = MemoryTransport::new(|frame: &[u8]| {
            if frame.starts_with(b"AT\r") {
                b"AT\r\r\nOK\r\n".to_vec()
            } else {
                Vec::new()
            }
        })
        .with_chunk_limit(4);
        let log = transport.log();
        assert_ok!(transport.open().await);
        assert_ok!(transport.write_all(b"AT\r\n").await);

        let mut received = Vec::new();
        let mut buf = [0u8; 64];
        while let Ok(n) = transport.read(&mut buf).await {
            assert!(n <= 4);
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, b"AT\r\r\nOK\r\n");
        assert_eq!(log.lines(), vec!["AT".to_string()]);
    }

    #[tokio::test]
    async fn test_body_frame_ends_at_ctrl_z() {
        let mut transport = MemoryTransport::new(|_: &[u8]| Vec::new());
        let log = transport.log();
        transport.open().await.unwrap();
        transport.write_all(b"AT+CMGS=12\r\n0011\x1a").await.unwrap();
        assert_eq!(log.frames().len(), 2);
        assert_eq!(log.lines()[1], "0011");
        assert_eq!(log.count_prefix("AT+CMGS"), 1);
    }

    #[tokio::test]
    async fn test_reset_after() {
        let mut transport = MemoryTransport::new(|_: &[u8]| b"OK\r\n".to_vec()).with_reset_after(1);
        transport.open().await.unwrap();
        transport.write_all(b"AT\r\n").await.unwrap();
        let mut buf = [0u8; 8];
        let err = transport.read(&mut buf).await.unwrap_err();
        assert!(matches!(err, SmsError::Transport(_)));
        assert!(transport.is_closed());
    }
}
