//! Byte-stream contract between the dialogue engine and a physical link
//!
//! AT answers carry no length or framing byte; the engine reads in chunks
//! and treats a read that times out as the end of the answer. Every
//! transport therefore honours the read timeout set through
//! [`StreamAccessor::set_timeout`] and reports its expiry as
//! `SmsError::Timeout`, never as an I/O error.

use atsms_core::{SmsError, SmsResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read/write access to an open link to a phone
#[async_trait]
pub trait StreamAccessor: Send + Sync {
    /// Set the read timeout
    ///
    /// # Arguments
    ///
    /// * `timeout` - How long one read may wait for the first byte. None
    ///   waits forever.
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> SmsResult<()>;

    /// Read whatever the phone has sent so far
    ///
    /// # Returns
    ///
    /// Number of bytes read, 0 once the peer has closed the link.
    /// `SmsError::Timeout` when nothing arrived within the read timeout.
    async fn read(&mut self, buf: &mut [u8]) -> SmsResult<usize>;

    /// Write part of `buf`, returning how much was accepted
    async fn write(&mut self, buf: &[u8]) -> SmsResult<usize>;

    /// Write a whole command line or message body
    async fn write_all(&mut self, buf: &[u8]) -> SmsResult<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                return Err(SmsError::Transport(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "Link accepted no more bytes",
                )));
            }
            written += n;
        }
        Ok(())
    }

    async fn flush(&mut self) -> SmsResult<()>;

    fn is_closed(&self) -> bool;

    async fn close(&mut self) -> SmsResult<()>;
}

/// A link that can be opened and named
#[async_trait]
pub trait TransportLayer: StreamAccessor {
    /// Open the physical link; fails if it is already open
    async fn open(&mut self) -> SmsResult<()>;

    /// Human-readable endpoint, for logging
    fn endpoint(&self) -> String;
}

/// One read from `stream`, bounded by `timeout`
pub(crate) async fn timed_read<S>(
    stream: &mut S,
    buf: &mut [u8],
    timeout: Option<Duration>,
) -> SmsResult<usize>
where
    S: AsyncRead + Unpin + Send,
{
    let read = stream.read(buf);
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, read)
            .await
            .map_err(|_| SmsError::Timeout)?,
        None => read.await,
    };
    result.map_err(SmsError::Transport)
}

pub(crate) fn not_connected(what: &str) -> SmsError {
    SmsError::Transport(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        format!("{} is not open", what),
    ))
}

pub(crate) fn already_open() -> SmsError {
    SmsError::Transport(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        "Link is already open",
    ))
}
