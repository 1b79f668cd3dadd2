//! TCP link to an RFCOMM bridge
//!
//! Bridges such as `rfcomm-socat` expose a phone's serial channel as a TCP
//! port. The socket carries the raw AT byte stream, nothing else.

use crate::stream::{already_open, not_connected, timed_read, StreamAccessor, TransportLayer};
use atsms_core::{SmsError, SmsResult};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Where and how to reach the bridge
#[derive(Debug, Clone)]
pub struct TcpSettings {
    /// `host:port`, resolved at open time
    pub address: String,
    pub connect_timeout: Option<Duration>,
    /// Replaced by the drain timeout before every exchange
    pub read_timeout: Option<Duration>,
}

impl TcpSettings {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: Some(Duration::from_secs(30)),
            read_timeout: Some(Duration::from_secs(1)),
        }
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

pub struct TcpTransport {
    stream: Option<TcpStream>,
    settings: TcpSettings,
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpTransport")
            .field("settings", &self.settings)
            .field("open", &self.stream.is_some())
            .finish()
    }
}

impl TcpTransport {
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
        }
    }

    /// Transport for a `host:port` address
    pub fn from_address(address: &str) -> SmsResult<Self> {
        match address.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(Self::new(TcpSettings::new(address)))
            }
            _ => Err(SmsError::InvalidData(format!(
                "Invalid bridge address (expected host:port): {}",
                address
            ))),
        }
    }

    fn connected(&mut self) -> SmsResult<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(|| not_connected("TCP link"))
    }
}

#[async_trait]
impl TransportLayer for TcpTransport {
    async fn open(&mut self) -> SmsResult<()> {
        if self.stream.is_some() {
            return Err(already_open());
        }
        let address = self.settings.address.as_str();
        let stream = match self.settings.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, TcpStream::connect(address))
                .await
                .map_err(|_| SmsError::Timeout)??,
            None => TcpStream::connect(address).await?,
        };
        // Command lines are short; do not hold them back
        stream.set_nodelay(true)?;

        log::debug!("Connected to tcp://{}", address);
        self.stream = Some(stream);
        Ok(())
    }

    fn endpoint(&self) -> String {
        format!("tcp://{}", self.settings.address)
    }
}

#[async_trait]
impl StreamAccessor for TcpTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> SmsResult<()> {
        self.settings.read_timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> SmsResult<usize> {
        let timeout = self.settings.read_timeout;
        let result = timed_read(self.connected()?, buf, timeout).await;
        match result {
            Ok(0) | Err(SmsError::Transport(_)) => {
                log::debug!("Bridge {} went away", self.settings.address);
                self.stream = None;
            }
            _ => {}
        }
        result
    }

    async fn write(&mut self, buf: &[u8]) -> SmsResult<usize> {
        Ok(self.connected()?.write(buf).await?)
    }

    async fn flush(&mut self) -> SmsResult<()> {
        Ok(self.connected()?.flush().await?)
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    async fn close(&mut self) -> SmsResult<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.shutdown().await {
                log::debug!("Shutdown of tcp://{} failed: {}", self.settings.address, err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_from_address_requires_port() {
        assert!(TcpTransport::from_address("localhost").is_err());
        assert!(TcpTransport::from_address(":2000").is_err());
        assert!(TcpTransport::from_address("localhost:rfcomm").is_err());
        let transport = TcpTransport::from_address("bridge.local:2000").unwrap();
        assert_eq!(transport.endpoint(), "tcp://bridge.local:2000");
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_read_times_out_on_silence() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut line = [0u8; 4];
            socket.read_exact(&mut line).await.unwrap();
            socket.write_all(b"\r\nOK\r\n").await.unwrap();
            // Keep the socket open and silent
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let settings = TcpSettings::new(address).read_timeout(Duration::from_millis(50));
        let mut transport = TcpTransport::new(settings);
        transport.open().await.unwrap();
        assert!(transport.open().await.is_err());
        transport.write_all(b"AT\r\n").await.unwrap();

        let mut received = Vec::new();
        let mut buf = [0u8; 16];
        loop {
            match transport.read(&mut buf).await {
                Ok(n) if n > 0 => received.extend_from_slice(&buf[..n]),
                Ok(_) => panic!("unexpected EOF"),
                Err(SmsError::Timeout) => break,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(received, b"\r\nOK\r\n");
        assert!(!transport.is_closed());
        transport.close().await.unwrap();
        assert!(transport.is_closed());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_peer_close_closes_link() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut transport = TcpTransport::new(TcpSettings::new(address));
        transport.open().await.unwrap();
        server.await.unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(transport.read(&mut buf).await.unwrap(), 0);
        assert!(transport.is_closed());
        assert!(matches!(
            transport.read(&mut buf).await,
            Err(SmsError::Transport(_))
        ));
    }
}
