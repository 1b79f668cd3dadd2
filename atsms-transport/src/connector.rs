//! Transport factories
//!
//! A dialogue session lives for exactly one logical operation, so clients
//! keep a [`Connector`] and ask it for a fresh, unopened transport each time.

use crate::serial::{SerialSettings, SerialTransport};
use crate::stream::{StreamAccessor, TransportLayer};
use crate::tcp::{TcpSettings, TcpTransport};
use atsms_core::{ConnectionDescriptor, SmsResult};
use async_trait::async_trait;
use std::time::Duration;

/// Creates unopened transports for one endpoint
pub trait Connector: Send + Sync {
    type Transport: TransportLayer;

    fn transport(&self) -> SmsResult<Self::Transport>;
}

impl Connector for ConnectionDescriptor {
    type Transport = AnyTransport;

    fn transport(&self) -> SmsResult<AnyTransport> {
        match self {
            ConnectionDescriptor::Tcp { address } => {
                Ok(AnyTransport::Tcp(TcpTransport::from_address(address)?))
            }
            ConnectionDescriptor::Serial {
                port_name,
                baud_rate,
            } => Ok(AnyTransport::Serial(SerialTransport::new(
                SerialSettings::new(port_name.as_str(), *baud_rate),
            ))),
        }
    }
}

impl Connector for TcpSettings {
    type Transport = TcpTransport;

    fn transport(&self) -> SmsResult<TcpTransport> {
        Ok(TcpTransport::new(self.clone()))
    }
}

impl Connector for SerialSettings {
    type Transport = SerialTransport;

    fn transport(&self) -> SmsResult<SerialTransport> {
        Ok(SerialTransport::new(self.clone()))
    }
}

/// Any of the physical transports
#[derive(Debug)]
pub enum AnyTransport {
    Tcp(TcpTransport),
    Serial(SerialTransport),
}

#[async_trait]
impl TransportLayer for AnyTransport {
    async fn open(&mut self) -> SmsResult<()> {
        match self {
            AnyTransport::Tcp(t) => t.open().await,
            AnyTransport::Serial(t) => t.open().await,
        }
    }

    fn endpoint(&self) -> String {
        match self {
            AnyTransport::Tcp(t) => t.endpoint(),
            AnyTransport::Serial(t) => t.endpoint(),
        }
    }
}

#[async_trait]
impl StreamAccessor for AnyTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> SmsResult<()> {
        match self {
            AnyTransport::Tcp(t) => t.set_timeout(timeout).await,
            AnyTransport::Serial(t) => t.set_timeout(timeout).await,
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> SmsResult<usize> {
        match self {
            AnyTransport::Tcp(t) => t.read(buf).await,
            AnyTransport::Serial(t) => t.read(buf).await,
        }
    }

    async fn write(&mut self, buf: &[u8]) -> SmsResult<usize> {
        match self {
            AnyTransport::Tcp(t) => t.write(buf).await,
            AnyTransport::Serial(t) => t.write(buf).await,
        }
    }

    async fn flush(&mut self) -> SmsResult<()> {
        match self {
            AnyTransport::Tcp(t) => t.flush().await,
            AnyTransport::Serial(t) => t.flush().await,
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            AnyTransport::Tcp(t) => t.is_closed(),
            AnyTransport::Serial(t) => t.is_closed(),
        }
    }

    async fn close(&mut self) -> SmsResult<()> {
        match self {
            AnyTransport::Tcp(t) => t.close().await,
            AnyTransport::Serial(t) => t.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_builds_transport() {
        let descriptor = ConnectionDescriptor::from_service("10.0.0.2", 4);
        let transport = descriptor.transport().unwrap();
        assert_eq!(transport.endpoint(), "tcp://10.0.0.2:4");

        let serial = ConnectionDescriptor::Serial {
            port_name: "/dev/rfcomm0".to_string(),
            baud_rate: 115200,
        };
        assert!(matches!(serial.transport().unwrap(), AnyTransport::Serial(_)));
    }
}
