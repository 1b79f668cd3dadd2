//! Serial link: RFCOMM channels bound to a tty (`rfcomm bind`), USB modems
//! and RS-232 phones

use crate::stream::{already_open, not_connected, timed_read, StreamAccessor, TransportLayer};
use atsms_core::{SmsError, SmsResult};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_serial::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialStream, StopBits};

/// Line settings; phones answer on 8N1 without flow control
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
    /// Replaced by the drain timeout before every exchange
    pub read_timeout: Option<Duration>,
}

impl SerialSettings {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            read_timeout: Some(Duration::from_secs(1)),
        }
    }

    /// RTS/CTS, for USB modems that drop bytes without it
    pub fn hardware_flow_control(mut self) -> Self {
        self.flow_control = FlowControl::Hardware;
        self
    }
}

pub struct SerialTransport {
    port: Option<SerialStream>,
    settings: SerialSettings,
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialTransport")
            .field("settings", &self.settings)
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl SerialTransport {
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            port: None,
            settings,
        }
    }

    fn connected(&mut self) -> SmsResult<&mut SerialStream> {
        self.port.as_mut().ok_or_else(|| not_connected("Serial port"))
    }
}

#[async_trait]
impl TransportLayer for SerialTransport {
    async fn open(&mut self) -> SmsResult<()> {
        if self.port.is_some() {
            return Err(already_open());
        }
        let settings = &self.settings;
        let builder = tokio_serial::new(&settings.port_name, settings.baud_rate)
            .data_bits(settings.data_bits)
            .stop_bits(settings.stop_bits)
            .parity(settings.parity)
            .flow_control(settings.flow_control);
        let port = SerialStream::open(&builder).map_err(|e| {
            SmsError::Transport(std::io::Error::other(format!(
                "Failed to open {}: {}",
                settings.port_name, e
            )))
        })?;
        // Unsolicited codes queued while nobody was listening
        if let Err(err) = port.clear(ClearBuffer::Input) {
            log::debug!("Could not clear input of {}: {}", settings.port_name, err);
        }

        log::debug!("Opened {} at {} baud", settings.port_name, settings.baud_rate);
        self.port = Some(port);
        Ok(())
    }

    fn endpoint(&self) -> String {
        format!("serial://{}@{}", self.settings.port_name, self.settings.baud_rate)
    }
}

#[async_trait]
impl StreamAccessor for SerialTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> SmsResult<()> {
        self.settings.read_timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> SmsResult<usize> {
        let timeout = self.settings.read_timeout;
        let result = timed_read(self.connected()?, buf, timeout).await;
        match result {
            Ok(0) | Err(SmsError::Transport(_)) => {
                log::debug!("{} went away", self.settings.port_name);
                self.port = None;
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
        self.port.is_none()
    }

    async fn close(&mut self) -> SmsResult<()> {
        if let Some(mut port) = self.port.take() {
            if let Err(err) = port.flush().await {
                log::debug!("Flush of {} failed: {}", self.settings.port_name, err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_settings() {
        let settings = SerialSettings::new("/dev/rfcomm0", 115200);
        assert_eq!(settings.baud_rate, 115200);
        assert_eq!(settings.flow_control, FlowControl::None);
        assert_eq!(
            settings.hardware_flow_control().flow_control,
            FlowControl::Hardware
        );
    }

    #[tokio::test]
    async fn test_unopened_port() {
        let mut transport = SerialTransport::new(SerialSettings::new("/dev/rfcomm0", 9600));
        assert_eq!(transport.endpoint(), "serial:///dev/rfcomm0@9600");
        assert!(transport.is_closed());
        let mut buf = [0u8; 4];
        assert!(matches!(
            transport.read(&mut buf).await,
            Err(SmsError::Transport(_))
        ));
        assert!(transport.close().await.is_ok());
    }
}
