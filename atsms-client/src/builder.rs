//! Connection builder
//!
//! ```rust,no_run
//! use atsms_client::ConnectionBuilder;
//!
//! # async fn run() -> atsms_core::SmsResult<()> {
//! // RFCOMM bridge exposing the phone's serial channel as a TCP port
//! let phone = ConnectionBuilder::new().tcp("127.0.0.1:5000").build()?;
//! let mode = phone.mode().await?;
//!
//! // Bound RFCOMM tty
//! let phone = ConnectionBuilder::new()
//!     .serial("/dev/rfcomm0", 115200)
//!     .list_retries(3)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::phone::Phone;
use atsms_core::{ConnectionDescriptor, SessionConfig, SmsError, SmsResult};
use std::time::Duration;

/// Builder for a [`Phone`] reached through a [`ConnectionDescriptor`]
///
/// # Default Settings
/// - Session configuration: `SessionConfig::default()`
#[derive(Debug, Clone, Default)]
pub struct ConnectionBuilder {
    descriptor: Option<ConnectionDescriptor>,
    config: SessionConfig,
}

impl ConnectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure TCP transport
    ///
    /// # Arguments
    /// * `address` - "host:port" of the stream bridge
    pub fn tcp(mut self, address: &str) -> Self {
        self.descriptor = Some(ConnectionDescriptor::Tcp {
            address: address.to_string(),
        });
        self
    }

    /// Configure Serial transport
    ///
    /// # Arguments
    /// * `port_name` - Device path, e.g. "/dev/rfcomm0"
    /// * `baud_rate` - Baud rate, e.g. 115200
    pub fn serial(mut self, port_name: &str, baud_rate: u32) -> Self {
        self.descriptor = Some(ConnectionDescriptor::Serial {
            port_name: port_name.to_string(),
            baud_rate,
        });
        self
    }

    /// Use an endpoint resolved elsewhere
    pub fn descriptor(mut self, descriptor: ConnectionDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    /// Replace the whole session configuration
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Attempts for listings that answer empty
    pub fn list_retries(mut self, attempts: u32) -> Self {
        self.config.list_retries = attempts;
        self
    }

    /// Silence that ends a response
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.config.drain_timeout = timeout;
        self
    }

    /// Build the phone handle
    ///
    /// # Errors
    /// `SmsError::InvalidData` if no transport was configured, or the
    /// configuration cannot work (zero listing attempts, zero read chunk).
    pub fn build(self) -> SmsResult<Phone> {
        let descriptor = self
            .descriptor
            .ok_or_else(|| SmsError::InvalidData("Transport not configured".to_string()))?;
        if self.config.list_retries == 0 {
            return Err(SmsError::InvalidData(
                "list_retries must be at least 1".to_string(),
            ));
        }
        if self.config.read_chunk_size == 0 {
            return Err(SmsError::InvalidData(
                "read_chunk_size must be at least 1".to_string(),
            ));
        }
        Ok(Phone::new(descriptor, self.config))
    }
}
