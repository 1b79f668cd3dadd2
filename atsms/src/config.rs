//! Command-line tool configuration file
//!
//! ```toml
//! [endpoint]
//! serial = "/dev/rfcomm0"
//! baud_rate = 115200
//!
//! [session]
//! drain_timeout = 1000
//! list_retries = 10
//!
//! [session.settle]
//! listing = 3000
//! ```
//!
//! Durations are in milliseconds. Every key is optional.

use atsms_core::{ConnectionDescriptor, SessionConfig, SmsError, SmsResult};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EndpointConfig {
    /// "host:port" of a stream bridge
    pub tcp: Option<String>,
    /// Device path of a bound RFCOMM tty
    pub serial: Option<String>,
    pub baud_rate: Option<u32>,
}

impl EndpointConfig {
    /// The configured endpoint, None if neither `tcp` nor `serial` is set
    pub fn descriptor(&self) -> SmsResult<Option<ConnectionDescriptor>> {
        match (&self.tcp, &self.serial) {
            (Some(_), Some(_)) => Err(SmsError::InvalidData(
                "endpoint sets both tcp and serial".to_string(),
            )),
            (Some(address), None) => Ok(Some(ConnectionDescriptor::Tcp {
                address: address.clone(),
            })),
            (None, Some(port_name)) => Ok(Some(ConnectionDescriptor::Serial {
                port_name: port_name.clone(),
                baud_rate: self.baud_rate.unwrap_or(DEFAULT_BAUD_RATE),
            })),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.endpoint.descriptor().unwrap(), None);
    }

    #[test]
    fn test_serial_endpoint_and_session() {
        let config = AppConfig::from_toml(
            r#"
            [endpoint]
            serial = "/dev/rfcomm0"

            [session]
            drain_timeout = 500
            list_retries = 3

            [session.settle]
            listing = 4000
            "#,
        )
        .unwrap();
        assert_eq!(
            config.endpoint.descriptor().unwrap(),
            Some(ConnectionDescriptor::Serial {
                port_name: "/dev/rfcomm0".to_string(),
                baud_rate: DEFAULT_BAUD_RATE
            })
        );
        assert_eq!(config.session.drain_timeout, Duration::from_millis(500));
        assert_eq!(config.session.list_retries, 3);
        assert_eq!(config.session.settle.listing, Duration::from_millis(4000));
        assert_eq!(config.session.settle.control, Duration::from_secs(1));
    }

    #[test]
    fn test_conflicting_endpoint() {
        let config = AppConfig::from_toml(
            "[endpoint]\ntcp = \"127.0.0.1:5000\"\nserial = \"/dev/rfcomm0\"\n",
        )
        .unwrap();
        assert!(config.endpoint.descriptor().is_err());
    }
}
