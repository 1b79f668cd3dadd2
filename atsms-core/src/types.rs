//! Device-state enums shared by the session and client layers

use crate::error::{SmsError, SmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SMS message format selected with `AT+CMGF`
///
/// The device holds this state; the session only mirrors the last value it set.
/// Every operation assumes PDU mode unless it switches explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceMode {
    #[default]
    Pdu,
    Text,
}

impl DeviceMode {
    /// Numeric value used on the wire (`AT+CMGF=<code>`)
    pub fn code(&self) -> u8 {
        match self {
            DeviceMode::Pdu => 0,
            DeviceMode::Text => 1,
        }
    }

    pub fn from_code(code: u8) -> SmsResult<Self> {
        match code {
            0 => Ok(DeviceMode::Pdu),
            1 => Ok(DeviceMode::Text),
            other => Err(SmsError::InvalidData(format!(
                "Unknown message format code: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceMode::Pdu => f.write_str("PDU"),
            DeviceMode::Text => f.write_str("TEXT"),
        }
    }
}

/// Message storage area name, as used in `AT+CPMS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Storage {
    /// "SM": SIM card
    #[default]
    Sim,
    /// "ME": device memory
    Phone,
    /// "MT": SIM and device memory combined
    Combined,
    /// "SR": status report store
    StatusReport,
    /// "BM": broadcast message store
    Broadcast,
    /// "TA": terminal adaptor memory
    Terminal,
}

impl Storage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Storage::Sim => "SM",
            Storage::Phone => "ME",
            Storage::Combined => "MT",
            Storage::StatusReport => "SR",
            Storage::Broadcast => "BM",
            Storage::Terminal => "TA",
        }
    }
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Storage {
    type Err = SmsError;

    fn from_str(s: &str) -> SmsResult<Self> {
        match s.trim().trim_matches('"').to_ascii_uppercase().as_str() {
            "SM" => Ok(Storage::Sim),
            "ME" => Ok(Storage::Phone),
            "MT" => Ok(Storage::Combined),
            "SR" => Ok(Storage::StatusReport),
            "BM" => Ok(Storage::Broadcast),
            "TA" => Ok(Storage::Terminal),
            other => Err(SmsError::InvalidData(format!("Unknown storage: {}", other))),
        }
    }
}

/// The three independent storage slots of `AT+CPMS`
///
/// * `read` - where listing, reading and deleting operate
/// * `write` - where writing and sending from storage operate
/// * `receive` - where newly received messages are placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StorageSlots {
    pub read: Storage,
    pub write: Storage,
    pub receive: Storage,
}

impl StorageSlots {
    pub fn new(read: Storage, write: Storage, receive: Storage) -> Self {
        Self {
            read,
            write,
            receive,
        }
    }

    /// Same storage for all three slots
    pub fn uniform(storage: Storage) -> Self {
        Self::new(storage, storage, storage)
    }

    pub fn with_read(mut self, storage: Storage) -> Self {
        self.read = storage;
        self
    }

    pub fn with_write(mut self, storage: Storage) -> Self {
        self.write = storage;
        self
    }

    pub fn with_receive(mut self, storage: Storage) -> Self {
        self.receive = storage;
        self
    }
}

/// Message status filter for `AT+CMGL`, and message status of listed records
///
/// PDU mode uses the numeric code, TEXT mode the quoted label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SmsFilter {
    ReceivedUnread,
    ReceivedRead,
    StoredUnsent,
    StoredSent,
    All,
}

impl SmsFilter {
    pub const VARIANTS: [SmsFilter; 5] = [
        SmsFilter::ReceivedUnread,
        SmsFilter::ReceivedRead,
        SmsFilter::StoredUnsent,
        SmsFilter::StoredSent,
        SmsFilter::All,
    ];

    /// Numeric code used in PDU mode
    pub fn code(&self) -> u8 {
        match self {
            SmsFilter::ReceivedUnread => 0,
            SmsFilter::ReceivedRead => 1,
            SmsFilter::StoredUnsent => 2,
            SmsFilter::StoredSent => 3,
            SmsFilter::All => 4,
        }
    }

    /// Label used in TEXT mode
    pub fn label(&self) -> &'static str {
        match self {
            SmsFilter::ReceivedUnread => "REC UNREAD",
            SmsFilter::ReceivedRead => "REC READ",
            SmsFilter::StoredUnsent => "STO UNSENT",
            SmsFilter::StoredSent => "STO SENT",
            SmsFilter::All => "ALL",
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::VARIANTS.into_iter().find(|f| f.code() == code)
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().trim_matches('"');
        Self::VARIANTS
            .into_iter()
            .find(|f| f.label().eq_ignore_ascii_case(label))
    }

    /// Parse the `<stat>` field of a listing header, numeric or quoted
    pub fn from_field(field: &str) -> Option<Self> {
        match field.trim().parse::<u8>() {
            Ok(code) => Self::from_code(code),
            Err(_) => Self::from_label(field),
        }
    }

    /// The argument rendering for the given message format
    pub fn argument(&self, mode: DeviceMode) -> String {
        match mode {
            DeviceMode::Pdu => self.code().to_string(),
            DeviceMode::Text => format!("\"{}\"", self.label()),
        }
    }
}

impl fmt::Display for SmsFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Remote endpoint handed in by the discovery collaborator
///
/// The stack never resolves services itself; it only opens what it is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionDescriptor {
    /// Stream socket, e.g. an RFCOMM bridge exposing the channel as a TCP port
    Tcp { address: String },
    /// Character device, e.g. a bound `/dev/rfcomm0`
    Serial { port_name: String, baud_rate: u32 },
}

impl ConnectionDescriptor {
    /// Build a descriptor from an `(address, channel)` pair of a stream bridge
    pub fn from_service(address: &str, channel: u16) -> Self {
        ConnectionDescriptor::Tcp {
            address: format!("{}:{}", address, channel),
        }
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionDescriptor::Tcp { address } => write!(f, "tcp://{}", address),
            ConnectionDescriptor::Serial {
                port_name,
                baud_rate,
            } => write!(f, "serial://{}@{}", port_name, baud_rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_code_and_label() {
        assert_eq!(SmsFilter::All.code(), 4);
        assert_eq!(SmsFilter::All.label(), "ALL");
        assert_eq!(SmsFilter::StoredUnsent.argument(DeviceMode::Text), "\"STO UNSENT\"");
        assert_eq!(SmsFilter::ReceivedRead.argument(DeviceMode::Pdu), "1");
    }

    #[test]
    fn test_filter_from_field() {
        assert_eq!(SmsFilter::from_field("0"), Some(SmsFilter::ReceivedUnread));
        assert_eq!(SmsFilter::from_field("\"REC READ\""), Some(SmsFilter::ReceivedRead));
        assert_eq!(SmsFilter::from_field("9"), None);
    }

    #[test]
    fn test_storage_parse() {
        assert_eq!("\"ME\"".parse::<Storage>().unwrap(), Storage::Phone);
        assert!("XX".parse::<Storage>().is_err());
        assert_eq!(StorageSlots::default(), StorageSlots::uniform(Storage::Sim));
    }

    #[test]
    fn test_mode_codes() {
        assert_eq!(DeviceMode::from_code(1).unwrap(), DeviceMode::Text);
        assert!(DeviceMode::from_code(7).is_err());
    }

    #[test]
    fn test_descriptor_from_service() {
        let descriptor = ConnectionDescriptor::from_service("127.0.0.1", 3);
        assert_eq!(
            descriptor,
            ConnectionDescriptor::Tcp {
                address: "127.0.0.1:3".to_string()
            }
        );
    }
}
