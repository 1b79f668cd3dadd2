//! Dialogue timing and session configuration

use crate::types::StorageSlots;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Command classes sharing a settle delay
///
/// The device needs a pause after each write before it is ready to answer.
/// How long depends on what the command does, not on the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandClass {
    /// Mode and storage switches (`CMGF`, `CPMS`)
    Control,
    /// Submission prompts and PDU bodies (`CMGS`, `CMGW`)
    Submit,
    /// Reads, sends from storage and text bodies (`CMGR`, `CMSS`)
    Read,
    /// Listings (`CMGL`)
    Listing,
    /// Service center, identity and phonebook queries
    Query,
}

/// Settle delay per command class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleDelays {
    #[serde(with = "duration_ms")]
    pub control: Duration,
    #[serde(with = "duration_ms")]
    pub submit: Duration,
    #[serde(with = "duration_ms")]
    pub read: Duration,
    #[serde(with = "duration_ms")]
    pub listing: Duration,
    #[serde(with = "duration_ms")]
    pub query: Duration,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            control: Duration::from_secs(1),
            submit: Duration::from_secs(2),
            read: Duration::from_secs(3),
            listing: Duration::from_secs(3),
            query: Duration::from_secs(2),
        }
    }
}

impl SettleDelays {
    /// Same delay for every class
    pub fn uniform(delay: Duration) -> Self {
        Self {
            control: delay,
            submit: delay,
            read: delay,
            listing: delay,
            query: delay,
        }
    }

    pub fn for_class(&self, class: CommandClass) -> Duration {
        match class {
            CommandClass::Control => self.control,
            CommandClass::Submit => self.submit,
            CommandClass::Read => self.read,
            CommandClass::Listing => self.listing,
            CommandClass::Query => self.query,
        }
    }
}

/// Session configuration
///
/// # Default Settings
/// - Settle delays: control 1 s, submit 2 s, read 3 s, listing 3 s, query 2 s
/// - Drain timeout: 1 s
/// - Read chunk size: 64 bytes
/// - Maximum response size: 64 KiB
/// - Listing attempts: 10
/// - Default storage: "SM","SM","SM"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub settle: SettleDelays,
    /// A read producing nothing within this window ends the response
    #[serde(with = "duration_ms")]
    pub drain_timeout: Duration,
    pub read_chunk_size: usize,
    pub max_response_size: usize,
    /// Attempts for listing commands that may transiently answer empty
    pub list_retries: u32,
    /// Storage triple restored after a scoped storage switch
    pub default_storage: StorageSlots,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle: SettleDelays::default(),
            drain_timeout: Duration::from_secs(1),
            read_chunk_size: 64,
            max_response_size: 64 * 1024,
            list_retries: 10,
            default_storage: StorageSlots::default(),
        }
    }
}

impl SessionConfig {
    /// Zero-delay profile for loopback transports
    pub fn immediate() -> Self {
        Self {
            settle: SettleDelays::uniform(Duration::ZERO),
            drain_timeout: Duration::from_millis(10),
            ..Self::default()
        }
    }

    pub fn settle_delay(&self, class: CommandClass) -> Duration {
        self.settle.for_class(class)
    }
}

/// Durations as integer milliseconds in configuration files
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays() {
        let config = SessionConfig::default();
        assert_eq!(config.settle_delay(CommandClass::Control), Duration::from_secs(1));
        assert_eq!(config.settle_delay(CommandClass::Listing), Duration::from_secs(3));
        assert_eq!(config.list_retries, 10);
    }

    #[test]
    fn test_immediate_profile() {
        let config = SessionConfig::immediate();
        assert_eq!(config.settle_delay(CommandClass::Submit), Duration::ZERO);
        assert_eq!(config.default_storage, StorageSlots::default());
    }
}
