//! atsms - SMS over AT commands
//!
//! Exchanges SMS messages with a GSM phone reachable over a byte stream
//! (an RFCOMM bridge or a bound RFCOMM tty), using the AT command set of
//! 3GPP TS 27.005/27.007 and the PDU encoding of TS 23.040.
//!
//! # Architecture
//!
//! - `atsms-core`: error taxonomy, device-state enums, session configuration
//! - `atsms-transport`: byte-stream contract, TCP, serial and in-memory transports
//! - `atsms-pdu`: PDU codec and multipart reassembly
//! - `atsms-session`: AT dialogue engine and response parser
//! - `atsms-client`: phone operations
//!
//! # Usage
//!
//! ```no_run
//! use atsms::client::ConnectionBuilder;
//! use atsms::pdu::SubmitOptions;
//!
//! # async fn run() -> atsms::SmsResult<()> {
//! let phone = ConnectionBuilder::new().tcp("127.0.0.1:5000").build()?;
//! phone.send_sms("+46701234567", "hello", &SubmitOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;

// Re-export core types
pub use atsms_core::{
    CodecError, ConnectionDescriptor, DeviceMode, IntegrityError, SessionConfig, SmsError,
    SmsFilter, SmsResult, Storage, StorageSlots,
};

// Re-export client API
pub mod client {
    pub use atsms_client::*;
}

pub mod pdu {
    pub use atsms_pdu::*;
}

pub mod session {
    pub use atsms_session::*;
}

pub mod transport {
    pub use atsms_transport::*;
}
