//! AT command dialogue engine
//!
//! The device speaks a half-duplex, line-oriented protocol and signals the
//! end of an answer with silence rather than with a framing byte. An
//! [`AtSession`] therefore writes one command, waits for the device to
//! settle, and drains the transport until a read times out.
//!
//! # Layout
//!
//! - `command`: typed AT commands and their wire text
//! - `response`: final result code detection and record splitting
//! - `state`: per-exchange state machine
//! - `statistics`: dialogue counters
//! - `session`: the dialogue engine with scoped mode/storage switches
//!
//! # TODO
//!
//! - [x] Command echo and final result code handling
//! - [x] `+CMS ERROR` / `+CME ERROR` reporting
//! - [x] Scoped mode and storage restoration
//! - [x] Cancellation
//! - [ ] Unsolicited result codes (`+CMTI`) arriving between exchanges

pub mod command;
pub mod response;
pub mod session;
pub mod state;
pub mod statistics;

pub use atsms_core::{SmsError, SmsResult};
pub use command::{AtCommand, IdentityQuery};
pub use response::{check_error, parse_response, parse_single, split_fields, RawRecord};
pub use session::AtSession;
pub use state::ExchangeState;
pub use statistics::DialogueStatistics;
