//! SMS PDU codec for the AT/SMS stack
//!
//! This crate encodes outgoing text into SMS-SUBMIT PDUs and decodes the
//! SMS-DELIVER, SMS-SUBMIT and SMS-STATUS-REPORT PDUs a phone returns from
//! its message stores (3GPP TS 23.040, alphabets per TS 23.038).
//!
//! # Layout
//!
//! - `gsm7` / `ucs2`: alphabets and septet packing
//! - `address`, `timestamp`, `dcs`, `udh`: PDU fields
//! - `submit`: SUBMIT encoder with automatic concatenation
//! - `decode`: DELIVER / SUBMIT / STATUS-REPORT decoder
//! - `reassembly`: groups concatenated fragments into logical messages
//!
//! # TODO
//!
//! - [x] GSM 7-bit default alphabet and extension table
//! - [x] UCS2 encoding
//! - [x] 8-bit and 16-bit concatenation references
//! - [ ] National language shift tables (TS 23.038 §6.2.1.2)

pub mod address;
pub mod dcs;
pub mod decode;
pub mod gsm7;
pub mod reassembly;
pub mod record;
pub mod reference;
pub mod submit;
pub mod timestamp;
pub mod ucs2;
pub mod udh;

mod reader;

pub use address::PhoneAddress;
pub use dcs::MessageEncoding;
pub use decode::{decode_pdu, decode_pdu_hex};
pub use reassembly::{reassemble, LogicalMessage, Reassembly};
pub use record::{ConcatenationInfo, DecodedMessageRecord, PduKind, StatusReportInfo};
pub use reference::{next_reference, ReferenceCounter};
pub use submit::{encode_submit, PduSegment, SubmitOptions};
pub use timestamp::SmscTimestamp;
pub use udh::{InformationElement, UserDataHeader};
