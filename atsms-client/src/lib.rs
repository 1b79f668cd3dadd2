//! SMS client for phones reachable over a byte stream
//!
//! This crate turns the dialogue engine of `atsms-session` and the codec of
//! `atsms-pdu` into phone operations: sending, listing, reading, storing and
//! deleting messages, plus service-center, identity and phonebook queries.
//!
//! # TODO
//!
//! ## Messages
//! - [x] PDU-mode send with automatic concatenation
//! - [x] TEXT-mode send, store, draft and send from storage
//! - [x] PDU-mode listing with reassembly
//! - [x] TEXT-mode listing
//! - [x] Read and delete by index
//! - [ ] Bulk delete (`AT+CMGD=<index>,<delflag>`)
//!
//! ## Device
//! - [x] Mode and storage status queries
//! - [x] Service center and identity queries
//! - [x] Phonebook pass-through

pub mod builder;
pub mod listing;
pub mod phone;
pub mod phonebook;

#[cfg(test)]
mod testing;

pub use builder::ConnectionBuilder;
pub use listing::{ListOutcome, RecordError, TextMessage};
pub use phone::{Phone, ServiceCenter, StorageStatus, StorageUsage, SubmitReceipt};
pub use phonebook::{PhonebookEntry, PhonebookStatus};
