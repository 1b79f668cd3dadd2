//! Core types and utilities for the AT/SMS stack
//!
//! This crate provides the error taxonomy, the device-state enums shared by
//! every layer (message format, storage names, list filters) and the session
//! configuration used by the dialogue engine.

pub mod config;
pub mod error;
pub mod types;

pub use config::{CommandClass, SessionConfig};
pub use error::{CodecError, IntegrityError, SmsError, SmsResult};
pub use types::{ConnectionDescriptor, DeviceMode, SmsFilter, Storage, StorageSlots};
