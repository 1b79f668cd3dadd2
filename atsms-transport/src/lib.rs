//! Transport layer module for the AT/SMS stack
//!
//! This crate provides the byte-stream contract consumed by the dialogue engine
//! and its implementations: TCP (RFCOMM bridges), serial (bound RFCOMM tty
//! devices) and an in-memory scripted transport for loopback use.
//!
//! The dialogue engine never expects framing from this layer. A read that
//! produces no byte within the read timeout reports `SmsError::Timeout`, which
//! the engine takes as "response complete".

pub mod connector;
pub mod memory;
pub mod serial;
pub mod stream;
pub mod tcp;

pub use atsms_core::{SmsError, SmsResult};
pub use connector::{AnyTransport, Connector};
pub use memory::{MemoryLog, MemoryTransport, Responder};
pub use serial::{SerialSettings, SerialTransport};
pub use stream::{StreamAccessor, TransportLayer};
pub use tcp::{TcpSettings, TcpTransport};
