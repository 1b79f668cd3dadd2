//! Decoded message records

use crate::address::PhoneAddress;
use crate::dcs::MessageEncoding;
use crate::timestamp::SmscTimestamp;
use crate::udh::UserDataHeader;
use atsms_core::SmsFilter;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message type indicator of the first octet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PduKind {
    /// SMS-DELIVER: received message
    Deliver,
    /// SMS-SUBMIT: stored outgoing message
    Submit,
    /// SMS-STATUS-REPORT
    StatusReport,
}

impl fmt::Display for PduKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PduKind::Deliver => f.write_str("DELIVER"),
            PduKind::Submit => f.write_str("SUBMIT"),
            PduKind::StatusReport => f.write_str("STATUS-REPORT"),
        }
    }
}

/// Concatenation metadata taken from the User Data Header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConcatenationInfo {
    /// 8-bit references are widened
    pub reference: u16,
    pub total: u8,
    /// 1-based
    pub sequence: u8,
}

/// Fields specific to SMS-STATUS-REPORT
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReportInfo {
    /// TP-MR of the submitted message this report is about
    pub message_reference: u8,
    pub discharge_time: Option<SmscTimestamp>,
    /// TP-ST (0x00..=0x1F delivered, 0x20.. temporary, 0x40.. permanent)
    pub status: u8,
}

impl StatusReportInfo {
    pub fn is_delivered(&self) -> bool {
        self.status < 0x20
    }
}

/// One decoded PDU, plus where the phone listed it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedMessageRecord {
    pub kind: PduKind,
    pub smsc: Option<PhoneAddress>,
    /// Originator for DELIVER, recipient for SUBMIT and STATUS-REPORT
    pub number: PhoneAddress,
    pub text: String,
    pub encoding: MessageEncoding,
    /// Service-center time stamp; absent for SUBMIT or when not valid BCD
    pub timestamp: Option<SmscTimestamp>,
    pub header: Option<UserDataHeader>,
    pub concatenation: Option<ConcatenationInfo>,
    pub status_report: Option<StatusReportInfo>,
    /// Storage index reported by the listing, if it came from one
    pub slot: Option<u32>,
    /// Status field reported by the listing
    pub filter: Option<SmsFilter>,
}

impl DecodedMessageRecord {
    /// Concatenation reference, None for single-part messages
    pub fn reference(&self) -> Option<u16> {
        self.concatenation.map(|c| c.reference)
    }

    /// Position within the concatenated message, 1 for single-part messages
    pub fn sequence(&self) -> u8 {
        self.concatenation.map_or(1, |c| c.sequence)
    }

    pub fn total_parts(&self) -> u8 {
        self.concatenation.map_or(1, |c| c.total)
    }

    /// Attach the listing metadata
    pub fn with_listing(mut self, slot: u32, filter: Option<SmsFilter>) -> Self {
        self.slot = Some(slot);
        self.filter = filter;
        self
    }
}
