//! Listing record decoding
//!
//! `AT+CMGL` / `AT+CMGR` answer with one record per stored message. In PDU
//! mode the header is `<index>,<stat>,[<alpha>],<length>` and the body the
//! PDU in hex; in TEXT mode the header carries the status, number and time
//! stamp and the body is the message text.

use atsms_core::{CodecError, IntegrityError, SmsFilter};
use atsms_pdu::{decode_pdu_hex, reassemble, DecodedMessageRecord, LogicalMessage};
use atsms_session::RawRecord;
use serde::{Deserialize, Serialize};

/// A listed record that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    /// Storage index from the record header, if it had one
    pub slot: Option<u32>,
    pub error: CodecError,
}

/// Result of a PDU-mode listing
///
/// One bad record never hides the others: undecodable records land in
/// `decode_errors`, concatenated groups that cannot be reconciled in
/// `integrity_errors`, and everything else in `messages`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOutcome {
    pub messages: Vec<LogicalMessage>,
    pub decode_errors: Vec<RecordError>,
    pub integrity_errors: Vec<IntegrityError>,
}

impl ListOutcome {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.decode_errors.is_empty() && self.integrity_errors.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.decode_errors.is_empty() && self.integrity_errors.is_empty()
    }
}

/// Decode one PDU-mode record
///
/// `slot` overrides the index field, for `AT+CMGR` whose header starts with
/// the status instead.
pub fn decode_record(record: &RawRecord, slot: Option<u32>) -> Result<DecodedMessageRecord, RecordError> {
    let (slot, status_field) = match slot {
        Some(slot) => (Some(slot), record.field(0)),
        None => (record.numeric_field(0), record.field(1)),
    };
    let filter = status_field.as_deref().and_then(SmsFilter::from_field);
    let decoded = decode_pdu_hex(&record.body).map_err(|error| RecordError { slot, error })?;
    Ok(match slot {
        Some(slot) => decoded.with_listing(slot, filter),
        None => DecodedMessageRecord { filter, ..decoded },
    })
}

/// Decode every record of a PDU-mode listing and reassemble the result
pub fn decode_listing(records: &[RawRecord]) -> ListOutcome {
    let mut decode_errors = Vec::new();
    let mut decoded = Vec::with_capacity(records.len());
    for record in records {
        match decode_record(record, None) {
            Ok(message) => decoded.push(message),
            Err(err) => {
                log::warn!("Skipping undecodable record {:?}: {}", err.slot, err.error);
                decode_errors.push(err);
            }
        }
    }
    let reassembly = reassemble(decoded);
    ListOutcome {
        messages: reassembly.messages,
        decode_errors,
        integrity_errors: reassembly.errors,
    }
}

/// One TEXT-mode record, as the device rendered it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMessage {
    /// None for `AT+CMGR` answers, which carry no index
    pub slot: Option<u32>,
    pub status: Option<SmsFilter>,
    pub number: String,
    /// Phonebook name the device matched to the number
    pub alpha: Option<String>,
    /// Device-formatted time stamp (`yy/MM/dd,hh:mm:ss±zz`)
    pub timestamp: Option<String>,
    pub text: String,
}

impl TextMessage {
    /// Parse a `+CMGL: <index>,<stat>,<oa/da>,[<alpha>],[<scts>]` record
    pub fn from_listing(record: &RawRecord) -> Self {
        let fields = record.fields();
        let field = |i: usize| fields.get(i).filter(|f| !f.is_empty()).cloned();
        Self {
            slot: field(0).and_then(|f| f.parse().ok()),
            status: field(1).as_deref().and_then(SmsFilter::from_field),
            number: field(2).unwrap_or_default(),
            alpha: field(3),
            timestamp: field(4),
            text: record.body.clone(),
        }
    }
}
