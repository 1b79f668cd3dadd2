//! Multipart reassembly
//!
//! Fragments are grouped by sender and concatenation reference, ordered by
//! sequence number and merged. Phones list stored fragments in whatever
//! order they were stored, and some never arrive, so a group with gaps is
//! still emitted and flagged incomplete instead of being held back.

use crate::address::PhoneAddress;
use crate::dcs::MessageEncoding;
use crate::record::{DecodedMessageRecord, PduKind};
use crate::timestamp::SmscTimestamp;
use atsms_core::{IntegrityError, SmsFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A message as the user sees it, possibly merged from several PDUs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalMessage {
    pub kind: PduKind,
    pub number: PhoneAddress,
    pub text: String,
    /// Time stamp of the lowest fragment present
    pub timestamp: Option<SmscTimestamp>,
    pub encoding: MessageEncoding,
    /// Concatenation reference, None for single-part messages
    pub reference: Option<u16>,
    pub total_parts: u8,
    /// False when at least one fragment is missing
    pub complete: bool,
    /// Sequence numbers that never showed up
    pub missing: Vec<u8>,
    /// Storage indexes of the fragments, in sequence order
    pub slots: Vec<u32>,
    pub filter: Option<SmsFilter>,
}

/// Outcome of [`reassemble`]
///
/// Groups with inconsistent concatenation headers are abandoned and reported
/// in `errors`; all other groups are still returned in `messages`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reassembly {
    pub messages: Vec<LogicalMessage>,
    pub errors: Vec<IntegrityError>,
}

impl Reassembly {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

enum Group {
    Single(DecodedMessageRecord),
    Fragments(u16, Vec<DecodedMessageRecord>),
}

/// Group, order and merge decoded records
///
/// The output keeps the order in which each message's first record arrived.
pub fn reassemble<I>(records: I) -> Reassembly
where
    I: IntoIterator<Item = DecodedMessageRecord>,
{
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<(String, u16), usize> = HashMap::new();

    for record in records {
        let Some(reference) = record.reference() else {
            groups.push(Group::Single(record));
            continue;
        };
        let key = (record.number.value.clone(), reference);
        match index.get(&key) {
            Some(&position) => {
                if let Group::Fragments(_, fragments) = &mut groups[position] {
                    fragments.push(record);
                }
            }
            None => {
                index.insert(key, groups.len());
                groups.push(Group::Fragments(reference, vec![record]));
            }
        }
    }

    let mut outcome = Reassembly::default();
    for group in groups {
        match group {
            Group::Single(record) => outcome.messages.push(single(record)),
            Group::Fragments(reference, fragments) => match merge(reference, fragments) {
                Ok(message) => outcome.messages.push(message),
                Err(err) => {
                    log::warn!("Abandoning concatenated message: {}", err);
                    outcome.errors.push(err);
                }
            },
        }
    }
    outcome
}

fn single(record: DecodedMessageRecord) -> LogicalMessage {
    LogicalMessage {
        kind: record.kind,
        number: record.number,
        text: record.text,
        timestamp: record.timestamp,
        encoding: record.encoding,
        reference: None,
        total_parts: 1,
        complete: true,
        missing: Vec::new(),
        slots: record.slot.into_iter().collect(),
        filter: record.filter,
    }
}

fn merge(
    reference: u16,
    mut fragments: Vec<DecodedMessageRecord>,
) -> Result<LogicalMessage, IntegrityError> {
    let expected = fragments[0].total_parts();
    if let Some(odd) = fragments.iter().find(|f| f.total_parts() != expected) {
        return Err(IntegrityError::InconsistentConcatenationHeader {
            reference,
            expected,
            found: odd.total_parts(),
        });
    }
    if let Some(odd) = fragments
        .iter()
        .find(|f| f.sequence() == 0 || f.sequence() > expected)
    {
        return Err(IntegrityError::SequenceOutOfRange {
            reference,
            sequence: odd.sequence(),
            total: expected,
        });
    }

    // Stable sort keeps arrival order among duplicates; the first one wins
    fragments.sort_by_key(DecodedMessageRecord::sequence);
    let before = fragments.len();
    fragments.dedup_by_key(|f| f.sequence());
    if fragments.len() != before {
        log::warn!(
            "Dropped {} duplicate fragment(s) of reference {}",
            before - fragments.len(),
            reference
        );
    }

    let missing: Vec<u8> = (1..=expected)
        .filter(|seq| !fragments.iter().any(|f| f.sequence() == *seq))
        .collect();
    let text: String = fragments.iter().map(|f| f.text.as_str()).collect();
    let slots = fragments.iter().filter_map(|f| f.slot).collect();
    let first = fragments.swap_remove(0);

    Ok(LogicalMessage {
        kind: first.kind,
        number: first.number,
        text,
        timestamp: first.timestamp,
        encoding: first.encoding,
        reference: Some(reference),
        total_parts: expected,
        complete: missing.is_empty(),
        missing,
        slots,
        filter: first.filter,
    })
}
