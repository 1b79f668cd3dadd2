//! SMS-SUBMIT encoder
//!
//! Picks the smallest alphabet covering the whole text (GSM 7-bit, else
//! UCS2), and splits the text into concatenated segments when it does not
//! fit in one PDU. All segments of one message share a concatenation
//! reference taken from the process-wide counter unless one is given.

use crate::address::PhoneAddress;
use crate::dcs::MessageEncoding;
use crate::reference::next_reference;
use crate::udh::UserDataHeader;
use crate::{gsm7, ucs2};
use atsms_core::{SmsError, SmsResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const FIRST_OCTET_SUBMIT: u8 = 0x01;
const FIRST_OCTET_VP_RELATIVE: u8 = 0x10;
const FIRST_OCTET_SRR: u8 = 0x20;
const FIRST_OCTET_UDHI: u8 = 0x40;

/// Sending options for [`encode_submit`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOptions {
    /// Ask the service center for a STATUS-REPORT
    pub request_status_report: bool,
    /// Relative validity period; omitted from the PDU when None
    pub validity: Option<Duration>,
    /// Service center to use instead of the one stored on the SIM
    pub smsc: Option<String>,
    /// Concatenation reference; taken from the process-wide counter when None
    pub reference: Option<u8>,
}

impl SubmitOptions {
    pub fn with_status_report(mut self) -> Self {
        self.request_status_report = true;
        self
    }

    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = Some(validity);
        self
    }

    pub fn with_smsc(mut self, smsc: impl Into<String>) -> Self {
        self.smsc = Some(smsc.into());
        self
    }

    pub fn with_reference(mut self, reference: u8) -> Self {
        self.reference = Some(reference);
        self
    }
}

/// One encoded SUBMIT PDU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PduSegment {
    /// Complete PDU including the service-center field
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
    /// Octets after the service-center field, the `<length>` of `AT+CMGS`
    pub tpdu_length: usize,
    /// 1-based
    pub sequence: u8,
    pub total: u8,
    /// Concatenation reference, None for a single-part message
    pub reference: Option<u8>,
}

impl PduSegment {
    /// Upper-case hex, as written to the device
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.bytes)
    }
}

/// Relative validity period octet (TS 23.040 §9.2.3.12.1), rounded up
pub fn relative_validity(validity: Duration) -> u8 {
    let minutes = validity.as_secs().div_ceil(60);
    if minutes <= 12 * 60 {
        (minutes.div_ceil(5).max(1) - 1) as u8
    } else if minutes <= 24 * 60 {
        (143 + (minutes - 12 * 60).div_ceil(30)) as u8
    } else {
        let days = minutes.div_ceil(24 * 60);
        if days <= 30 {
            (166 + days) as u8
        } else {
            (192 + days.div_ceil(7)).min(255) as u8
        }
    }
}

/// Fill bits and septet count of a header that precedes 7-bit user data
fn header_septets(header_len: usize) -> (u8, usize) {
    let bits = header_len * 8;
    let fill = (7 - bits % 7) % 7;
    (fill as u8, (bits + fill) / 7)
}

/// Encode `text` to `destination` as one or more SUBMIT PDUs
///
/// # Errors
///
/// * `CodecError::InvalidAddress` - destination or service center unparsable
/// * `CodecError::UnsupportedCharacter` - text outside GSM 7-bit and UCS2
/// * `SmsError::InvalidData` - text needs more than 255 segments
pub fn encode_submit(
    destination: &str,
    text: &str,
    options: &SubmitOptions,
) -> SmsResult<Vec<PduSegment>> {
    let destination = PhoneAddress::parse(destination)?;
    let smsc_field = match &options.smsc {
        Some(smsc) => PhoneAddress::parse(smsc)?.encode_smsc(),
        None => vec![0x00],
    };

    let (encoding, chunks) = if gsm7::is_encodable(text) {
        let encoding = MessageEncoding::Gsm7;
        let septets = gsm7::encode(text)?;
        let chunks = if septets.len() <= encoding.single_limit() {
            vec![septets]
        } else {
            gsm7::split(text, encoding.multipart_limit())?
        };
        (encoding, chunks)
    } else {
        let encoding = MessageEncoding::Ucs2;
        let units = ucs2::encode(text)?;
        let chunks = if units.len() <= encoding.single_limit() {
            vec![units]
        } else {
            ucs2::split(&units, encoding.multipart_limit())
        };
        (
            encoding,
            chunks.iter().map(|chunk| ucs2::to_bytes(chunk)).collect(),
        )
    };

    let total = u8::try_from(chunks.len()).map_err(|_| {
        SmsError::InvalidData(format!(
            "message needs {} segments, at most 255 are possible",
            chunks.len()
        ))
    })?;
    let reference = (total > 1).then(|| options.reference.unwrap_or_else(next_reference));

    let segments: Vec<PduSegment> = chunks
        .into_iter()
        .zip(1u8..)
        .map(|(chunk, sequence)| {
            let header = reference.map(|r| UserDataHeader::concatenated(r, total, sequence).encode());
            let tpdu = encode_tpdu(&destination, encoding, &chunk, header.as_deref(), options);
            let mut bytes = smsc_field.clone();
            bytes.extend_from_slice(&tpdu);
            PduSegment {
                bytes,
                tpdu_length: tpdu.len(),
                sequence,
                total,
                reference,
            }
        })
        .collect();

    log::debug!(
        "Encoded {} chars to {} as {} {} segment(s)",
        text.chars().count(),
        destination,
        segments.len(),
        encoding
    );
    Ok(segments)
}

/// `payload` is unpacked septets for GSM 7-bit, octets otherwise
fn encode_tpdu(
    destination: &PhoneAddress,
    encoding: MessageEncoding,
    payload: &[u8],
    header: Option<&[u8]>,
    options: &SubmitOptions,
) -> Vec<u8> {
    let mut first = FIRST_OCTET_SUBMIT;
    if options.validity.is_some() {
        first |= FIRST_OCTET_VP_RELATIVE;
    }
    if options.request_status_report {
        first |= FIRST_OCTET_SRR;
    }
    if header.is_some() {
        first |= FIRST_OCTET_UDHI;
    }

    let mut out = vec![first, 0x00];
    out.extend(destination.encode());
    out.push(0x00);
    out.push(encoding.dcs());
    if let Some(validity) = options.validity {
        out.push(relative_validity(validity));
    }

    let header = header.unwrap_or_default();
    match encoding {
        MessageEncoding::Gsm7 => {
            let (fill, skip) = if header.is_empty() {
                (0, 0)
            } else {
                header_septets(header.len())
            };
            out.push((skip + payload.len()) as u8);
            out.extend_from_slice(header);
            out.extend(gsm7::pack(payload, fill));
        }
        MessageEncoding::EightBit | MessageEncoding::Ucs2 => {
            out.push((header.len() + payload.len()) as u8);
            out.extend_from_slice(header);
            out.extend_from_slice(payload);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_pdu;

    #[test]
    fn test_single_segment_layout() {
        let segments = encode_submit("+46701234567", "hellohello", &SubmitOptions::default()).unwrap();
        assert_eq!(segments.len(), 1);
        let segment = &segments[0];
        assert_eq!(
            segment.to_hex(),
            "0001000B916407214365F700000AE8329BFD4697D9EC37"
        );
        assert_eq!(segment.tpdu_length, segment.bytes.len() - 1);
        assert_eq!(segment.reference, None);
    }

    #[test]
    fn test_160_and_161_chars() {
        let options = SubmitOptions::default().with_reference(7);
        let one = encode_submit("12345", &"a".repeat(160), &options).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].bytes[1] & FIRST_OCTET_UDHI, 0);

        let two = encode_submit("12345", &"a".repeat(161), &options).unwrap();
        assert_eq!(two.len(), 2);
        for (index, segment) in two.iter().enumerate() {
            let record = decode_pdu(&segment.bytes).unwrap();
            let concat = record.concatenation.unwrap();
            assert_eq!(concat.reference, 7);
            assert_eq!(concat.total, 2);
            assert_eq!(concat.sequence as usize, index + 1);
        }
    }

    #[test]
    fn test_ucs2_limits() {
        let options = SubmitOptions::default();
        assert_eq!(encode_submit("1", &"ж".repeat(70), &options).unwrap().len(), 1);
        let segments = encode_submit("1", &"ж".repeat(71), &options).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].bytes.len(), segments[0].tpdu_length + 1);
        // header 6 + 67 code units
        assert_eq!(*segments[0].bytes.last().unwrap(), 0x36);
        assert_eq!(segments[0].bytes[segments[0].bytes.len() - 141], 140);
    }

    #[test]
    fn test_unsupported_character() {
        let err = encode_submit("1", "smile 😀", &SubmitOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            SmsError::Codec(atsms_core::CodecError::UnsupportedCharacter { position: 6, .. })
        ));
    }

    #[test]
    fn test_options_bits() {
        let options = SubmitOptions::default()
            .with_status_report()
            .with_validity(Duration::from_secs(24 * 3600))
            .with_smsc("+31624000000");
        let segment = &encode_submit("+15551234", "hi", &options).unwrap()[0];
        let smsc_len = segment.bytes[0] as usize + 1;
        let first = segment.bytes[smsc_len];
        assert_eq!(first, FIRST_OCTET_SUBMIT | FIRST_OCTET_VP_RELATIVE | FIRST_OCTET_SRR);
        assert_eq!(segment.tpdu_length, segment.bytes.len() - smsc_len);
        let record = decode_pdu(&segment.bytes).unwrap();
        assert_eq!(record.smsc.as_ref().unwrap().to_string(), "+31624000000");
        assert_eq!(record.text, "hi");
    }

    #[test]
    fn test_relative_validity() {
        assert_eq!(relative_validity(Duration::from_secs(5 * 60)), 0);
        assert_eq!(relative_validity(Duration::from_secs(12 * 3600)), 143);
        assert_eq!(relative_validity(Duration::from_secs(24 * 3600)), 167);
        assert_eq!(relative_validity(Duration::from_secs(2 * 24 * 3600)), 168);
        assert_eq!(relative_validity(Duration::from_secs(30 * 24 * 3600)), 196);
        assert_eq!(relative_validity(Duration::from_secs(5 * 7 * 24 * 3600)), 197);
        assert_eq!(relative_validity(Duration::from_secs(1000 * 24 * 3600)), 255);
    }

    #[test]
    fn test_invalid_destination() {
        assert!(matches!(
            encode_submit("", "hi", &SubmitOptions::default()),
            Err(SmsError::Codec(atsms_core::CodecError::InvalidAddress(_)))
        ));
    }
}
