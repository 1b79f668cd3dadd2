//! DELIVER / SUBMIT / STATUS-REPORT decoder
//!
//! Every length field is checked against the bytes that are actually
//! present. A PDU that lies about its lengths is rejected with the offset
//! of the offending field, it is never truncated or padded.

use crate::address::PhoneAddress;
use crate::dcs::MessageEncoding;
use crate::reader::PduReader;
use crate::record::{ConcatenationInfo, DecodedMessageRecord, PduKind, StatusReportInfo};
use crate::timestamp::{SmscTimestamp, TIMESTAMP_LEN};
use crate::udh::UserDataHeader;
use crate::{gsm7, ucs2};
use atsms_core::CodecError;

const MTI_MASK: u8 = 0x03;
const MTI_DELIVER: u8 = 0x00;
const MTI_SUBMIT: u8 = 0x01;
const MTI_STATUS_REPORT: u8 = 0x02;
const UDHI: u8 = 0x40;

const PI_PID: u8 = 0x01;
const PI_DCS: u8 = 0x02;
const PI_UDL: u8 = 0x04;

/// Decode a PDU given as hex text, the way `AT+CMGR`/`AT+CMGL` return it
pub fn decode_pdu_hex(hex_text: &str) -> Result<DecodedMessageRecord, CodecError> {
    let bytes = hex::decode(hex_text.trim()).map_err(|err| {
        let offset = match err {
            hex::FromHexError::InvalidHexCharacter { index, .. } => index / 2,
            hex::FromHexError::OddLength => hex_text.trim().len() / 2,
            hex::FromHexError::InvalidStringLength => 0,
        };
        CodecError::malformed(offset, format!("invalid hex: {}", err))
    })?;
    decode_pdu(&bytes)
}

/// Decode a binary PDU, starting with the service-center field
pub fn decode_pdu(bytes: &[u8]) -> Result<DecodedMessageRecord, CodecError> {
    let mut reader = PduReader::new(bytes);
    let smsc = PhoneAddress::decode_smsc(&mut reader)?;
    let first_offset = reader.offset();
    let first = reader.read_u8("first octet")?;

    let record = match first & MTI_MASK {
        MTI_DELIVER => decode_deliver(&mut reader, first, smsc)?,
        MTI_SUBMIT => decode_submit(&mut reader, first, smsc)?,
        MTI_STATUS_REPORT => decode_status_report(&mut reader, first, smsc)?,
        _ => {
            return Err(CodecError::malformed(
                first_offset,
                "reserved message type indicator",
            ));
        }
    };
    log::trace!(
        "Decoded {} from {} ({} chars)",
        record.kind,
        record.number,
        record.text.chars().count()
    );
    Ok(record)
}

fn read_timestamp(reader: &mut PduReader<'_>, field: &str) -> Result<Option<SmscTimestamp>, CodecError> {
    let octets = reader.read_bytes(TIMESTAMP_LEN, field)?;
    Ok(SmscTimestamp::decode(octets))
}

fn decode_deliver(
    reader: &mut PduReader<'_>,
    first: u8,
    smsc: Option<PhoneAddress>,
) -> Result<DecodedMessageRecord, CodecError> {
    let number = PhoneAddress::decode(reader)?;
    let _pid = reader.read_u8("protocol identifier")?;
    let dcs = reader.read_u8("data coding scheme")?;
    let timestamp = read_timestamp(reader, "service center time stamp")?;
    let user_data = decode_user_data(reader, dcs, first & UDHI != 0)?;
    Ok(user_data.into_record(PduKind::Deliver, smsc, number, timestamp, None))
}

fn decode_submit(
    reader: &mut PduReader<'_>,
    first: u8,
    smsc: Option<PhoneAddress>,
) -> Result<DecodedMessageRecord, CodecError> {
    let _message_reference = reader.read_u8("message reference")?;
    let number = PhoneAddress::decode(reader)?;
    let _pid = reader.read_u8("protocol identifier")?;
    let dcs = reader.read_u8("data coding scheme")?;
    let validity_len = match (first >> 3) & 0x03 {
        0b00 => 0,
        0b10 => 1,
        // enhanced and absolute formats
        _ => 7,
    };
    reader.read_bytes(validity_len, "validity period")?;
    let user_data = decode_user_data(reader, dcs, first & UDHI != 0)?;
    Ok(user_data.into_record(PduKind::Submit, smsc, number, None, None))
}

fn decode_status_report(
    reader: &mut PduReader<'_>,
    first: u8,
    smsc: Option<PhoneAddress>,
) -> Result<DecodedMessageRecord, CodecError> {
    let message_reference = reader.read_u8("message reference")?;
    let number = PhoneAddress::decode(reader)?;
    let timestamp = read_timestamp(reader, "service center time stamp")?;
    let discharge_time = read_timestamp(reader, "discharge time")?;
    let status = reader.read_u8("status")?;
    let report = StatusReportInfo {
        message_reference,
        discharge_time,
        status,
    };

    // Parameter indicator and everything after it are optional
    let mut user_data = UserData::default();
    if !reader.is_empty() {
        let indicator = reader.read_u8("parameter indicator")?;
        if indicator & PI_PID != 0 {
            reader.read_u8("protocol identifier")?;
        }
        let dcs = if indicator & PI_DCS != 0 {
            reader.read_u8("data coding scheme")?
        } else {
            0x00
        };
        if indicator & PI_UDL != 0 {
            user_data = decode_user_data(reader, dcs, first & UDHI != 0)?;
        }
    }
    Ok(user_data.into_record(PduKind::StatusReport, smsc, number, timestamp, Some(report)))
}

#[derive(Default)]
struct UserData {
    text: String,
    encoding: MessageEncoding,
    header: Option<UserDataHeader>,
}

impl UserData {
    fn into_record(
        self,
        kind: PduKind,
        smsc: Option<PhoneAddress>,
        number: PhoneAddress,
        timestamp: Option<SmscTimestamp>,
        status_report: Option<StatusReportInfo>,
    ) -> DecodedMessageRecord {
        let concatenation = self
            .header
            .as_ref()
            .and_then(UserDataHeader::concatenation)
            .map(|(reference, total, sequence)| ConcatenationInfo {
                reference,
                total,
                sequence,
            });
        DecodedMessageRecord {
            kind,
            smsc,
            number,
            text: self.text,
            encoding: self.encoding,
            timestamp,
            header: self.header,
            concatenation,
            status_report,
            slot: None,
            filter: None,
        }
    }
}

fn decode_user_data(
    reader: &mut PduReader<'_>,
    dcs: u8,
    has_header: bool,
) -> Result<UserData, CodecError> {
    let udl_offset = reader.offset();
    let udl = reader.read_u8("user data length")? as usize;
    let encoding = MessageEncoding::from_dcs(dcs);
    let data_offset = reader.offset();

    match encoding {
        MessageEncoding::Gsm7 => {
            let data = reader.read_bytes(gsm7::packed_len(udl, 0), "user data")?;
            let (header, header_len) = read_header(data, data_offset, has_header)?;
            let header_bits = header_len * 8;
            let fill = (7 - header_bits % 7) % 7;
            let header_septets = (header_bits + fill) / 7;
            let count = udl.checked_sub(header_septets).ok_or_else(|| {
                CodecError::malformed(udl_offset, "user data length shorter than its header")
            })?;
            let septets = gsm7::unpack(&data[header_len..], count, fill as u8).ok_or_else(|| {
                CodecError::malformed(data_offset + header_len, "septets truncated")
            })?;
            Ok(UserData {
                text: gsm7::decode(&septets),
                encoding,
                header,
            })
        }
        MessageEncoding::EightBit | MessageEncoding::Ucs2 => {
            let data = reader.read_bytes(udl, "user data")?;
            let (header, header_len) = read_header(data, data_offset, has_header)?;
            let body = &data[header_len..];
            let text = match encoding {
                MessageEncoding::Ucs2 => ucs2::decode(body, data_offset + header_len)?,
                // Latin-1: every octet maps to the code point of the same value
                _ => body.iter().map(|&b| b as char).collect(),
            };
            Ok(UserData {
                text,
                encoding,
                header,
            })
        }
    }
}

fn read_header(
    data: &[u8],
    offset: usize,
    has_header: bool,
) -> Result<(Option<UserDataHeader>, usize), CodecError> {
    if !has_header {
        return Ok((None, 0));
    }
    let (header, len) = UserDataHeader::decode(data, offset)?;
    Ok((Some(header), len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_deliver_gsm7() {
        // From +46701234567, "hellohello", 2021-03-14 15:09:26 +02:00
        let record =
            decode_pdu_hex("07911326040000F0040B916407214365F70000123041519062800AE8329BFD4697D9EC37")
                .unwrap();
        assert_eq!(record.kind, PduKind::Deliver);
        assert_eq!(record.smsc.as_ref().unwrap().to_string(), "+31624000000");
        assert_eq!(record.number.to_string(), "+46701234567");
        assert_eq!(record.text, "hellohello");
        assert_eq!(record.encoding, MessageEncoding::Gsm7);
        assert_eq!(record.timestamp.unwrap().to_string(), "21/03/14,15:09:26+08");
        assert_eq!(record.concatenation, None);
        assert_eq!(record.sequence(), 1);
        assert_eq!(record.total_parts(), 1);
    }

    #[test]
    fn test_decode_deliver_ucs2_concatenated() {
        // UDH 05 00 03 2A 02 01, then "Hi" in UCS2
        let record = decode_pdu_hex(
            "00440B916407214365F70008123041519062800A0500032A020100480069",
        )
        .unwrap();
        assert_eq!(record.text, "Hi");
        assert_eq!(record.encoding, MessageEncoding::Ucs2);
        assert_eq!(
            record.concatenation,
            Some(ConcatenationInfo {
                reference: 0x2A,
                total: 2,
                sequence: 1
            })
        );
    }

    #[test]
    fn test_decode_eight_bit_as_latin1() {
        let record =
            decode_pdu_hex("00040B916407214365F7000412304151906280024FE9").unwrap();
        assert_eq!(record.encoding, MessageEncoding::EightBit);
        assert_eq!(record.text, "Oé");
    }

    #[test]
    fn test_decode_status_report() {
        // MR 0x05, recipient +46701234567, status 0x00, no parameters
        let record = decode_pdu_hex(
            "0006050B916407214365F7123041519062801230415190728000",
        )
        .unwrap();
        assert_eq!(record.kind, PduKind::StatusReport);
        let report = record.status_report.unwrap();
        assert_eq!(report.message_reference, 5);
        assert!(report.is_delivered());
        assert_eq!(report.discharge_time.unwrap().second, 27);
        assert!(record.text.is_empty());
    }

    #[test]
    fn test_udh_longer_than_user_data() {
        // UDL 6 octets of 8-bit data, UDHL claims 9
        let err = decode_pdu_hex("00440B916407214365F700041230415190628006090003010201")
            .unwrap_err();
        assert!(matches!(err, CodecError::MalformedPdu { offset: 20, .. }));
    }

    #[test]
    fn test_truncated_user_data() {
        let err = decode_pdu_hex("00040B916407214365F700001230415190628014E832").unwrap_err();
        assert!(matches!(err, CodecError::MalformedPdu { offset: 20, .. }));
    }

    #[test]
    fn test_reserved_message_type() {
        let err = decode_pdu(&[0x00, 0x03]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPdu { offset: 1, .. }));
    }

    #[test]
    fn test_invalid_hex() {
        let err = decode_pdu_hex("0004ZZ").unwrap_err();
        assert!(matches!(err, CodecError::MalformedPdu { offset: 2, .. }));
    }

    #[test]
    fn test_bad_timestamp_is_tolerated() {
        let record =
            decode_pdu_hex("00040B916407214365F70000FFFFFFFFFFFFFF0AE8329BFD4697D9EC37").unwrap();
        assert_eq!(record.timestamp, None);
        assert_eq!(record.text, "hellohello");
    }
}
