//! Semi-octet phone addresses (TS 23.040 §9.1.2.5)

use crate::gsm7;
use crate::reader::PduReader;
use atsms_core::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type-of-address: international number, ISDN numbering plan
pub const TOA_INTERNATIONAL: u8 = 0x91;
/// Type-of-address: unknown type, ISDN numbering plan
pub const TOA_UNKNOWN: u8 = 0x81;
/// Type-of-address: alphanumeric (GSM 7-bit) originator
pub const TOA_ALPHANUMERIC: u8 = 0xD0;

const TYPE_OF_NUMBER_MASK: u8 = 0x70;
const TYPE_INTERNATIONAL: u8 = 0x10;
const TYPE_ALPHANUMERIC: u8 = 0x50;

/// Longest number an address field can hold
const MAX_DIGITS: usize = 20;

/// A phone number together with its type-of-address octet
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhoneAddress {
    /// Digits (or the alphanumeric name) without the leading '+'
    pub value: String,
    /// Type-of-address octet
    pub type_of_address: u8,
}

impl PhoneAddress {
    /// Parse a dialable number
    ///
    /// A leading '+' selects the international type (0x91), anything else is
    /// sent as unknown type (0x81). Spaces, dashes and parentheses are ignored.
    ///
    /// # Errors
    ///
    /// `CodecError::InvalidAddress` if the number is empty, too long, or
    /// contains characters other than digits, '*' and '#'.
    pub fn parse(number: &str) -> Result<Self, CodecError> {
        let trimmed = number.trim();
        let (international, rest) = match trimmed.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let mut digits = String::with_capacity(rest.len());
        for ch in rest.chars() {
            match ch {
                '0'..='9' | '*' | '#' => digits.push(ch),
                ' ' | '-' | '(' | ')' => {}
                other => {
                    return Err(CodecError::InvalidAddress(format!(
                        "unexpected character {:?} in {:?}",
                        other, number
                    )));
                }
            }
        }
        if digits.is_empty() {
            return Err(CodecError::InvalidAddress(format!(
                "no digits in {:?}",
                number
            )));
        }
        if digits.len() > MAX_DIGITS {
            return Err(CodecError::InvalidAddress(format!(
                "{} digits exceed the maximum of {}",
                digits.len(),
                MAX_DIGITS
            )));
        }
        Ok(Self {
            value: digits,
            type_of_address: if international {
                TOA_INTERNATIONAL
            } else {
                TOA_UNKNOWN
            },
        })
    }

    pub fn is_international(&self) -> bool {
        self.type_of_address & TYPE_OF_NUMBER_MASK == TYPE_INTERNATIONAL
    }

    pub fn is_alphanumeric(&self) -> bool {
        self.type_of_address & TYPE_OF_NUMBER_MASK == TYPE_ALPHANUMERIC
    }

    /// Encode as an originating/destination address field
    ///
    /// The length octet counts digits, not octets.
    pub fn encode(&self) -> Vec<u8> {
        let semi_octets = encode_semi_octets(&self.value);
        let mut out = Vec::with_capacity(2 + semi_octets.len());
        out.push(self.value.len() as u8);
        out.push(self.type_of_address);
        out.extend(semi_octets);
        out
    }

    /// Encode as a service-center address field
    ///
    /// The length octet counts octets including the type-of-address.
    pub fn encode_smsc(&self) -> Vec<u8> {
        let semi_octets = encode_semi_octets(&self.value);
        let mut out = Vec::with_capacity(2 + semi_octets.len());
        out.push(semi_octets.len() as u8 + 1);
        out.push(self.type_of_address);
        out.extend(semi_octets);
        out
    }

    /// Read an originating/destination address field
    pub(crate) fn decode(reader: &mut PduReader<'_>) -> Result<Self, CodecError> {
        let start = reader.offset();
        let digits = reader.read_u8("address length")? as usize;
        let type_of_address = reader.read_u8("type of address")?;
        let octets = reader.read_bytes(digits.div_ceil(2), "address digits")?;

        let value = if type_of_address & TYPE_OF_NUMBER_MASK == TYPE_ALPHANUMERIC {
            let count = digits * 4 / 7;
            let septets = gsm7::unpack(octets, count, 0).ok_or_else(|| {
                CodecError::malformed(start, "alphanumeric address shorter than declared")
            })?;
            gsm7::decode(&septets)
        } else {
            decode_semi_octets(octets, Some(digits))
        };
        Ok(Self {
            value,
            type_of_address,
        })
    }

    /// Read a service-center address field; a zero length means "none"
    pub(crate) fn decode_smsc(reader: &mut PduReader<'_>) -> Result<Option<Self>, CodecError> {
        let len = reader.read_u8("service center length")? as usize;
        if len == 0 {
            return Ok(None);
        }
        let type_of_address = reader.read_u8("service center type")?;
        let octets = reader.read_bytes(len - 1, "service center digits")?;
        Ok(Some(Self {
            value: decode_semi_octets(octets, None),
            type_of_address,
        }))
    }
}

impl FromStr for PhoneAddress {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, CodecError> {
        Self::parse(s)
    }
}

impl fmt::Display for PhoneAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_international() {
            f.write_str("+")?;
        }
        f.write_str(&self.value)
    }
}

fn digit_nibble(ch: char) -> u8 {
    match ch {
        '*' => 0x0A,
        '#' => 0x0B,
        // parse() only admits digits, '*' and '#'
        _ => ch.to_digit(10).unwrap_or(0) as u8,
    }
}

fn nibble_digit(nibble: u8) -> Option<char> {
    match nibble {
        0x0..=0x9 => Some((b'0' + nibble) as char),
        0xA => Some('*'),
        0xB => Some('#'),
        0xC => Some('a'),
        0xD => Some('b'),
        0xE => Some('c'),
        _ => None,
    }
}

/// Swap-nibble encoding, padded with 0xF when the digit count is odd
fn encode_semi_octets(digits: &str) -> Vec<u8> {
    let nibbles: Vec<u8> = digits.chars().map(digit_nibble).collect();
    nibbles
        .chunks(2)
        .map(|pair| {
            let low = pair[0];
            let high = pair.get(1).copied().unwrap_or(0x0F);
            (high << 4) | low
        })
        .collect()
}

fn decode_semi_octets(octets: &[u8], limit: Option<usize>) -> String {
    let digits = octets
        .iter()
        .flat_map(|&octet| [octet & 0x0F, octet >> 4])
        .map_while(nibble_digit);
    match limit {
        Some(limit) => digits.take(limit).collect(),
        None => digits.collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_international() {
        let addr = PhoneAddress::parse("+46 70-123 4567").unwrap();
        assert_eq!(addr.value, "46701234567");
        assert_eq!(addr.type_of_address, TOA_INTERNATIONAL);
        assert_eq!(addr.to_string(), "+46701234567");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            PhoneAddress::parse(""),
            Err(CodecError::InvalidAddress(_))
        ));
        assert!(matches!(
            PhoneAddress::parse("12a4"),
            Err(CodecError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_encode_odd_length() {
        let addr = PhoneAddress::parse("+46701234567").unwrap();
        assert_eq!(
            addr.encode(),
            vec![0x0B, 0x91, 0x64, 0x07, 0x21, 0x43, 0x65, 0xF7]
        );
    }

    #[test]
    fn test_decode_round_trip() {
        let addr = PhoneAddress::parse("*100#").unwrap();
        let bytes = addr.encode();
        let mut reader = PduReader::new(&bytes);
        assert_eq!(PhoneAddress::decode(&mut reader).unwrap(), addr);
        assert_eq!(reader.offset(), bytes.len());
    }

    #[test]
    fn test_decode_alphanumeric() {
        // "Telia": 5 septets -> 35 bits -> 5 octets, 9 useful semi-octets
        let septets = gsm7::encode("Telia").unwrap();
        let packed = gsm7::pack(&septets, 0);
        let mut bytes = vec![0x09, TOA_ALPHANUMERIC];
        bytes.extend(&packed);
        let mut reader = PduReader::new(&bytes);
        let addr = PhoneAddress::decode(&mut reader).unwrap();
        assert!(addr.is_alphanumeric());
        assert_eq!(addr.to_string(), "Telia");
    }

    #[test]
    fn test_smsc_absent_and_present() {
        let mut reader = PduReader::new(&[0x00]);
        assert_eq!(PhoneAddress::decode_smsc(&mut reader).unwrap(), None);

        let smsc = PhoneAddress::parse("+31624000000").unwrap();
        let bytes = smsc.encode_smsc();
        assert_eq!(bytes[0], 7);
        let mut reader = PduReader::new(&bytes);
        assert_eq!(PhoneAddress::decode_smsc(&mut reader).unwrap(), Some(smsc));
    }

    #[test]
    fn test_truncated_address() {
        let mut reader = PduReader::new(&[0x0B, 0x91, 0x64]);
        assert!(matches!(
            PhoneAddress::decode(&mut reader),
            Err(CodecError::MalformedPdu { offset: 2, .. })
        ));
    }
}
