//! User Data Header (TS 23.040 §9.2.3.24)

use atsms_core::CodecError;
use serde::{Deserialize, Serialize};

/// Concatenated short message, 8-bit reference
pub const IEI_CONCAT_8: u8 = 0x00;
/// Concatenated short message, 16-bit reference
pub const IEI_CONCAT_16: u8 = 0x08;

/// One information element of a User Data Header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InformationElement {
    Concat8 {
        reference: u8,
        total: u8,
        sequence: u8,
    },
    Concat16 {
        reference: u16,
        total: u8,
        sequence: u8,
    },
    /// Any element this codec does not interpret, kept verbatim
    Other { id: u8, data: Vec<u8> },
}

impl InformationElement {
    fn from_parts(id: u8, data: &[u8]) -> Self {
        match (id, data) {
            (IEI_CONCAT_8, &[reference, total, sequence]) => InformationElement::Concat8 {
                reference,
                total,
                sequence,
            },
            (IEI_CONCAT_16, &[high, low, total, sequence]) => InformationElement::Concat16 {
                reference: u16::from_be_bytes([high, low]),
                total,
                sequence,
            },
            _ => InformationElement::Other {
                id,
                data: data.to_vec(),
            },
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            InformationElement::Concat8 {
                reference,
                total,
                sequence,
            } => out.extend([IEI_CONCAT_8, 3, *reference, *total, *sequence]),
            InformationElement::Concat16 {
                reference,
                total,
                sequence,
            } => {
                let [high, low] = reference.to_be_bytes();
                out.extend([IEI_CONCAT_16, 4, high, low, *total, *sequence]);
            }
            InformationElement::Other { id, data } => {
                out.push(*id);
                out.push(data.len() as u8);
                out.extend_from_slice(data);
            }
        }
    }
}

/// Parsed User Data Header
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserDataHeader {
    pub elements: Vec<InformationElement>,
}

impl UserDataHeader {
    /// Header carrying only an 8-bit concatenation element
    pub fn concatenated(reference: u8, total: u8, sequence: u8) -> Self {
        Self {
            elements: vec![InformationElement::Concat8 {
                reference,
                total,
                sequence,
            }],
        }
    }

    /// Encoded header, starting with the UDHL octet
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8];
        for element in &self.elements {
            element.encode_into(&mut out);
        }
        out[0] = (out.len() - 1) as u8;
        out
    }

    /// Decode a header at the start of the user data
    ///
    /// `offset` is the position of `user_data` inside the PDU. Returns the
    /// header and the number of octets it occupies including the UDHL octet.
    ///
    /// # Errors
    ///
    /// `CodecError::MalformedPdu` when the declared header length, or the
    /// length of any element inside it, runs past the available bytes.
    pub fn decode(user_data: &[u8], offset: usize) -> Result<(Self, usize), CodecError> {
        let Some((&udhl, rest)) = user_data.split_first() else {
            return Err(CodecError::malformed(offset, "missing user data header length"));
        };
        let udhl = udhl as usize;
        if udhl > rest.len() {
            return Err(CodecError::malformed(
                offset,
                format!(
                    "user data header declares {} octets, only {} remain",
                    udhl,
                    rest.len()
                ),
            ));
        }

        let header = &rest[..udhl];
        let mut elements = Vec::new();
        let mut pos = 0;
        while pos < header.len() {
            let element_offset = offset + 1 + pos;
            let id = header[pos];
            let len = *header.get(pos + 1).ok_or_else(|| {
                CodecError::malformed(element_offset, "information element without length")
            })? as usize;
            let data = header.get(pos + 2..pos + 2 + len).ok_or_else(|| {
                CodecError::malformed(
                    element_offset,
                    format!("information element 0x{:02X} overruns the header", id),
                )
            })?;
            elements.push(InformationElement::from_parts(id, data));
            pos += 2 + len;
        }
        Ok((Self { elements }, udhl + 1))
    }

    /// Concatenation `(reference, total, sequence)`, first matching element wins
    pub fn concatenation(&self) -> Option<(u16, u8, u8)> {
        self.elements.iter().find_map(|element| match *element {
            InformationElement::Concat8 {
                reference,
                total,
                sequence,
            } => Some((reference as u16, total, sequence)),
            InformationElement::Concat16 {
                reference,
                total,
                sequence,
            } => Some((reference, total, sequence)),
            InformationElement::Other { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_concat8() {
        let udh = UserDataHeader::concatenated(0x2A, 3, 1);
        assert_eq!(udh.encode(), vec![0x05, 0x00, 0x03, 0x2A, 0x03, 0x01]);
    }

    #[test]
    fn test_decode_concat16_after_other() {
        let data = [0x0A, 0x0A, 0x02, 0xFF, 0xEE, 0x08, 0x04, 0x12, 0x34, 0x02, 0x02, b'x'];
        let (udh, used) = UserDataHeader::decode(&data, 20).unwrap();
        assert_eq!(used, 11);
        assert_eq!(udh.elements.len(), 2);
        assert_eq!(udh.concatenation(), Some((0x1234, 2, 2)));
    }

    #[test]
    fn test_header_longer_than_data() {
        let err = UserDataHeader::decode(&[0x09, 0x00, 0x03, 0x01], 30).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPdu { offset: 30, .. }));
    }

    #[test]
    fn test_element_overruns_header() {
        let err = UserDataHeader::decode(&[0x03, 0x00, 0x03, 0x01, 0x02, 0x03], 0).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPdu { offset: 1, .. }));
    }

    #[test]
    fn test_wrong_length_concat_is_opaque() {
        let (udh, _) = UserDataHeader::decode(&[0x04, 0x00, 0x02, 0x01, 0x02], 0).unwrap();
        assert_eq!(udh.concatenation(), None);
    }
}
