//! UCS2 (big-endian UTF-16 code units) user data

use atsms_core::CodecError;

/// Encode text as UCS2 code units
///
/// Characters outside the Basic Multilingual Plane have no UCS2 code unit
/// and are rejected.
pub fn encode(text: &str) -> Result<Vec<u16>, CodecError> {
    text.chars()
        .enumerate()
        .map(|(position, character)| {
            u16::try_from(character as u32)
                .map_err(|_| CodecError::UnsupportedCharacter { character, position })
        })
        .collect()
}

/// Big-endian octets of the given code units
pub fn to_bytes(units: &[u16]) -> Vec<u8> {
    units.iter().flat_map(|unit| unit.to_be_bytes()).collect()
}

/// Split code units into chunks of at most `limit` units
pub fn split(units: &[u16], limit: usize) -> Vec<Vec<u16>> {
    if units.is_empty() {
        return vec![Vec::new()];
    }
    units.chunks(limit).map(<[u16]>::to_vec).collect()
}

/// Decode big-endian UCS2 octets
///
/// Surrogate pairs sent by phones are accepted; an odd byte count or an
/// unpaired surrogate is a malformed PDU. `offset` is the position of
/// `bytes` inside the PDU, used for error reporting.
pub fn decode(bytes: &[u8], offset: usize) -> Result<String, CodecError> {
    if bytes.len() % 2 != 0 {
        return Err(CodecError::malformed(
            offset + bytes.len() - 1,
            "UCS2 user data has an odd number of bytes",
        ));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    let mut text = String::with_capacity(units.len());
    let mut index = 0;
    while index < units.len() {
        let unit = units[index];
        let (decoded, used) = match unit {
            0xD800..=0xDBFF => match units.get(index + 1) {
                Some(&low @ 0xDC00..=0xDFFF) => {
                    let code = 0x10000 + (((unit as u32) - 0xD800) << 10) + ((low as u32) - 0xDC00);
                    (char::from_u32(code), 2)
                }
                _ => (None, 1),
            },
            0xDC00..=0xDFFF => (None, 1),
            _ => (char::from_u32(unit as u32), 1),
        };
        let ch = decoded.ok_or_else(|| {
            CodecError::malformed(
                offset + index * 2,
                format!("unpaired surrogate 0x{:04X}", unit),
            )
        })?;
        text.push(ch);
        index += used;
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let units = encode("Привет").unwrap();
        assert_eq!(units.len(), 6);
        let bytes = to_bytes(&units);
        assert_eq!(&bytes[..2], &[0x04, 0x1F]);
        assert_eq!(decode(&bytes, 0).unwrap(), "Привет");
    }

    #[test]
    fn test_rejects_astral_plane() {
        let err = encode("hi 😀").unwrap_err();
        assert_eq!(
            err,
            CodecError::UnsupportedCharacter {
                character: '😀',
                position: 3
            }
        );
    }

    #[test]
    fn test_decode_surrogate_pair() {
        assert_eq!(decode(&[0xD8, 0x3D, 0xDE, 0x00], 0).unwrap(), "😀");
    }

    #[test]
    fn test_decode_odd_length() {
        assert!(matches!(
            decode(&[0x00, 0x41, 0x00], 10),
            Err(CodecError::MalformedPdu { offset: 12, .. })
        ));
    }
}
