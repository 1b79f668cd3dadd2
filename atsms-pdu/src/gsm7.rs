//! GSM 7-bit default alphabet (TS 23.038) and septet packing

use atsms_core::CodecError;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Escape to the extension table
pub const ESCAPE: u8 = 0x1B;

/// Default alphabet, indexed by septet value. 0x1B is the escape code.
const BASIC_TABLE: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å',
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1B}', 'Æ', 'æ', 'ß', 'É',
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/',
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?',
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O',
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§',
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

/// Extension table entries, reached through [`ESCAPE`]
const EXTENSION_TABLE: [(char, u8); 10] = [
    ('\u{0C}', 0x0A),
    ('^', 0x14),
    ('{', 0x28),
    ('}', 0x29),
    ('\\', 0x2F),
    ('[', 0x3C),
    ('~', 0x3D),
    (']', 0x3E),
    ('|', 0x40),
    ('€', 0x65),
];

static BASIC_LOOKUP: Lazy<HashMap<char, u8>> = Lazy::new(|| {
    BASIC_TABLE
        .iter()
        .enumerate()
        .filter(|&(code, _)| code as u8 != ESCAPE)
        .map(|(code, &ch)| (ch, code as u8))
        .collect()
});

static EXTENSION_LOOKUP: Lazy<HashMap<char, u8>> =
    Lazy::new(|| EXTENSION_TABLE.iter().copied().collect());

/// Septets one character occupies, or None if it has no 7-bit encoding
pub fn char_len(ch: char) -> Option<usize> {
    if BASIC_LOOKUP.contains_key(&ch) {
        Some(1)
    } else if EXTENSION_LOOKUP.contains_key(&ch) {
        Some(2)
    } else {
        None
    }
}

/// Append the septets of one character; false if it has no 7-bit encoding
fn push_char(ch: char, septets: &mut Vec<u8>) -> bool {
    if let Some(&code) = BASIC_LOOKUP.get(&ch) {
        septets.push(code);
        true
    } else if let Some(&code) = EXTENSION_LOOKUP.get(&ch) {
        septets.push(ESCAPE);
        septets.push(code);
        true
    } else {
        false
    }
}

/// Whether every character of `text` has a 7-bit encoding
pub fn is_encodable(text: &str) -> bool {
    text.chars().all(|ch| char_len(ch).is_some())
}

/// Encode text into unpacked septets
///
/// # Errors
///
/// `CodecError::UnsupportedCharacter` with the character index of the first
/// character outside the default alphabet and its extension table.
pub fn encode(text: &str) -> Result<Vec<u8>, CodecError> {
    let mut septets = Vec::with_capacity(text.len());
    for (position, character) in text.chars().enumerate() {
        if !push_char(character, &mut septets) {
            return Err(CodecError::UnsupportedCharacter { character, position });
        }
    }
    Ok(septets)
}

/// Number of septets `text` occupies, if it is 7-bit encodable
pub fn septet_len(text: &str) -> Option<usize> {
    text.chars().map(char_len).sum()
}

/// Split text into chunks of at most `limit` septets without cutting an
/// escape sequence in half
pub fn split(text: &str, limit: usize) -> Result<Vec<Vec<u8>>, CodecError> {
    let mut chunks = Vec::new();
    let mut current: Vec<u8> = Vec::with_capacity(limit);
    for (position, character) in text.chars().enumerate() {
        let len = char_len(character)
            .ok_or(CodecError::UnsupportedCharacter { character, position })?;
        if current.len() + len > limit {
            chunks.push(std::mem::take(&mut current));
        }
        push_char(character, &mut current);
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    Ok(chunks)
}

/// Decode unpacked septets into text
///
/// An escape followed by a code missing from the extension table decodes as
/// the default-alphabet character of that code; a trailing lone escape
/// decodes as a space (TS 23.038 §6.2.1.1).
pub fn decode(septets: &[u8]) -> String {
    let mut text = String::with_capacity(septets.len());
    let mut iter = septets.iter().map(|s| s & 0x7F);
    while let Some(septet) = iter.next() {
        if septet != ESCAPE {
            text.push(BASIC_TABLE[septet as usize]);
            continue;
        }
        match iter.next() {
            Some(code) => {
                let extended = EXTENSION_TABLE
                    .iter()
                    .find(|&&(_, c)| c == code)
                    .map(|&(ch, _)| ch);
                text.push(extended.unwrap_or(BASIC_TABLE[code as usize]));
            }
            None => text.push(' '),
        }
    }
    text
}

/// Pack septets into octets, leaving `fill_bits` zero bits at the start
///
/// The fill bits align septets after a User Data Header on a septet boundary.
pub fn pack(septets: &[u8], fill_bits: u8) -> Vec<u8> {
    let total_bits = fill_bits as usize + septets.len() * 7;
    let mut packed = vec![0u8; total_bits.div_ceil(8)];
    let mut bit = fill_bits as usize;
    for &septet in septets {
        let value = (septet & 0x7F) as u16;
        let index = bit / 8;
        let shift = bit % 8;
        packed[index] |= (value << shift) as u8;
        if shift > 1 {
            packed[index + 1] |= (value >> (8 - shift)) as u8;
        }
        bit += 7;
    }
    packed
}

/// Octets needed to hold `count` septets after `fill_bits`
pub fn packed_len(count: usize, fill_bits: u8) -> usize {
    (fill_bits as usize + count * 7).div_ceil(8)
}

/// Unpack `count` septets, skipping `fill_bits` leading bits
///
/// Returns None if `packed` is too short to hold them.
pub fn unpack(packed: &[u8], count: usize, fill_bits: u8) -> Option<Vec<u8>> {
    if packed.len() < packed_len(count, fill_bits) {
        return None;
    }
    let mut septets = Vec::with_capacity(count);
    let mut bit = fill_bits as usize;
    for _ in 0..count {
        let index = bit / 8;
        let shift = bit % 8;
        let mut value = (packed[index] >> shift) as u16;
        if shift > 1 {
            value |= (packed[index + 1] as u16) << (8 - shift);
        }
        septets.push((value & 0x7F) as u8);
        bit += 7;
    }
    Some(septets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_hello() {
        // Classic example from TS 23.040 tutorials
        let septets = encode("hellohello").unwrap();
        assert_eq!(pack(&septets, 0), vec![0xE8, 0x32, 0x9B, 0xFD, 0x46, 0x97, 0xD9, 0xEC, 0x37]);
    }

    #[test]
    fn test_unpack_hello() {
        let packed = [0xE8, 0x32, 0x9B, 0xFD, 0x46, 0x97, 0xD9, 0xEC, 0x37];
        let septets = unpack(&packed, 10, 0).unwrap();
        assert_eq!(decode(&septets), "hellohello");
    }

    #[test]
    fn test_fill_bits_alignment() {
        let septets = encode("Hi there").unwrap();
        let packed = pack(&septets, 1);
        assert_eq!(packed[0] & 0x01, 0);
        assert_eq!(unpack(&packed, septets.len(), 1).unwrap(), septets);
    }

    #[test]
    fn test_extension_characters() {
        let septets = encode("{€}").unwrap();
        assert_eq!(septets, vec![ESCAPE, 0x28, ESCAPE, 0x65, ESCAPE, 0x29]);
        assert_eq!(septet_len("a€"), Some(3));
        assert_eq!(decode(&septets), "{€}");
    }

    #[test]
    fn test_unsupported_character() {
        let err = encode("ok 漢").unwrap_err();
        assert_eq!(
            err,
            CodecError::UnsupportedCharacter {
                character: '漢',
                position: 3
            }
        );
        assert!(!is_encodable("漢"));
        assert_eq!(septet_len("漢"), None);
    }

    #[test]
    fn test_split_keeps_escape_pairs() {
        let text = format!("{}€", "a".repeat(152));
        let chunks = split(&text, 153).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 152);
        assert_eq!(chunks[1], vec![ESCAPE, 0x65]);
    }

    #[test]
    fn test_unpack_too_short() {
        assert!(unpack(&[0xE8], 3, 0).is_none());
    }

    #[test]
    fn test_lone_escape() {
        assert_eq!(decode(&[0x41, ESCAPE]), "A ");
    }
}
