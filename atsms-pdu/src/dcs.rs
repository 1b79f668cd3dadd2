//! Data coding scheme (TS 23.038 §4)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Alphabet of the user data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MessageEncoding {
    /// GSM 7-bit default alphabet, packed septets
    #[default]
    Gsm7,
    /// Raw 8-bit data
    EightBit,
    /// UCS2, big-endian
    Ucs2,
}

impl MessageEncoding {
    /// Alphabet selected by a DCS octet
    ///
    /// Reserved alphabets and reserved coding groups fall back to the
    /// default alphabet as TS 23.038 requires.
    pub fn from_dcs(dcs: u8) -> Self {
        match dcs >> 4 {
            // General data coding, with and without automatic deletion
            0x0..=0x7 => match (dcs >> 2) & 0x03 {
                0b01 => MessageEncoding::EightBit,
                0b10 => MessageEncoding::Ucs2,
                _ => MessageEncoding::Gsm7,
            },
            // Message waiting indication, store message, UCS2
            0xE => MessageEncoding::Ucs2,
            // Data coding / message class
            0xF if dcs & 0x04 != 0 => MessageEncoding::EightBit,
            _ => MessageEncoding::Gsm7,
        }
    }

    /// DCS octet used when sending: general group, no class, uncompressed
    pub fn dcs(&self) -> u8 {
        match self {
            MessageEncoding::Gsm7 => 0x00,
            MessageEncoding::EightBit => 0x04,
            MessageEncoding::Ucs2 => 0x08,
        }
    }

    /// Characters (septets or code units) one unsegmented PDU carries
    pub fn single_limit(&self) -> usize {
        match self {
            MessageEncoding::Gsm7 => 160,
            MessageEncoding::EightBit => 140,
            MessageEncoding::Ucs2 => 70,
        }
    }

    /// Characters per segment once a concatenation header takes 6 octets
    pub fn multipart_limit(&self) -> usize {
        match self {
            MessageEncoding::Gsm7 => 153,
            MessageEncoding::EightBit => 134,
            MessageEncoding::Ucs2 => 67,
        }
    }
}

impl fmt::Display for MessageEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageEncoding::Gsm7 => f.write_str("GSM7"),
            MessageEncoding::EightBit => f.write_str("8bit"),
            MessageEncoding::Ucs2 => f.write_str("UCS2"),
        }
    }
}

/// Message class (0 = flash) carried by a DCS octet, if any
pub fn message_class(dcs: u8) -> Option<u8> {
    match dcs >> 4 {
        0x0..=0x7 if dcs & 0x10 != 0 => Some(dcs & 0x03),
        0xF => Some(dcs & 0x03),
        _ => None,
    }
}
