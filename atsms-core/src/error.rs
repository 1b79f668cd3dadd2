use thiserror::Error;

/// Main error type for AT/SMS operations
#[derive(Error, Debug)]
pub enum SmsError {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Timeout")]
    Timeout,

    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        /// Raw device answer, kept for diagnostics
        raw: Vec<u8>,
    },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Dialogue cancelled")]
    Cancelled,
}

impl SmsError {
    /// Build a protocol error carrying the raw device answer
    pub fn protocol(message: impl Into<String>, raw: &[u8]) -> Self {
        SmsError::Protocol {
            message: message.into(),
            raw: raw.to_vec(),
        }
    }

    /// Raw payload attached to a protocol error, if any
    pub fn raw_payload(&self) -> Option<&[u8]> {
        match self {
            SmsError::Protocol { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// PDU encoding/decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unsupported character {character:?} at position {position}")]
    UnsupportedCharacter { character: char, position: usize },

    #[error("malformed PDU at offset {offset}: {reason}")]
    MalformedPdu { offset: usize, reason: String },

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl CodecError {
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        CodecError::MalformedPdu {
            offset,
            reason: reason.into(),
        }
    }
}

/// Concatenation metadata that cannot be reconciled during reassembly
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error(
        "inconsistent concatenation header for reference {reference}: expected {expected} parts, found {found}"
    )]
    InconsistentConcatenationHeader { reference: u16, expected: u8, found: u8 },

    #[error("fragment {sequence} of reference {reference} is outside 1..={total}")]
    SequenceOutOfRange { reference: u16, sequence: u8, total: u8 },
}

/// Result type alias for AT/SMS operations
pub type SmsResult<T> = Result<T, SmsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_keeps_raw() {
        let err = SmsError::protocol("device answered ERROR", b"\r\nERROR\r\n");
        assert_eq!(err.raw_payload(), Some(&b"\r\nERROR\r\n"[..]));
        assert_eq!(err.to_string(), "Protocol error: device answered ERROR");
    }

    #[test]
    fn test_codec_error_converts() {
        let err: SmsError = CodecError::malformed(12, "user data truncated").into();
        assert!(matches!(
            err,
            SmsError::Codec(CodecError::MalformedPdu { offset: 12, .. })
        ));
    }
}
