//! Response parser
//!
//! A complete answer looks like
//!
//! ```text
//! <echo>\r\n+TAG: <fields>\r\n[<body>\r\n]...\r\nOK\r\n
//! ```
//!
//! The parser discards the echo and the final result code and splits the
//! rest on the `+TAG:` marker. Each chunk becomes one [`RawRecord`]: the
//! first line holds the header fields, following lines the body (a PDU in
//! hex, or message text).

use atsms_core::{SmsError, SmsResult};
use once_cell::sync::Lazy;
use regex::Regex;

static FINAL_ERROR: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(?:ERROR|\+CM[ES] ERROR:\s*(.*))$").ok());

/// One record of a response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRecord {
    /// Text after the `+TAG:` marker on the first line, trimmed
    pub header: String,
    /// Lines following the header, joined with `\n`; empty if none
    pub body: String,
}

impl RawRecord {
    fn from_chunk(chunk: &str) -> Self {
        let mut lines = chunk.split("\r\n").map(str::trim).filter(|l| !l.is_empty());
        let header = lines.next().unwrap_or_default().to_string();
        let body = lines.collect::<Vec<_>>().join("\n");
        Self { header, body }
    }

    /// Comma-separated header fields with quotes removed
    pub fn fields(&self) -> Vec<String> {
        split_fields(&self.header)
    }

    /// Header field at `index`, if present and not empty
    pub fn field(&self, index: usize) -> Option<String> {
        self.fields().into_iter().nth(index).filter(|f| !f.is_empty())
    }

    /// Numeric header field at `index`
    pub fn numeric_field(&self, index: usize) -> Option<u32> {
        self.field(index).and_then(|f| f.parse().ok())
    }
}

enum FinalResult {
    /// Byte position where the final `OK` line starts
    Ok(usize),
    Error(String),
    Missing,
}

/// Find the last final result code line
///
/// Unsolicited result codes (`+CMTI`, `RING`) may be drained together with
/// the answer and follow the final result code; they are dropped.
fn final_result(text: &str) -> FinalResult {
    let mut end = text.len();
    for line in text.split_inclusive('\n').rev() {
        let start = end - line.len();
        let code = line.trim();
        end = start;
        let outcome = if code == "OK" {
            FinalResult::Ok(start)
        } else {
            match FINAL_ERROR.as_ref().and_then(|re| re.captures(code)) {
                Some(captures) => match captures.get(1) {
                    Some(number) => {
                        FinalResult::Error(format!("device answered {} ({})", code, number.as_str()))
                    }
                    None => FinalResult::Error("device answered ERROR".to_string()),
                },
                None => continue,
            }
        };
        let trailing = text[start + line.len()..].trim();
        if !trailing.is_empty() {
            log::debug!("Ignoring {:?} after final result code", trailing);
        }
        return outcome;
    }
    FinalResult::Missing
}

/// Check a raw answer for a final error result code without requiring `OK`
///
/// Used for the `> ` prompt of body commands, which has no final result code.
pub fn check_error(raw: &[u8]) -> SmsResult<()> {
    let text = String::from_utf8_lossy(raw);
    match final_result(&text) {
        FinalResult::Error(message) => Err(SmsError::protocol(message, raw)),
        _ => Ok(()),
    }
}

/// Split a raw answer into records
///
/// An empty (or whitespace-only) answer yields no records: the device was
/// silent, which is not an error. A response without a final `OK`, or
/// whose last final result code is `ERROR` / `+CMS ERROR` / `+CME ERROR`,
/// is a protocol error carrying the raw bytes.
///
/// Untagged answers (identity queries on many phones) become a single
/// record whose header is the answer line.
pub fn parse_response(raw: &[u8], tag: &str) -> SmsResult<Vec<RawRecord>> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let text = String::from_utf8_lossy(raw);
    let payload = match final_result(&text) {
        FinalResult::Ok(end) => &text[..end],
        FinalResult::Error(message) => return Err(SmsError::protocol(message, raw)),
        FinalResult::Missing => {
            return Err(SmsError::protocol("response has no final result code", raw));
        }
    };

    // Echo of the command line
    let payload = payload.find("\r\n").map_or("", |i| &payload[i + 2..]);

    let marker = format!("{}:", tag);
    let mut chunks = payload.split(marker.as_str());
    if payload.contains(&marker) {
        // Whatever precedes the first marker is not a record
        if let Some(leading) = chunks.next().map(str::trim).filter(|l| !l.is_empty()) {
            log::debug!("Ignoring {:?} before first {}", leading, marker);
        }
    }
    Ok(chunks
        .filter(|chunk| !chunk.trim().is_empty())
        .map(RawRecord::from_chunk)
        .collect())
}

/// Parse an answer expected to carry at most one record
pub fn parse_single(raw: &[u8], tag: &str) -> SmsResult<Option<RawRecord>> {
    Ok(parse_response(raw, tag)?.into_iter().next())
}

/// Split comma-separated fields, honouring double quotes
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in line.chars() {
        match ch {
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(ch),
        }
    }
    fields.push(current.trim().to_string());
    fields
}
