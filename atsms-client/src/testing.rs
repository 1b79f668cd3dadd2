//! Stateful modem simulator for client tests
//!
//! Keeps the message format, storage triple, a message store and a
//! phonebook, and answers the way a typical handset does: command echo,
//! `\r\n`-framed information responses, `OK` or `+CMS ERROR`.

use crate::Phone;
use atsms_core::{SessionConfig, SmsFilter, SmsResult};
use atsms_pdu::{encode_submit, SubmitOptions};
use atsms_transport::{Connector, MemoryTransport, Responder};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub status: SmsFilter,
    pub number: String,
    pub text: String,
    pub pdu: String,
}

#[derive(Debug, Clone)]
pub struct PhonebookRecord {
    pub number: String,
    pub type_of_address: u8,
    pub label: String,
}

#[derive(Debug)]
enum Pending {
    SubmitPdu,
    SubmitText,
    Write { number: String, status: SmsFilter },
}

#[derive(Debug)]
pub struct ModemState {
    pub mode: u8,
    pub storage: [String; 3],
    pub store: BTreeMap<u32, StoredMessage>,
    pub phonebook_storage: String,
    pub phonebook: BTreeMap<u32, PhonebookRecord>,
    pub phonebook_capacity: u32,
    /// Bodies accepted by `AT+CMGS`
    pub sent: Vec<String>,
    /// Every command line received, without terminator
    pub commands: Vec<String>,
    /// Answer `AT+CMGS="..."` with `+CMS ERROR: 500`
    pub reject_text_submit: bool,
    /// Answer `AT+CMGL` with silence this many times first
    pub silent_listings: u32,
    next_reference: u8,
    pending: Option<Pending>,
}

impl Default for ModemState {
    fn default() -> Self {
        Self {
            mode: 0,
            storage: ["SM".to_string(), "SM".to_string(), "SM".to_string()],
            store: BTreeMap::new(),
            phonebook_storage: "SM".to_string(),
            phonebook: BTreeMap::new(),
            phonebook_capacity: 250,
            sent: Vec::new(),
            commands: Vec::new(),
            reject_text_submit: false,
            silent_listings: 0,
            next_reference: 1,
            pending: None,
        }
    }
}

fn ok(echo: &str, lines: &[String]) -> Vec<u8> {
    let mut answer = format!("{}\r\r\n", echo);
    for line in lines {
        answer.push_str(line);
        answer.push_str("\r\n");
    }
    answer.push_str("\r\nOK\r\n");
    answer.into_bytes()
}

fn cms_error(echo: &str, code: u16) -> Vec<u8> {
    format!("{}\r\r\n+CMS ERROR: {}\r\n", echo, code).into_bytes()
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('"').to_string()
}

impl ModemState {
    fn take_reference(&mut self) -> u8 {
        let reference = self.next_reference;
        self.next_reference = self.next_reference.wrapping_add(1);
        reference
    }

    fn storage_line(&self) -> String {
        let used = self.store.len();
        self.storage
            .iter()
            .map(|s| format!("\"{}\",{},30", s, used))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn answer_body(&mut self, body: &str) -> Vec<u8> {
        match self.pending.take() {
            Some(Pending::SubmitPdu) | Some(Pending::SubmitText) => {
                self.sent.push(body.to_string());
                let reference = self.take_reference();
                ok("", &[format!("+CMGS: {}", reference)])
            }
            Some(Pending::Write { number, status }) => {
                let index = self.store.keys().next_back().map_or(1, |k| k + 1);
                let pdu = encode_submit(&number, body, &SubmitOptions::default())
                    .ok()
                    .and_then(|segments| segments.first().map(|s| s.to_hex()))
                    .unwrap_or_default();
                self.store.insert(
                    index,
                    StoredMessage {
                        status,
                        number,
                        text: body.to_string(),
                        pdu,
                    },
                );
                ok("", &[format!("+CMGW: {}", index)])
            }
            None => b"\r\nERROR\r\n".to_vec(),
        }
    }

    fn answer_line(&mut self, line: &str) -> Vec<u8> {
        self.commands.push(line.to_string());
        let Some(rest) = line.strip_prefix("AT") else {
            return b"\r\nERROR\r\n".to_vec();
        };
        if rest.is_empty() {
            return ok(line, &[]);
        }
        let (name, argument) = match rest.find(['=', '?']) {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, ""),
        };
        match (name, argument) {
            ("+CMGF", "?") => ok(line, &[format!("+CMGF: {}", self.mode)]),
            ("+CMGF", arg) => match arg.trim_start_matches('=') {
                "0" => {
                    self.mode = 0;
                    ok(line, &[])
                }
                "1" => {
                    self.mode = 1;
                    ok(line, &[])
                }
                _ => b"\r\nERROR\r\n".to_vec(),
            },
            ("+CPMS", "?") => ok(line, &[format!("+CPMS: {}", self.storage_line())]),
            ("+CPMS", arg) => {
                let names: Vec<String> = arg.trim_start_matches('=').split(',').map(unquote).collect();
                if names.len() != 3 {
                    return cms_error(line, 302);
                }
                self.storage = [names[0].clone(), names[1].clone(), names[2].clone()];
                let used = self.store.len();
                ok(line, &[format!("+CPMS: {},30,{},30,{},30", used, used, used)])
            }
            ("+CMGS", arg) => {
                let arg = arg.trim_start_matches('=');
                if arg.starts_with('"') {
                    if self.mode != 1 || self.reject_text_submit {
                        return cms_error(line, 500);
                    }
                    self.pending = Some(Pending::SubmitText);
                } else {
                    if self.mode != 0 {
                        return cms_error(line, 304);
                    }
                    self.pending = Some(Pending::SubmitPdu);
                }
                format!("{}\r\r\n> ", line).into_bytes()
            }
            ("+CMGW", arg) => {
                if self.mode != 1 {
                    return cms_error(line, 304);
                }
                let fields: Vec<String> = arg.trim_start_matches('=').split(',').map(unquote).collect();
                let status = fields
                    .get(2)
                    .and_then(|s| SmsFilter::from_label(s))
                    .unwrap_or(SmsFilter::StoredUnsent);
                self.pending = Some(Pending::Write {
                    number: fields.first().cloned().unwrap_or_default(),
                    status,
                });
                format!("{}\r\r\n> ", line).into_bytes()
            }
            ("+CMGL", arg) => {
                if self.silent_listings > 0 {
                    self.silent_listings -= 1;
                    return Vec::new();
                }
                let arg = unquote(arg.trim_start_matches('='));
                let filter = match self.mode {
                    0 => arg.parse().ok().and_then(SmsFilter::from_code),
                    _ => SmsFilter::from_label(&arg),
                };
                let Some(filter) = filter else {
                    return cms_error(line, 302);
                };
                let mut lines = Vec::new();
                for (index, message) in &self.store {
                    if filter != SmsFilter::All && filter != message.status {
                        continue;
                    }
                    if self.mode == 0 {
                        lines.push(format!(
                            "+CMGL: {},{},,{}",
                            index,
                            message.status.code(),
                            message.pdu.len() / 2
                        ));
                        lines.push(message.pdu.clone());
                    } else {
                        lines.push(format!(
                            "+CMGL: {},\"{}\",\"{}\",,",
                            index,
                            message.status.label(),
                            message.number
                        ));
                        lines.push(message.text.clone());
                    }
                }
                ok(line, &lines)
            }
            ("+CMGR", arg) => {
                let index: u32 = arg.trim_start_matches('=').parse().unwrap_or(0);
                match self.store.get(&index) {
                    Some(message) if self.mode == 0 => ok(
                        line,
                        &[
                            format!("+CMGR: {},,{}", message.status.code(), message.pdu.len() / 2),
                            message.pdu.clone(),
                        ],
                    ),
                    Some(message) => ok(
                        line,
                        &[
                            format!("+CMGR: \"{}\",\"{}\",,", message.status.label(), message.number),
                            message.text.clone(),
                        ],
                    ),
                    None => cms_error(line, 321),
                }
            }
            ("+CMGD", arg) => {
                let index: u32 = arg.trim_start_matches('=').parse().unwrap_or(0);
                match self.store.remove(&index) {
                    Some(_) => ok(line, &[]),
                    None => cms_error(line, 321),
                }
            }
            ("+CMSS", arg) => {
                let index: u32 = arg
                    .trim_start_matches('=')
                    .split(',')
                    .next()
                    .and_then(|i| i.parse().ok())
                    .unwrap_or(0);
                match self.store.get_mut(&index) {
                    Some(message) => {
                        message.status = SmsFilter::StoredSent;
                        let reference = self.take_reference();
                        ok(line, &[format!("+CMSS: {}", reference)])
                    }
                    None => cms_error(line, 321),
                }
            }
            ("+CSCA", "?") => ok(line, &["+CSCA: \"+31624000000\",145".to_string()]),
            ("+CGMI", _) => ok(line, &["Nokia".to_string()]),
            ("+CGMM", _) => ok(line, &["+CGMM: 6310i".to_string()]),
            ("+CGMR", _) => ok(line, &["V 5.50".to_string()]),
            ("+CGSN", _) => ok(line, &["350000000000006".to_string()]),
            ("+CIMI", _) => ok(line, &["204080000000001".to_string()]),
            ("+CPBS", "?") => ok(
                line,
                &[format!(
                    "+CPBS: \"{}\",{},{}",
                    self.phonebook_storage,
                    self.phonebook.len(),
                    self.phonebook_capacity
                )],
            ),
            ("+CPBS", arg) => {
                self.phonebook_storage = unquote(arg.trim_start_matches('='));
                ok(line, &[])
            }
            ("+CPBR", arg) => {
                let bounds: Vec<u32> = arg
                    .trim_start_matches('=')
                    .split(',')
                    .filter_map(|b| b.parse().ok())
                    .collect();
                let (start, stop) = match bounds.as_slice() {
                    [start] => (*start, *start),
                    [start, stop] => (*start, *stop),
                    _ => return b"\r\nERROR\r\n".to_vec(),
                };
                let lines: Vec<String> = self
                    .phonebook
                    .range(start..=stop)
                    .map(|(index, entry)| {
                        format!(
                            "+CPBR: {},\"{}\",{},\"{}\"",
                            index, entry.number, entry.type_of_address, entry.label
                        )
                    })
                    .collect();
                ok(line, &lines)
            }
            ("+CPBW", arg) => {
                let fields: Vec<String> = arg.trim_start_matches('=').split(',').map(unquote).collect();
                if fields.len() < 4 {
                    return b"\r\nERROR\r\n".to_vec();
                }
                let index = fields[0].parse().unwrap_or_else(|_| {
                    (1..).find(|i| !self.phonebook.contains_key(i)).unwrap_or(1)
                });
                self.phonebook.insert(
                    index,
                    PhonebookRecord {
                        number: fields[1].clone(),
                        type_of_address: fields[2].parse().unwrap_or(129),
                        label: fields[3].clone(),
                    },
                );
                ok(line, &[])
            }
            _ => b"\r\nERROR\r\n".to_vec(),
        }
    }
}

/// Shared handle on the simulated device
#[derive(Debug, Clone, Default)]
pub struct ModemSimulator {
    state: Arc<Mutex<ModemState>>,
}

impl ModemSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, ModemState> {
        self.state.lock().unwrap()
    }

    /// Store a message as if it had been received or written earlier
    pub fn insert(&self, index: u32, status: SmsFilter, pdu: &str) {
        self.state().store.insert(
            index,
            StoredMessage {
                status,
                number: String::new(),
                text: String::new(),
                pdu: pdu.to_string(),
            },
        );
    }

    /// Phone bound to this simulator with zero settle delays
    pub fn phone(&self) -> Phone<ModemSimulator> {
        self.phone_with(SessionConfig::immediate())
    }

    pub fn phone_with(&self, config: SessionConfig) -> Phone<ModemSimulator> {
        Phone::new(self.clone(), config)
    }
}

impl Responder for ModemSimulator {
    fn respond(&mut self, frame: &[u8]) -> Vec<u8> {
        let text = String::from_utf8_lossy(frame);
        let mut state = self.state();
        match text.strip_suffix('\u{1a}') {
            Some(body) => state.answer_body(body),
            None => state.answer_line(text.trim_end()),
        }
    }
}

impl Connector for ModemSimulator {
    type Transport = MemoryTransport;

    fn transport(&self) -> SmsResult<MemoryTransport> {
        Ok(MemoryTransport::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulator_tracks_mode() {
        let mut modem = ModemSimulator::new();
        assert_eq!(modem.respond(b"AT+CMGF=1\r\n"), b"AT+CMGF=1\r\r\n\r\nOK\r\n");
        assert_eq!(modem.state().mode, 1);
        let answer = modem.respond(b"AT+CMGF?\r\n");
        assert!(String::from_utf8_lossy(&answer).contains("+CMGF: 1"));
    }

    #[test]
    fn test_simulator_rejects_pdu_submit_in_text_mode() {
        let mut modem = ModemSimulator::new();
        modem.respond(b"AT+CMGF=1\r\n");
        let answer = modem.respond(b"AT+CMGS=12\r\n");
        assert!(String::from_utf8_lossy(&answer).contains("+CMS ERROR: 304"));
    }
}
