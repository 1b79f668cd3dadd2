//! Typed AT commands (3GPP TS 27.005 / 27.007)

use atsms_core::{CommandClass, DeviceMode, SmsFilter, StorageSlots};
use std::fmt;

/// Identification queries answered with a single line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityQuery {
    /// `AT+CGMI`
    Manufacturer,
    /// `AT+CGMM`
    Model,
    /// `AT+CGMR`
    Revision,
    /// `AT+CGSN` (IMEI)
    SerialNumber,
    /// `AT+CIMI` (IMSI)
    Subscriber,
}

impl IdentityQuery {
    pub const ALL: [IdentityQuery; 5] = [
        IdentityQuery::Manufacturer,
        IdentityQuery::Model,
        IdentityQuery::Revision,
        IdentityQuery::SerialNumber,
        IdentityQuery::Subscriber,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            IdentityQuery::Manufacturer => "+CGMI",
            IdentityQuery::Model => "+CGMM",
            IdentityQuery::Revision => "+CGMR",
            IdentityQuery::SerialNumber => "+CGSN",
            IdentityQuery::Subscriber => "+CIMI",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IdentityQuery::Manufacturer => "manufacturer",
            IdentityQuery::Model => "model",
            IdentityQuery::Revision => "revision",
            IdentityQuery::SerialNumber => "serial number",
            IdentityQuery::Subscriber => "subscriber",
        }
    }
}

/// Every command the stack sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtCommand {
    /// `AT`
    Attention,
    /// `AT+CMGF=<n>`
    SetMode(DeviceMode),
    /// `AT+CMGF?`
    QueryMode,
    /// `AT+CPMS="<r>","<w>","<n>"`
    SetStorage(StorageSlots),
    /// `AT+CPMS?`
    QueryStorage,
    /// `AT+CMGS=<length>`, followed by the PDU
    SubmitPdu { tpdu_length: usize },
    /// `AT+CMGS="<number>"`, followed by the text
    SubmitText { number: String },
    /// `AT+CMGR=<index>`
    Read { index: u32 },
    /// `AT+CMGW="<number>",,"<status>"`, followed by the text
    Write { number: String, status: SmsFilter },
    /// `AT+CMSS=<index>[,"<number>"]`
    SendStored { index: u32, number: Option<String> },
    /// `AT+CMGD=<index>`
    Delete { index: u32 },
    /// `AT+CMGL=<filter>`, numeric in PDU mode and quoted in TEXT mode
    List { filter: SmsFilter, mode: DeviceMode },
    /// `AT+CSCA?`
    QueryServiceCenter,
    Identity(IdentityQuery),
    /// `AT+CPBS="<storage>"`
    SetPhonebookStorage(String),
    /// `AT+CPBS?`
    QueryPhonebookStorage,
    /// `AT+CPBR=<start>,<stop>`
    ReadPhonebook { start: u32, stop: u32 },
    /// `AT+CPBW=[<index>],"<number>",<type>,"<label>"`
    WritePhonebook {
        index: Option<u32>,
        number: String,
        type_of_address: u8,
        label: String,
    },
}

impl AtCommand {
    /// Information-response prefix used to split the answer into records
    pub fn tag(&self) -> &'static str {
        match self {
            AtCommand::Attention => "AT",
            AtCommand::SetMode(_) | AtCommand::QueryMode => "+CMGF",
            AtCommand::SetStorage(_) | AtCommand::QueryStorage => "+CPMS",
            AtCommand::SubmitPdu { .. } | AtCommand::SubmitText { .. } => "+CMGS",
            AtCommand::Read { .. } => "+CMGR",
            AtCommand::Write { .. } => "+CMGW",
            AtCommand::SendStored { .. } => "+CMSS",
            AtCommand::Delete { .. } => "+CMGD",
            AtCommand::List { .. } => "+CMGL",
            AtCommand::QueryServiceCenter => "+CSCA",
            AtCommand::Identity(query) => query.tag(),
            AtCommand::SetPhonebookStorage(_) | AtCommand::QueryPhonebookStorage => "+CPBS",
            AtCommand::ReadPhonebook { .. } => "+CPBR",
            AtCommand::WritePhonebook { .. } => "+CPBW",
        }
    }

    /// Settle delay class of the command line itself
    pub fn class(&self) -> CommandClass {
        match self {
            AtCommand::Attention
            | AtCommand::SetMode(_)
            | AtCommand::QueryMode
            | AtCommand::SetStorage(_)
            | AtCommand::QueryStorage
            | AtCommand::Delete { .. } => CommandClass::Control,
            AtCommand::SubmitPdu { .. }
            | AtCommand::SubmitText { .. }
            | AtCommand::Write { .. } => CommandClass::Submit,
            AtCommand::Read { .. } | AtCommand::SendStored { .. } => CommandClass::Read,
            AtCommand::List { .. } => CommandClass::Listing,
            AtCommand::QueryServiceCenter
            | AtCommand::Identity(_)
            | AtCommand::SetPhonebookStorage(_)
            | AtCommand::QueryPhonebookStorage
            | AtCommand::ReadPhonebook { .. }
            | AtCommand::WritePhonebook { .. } => CommandClass::Query,
        }
    }

    /// Whether the device answers with a `> ` prompt and waits for a body
    pub fn expects_body(&self) -> bool {
        matches!(
            self,
            AtCommand::SubmitPdu { .. } | AtCommand::SubmitText { .. } | AtCommand::Write { .. }
        )
    }

    /// Settle delay class of the body following the prompt
    ///
    /// PDU bodies are acknowledged faster than text bodies, which the device
    /// converts before answering.
    pub fn body_class(&self) -> CommandClass {
        match self {
            AtCommand::SubmitPdu { .. } => CommandClass::Submit,
            _ => CommandClass::Read,
        }
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtCommand::Attention => f.write_str("AT"),
            AtCommand::SetMode(mode) => write!(f, "AT+CMGF={}", mode.code()),
            AtCommand::QueryMode => f.write_str("AT+CMGF?"),
            AtCommand::SetStorage(slots) => write!(
                f,
                "AT+CPMS=\"{}\",\"{}\",\"{}\"",
                slots.read, slots.write, slots.receive
            ),
            AtCommand::QueryStorage => f.write_str("AT+CPMS?"),
            AtCommand::SubmitPdu { tpdu_length } => write!(f, "AT+CMGS={}", tpdu_length),
            AtCommand::SubmitText { number } => write!(f, "AT+CMGS=\"{}\"", number),
            AtCommand::Read { index } => write!(f, "AT+CMGR={}", index),
            AtCommand::Write { number, status } => {
                write!(f, "AT+CMGW=\"{}\",,\"{}\"", number, status.label())
            }
            AtCommand::SendStored { index, number } => match number {
                Some(number) => write!(f, "AT+CMSS={},\"{}\"", index, number),
                None => write!(f, "AT+CMSS={}", index),
            },
            AtCommand::Delete { index } => write!(f, "AT+CMGD={}", index),
            AtCommand::List { filter, mode } => write!(f, "AT+CMGL={}", filter.argument(*mode)),
            AtCommand::QueryServiceCenter => f.write_str("AT+CSCA?"),
            AtCommand::Identity(query) => write!(f, "AT{}", query.tag()),
            AtCommand::SetPhonebookStorage(storage) => write!(f, "AT+CPBS=\"{}\"", storage),
            AtCommand::QueryPhonebookStorage => f.write_str("AT+CPBS?"),
            AtCommand::ReadPhonebook { start, stop } => write!(f, "AT+CPBR={},{}", start, stop),
            AtCommand::WritePhonebook {
                index,
                number,
                type_of_address,
                label,
            } => {
                f.write_str("AT+CPBW=")?;
                if let Some(index) = index {
                    write!(f, "{}", index)?;
                }
                write!(f, ",\"{}\",{},\"{}\"", number, type_of_address, label)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atsms_core::Storage;

    #[test]
    fn test_wire_text() {
        assert_eq!(AtCommand::SetMode(DeviceMode::Text).to_string(), "AT+CMGF=1");
        assert_eq!(
            AtCommand::SetStorage(StorageSlots::default().with_read(Storage::Phone)).to_string(),
            "AT+CPMS=\"ME\",\"SM\",\"SM\""
        );
        assert_eq!(AtCommand::SubmitPdu { tpdu_length: 23 }.to_string(), "AT+CMGS=23");
        assert_eq!(
            AtCommand::Write {
                number: "+3361234".into(),
                status: SmsFilter::StoredUnsent
            }
            .to_string(),
            "AT+CMGW=\"+3361234\",,\"STO UNSENT\""
        );
        assert_eq!(
            AtCommand::SendStored {
                index: 3,
                number: Some("555".into())
            }
            .to_string(),
            "AT+CMSS=3,\"555\""
        );
        assert_eq!(AtCommand::Identity(IdentityQuery::Subscriber).to_string(), "AT+CIMI");
    }

    #[test]
    fn test_list_argument_follows_mode() {
        let pdu = AtCommand::List {
            filter: SmsFilter::All,
            mode: DeviceMode::Pdu,
        };
        let text = AtCommand::List {
            filter: SmsFilter::All,
            mode: DeviceMode::Text,
        };
        assert_eq!(pdu.to_string(), "AT+CMGL=4");
        assert_eq!(text.to_string(), "AT+CMGL=\"ALL\"");
        assert_eq!(pdu.class(), CommandClass::Listing);
    }

    #[test]
    fn test_phonebook_write() {
        let add = AtCommand::WritePhonebook {
            index: None,
            number: "0612345678".into(),
            type_of_address: 129,
            label: "Alice".into(),
        };
        assert_eq!(add.to_string(), "AT+CPBW=,\"0612345678\",129,\"Alice\"");
    }

    #[test]
    fn test_body_commands() {
        assert!(AtCommand::SubmitPdu { tpdu_length: 1 }.expects_body());
        assert!(!AtCommand::Read { index: 1 }.expects_body());
        assert_eq!(
            AtCommand::SubmitText { number: "1".into() }.body_class(),
            CommandClass::Read
        );
    }
}
