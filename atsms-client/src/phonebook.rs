//! Phonebook pass-through (`AT+CPBS`, `AT+CPBR`, `AT+CPBW`)
//!
//! Entries are read and written as the device presents them. There is no
//! synchronization logic here.

use crate::phone::Phone;
use atsms_core::{SmsError, SmsResult};
use atsms_pdu::PhoneAddress;
use atsms_session::{AtCommand, AtSession, RawRecord};
use atsms_transport::{Connector, TransportLayer};
use serde::{Deserialize, Serialize};

/// One phonebook entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhonebookEntry {
    pub index: u32,
    pub number: String,
    /// 145 for international numbers, 129 otherwise
    pub type_of_address: u8,
    pub label: String,
    /// Vendor-specific trailing field, e.g. the hidden flag
    pub flag: Option<u32>,
}

impl PhonebookEntry {
    /// Parse a `+CPBR: <index>,"<number>",<type>,"<text>"[,<flag>]` record
    pub fn from_record(record: &RawRecord) -> SmsResult<Self> {
        let malformed = || SmsError::InvalidData(format!("Malformed phonebook entry: {}", record.header));
        let fields = record.fields();
        let index = record.numeric_field(0).ok_or_else(malformed)?;
        let number = fields.get(1).cloned().ok_or_else(malformed)?;
        let type_of_address = record
            .numeric_field(2)
            .and_then(|t| u8::try_from(t).ok())
            .ok_or_else(malformed)?;
        Ok(Self {
            index,
            number,
            type_of_address,
            label: fields.get(3).cloned().unwrap_or_default(),
            flag: record.numeric_field(4),
        })
    }
}

/// Answer of `AT+CPBS?`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhonebookStatus {
    pub storage: String,
    pub used: Option<u32>,
    pub total: Option<u32>,
}

async fn query_status<T: TransportLayer>(session: &mut AtSession<T>) -> SmsResult<PhonebookStatus> {
    let records = session
        .execute_command(&AtCommand::QueryPhonebookStorage)
        .await?;
    let record = records
        .first()
        .ok_or_else(|| SmsError::InvalidData("Empty phonebook status".to_string()))?;
    Ok(PhonebookStatus {
        storage: record.field(0).unwrap_or_default(),
        used: record.numeric_field(1),
        total: record.numeric_field(2),
    })
}

impl<C: Connector> Phone<C> {
    /// Selected phonebook storage and its occupation
    pub async fn phonebook_status(&self) -> SmsResult<PhonebookStatus> {
        let mut session = self.open_session().await?;
        let result = query_status(&mut session).await;
        self.finish(session, result).await
    }

    /// Read entries `start..=stop` of phonebook `storage`
    ///
    /// With `stop` None the range runs to the storage capacity reported by
    /// `AT+CPBS?`.
    pub async fn read_phonebook(
        &self,
        storage: &str,
        start: u32,
        stop: Option<u32>,
    ) -> SmsResult<Vec<PhonebookEntry>> {
        let mut session = self.open_session().await?;
        let result = read_entries(&mut session, storage, start, stop).await;
        self.finish(session, result).await
    }

    /// Add an entry at the first free index, or overwrite the one at `index`
    pub async fn write_phonebook(
        &self,
        storage: &str,
        index: Option<u32>,
        number: &str,
        label: &str,
    ) -> SmsResult<()> {
        let type_of_address = PhoneAddress::parse(number)?.type_of_address;
        let mut session = self.open_session().await?;
        let command = AtCommand::WritePhonebook {
            index,
            number: number.trim().to_string(),
            type_of_address,
            label: label.to_string(),
        };
        let result = write_entry(&mut session, storage, &command).await;
        self.finish(session, result).await
    }
}

async fn write_entry<T: TransportLayer>(
    session: &mut AtSession<T>,
    storage: &str,
    command: &AtCommand,
) -> SmsResult<()> {
    session
        .execute_command(&AtCommand::SetPhonebookStorage(storage.to_string()))
        .await?;
    session.execute_command(command).await?;
    Ok(())
}

async fn read_entries<T: TransportLayer>(
    session: &mut AtSession<T>,
    storage: &str,
    start: u32,
    stop: Option<u32>,
) -> SmsResult<Vec<PhonebookEntry>> {
    session
        .execute_command(&AtCommand::SetPhonebookStorage(storage.to_string()))
        .await?;
    let stop = match stop {
        Some(stop) => stop,
        None => query_status(session)
            .await?
            .total
            .ok_or_else(|| SmsError::InvalidData(format!("{} reports no capacity", storage)))?,
    };
    if stop < start {
        return Ok(Vec::new());
    }
    let records = session
        .execute_command(&AtCommand::ReadPhonebook { start, stop })
        .await?;
    records.iter().map(PhonebookEntry::from_record).collect()
}
