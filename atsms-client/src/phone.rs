//! SMS operations on a phone
//!
//! Every operation opens its own dialogue session, runs, and closes it
//! again. Operations that depend on the message format or storage switch
//! them explicitly on entry and restore the defaults on exit, so no
//! operation relies on what an earlier one left behind.

use crate::listing::{decode_listing, decode_record, ListOutcome, TextMessage};
use atsms_core::{
    ConnectionDescriptor, DeviceMode, SessionConfig, SmsError, SmsFilter, SmsResult, Storage,
    StorageSlots,
};
use atsms_pdu::{encode_submit, DecodedMessageRecord, SubmitOptions};
use atsms_session::{AtCommand, AtSession, IdentityQuery, RawRecord};
use atsms_transport::{Connector, TransportLayer};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Acknowledgement of one submitted segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub sequence: u8,
    pub total: u8,
    /// TP-MR assigned by the device, if it reported one
    pub message_reference: Option<u8>,
}

/// Occupation of one message storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUsage {
    pub storage: Storage,
    pub used: u32,
    pub total: u32,
}

/// Answer of `AT+CPMS?`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStatus {
    pub read: StorageUsage,
    pub write: StorageUsage,
    pub receive: StorageUsage,
}

impl StorageStatus {
    fn from_record(record: &RawRecord) -> SmsResult<Self> {
        let fields = record.fields();
        let usage = |slot: usize| -> SmsResult<StorageUsage> {
            let base = slot * 3;
            let number = |i: usize| -> SmsResult<u32> {
                fields
                    .get(base + i)
                    .and_then(|f| f.parse().ok())
                    .ok_or_else(|| {
                        SmsError::InvalidData(format!("Malformed storage status: {}", record.header))
                    })
            };
            let name = fields.get(base).ok_or_else(|| {
                SmsError::InvalidData(format!("Malformed storage status: {}", record.header))
            })?;
            Ok(StorageUsage {
                storage: name.parse()?,
                used: number(1)?,
                total: number(2)?,
            })
        };
        Ok(Self {
            read: usage(0)?,
            write: usage(1)?,
            receive: usage(2)?,
        })
    }
}

/// Service center configured on the SIM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCenter {
    pub number: String,
    pub type_of_address: Option<u8>,
}

/// Handle on one phone
///
/// Holds no connection. Each call asks the [`Connector`] for a fresh
/// transport, so a `Phone` can be kept around and shared by reference.
#[derive(Debug)]
pub struct Phone<C: Connector = ConnectionDescriptor> {
    connector: C,
    config: SessionConfig,
    cancel: CancellationToken,
}

impl<C: Connector> Phone<C> {
    pub fn new(connector: C, config: SessionConfig) -> Self {
        Self {
            connector,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Cancelling this token aborts every running and future operation
    ///
    /// Aborted operations still restore the device's mode and storage
    /// before their session closes.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Open a dialogue session for custom command sequences
    ///
    /// The caller must [`close`](AtSession::close) it.
    pub async fn open_session(&self) -> SmsResult<AtSession<C::Transport>> {
        let transport = self.connector.transport()?;
        let mut session = AtSession::new(transport, self.config.clone())
            .with_cancellation(self.cancel.child_token());
        session.open().await?;
        Ok(session)
    }

    /// Close `session` and hand back `result`
    ///
    /// A failing close is logged; it never replaces the operation's result.
    pub(crate) async fn finish<R>(
        &self,
        mut session: AtSession<C::Transport>,
        result: SmsResult<R>,
    ) -> SmsResult<R> {
        if let Err(err) = session.close().await {
            log::warn!("Failed to close dialogue session: {}", err);
        }
        result
    }

    fn read_slots(&self, storage: Storage) -> StorageSlots {
        self.config.default_storage.with_read(storage)
    }

    fn write_slots(&self, storage: Storage) -> StorageSlots {
        self.config.default_storage.with_write(storage)
    }

    /// Current message format (`AT+CMGF?`)
    pub async fn mode(&self) -> SmsResult<DeviceMode> {
        let mut session = self.open_session().await?;
        let result = query_mode(&mut session).await;
        self.finish(session, result).await
    }

    /// Storage names and occupation of the three slots (`AT+CPMS?`)
    pub async fn storage_status(&self) -> SmsResult<StorageStatus> {
        let mut session = self.open_session().await?;
        let result = match session.execute_command(&AtCommand::QueryStorage).await {
            Ok(records) => match records.first() {
                Some(record) => StorageStatus::from_record(record),
                None => Err(SmsError::InvalidData("Empty storage status".to_string())),
            },
            Err(err) => Err(err),
        };
        self.finish(session, result).await
    }

    /// Send `text` to `number` as one or more PDUs
    ///
    /// Segments are submitted in order, one `AT+CMGS` exchange each. The
    /// first failing segment ends the operation.
    pub async fn send_sms(
        &self,
        number: &str,
        text: &str,
        options: &SubmitOptions,
    ) -> SmsResult<Vec<SubmitReceipt>> {
        let segments = encode_submit(number, text, options)?;
        let mut session = self.open_session().await?;
        let result = session
            .with_mode(DeviceMode::Pdu, async |s| {
                let mut receipts = Vec::with_capacity(segments.len());
                for segment in &segments {
                    let command = AtCommand::SubmitPdu {
                        tpdu_length: segment.tpdu_length,
                    };
                    let records = s.send_body(&command, &segment.to_hex()).await?;
                    let reference = message_reference(&records);
                    log::info!(
                        "Sent segment {}/{} to {} (reference {:?})",
                        segment.sequence,
                        segment.total,
                        number,
                        reference
                    );
                    receipts.push(SubmitReceipt {
                        sequence: segment.sequence,
                        total: segment.total,
                        message_reference: reference,
                    });
                }
                Ok(receipts)
            })
            .await;
        self.finish(session, result).await
    }

    /// Send `text` to `number` in TEXT mode; the device does the encoding
    pub async fn send_sms_text(&self, number: &str, text: &str) -> SmsResult<Option<u8>> {
        let mut session = self.open_session().await?;
        let result = session
            .with_mode(DeviceMode::Text, async |s| {
                let command = AtCommand::SubmitText {
                    number: number.to_string(),
                };
                let records = s.send_body(&command, text).await?;
                Ok(message_reference(&records))
            })
            .await;
        if result.is_ok() {
            log::info!("Sent text message to {}", number);
        }
        self.finish(session, result).await
    }

    /// Read the message at `index` of `storage` (`AT+CMGR`)
    ///
    /// Returns None when the device answers without a record.
    pub async fn get_sms(
        &self,
        index: u32,
        storage: Storage,
    ) -> SmsResult<Option<DecodedMessageRecord>> {
        let slots = self.read_slots(storage);
        let mut session = self.open_session().await?;
        let result = session
            .with_mode(DeviceMode::Pdu, async |s| {
                s.with_storage(slots, async |s| {
                    let records = s.execute_command(&AtCommand::Read { index }).await?;
                    match records.first() {
                        Some(record) => decode_record(record, Some(index))
                            .map(Some)
                            .map_err(|err| SmsError::Codec(err.error)),
                        None => Ok(None),
                    }
                })
                .await
            })
            .await;
        self.finish(session, result).await
    }

    /// List the messages of `storage` matching `filter`, reassembled
    ///
    /// The listing is retried up to `list_retries` times while the device
    /// answers with no record; the first non-empty answer is used as is.
    pub async fn list_messages(&self, filter: SmsFilter, storage: Storage) -> SmsResult<ListOutcome> {
        let slots = self.read_slots(storage);
        let attempts = self.config.list_retries;
        let mut session = self.open_session().await?;
        let result = session
            .with_mode(DeviceMode::Pdu, async |s| {
                s.with_storage(slots, async |s| {
                    let command = AtCommand::List {
                        filter,
                        mode: DeviceMode::Pdu,
                    };
                    let records = s.execute_with_retry(&command, attempts).await?;
                    Ok(records.map(|r| decode_listing(&r)).unwrap_or_default())
                })
                .await
            })
            .await;
        if let Ok(outcome) = &result {
            log::debug!(
                "Listed {} message(s) from {}, {} undecodable",
                outcome.messages.len(),
                storage,
                outcome.decode_errors.len()
            );
        }
        self.finish(session, result).await
    }

    /// List in TEXT mode, as the device renders the messages
    pub async fn list_messages_text(
        &self,
        filter: SmsFilter,
        storage: Storage,
    ) -> SmsResult<Vec<TextMessage>> {
        let slots = self.read_slots(storage);
        let attempts = self.config.list_retries;
        let mut session = self.open_session().await?;
        let result = session
            .with_mode(DeviceMode::Text, async |s| {
                s.with_storage(slots, async |s| {
                    let command = AtCommand::List {
                        filter,
                        mode: DeviceMode::Text,
                    };
                    let records = s.execute_with_retry(&command, attempts).await?;
                    Ok(records
                        .unwrap_or_default()
                        .iter()
                        .map(TextMessage::from_listing)
                        .collect())
                })
                .await
            })
            .await;
        self.finish(session, result).await
    }

    /// Store `text` from `number` as an unread received message
    ///
    /// Returns the storage index assigned by the device.
    pub async fn store_sms(&self, number: &str, text: &str, storage: Storage) -> SmsResult<u32> {
        self.write_message(number, text, storage, SmsFilter::ReceivedUnread)
            .await
    }

    /// Store `text` to `number` as an unsent draft
    pub async fn store_draft_sms(&self, number: &str, text: &str, storage: Storage) -> SmsResult<u32> {
        self.write_message(number, text, storage, SmsFilter::StoredUnsent)
            .await
    }

    async fn write_message(
        &self,
        number: &str,
        text: &str,
        storage: Storage,
        status: SmsFilter,
    ) -> SmsResult<u32> {
        let slots = self.write_slots(storage);
        let mut session = self.open_session().await?;
        let result = session
            .with_mode(DeviceMode::Text, async |s| {
                s.with_storage(slots, async |s| {
                    let command = AtCommand::Write {
                        number: number.to_string(),
                        status,
                    };
                    let records = s.send_body(&command, text).await?;
                    records
                        .first()
                        .and_then(|r| r.numeric_field(0))
                        .ok_or_else(|| {
                            SmsError::InvalidData("Device reported no storage index".to_string())
                        })
                })
                .await
            })
            .await;
        self.finish(session, result).await
    }

    /// Send the stored message at `index`, optionally to another `number`
    pub async fn send_from_storage(
        &self,
        index: u32,
        number: Option<&str>,
        storage: Storage,
    ) -> SmsResult<Option<u8>> {
        let slots = self.write_slots(storage);
        let mut session = self.open_session().await?;
        let result = session
            .with_storage(slots, async |s| {
                let command = AtCommand::SendStored {
                    index,
                    number: number.map(str::to_string),
                };
                let records = s.execute_command(&command).await?;
                Ok(message_reference(&records))
            })
            .await;
        self.finish(session, result).await
    }

    /// Delete the message at `index` of `storage`
    pub async fn delete_sms(&self, index: u32, storage: Storage) -> SmsResult<()> {
        let slots = self.read_slots(storage);
        let mut session = self.open_session().await?;
        let result = session
            .with_storage(slots, async |s| {
                s.execute_command(&AtCommand::Delete { index }).await?;
                Ok(())
            })
            .await;
        if result.is_ok() {
            log::info!("Deleted message {} from {}", index, storage);
        }
        self.finish(session, result).await
    }

    /// Service center address (`AT+CSCA?`)
    pub async fn service_center(&self) -> SmsResult<Option<ServiceCenter>> {
        let mut session = self.open_session().await?;
        let result = session
            .execute_command(&AtCommand::QueryServiceCenter)
            .await
            .map(|records| {
                records.first().and_then(|record| {
                    record.field(0).map(|number| ServiceCenter {
                        number,
                        type_of_address: record.numeric_field(1).and_then(|t| u8::try_from(t).ok()),
                    })
                })
            });
        self.finish(session, result).await
    }

    /// Answer to one identification query
    pub async fn identity(&self, query: IdentityQuery) -> SmsResult<Option<String>> {
        let mut session = self.open_session().await?;
        let result = query_identity(&mut session, query).await;
        self.finish(session, result).await
    }

    /// Answers to every identification query, in one session
    pub async fn identities(&self) -> SmsResult<Vec<(IdentityQuery, Option<String>)>> {
        let mut session = self.open_session().await?;
        let mut result = Ok(Vec::with_capacity(IdentityQuery::ALL.len()));
        for query in IdentityQuery::ALL {
            match query_identity(&mut session, query).await {
                Ok(answer) => {
                    if let Ok(answers) = &mut result {
                        answers.push((query, answer));
                    }
                }
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        self.finish(session, result).await
    }
}

async fn query_mode<T: TransportLayer>(
    session: &mut AtSession<T>,
) -> SmsResult<DeviceMode> {
    let records = session.execute_command(&AtCommand::QueryMode).await?;
    let code = records
        .first()
        .and_then(|r| r.numeric_field(0))
        .ok_or_else(|| SmsError::InvalidData("Device reported no message format".to_string()))?;
    let code = u8::try_from(code)
        .map_err(|_| SmsError::InvalidData(format!("Unknown message format code: {}", code)))?;
    DeviceMode::from_code(code)
}

async fn query_identity<T: TransportLayer>(
    session: &mut AtSession<T>,
    query: IdentityQuery,
) -> SmsResult<Option<String>> {
    let records = session.execute_command(&AtCommand::Identity(query)).await?;
    Ok(records
        .into_iter()
        .next()
        .map(|r| r.header)
        .filter(|h| !h.is_empty()))
}

/// TP-MR from a `+CMGS:` / `+CMSS:` answer
fn message_reference(records: &[RawRecord]) -> Option<u8> {
    records
        .first()
        .and_then(|r| r.numeric_field(0))
        .and_then(|mr| u8::try_from(mr).ok())
}
