//! AT dialogue engine

use crate::command::AtCommand;
use crate::response::{check_error, parse_response, RawRecord};
use crate::state::ExchangeState;
use crate::statistics::DialogueStatistics;
use atsms_core::{DeviceMode, SessionConfig, SmsError, SmsResult, StorageSlots};
use atsms_transport::TransportLayer;
use bytes::BytesMut;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const CRLF: &[u8] = b"\r\n";
const CTRL_Z: u8 = 0x1A;

/// One dialogue with a phone over one open transport
///
/// The protocol is half-duplex: every exchange borrows the session mutably,
/// so a second command can never be written while an answer is still being
/// drained.
///
/// The session mirrors the message format and storage triple it last set.
/// [`with_mode`](Self::with_mode) and [`with_storage`](Self::with_storage)
/// restore the defaults on every exit path, and [`close`](Self::close)
/// restores them if the mirror still shows a non-default state.
pub struct AtSession<T: TransportLayer> {
    transport: T,
    config: SessionConfig,
    state: ExchangeState,
    statistics: DialogueStatistics,
    buffer: BytesMut,
    mode: Option<DeviceMode>,
    storage: Option<StorageSlots>,
    cancel: CancellationToken,
    closed: bool,
}

impl<T: TransportLayer> AtSession<T> {
    /// Create a session over an unopened transport
    pub fn new(transport: T, config: SessionConfig) -> Self {
        let capacity = config.read_chunk_size.max(1) * 4;
        Self {
            transport,
            config,
            state: ExchangeState::Idle,
            statistics: DialogueStatistics::new(),
            buffer: BytesMut::with_capacity(capacity),
            mode: None,
            storage: None,
            cancel: CancellationToken::new(),
            closed: true,
        }
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that aborts this dialogue when cancelled
    ///
    /// A cancelled session refuses new exchanges with `SmsError::Cancelled`
    /// but still runs its mode and storage restoration.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn statistics(&self) -> &DialogueStatistics {
        &self.statistics
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Message format last set on the device, None if never changed
    pub fn mode(&self) -> Option<DeviceMode> {
        self.mode
    }

    /// Storage triple last set on the device, None if never changed
    pub fn storage(&self) -> Option<StorageSlots> {
        self.storage
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_closed(&self) -> bool {
        self.closed || self.transport.is_closed()
    }

    /// Whether the device may be left in a non-default mode or storage
    pub fn is_dirty(&self) -> bool {
        self.mode_dirty() || self.storage_dirty()
    }

    fn mode_dirty(&self) -> bool {
        self.mode.is_some_and(|mode| mode != DeviceMode::default())
    }

    fn storage_dirty(&self) -> bool {
        self.storage
            .is_some_and(|slots| slots != self.config.default_storage)
    }

    /// Open the transport
    pub async fn open(&mut self) -> SmsResult<()> {
        self.transport.open().await?;
        self.transport
            .set_timeout(Some(self.config.drain_timeout))
            .await?;
        self.closed = false;
        self.state = ExchangeState::Idle;
        log::debug!("Dialogue opened on {}", self.transport.endpoint());
        Ok(())
    }

    /// Send `command` + CR LF and drain the answer
    ///
    /// # Arguments
    /// * `command` - Command line without terminator
    /// * `settle` - Pause after writing, before the first read
    /// * `drain` - Read timeout whose expiry ends the answer
    ///
    /// # Returns
    /// Every byte received until a read timed out
    pub async fn execute(
        &mut self,
        command: &str,
        settle: Duration,
        drain: Duration,
    ) -> SmsResult<Vec<u8>> {
        self.ensure_active()?;
        log::debug!("-> {}", command);
        let mut line = Vec::with_capacity(command.len() + CRLF.len());
        line.extend_from_slice(command.as_bytes());
        line.extend_from_slice(CRLF);
        self.exchange(&line, settle, drain, true).await
    }

    /// Execute a typed command and split its answer into records
    pub async fn execute_command(&mut self, command: &AtCommand) -> SmsResult<Vec<RawRecord>> {
        let settle = self.config.settle_delay(command.class());
        let drain = self.config.drain_timeout;
        let raw = self.execute(&command.to_string(), settle, drain).await?;
        self.parse(&raw, command.tag())
    }

    /// Execute a command answered with a `> ` prompt, then send `body`
    ///
    /// The body is terminated with `0x1A` (Ctrl-Z). The records returned are
    /// those of the answer to the body.
    pub async fn send_body(&mut self, command: &AtCommand, body: &str) -> SmsResult<Vec<RawRecord>> {
        if !command.expects_body() {
            return Err(SmsError::InvalidData(format!(
                "{} does not take a message body",
                command
            )));
        }
        let drain = self.config.drain_timeout;
        let prompt = self
            .execute(
                &command.to_string(),
                self.config.settle_delay(command.class()),
                drain,
            )
            .await?;
        if let Err(err) = check_error(&prompt) {
            self.statistics.increment_protocol_errors();
            return Err(err);
        }
        if !prompt.contains(&b'>') {
            log::debug!("No prompt after {}, sending body anyway", command);
        }

        self.ensure_active()?;
        let mut payload = Vec::with_capacity(body.len() + 1);
        payload.extend_from_slice(body.as_bytes());
        payload.push(CTRL_Z);
        log::debug!("-> <body, {} bytes>", payload.len());
        let raw = self
            .exchange(
                &payload,
                self.config.settle_delay(command.body_class()),
                drain,
                true,
            )
            .await?;
        self.parse(&raw, command.tag())
    }

    /// Re-issue `command` until the answer carries at least one record
    ///
    /// Returns None once `max_attempts` answers were all empty; an empty
    /// store is a valid outcome, not an error. Protocol and transport errors
    /// end the loop immediately.
    pub async fn execute_with_retry(
        &mut self,
        command: &AtCommand,
        max_attempts: u32,
    ) -> SmsResult<Option<Vec<RawRecord>>> {
        for attempt in 1..=max_attempts {
            if attempt > 1 {
                self.statistics.increment_retries();
                log::debug!("{} answered empty, attempt {}/{}", command, attempt, max_attempts);
            }
            let records = self.execute_command(command).await?;
            if !records.is_empty() {
                return Ok(Some(records));
            }
        }
        log::debug!("{} still empty after {} attempts", command, max_attempts);
        Ok(None)
    }

    /// Switch the message format (`AT+CMGF`)
    pub async fn set_mode(&mut self, mode: DeviceMode) -> SmsResult<()> {
        let result = self.execute_command(&AtCommand::SetMode(mode)).await;
        self.track_mode(mode, result.is_ok());
        result.map(|_| ())
    }

    /// Switch the storage triple (`AT+CPMS`)
    pub async fn set_storage(&mut self, slots: StorageSlots) -> SmsResult<()> {
        let result = self.execute_command(&AtCommand::SetStorage(slots)).await;
        self.track_storage(slots, result.is_ok());
        result.map(|_| ())
    }

    /// After a failed switch the device may or may not have changed, so the
    /// mirror keeps whichever of the two states is not the default.
    fn track_mode(&mut self, mode: DeviceMode, succeeded: bool) {
        if succeeded || mode != DeviceMode::default() {
            self.mode = Some(mode);
        }
    }

    fn track_storage(&mut self, slots: StorageSlots, succeeded: bool) {
        if succeeded || slots != self.config.default_storage {
            self.storage = Some(slots);
        }
    }

    /// Run `body` with the device in `mode`, then switch back to PDU mode
    ///
    /// Restoration runs whether `body` succeeded, failed or was cancelled.
    /// A failed restoration is logged and counted. It is returned as the
    /// error when `body` succeeded; otherwise the error of `body` wins.
    pub async fn with_mode<R>(
        &mut self,
        mode: DeviceMode,
        body: impl AsyncFnOnce(&mut Self) -> SmsResult<R>,
    ) -> SmsResult<R> {
        let result = match self.set_mode(mode).await {
            Ok(()) => body(self).await,
            Err(err) => Err(err),
        };
        let restored = self.restore_mode().await;
        keep_first_error(result, restored)
    }

    /// Run `body` with `slots` selected, then restore the configured default
    /// storage triple
    ///
    /// Same restoration guarantees as [`with_mode`](Self::with_mode).
    pub async fn with_storage<R>(
        &mut self,
        slots: StorageSlots,
        body: impl AsyncFnOnce(&mut Self) -> SmsResult<R>,
    ) -> SmsResult<R> {
        let result = match self.set_storage(slots).await {
            Ok(()) => body(self).await,
            Err(err) => Err(err),
        };
        let restored = self.restore_storage().await;
        keep_first_error(result, restored)
    }

    async fn restore_mode(&mut self) -> SmsResult<()> {
        let mode = DeviceMode::default();
        let result = self.restore(&AtCommand::SetMode(mode)).await;
        self.track_mode(mode, result.is_ok());
        if let Err(err) = &result {
            log::warn!("Failed to restore {} mode: {}", mode, err);
            self.statistics.increment_restore_failures();
        }
        result
    }

    async fn restore_storage(&mut self) -> SmsResult<()> {
        let slots = self.config.default_storage;
        let result = self.restore(&AtCommand::SetStorage(slots)).await;
        self.track_storage(slots, result.is_ok());
        if let Err(err) = &result {
            log::warn!("Failed to restore storage {}: {}", AtCommand::SetStorage(slots), err);
            self.statistics.increment_restore_failures();
        }
        result
    }

    /// Restoration exchange, exempt from cancellation
    async fn restore(&mut self, command: &AtCommand) -> SmsResult<()> {
        log::debug!("-> {} (restore)", command);
        let mut line = command.to_string().into_bytes();
        line.extend_from_slice(CRLF);
        let settle = self.config.settle_delay(command.class());
        let raw = self
            .exchange(&line, settle, self.config.drain_timeout, false)
            .await?;
        self.parse(&raw, command.tag()).map(|_| ())
    }

    /// Restore device defaults if needed, then close the transport
    pub async fn close(&mut self) -> SmsResult<()> {
        if self.closed {
            return Ok(());
        }
        let mut restored = Ok(());
        if self.mode_dirty() {
            restored = self.restore_mode().await;
        }
        if self.storage_dirty() {
            restored = keep_first_error(restored, self.restore_storage().await);
        }
        self.closed = true;
        self.transport.close().await?;
        log::debug!("Dialogue closed on {}", self.transport.endpoint());
        restored
    }

    fn ensure_active(&self) -> SmsResult<()> {
        if self.cancel.is_cancelled() {
            return Err(SmsError::Cancelled);
        }
        Ok(())
    }

    fn parse(&mut self, raw: &[u8], tag: &str) -> SmsResult<Vec<RawRecord>> {
        parse_response(raw, tag).inspect_err(|_| self.statistics.increment_protocol_errors())
    }

    fn transition(&mut self, new_state: ExchangeState) -> SmsResult<()> {
        self.state.validate_transition(new_state)?;
        self.state = new_state;
        Ok(())
    }

    fn fail(&mut self) {
        self.state = ExchangeState::Failed;
    }

    /// Write `payload`, wait `settle`, then read until a read times out
    async fn exchange(
        &mut self,
        payload: &[u8],
        settle: Duration,
        drain: Duration,
        cancellable: bool,
    ) -> SmsResult<Vec<u8>> {
        if self.closed {
            return Err(SmsError::Transport(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Dialogue session is closed",
            )));
        }
        if !self.state.is_ready() {
            // The future of the previous exchange was dropped mid-flight
            log::warn!("Discarding abandoned exchange in state {}", self.state.as_str());
            self.fail();
        }
        if self.state != ExchangeState::Idle {
            self.transition(ExchangeState::Idle)?;
        }
        self.buffer.clear();
        self.transport.set_timeout(Some(drain)).await?;

        self.transition(ExchangeState::Sent)?;
        let written = match self.transport.write_all(payload).await {
            Ok(()) => self.transport.flush().await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            self.fail();
            return Err(err);
        }
        self.statistics.record_sent(payload.len());
        self.transition(ExchangeState::Draining)?;

        let token = self.cancel.clone();
        if !settle.is_zero() {
            if cancellable {
                tokio::select! {
                    _ = tokio::time::sleep(settle) => {}
                    _ = token.cancelled() => {
                        self.fail();
                        return Err(SmsError::Cancelled);
                    }
                }
            } else {
                tokio::time::sleep(settle).await;
            }
        }

        let mut chunk = vec![0u8; self.config.read_chunk_size.max(1)];
        loop {
            let read = if cancellable {
                tokio::select! {
                    read = self.transport.read(&mut chunk) => read,
                    _ = token.cancelled() => Err(SmsError::Cancelled),
                }
            } else {
                self.transport.read(&mut chunk).await
            };
            match read {
                Ok(0) => {
                    self.fail();
                    return Err(SmsError::Transport(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "Connection closed by the device",
                    )));
                }
                Ok(n) => {
                    log::trace!("<- chunk {:?}", String::from_utf8_lossy(&chunk[..n]));
                    self.buffer.extend_from_slice(&chunk[..n]);
                    self.statistics.record_received(n);
                    if self.buffer.len() > self.config.max_response_size {
                        self.fail();
                        self.statistics.increment_protocol_errors();
                        return Err(SmsError::protocol(
                            format!(
                                "response exceeds {} bytes",
                                self.config.max_response_size
                            ),
                            &self.buffer,
                        ));
                    }
                }
                Err(SmsError::Timeout) => break,
                Err(err) => {
                    self.fail();
                    return Err(err);
                }
            }
        }

        self.transition(ExchangeState::Complete)?;
        self.statistics.increment_drains();
        let raw = self.buffer.split().to_vec();
        log::debug!("<- {} bytes", raw.len());
        Ok(raw)
    }
}

/// The first error wins; a successful `result` gives way to a failed
/// restoration
fn keep_first_error<R>(result: SmsResult<R>, restored: SmsResult<()>) -> SmsResult<R> {
    match (result, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), _) => Err(err),
    }
}

impl<T: TransportLayer> Drop for AtSession<T> {
    fn drop(&mut self) {
        if !self.closed && self.is_dirty() {
            log::warn!(
                "Dialogue on {} dropped without close(); device left in mode {:?}, storage {:?}",
                self.transport.endpoint(),
                self.mode,
                self.storage
            );
        }
    }
}
