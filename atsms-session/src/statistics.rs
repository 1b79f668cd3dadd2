//! Dialogue statistics

/// Counters kept by an [`AtSession`](crate::AtSession)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialogueStatistics {
    /// Command lines and bodies written
    pub commands_sent: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Exchanges that ended with a read timeout
    pub drains_completed: u64,
    /// Listing attempts beyond the first
    pub retries: u64,
    /// Answers rejected by the response parser
    pub protocol_errors: u64,
    /// Mode or storage restorations that failed
    pub restore_failures: u64,
}

impl DialogueStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all statistics counters
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn record_sent(&mut self, bytes: usize) {
        self.commands_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub fn record_received(&mut self, bytes: usize) {
        self.bytes_received += bytes as u64;
    }

    pub fn increment_drains(&mut self) {
        self.drains_completed += 1;
    }

    pub fn increment_retries(&mut self) {
        self.retries += 1;
    }

    pub fn increment_protocol_errors(&mut self) {
        self.protocol_errors += 1;
    }

    pub fn increment_restore_failures(&mut self) {
        self.restore_failures += 1;
    }
}
