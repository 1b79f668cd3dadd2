//! Exchange state machine

use atsms_core::{SmsError, SmsResult};

/// State of a single command/response exchange
///
/// # State Transitions
/// ```text
/// Idle -> Sent        (write started)
/// Sent -> Draining    (command written and flushed)
/// Draining -> Complete (a read timed out)
/// Sent/Draining -> Failed (write or read failed, or the dialogue was cancelled)
/// Complete/Failed -> Idle (next exchange)
/// ```
///
/// Nothing is retried from `Failed`; retrying is the caller's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExchangeState {
    #[default]
    Idle,
    Sent,
    Draining,
    Complete,
    Failed,
}

impl ExchangeState {
    /// Whether a new exchange may start
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            ExchangeState::Idle | ExchangeState::Complete | ExchangeState::Failed
        )
    }

    /// Validate state transition
    ///
    /// # Returns
    /// `Ok(())` if the transition is valid, `Err` otherwise
    pub fn validate_transition(&self, new_state: ExchangeState) -> SmsResult<()> {
        let valid = matches!(
            (*self, new_state),
            (ExchangeState::Idle, ExchangeState::Sent)
                | (ExchangeState::Sent, ExchangeState::Draining)
                | (ExchangeState::Sent, ExchangeState::Failed)
                | (ExchangeState::Draining, ExchangeState::Complete)
                | (ExchangeState::Draining, ExchangeState::Failed)
                | (ExchangeState::Complete, ExchangeState::Idle)
                | (ExchangeState::Failed, ExchangeState::Idle)
                | (ExchangeState::Idle, ExchangeState::Idle)
        );

        if valid {
            Ok(())
        } else {
            Err(SmsError::InvalidData(format!(
                "Invalid exchange transition: {:?} -> {:?}",
                self, new_state
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeState::Idle => "Idle",
            ExchangeState::Sent => "Sent",
            ExchangeState::Draining => "Draining",
            ExchangeState::Complete => "Complete",
            ExchangeState::Failed => "Failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_cycle() {
        let cycle = [
            ExchangeState::Idle,
            ExchangeState::Sent,
            ExchangeState::Draining,
            ExchangeState::Complete,
            ExchangeState::Idle,
        ];
        for pair in cycle.windows(2) {
            assert!(pair[0].validate_transition(pair[1]).is_ok());
        }
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(ExchangeState::Idle
            .validate_transition(ExchangeState::Draining)
            .is_err());
        assert!(ExchangeState::Complete
            .validate_transition(ExchangeState::Failed)
            .is_err());
        assert!(ExchangeState::Failed.is_ready());
        assert!(!ExchangeState::Draining.is_ready());
    }
}
