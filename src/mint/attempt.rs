use solana_sdk::signature::Signature;
use std::time::Instant;

use super::errors::InvalidTransition;
use crate::observability::CorrelationId;
use crate::outcome::UserMessage;
use crate::types::MintStatus;

/// One user-initiated mint, from build to its terminal status
#[derive(Debug, Clone)]
pub struct MintAttempt {
    /// Set once the broadcast succeeds
    pub transaction_id: Option<Signature>,
    pub status: MintStatus,
    /// Classified outcome, filled in after a terminal failure
    pub error: Option<UserMessage>,
    pub correlation_id: CorrelationId,
    started_at: Instant,
}

impl MintAttempt {
    pub fn new() -> Self {
        Self {
            transaction_id: None,
            status: MintStatus::Building,
            error: None,
            correlation_id: CorrelationId::new(),
            started_at: Instant::now(),
        }
    }

    pub fn advance(&mut self, next: MintStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn submitted(&mut self, signature: Signature) -> Result<(), InvalidTransition> {
        self.advance(MintStatus::Submitted)?;
        self.transaction_id = Some(signature);
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

impl Default for MintAttempt {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut attempt = MintAttempt::new();
        assert!(attempt.transaction_id.is_none());

        let sig = Signature::new_unique();
        attempt.submitted(sig).unwrap();
        attempt.advance(MintStatus::Confirming).unwrap();
        attempt.advance(MintStatus::Succeeded).unwrap();

        assert_eq!(attempt.transaction_id, Some(sig));
        assert!(attempt.is_terminal());
    }

    #[test]
    fn test_terminal_status_is_final() {
        let mut attempt = MintAttempt::new();
        attempt.advance(MintStatus::Failed).unwrap();
        let err = attempt.advance(MintStatus::Submitted).unwrap_err();
        assert_eq!(err.from, MintStatus::Failed);
        assert_eq!(attempt.status, MintStatus::Failed);
        assert!(attempt.transaction_id.is_none());
    }

    #[test]
    fn test_cannot_skip_submission() {
        let mut attempt = MintAttempt::new();
        assert!(attempt.advance(MintStatus::Confirming).is_err());
    }
}
