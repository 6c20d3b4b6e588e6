//! Structured logging for the mint lifecycle

use crate::observability::CorrelationId;

/// Structured logger bound to one mint attempt
#[derive(Debug, Clone)]
pub struct MintLogger {
    correlation_id: CorrelationId,
}

impl MintLogger {
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self { correlation_id }
    }

    pub fn log_mint_start(&self, candy_machine: &str, buyer: &str, gated: bool) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            candy_machine = %candy_machine,
            buyer = %buyer,
            gated = %gated,
            "Starting mint"
        );
    }

    pub fn log_transition(&self, from: &str, to: &str) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            from = %from,
            to = %to,
            "Mint attempt transition"
        );
    }

    pub fn log_submitted(&self, signature: &str) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            signature = %signature,
            "Mint transaction submitted"
        );
    }

    pub fn log_success(&self, signature: &str, latency_ms: u64) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            signature = %signature,
            latency_ms = %latency_ms,
            "Mint confirmed"
        );
    }

    pub fn log_failure(&self, error: &str, message: &str) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            error = %error,
            message = %message,
            "Mint failed"
        );
    }

    pub fn log_timeout(&self, signature: &str, timeout_ms: u64) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            signature = %signature,
            timeout_ms = %timeout_ms,
            "Mint confirmation timed out"
        );
    }
}
