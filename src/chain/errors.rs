use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_rpc_client_api::request::{RpcError, RpcResponseErrorData};
use solana_sdk::instruction::InstructionError;
use solana_sdk::transaction::TransactionError;
use thiserror::Error;

/// Raw failure reported by the chain for a transaction, either during
/// preflight (broadcast rejected) or after execution (status carries `err`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    /// Custom program error code, when the failing instruction returned one
    pub code: Option<u32>,
    /// Chain-side rendering of the error (e.g. "custom program error: 0x137")
    pub message: String,
    /// Program logs captured by preflight simulation, if any
    pub logs: Vec<String>,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            logs: Vec::new(),
        }
    }

    pub fn from_transaction_error(err: &TransactionError) -> Self {
        let code = match err {
            TransactionError::InstructionError(_, InstructionError::Custom(code)) => Some(*code),
            _ => None,
        };
        Self {
            code,
            message: err.to_string(),
            logs: Vec::new(),
        }
    }

    pub fn with_logs(mut self, logs: Vec<String>) -> Self {
        self.logs = logs;
        self
    }
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Errors produced by the chain client collaborator
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// Transport-level errors (network, connection)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// Timeout errors
    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// RPC response errors (from the RPC server)
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    /// Node refused the transaction (preflight simulation failed)
    #[error("Transaction rejected: {0}")]
    TransactionRejected(ExecutionError),

    #[error("Rate limit exceeded (endpoint: {endpoint})")]
    RateLimitExceeded { endpoint: String },

    #[error("Blockhash not found (endpoint: {endpoint})")]
    BlockhashNotFound { endpoint: String },

    #[error("Insufficient funds (endpoint: {endpoint})")]
    InsufficientFunds { endpoint: String },

    /// Websocket subscription could not be established
    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChainError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ChainError::Transport { .. } => true,
            ChainError::Timeout { .. } => true,
            ChainError::RateLimitExceeded { .. } => true,
            ChainError::BlockhashNotFound { .. } => true,
            ChainError::Subscription(_) => true,

            ChainError::TransactionRejected(_) => false,
            ChainError::InsufficientFunds { .. } => false,
            ChainError::Internal(_) => false,

            // Retry on server errors (5xx)
            ChainError::RpcResponse { code, .. } => {
                matches!(code, Some(c) if (500..600).contains(c))
            }
        }
    }

    /// Program execution error carried by this failure, if the node reported one
    pub fn execution_error(&self) -> Option<&ExecutionError> {
        match self {
            ChainError::TransactionRejected(exec) => Some(exec),
            _ => None,
        }
    }

    /// Create from ClientError with context
    pub fn from_client_error(err: ClientError, endpoint: &str) -> Self {
        if let Some(tx_err) = err.get_transaction_error() {
            let logs = match err.kind() {
                ClientErrorKind::RpcError(RpcError::RpcResponseError {
                    data: RpcResponseErrorData::SendTransactionPreflightFailure(result),
                    ..
                }) => result.logs.clone().unwrap_or_default(),
                _ => Vec::new(),
            };
            return ChainError::TransactionRejected(
                ExecutionError::from_transaction_error(&tx_err).with_logs(logs),
            );
        }

        let err_str = err.to_string().to_lowercase();

        if err_str.contains("blockhash not found") {
            ChainError::BlockhashNotFound {
                endpoint: endpoint.to_string(),
            }
        } else if err_str.contains("insufficient funds") || err_str.contains("insufficient lamports")
        {
            ChainError::InsufficientFunds {
                endpoint: endpoint.to_string(),
            }
        } else if err_str.contains("rate limit")
            || err_str.contains("too many requests")
            || err_str.contains("429")
        {
            ChainError::RateLimitExceeded {
                endpoint: endpoint.to_string(),
            }
        } else if err_str.contains("timeout") || err_str.contains("timed out") {
            ChainError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms: 0,
            }
        } else if let ClientErrorKind::Io(io) = err.kind() {
            ChainError::Transport {
                endpoint: endpoint.to_string(),
                message: io.to_string(),
            }
        } else {
            let code = match err.kind() {
                ClientErrorKind::RpcError(RpcError::RpcResponseError { code, .. }) => Some(*code),
                _ => None,
            };
            ChainError::RpcResponse {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
                code,
            }
        }
    }
}

/// Retry policy for read-only chain queries
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_attempts: u32,

    /// Base delay in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,

    /// Jitter factor (0.0 - 1.0)
    pub jitter_factor: f64,

    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter_factor: 0.1,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// No retries at all; the first error is final
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Calculate delay for a given attempt number
    pub fn calculate_delay(&self, attempt: u32) -> Option<std::time::Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        let delay_ms = self.base_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let delay_ms = delay_ms.min(self.max_delay_ms as f64);

        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * self.jitter_factor;
        let jittered_delay = (delay_ms * (1.0 + jitter)).max(0.0) as u64;

        Some(std::time::Duration::from_millis(jittered_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(ChainError::Transport {
            endpoint: "test".to_string(),
            message: "connection failed".to_string(),
        }
        .is_retryable());

        assert!(ChainError::RpcResponse {
            endpoint: "test".to_string(),
            message: "bad gateway".to_string(),
            code: Some(502),
        }
        .is_retryable());

        assert!(!ChainError::RpcResponse {
            endpoint: "test".to_string(),
            message: "invalid params".to_string(),
            code: Some(-32602),
        }
        .is_retryable());

        assert!(!ChainError::TransactionRejected(ExecutionError::new("x")).is_retryable());
    }

    #[test]
    fn test_custom_code_extracted_from_instruction_error() {
        let err = TransactionError::InstructionError(4, InstructionError::Custom(0x137));
        let exec = ExecutionError::from_transaction_error(&err);
        assert_eq!(exec.code, Some(311));
        assert!(exec.message.contains("0x137"));
    }

    #[test]
    fn test_non_custom_error_has_no_code() {
        let exec = ExecutionError::from_transaction_error(&TransactionError::AccountNotFound);
        assert_eq!(exec.code, None);
        assert!(!exec.message.is_empty());
    }

    #[test]
    fn test_retry_policy_delay() {
        let policy = RetryPolicy::default();

        let delay1 = policy.calculate_delay(0);
        assert!(delay1.is_some());

        let delay_none = policy.calculate_delay(10);
        assert!(delay_none.is_none());

        assert!(RetryPolicy::none().calculate_delay(0).is_none());
    }
}
