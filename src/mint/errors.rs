use thiserror::Error;

use crate::candy_machine::BuildError;
use crate::chain::ChainError;
use crate::confirmation::ConfirmationError;
use crate::gateway::GatewayError;
use crate::outcome::FailureDetail;
use crate::types::MintStatus;
use crate::wallet::WalletError;

/// Failure before the transaction reached the network
#[derive(Debug, Clone, Error)]
pub enum SubmissionError {
    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Wallet has no public key")]
    MissingPublicKey,

    #[error("Gateway token unavailable: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Failed to build mint transaction: {0}")]
    Build(#[from] BuildError),

    /// The ephemeral mint keypair could not co-sign
    #[error("Failed to sign with mint keypair: {0}")]
    MintSigner(String),

    #[error("Signing rejected: {0}")]
    SigningRejected(WalletError),

    #[error("Broadcast rejected: {0}")]
    Broadcast(ChainError),

    /// Ledger read needed to build the transaction failed
    #[error(transparent)]
    Chain(ChainError),
}

impl SubmissionError {
    pub fn failure_detail(&self) -> FailureDetail {
        match self {
            SubmissionError::Broadcast(err) | SubmissionError::Chain(err) => {
                match err.execution_error() {
                    Some(exec) => FailureDetail::from_execution(exec),
                    None => FailureDetail::from_message(err.to_string()),
                }
            }
            other => FailureDetail::from_message(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Invalid mint attempt transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: MintStatus,
    pub to: MintStatus,
}

/// Terminal failure of one mint attempt
#[derive(Debug, Clone, Error)]
pub enum MintError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Confirmation(#[from] ConfirmationError),

    #[error("Transaction confirmation timed out")]
    TimedOut,

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

impl MintError {
    pub fn failure_detail(&self) -> FailureDetail {
        match self {
            MintError::Submission(err) => err.failure_detail(),
            MintError::Confirmation(ConfirmationError::Execution(exec)) => {
                FailureDetail::from_execution(exec)
            }
            MintError::TimedOut => FailureDetail::timeout(),
            MintError::Transition(err) => FailureDetail::from_message(err.to_string()),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, MintError::TimedOut)
    }
}
