//! Chain client collaborator
//!
//! Read-only ledger queries, raw transaction submission and signature status
//! (one-shot query and push subscription). `RpcChainClient` is the production
//! implementation over Solana JSON-RPC and the websocket pubsub API.

use async_trait::async_trait;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};
use tokio::sync::{mpsc, oneshot};

pub mod errors;
pub mod pubsub;
pub mod rpc;

pub use errors::{ChainError, ExecutionError, RetryPolicy};
pub use rpc::RpcChainClient;

/// Point-in-time status of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub slot: u64,
    /// `None` once the block is rooted
    pub confirmations: Option<usize>,
    pub finalized: bool,
    pub err: Option<ExecutionError>,
}

impl SignatureStatus {
    /// Rooted or explicitly finalized
    pub fn is_final(&self) -> bool {
        self.finalized || self.confirmations.is_none()
    }
}

/// Push notification delivered by a signature subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureNotification {
    /// Transaction reached the leader; no execution result yet
    Received { slot: u64 },
    /// Transaction was processed at the subscription commitment
    Processed {
        slot: u64,
        err: Option<ExecutionError>,
    },
}

/// Live subscription to one signature.
///
/// Dropping or calling [`SignatureSubscription::unsubscribe`] tells the
/// producer to unsubscribe and stop.
#[derive(Debug)]
pub struct SignatureSubscription {
    updates: mpsc::UnboundedReceiver<SignatureNotification>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl SignatureSubscription {
    pub fn new(
        updates: mpsc::UnboundedReceiver<SignatureNotification>,
        shutdown: oneshot::Sender<()>,
    ) -> Self {
        Self {
            updates,
            shutdown: Some(shutdown),
        }
    }

    /// Next notification, or `None` once the producer is gone
    pub async fn next(&mut self) -> Option<SignatureNotification> {
        self.updates.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.signal_shutdown();
    }

    fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for SignatureSubscription {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

/// Contract the mint flow needs from the ledger
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Account data, or `None` when the account does not exist
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ChainError>;

    async fn get_latest_blockhash(&self) -> Result<Hash, ChainError>;

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize)
        -> Result<u64, ChainError>;

    /// Broadcast a fully signed transaction
    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, ChainError>;

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, ChainError>;

    async fn subscribe_signature(
        &self,
        signature: &Signature,
    ) -> Result<SignatureSubscription, ChainError>;
}
