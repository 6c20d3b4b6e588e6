//! Websocket signature subscriptions
//!
//! Uses the native Solana pubsub API. Each subscription owns its websocket
//! client inside a spawned task; the task ends (and unsubscribes) when the
//! shutdown signal fires or the consumer drops the receiver.

use futures_util::StreamExt;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::rpc_config::RpcSignatureSubscribeConfig;
use solana_client::rpc_response::{Response, RpcSignatureResult};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::TransactionError;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::{ChainError, ExecutionError, SignatureNotification, SignatureSubscription};

/// Websocket endpoint used for signature notifications
pub struct SignatureStream {
    ws_url: String,
    commitment: CommitmentConfig,
}

impl SignatureStream {
    pub fn new(ws_url: String, commitment: CommitmentConfig) -> Self {
        Self { ws_url, commitment }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    async fn connect(&self) -> Result<Arc<PubsubClient>, ChainError> {
        debug!(ws_url = %self.ws_url, "Connecting to websocket");
        let client = PubsubClient::new(&self.ws_url)
            .await
            .map_err(|e| ChainError::Subscription(format!("{}: {}", self.ws_url, e)))?;
        Ok(Arc::new(client))
    }

    /// Subscribe to status notifications for one signature
    pub async fn subscribe(&self, signature: &Signature) -> Result<SignatureSubscription, ChainError> {
        let client = self.connect().await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let commitment = self.commitment;
        let signature = *signature;

        info!(signature = %signature, "Subscribing to signature");

        tokio::spawn(async move {
            let (mut notifications, unsubscribe) = match client
                .signature_subscribe(
                    &signature,
                    Some(RpcSignatureSubscribeConfig {
                        commitment: Some(commitment),
                        enable_received_notification: Some(true),
                    }),
                )
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    warn!(signature = %signature, error = %e, "Failed to subscribe to signature");
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    next = notifications.next() => match next {
                        Some(response) => {
                            if tx.send(notification_from_response(response)).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }

            drop(notifications);
            unsubscribe().await;
            debug!(signature = %signature, "Signature subscription closed");
        });

        Ok(SignatureSubscription::new(rx, shutdown_tx))
    }
}

fn notification_from_response(response: Response<RpcSignatureResult>) -> SignatureNotification {
    let slot = response.context.slot;
    match response.value {
        RpcSignatureResult::ReceivedSignature(_) => SignatureNotification::Received { slot },
        RpcSignatureResult::ProcessedSignature(processed) => SignatureNotification::Processed {
            slot,
            err: processed
                .err
                .map(TransactionError::from)
                .map(|e| ExecutionError::from_transaction_error(&e)),
        },
    }
}
