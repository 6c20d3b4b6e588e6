use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};
use solana_sdk::transaction::TransactionError;
use solana_transaction_status::TransactionConfirmationStatus;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::pubsub::SignatureStream;
use super::{ChainClient, ChainError, ExecutionError, SignatureStatus, SignatureSubscription};
use crate::metrics::Timer;

/// Production chain client over JSON-RPC (queries, broadcast) and
/// websocket pubsub (signature notifications)
pub struct RpcChainClient {
    endpoint: String,
    rpc: Arc<RpcClient>,
    signatures: SignatureStream,
}

impl RpcChainClient {
    pub fn new(endpoint: String, ws_endpoint: String, request_timeout: Duration) -> Self {
        let rpc = RpcClient::new_with_timeout_and_commitment(
            endpoint.clone(),
            request_timeout,
            CommitmentConfig::confirmed(),
        );
        // Push notifications fire at processed ("recent") commitment
        let signatures = SignatureStream::new(ws_endpoint, CommitmentConfig::processed());
        Self {
            endpoint,
            rpc: Arc::new(rpc),
            signatures,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_err(&self, err: solana_client::client_error::ClientError) -> ChainError {
        ChainError::from_client_error(err, &self.endpoint)
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ChainError> {
        let timer = Timer::with_name("rpc_latency_seconds");
        let response = self
            .rpc
            .get_account_with_commitment(address, self.rpc.commitment())
            .await
            .map_err(|e| self.map_err(e))?;
        timer.finish();
        Ok(response.value.map(|account| account.data))
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, ChainError> {
        self.rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, ChainError> {
        self.rpc
            .get_minimum_balance_for_rent_exemption(data_len)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, ChainError> {
        let timer = Timer::with_name("rpc_latency_seconds");
        let signature = self
            .rpc
            .send_transaction_with_config(
                tx,
                RpcSendTransactionConfig {
                    skip_preflight: false,
                    preflight_commitment: Some(CommitmentLevel::Processed),
                    ..RpcSendTransactionConfig::default()
                },
            )
            .await
            .map_err(|e| self.map_err(e))?;
        timer.finish();
        debug!(signature = %signature, endpoint = %self.endpoint, "Transaction broadcast");
        Ok(signature)
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, ChainError> {
        let response = self
            .rpc
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| self.map_err(e))?;

        let status = response.value.into_iter().next().flatten();
        Ok(status.map(|status| SignatureStatus {
            slot: status.slot,
            confirmations: status.confirmations,
            finalized: matches!(
                status.confirmation_status,
                Some(TransactionConfirmationStatus::Finalized)
            ),
            err: status
                .err
                .map(TransactionError::from)
                .map(|e| ExecutionError::from_transaction_error(&e)),
        }))
    }

    async fn subscribe_signature(
        &self,
        signature: &Signature,
    ) -> Result<SignatureSubscription, ChainError> {
        self.signatures.subscribe(signature).await
    }
}
