//! Wallet adapter
//!
//! The mint flow only needs the capability surface of a browser wallet:
//! connection state, an optional public key and transaction signing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::Transaction,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("Wallet not connected")]
    NotConnected,

    /// User declined, or the signer could not sign the message
    #[error("Signature rejected: {0}")]
    Rejected(String),
}

/// Signing capability exposed by a connected wallet
#[async_trait]
pub trait Wallet: Send + Sync {
    fn connected(&self) -> bool;

    fn public_key(&self) -> Option<Pubkey>;

    /// Whether the wallet exposes both signing methods
    fn can_sign(&self) -> bool {
        true
    }

    async fn sign_transaction(&self, tx: Transaction) -> Result<Transaction, WalletError>;

    async fn sign_all_transactions(
        &self,
        txs: Vec<Transaction>,
    ) -> Result<Vec<Transaction>, WalletError> {
        let mut signed = Vec::with_capacity(txs.len());
        for tx in txs {
            signed.push(self.sign_transaction(tx).await?);
        }
        Ok(signed)
    }
}

/// Local keypair acting as an always-connected wallet
pub struct KeypairWallet {
    keypair: Arc<Keypair>,
    connected: AtomicBool,
}

impl KeypairWallet {
    /// Load a keypair file (64 raw bytes or the solana-cli JSON array)
    pub fn from_file(path: &str) -> Result<Self> {
        let keypair_bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read keypair file: {}", path))?;

        let keypair = if keypair_bytes.len() == 64 {
            if keypair_bytes.iter().all(|&b| b == 0) {
                anyhow::bail!("Invalid keypair: all-zero key rejected");
            }
            Keypair::try_from(keypair_bytes.as_slice()).context("Invalid keypair bytes")?
        } else {
            let json: Vec<u8> = serde_json::from_slice(&keypair_bytes)
                .context("Failed to parse keypair JSON")?;
            if json.len() != 64 {
                anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", json.len());
            }
            if json.iter().all(|&b| b == 0) {
                anyhow::bail!("Invalid keypair: all-zero key rejected");
            }
            Keypair::try_from(json.as_slice()).context("Invalid keypair from JSON")?
        };

        Ok(Self::from_keypair(keypair))
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
            connected: AtomicBool::new(true),
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Wallet for KeypairWallet {
    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn public_key(&self) -> Option<Pubkey> {
        self.connected().then(|| self.keypair.pubkey())
    }

    async fn sign_transaction(&self, mut tx: Transaction) -> Result<Transaction, WalletError> {
        if !self.connected() {
            return Err(WalletError::NotConnected);
        }
        let blockhash = tx.message.recent_blockhash;
        tx.try_partial_sign(&[self.keypair.as_ref()], blockhash)
            .map_err(|e| WalletError::Rejected(e.to_string()))?;
        Ok(tx)
    }
}
