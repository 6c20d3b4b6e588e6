//! Capability-gate collaborator
//!
//! Gated sales require a gateway token proving the buyer passed an
//! off-chain check. The token is an account of the gateway program that
//! must accompany the mint instruction.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::candy_machine::instructions::gateway_token_address;
use crate::chain::{ChainClient, ChainError};

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The buyer has not passed the check on this network
    #[error("No gateway token for {owner} on network {network}")]
    TokenMissing { owner: Pubkey, network: Pubkey },

    #[error("Gateway issuance failed: {0}")]
    Issuance(String),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Token to attach to a gated mint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayToken {
    pub account: Pubkey,
    pub network: Pubkey,
}

#[async_trait]
pub trait GatewayIssuer: Send + Sync {
    async fn issue(&self, network: &Pubkey, owner: &Pubkey) -> Result<GatewayToken, GatewayError>;
}

/// Resolves the owner's existing gateway token from its program address
pub struct DerivedGatewayIssuer {
    chain: Arc<dyn ChainClient>,
}

impl DerivedGatewayIssuer {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl GatewayIssuer for DerivedGatewayIssuer {
    async fn issue(&self, network: &Pubkey, owner: &Pubkey) -> Result<GatewayToken, GatewayError> {
        let account = gateway_token_address(owner, network);
        debug!(owner = %owner, network = %network, token = %account, "Resolving gateway token");
        match self.chain.get_account_data(&account).await? {
            Some(_) => Ok(GatewayToken {
                account,
                network: *network,
            }),
            None => Err(GatewayError::TokenMissing {
                owner: *owner,
                network: *network,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockChainClient;

    #[tokio::test]
    async fn test_existing_token_is_issued() {
        let owner = Pubkey::new_unique();
        let network = Pubkey::new_unique();
        let chain = MockChainClient::new();
        chain.set_account(gateway_token_address(&owner, &network), vec![1, 2, 3]);

        let issuer = DerivedGatewayIssuer::new(Arc::new(chain));
        let token = issuer.issue(&network, &owner).await.unwrap();
        assert_eq!(token.account, gateway_token_address(&owner, &network));
        assert_eq!(token.network, network);
    }

    #[tokio::test]
    async fn test_missing_token() {
        let issuer = DerivedGatewayIssuer::new(Arc::new(MockChainClient::new()));
        let err = issuer
            .issue(&Pubkey::new_unique(), &Pubkey::new_unique())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::TokenMissing { .. }));
    }
}
