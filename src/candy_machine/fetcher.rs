use borsh::BorshDeserialize;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::state::{account_discriminator, CandyMachineAccount, SaleState};
use crate::chain::{ChainClient, ChainError, RetryPolicy};
use crate::wallet::Wallet;

/// Failure to read the candy machine; logged, never alerted
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Candy machine account not found: {0}")]
    AccountNotFound(Pubkey),

    #[error("Failed to decode candy machine account: {0}")]
    Decode(String),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Decode raw account data (Anchor discriminator + Borsh body)
pub fn decode_candy_machine(data: &[u8]) -> Result<CandyMachineAccount, FetchError> {
    if data.len() < 8 {
        return Err(FetchError::Decode(format!(
            "account too small: {} bytes",
            data.len()
        )));
    }
    let (discriminator, mut body) = data.split_at(8);
    if discriminator != account_discriminator() {
        return Err(FetchError::Decode(
            "account discriminator does not match CandyMachine".to_string(),
        ));
    }
    CandyMachineAccount::deserialize(&mut body).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Loads the on-chain sale configuration into a [`SaleState`]
pub struct SaleStateFetcher {
    chain: Arc<dyn ChainClient>,
    candy_machine: Pubkey,
    start_date_seed: Option<i64>,
    retry: RetryPolicy,
}

impl SaleStateFetcher {
    pub fn new(chain: Arc<dyn ChainClient>, candy_machine: Pubkey) -> Self {
        Self {
            chain,
            candy_machine,
            start_date_seed: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_start_date_seed(mut self, start_date_seed: Option<i64>) -> Self {
        self.start_date_seed = start_date_seed;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn candy_machine(&self) -> Pubkey {
        self.candy_machine
    }

    /// Fetch the sale as of now. `Ok(None)` when the wallet cannot sign.
    pub async fn fetch(&self, wallet: &dyn Wallet) -> Result<Option<SaleState>, FetchError> {
        self.fetch_at(wallet, chrono::Utc::now().timestamp()).await
    }

    pub async fn fetch_at(
        &self,
        wallet: &dyn Wallet,
        now: i64,
    ) -> Result<Option<SaleState>, FetchError> {
        if wallet.public_key().is_none() || !wallet.can_sign() {
            debug!("Wallet has no signing capability, skipping sale state fetch");
            return Ok(None);
        }

        let data = self
            .read_account()
            .await?
            .ok_or(FetchError::AccountNotFound(self.candy_machine))?;
        let account = decode_candy_machine(&data)?;
        let state = SaleState::from_account(self.candy_machine, &account, now, self.start_date_seed);

        debug!(
            candy_machine = %self.candy_machine,
            items_remaining = state.items_remaining,
            is_active = state.is_active,
            "Sale state fetched"
        );
        Ok(Some(state))
    }

    async fn read_account(&self) -> Result<Option<Vec<u8>>, ChainError> {
        let mut attempt = 0;
        loop {
            match self.chain.get_account_data(&self.candy_machine).await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_retryable() => match self.retry.calculate_delay(attempt) {
                    Some(delay) => {
                        warn!(
                            candy_machine = %self.candy_machine,
                            attempt = attempt,
                            error = %e,
                            "Retrying candy machine fetch"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{candy_machine_account, encode_candy_machine, MockChainClient, MockWallet};

    const NOW: i64 = 1_700_000_000;

    #[tokio::test]
    async fn test_fetch_decodes_account() {
        let address = Pubkey::new_unique();
        let chain = MockChainClient::new();
        chain.set_account(address, encode_candy_machine(&candy_machine_account(50, 49, Some(NOW - 1))));

        let fetcher = SaleStateFetcher::new(Arc::new(chain), address);
        let state = fetcher
            .fetch_at(&MockWallet::connected(), NOW)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.items_remaining, 1);
        assert!(state.is_active);
        assert_eq!(state.address, address);
    }

    #[tokio::test]
    async fn test_fetch_skipped_without_public_key() {
        let chain = Arc::new(MockChainClient::new());
        let fetcher = SaleStateFetcher::new(chain.clone(), Pubkey::new_unique());
        let result = fetcher.fetch_at(&MockWallet::disconnected(), NOW).await.unwrap();
        assert!(result.is_none());
        assert_eq!(chain.account_queries(), 0);
    }

    #[tokio::test]
    async fn test_missing_account() {
        let address = Pubkey::new_unique();
        let fetcher = SaleStateFetcher::new(Arc::new(MockChainClient::new()), address);
        let err = fetcher.fetch_at(&MockWallet::connected(), NOW).await.unwrap_err();
        assert!(matches!(err, FetchError::AccountNotFound(a) if a == address));
    }

    #[test]
    fn test_decode_rejects_wrong_discriminator() {
        let mut data = encode_candy_machine(&candy_machine_account(1, 0, None));
        data[0] ^= 0xff;
        assert!(matches!(decode_candy_machine(&data), Err(FetchError::Decode(_))));
        assert!(matches!(decode_candy_machine(&[1, 2, 3]), Err(FetchError::Decode(_))));
    }

    #[test]
    fn test_decode_ignores_trailing_config_lines() {
        let mut data = encode_candy_machine(&candy_machine_account(3, 1, None));
        data.extend_from_slice(&[0xAB; 256]);
        let account = decode_candy_machine(&data).unwrap();
        assert_eq!(account.items_redeemed, 1);
        assert_eq!(account.data.items_available, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let address = Pubkey::new_unique();
        let chain = MockChainClient::new();
        chain.set_account(address, encode_candy_machine(&candy_machine_account(5, 0, Some(NOW - 1))));
        chain.fail_account_reads(2);
        let chain = Arc::new(chain);

        let fetcher = SaleStateFetcher::new(chain.clone(), address);
        let state = fetcher.fetch_at(&MockWallet::connected(), NOW).await.unwrap();
        assert!(state.is_some());
        assert_eq!(chain.account_queries(), 3);
    }
}
