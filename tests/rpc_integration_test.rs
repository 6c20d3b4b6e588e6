use candy_mint::chain::{ChainClient, RpcChainClient};
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;

const DEVNET_RPC: &str = "https://api.devnet.solana.com";
const DEVNET_WS: &str = "wss://api.devnet.solana.com";

fn client() -> RpcChainClient {
    RpcChainClient::new(
        DEVNET_RPC.to_string(),
        DEVNET_WS.to_string(),
        Duration::from_secs(30),
    )
}

#[tokio::test]
#[ignore] // Ignore by default as it requires network access
async fn test_latest_blockhash() {
    let result = client().get_latest_blockhash().await;
    assert!(result.is_ok(), "Failed to fetch blockhash: {:?}", result);
}

#[tokio::test]
#[ignore] // Ignore by default as it requires network access
async fn test_missing_account_is_none() {
    let data = client()
        .get_account_data(&Pubkey::new_unique())
        .await
        .expect("RPC call failed");
    assert!(data.is_none());
}

#[tokio::test]
#[ignore] // Ignore by default as it requires network access
async fn test_mint_rent_exemption() {
    let lamports = client()
        .get_minimum_balance_for_rent_exemption(82)
        .await
        .expect("RPC call failed");
    assert!(lamports > 0);
}
