use candy_mint::config::Config;
use candy_mint::wallet::{KeypairWallet, Wallet};
use solana_sdk::signature::{Keypair, Signer};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
[candy_machine]
id = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
start_date = 1640995200

[rpc]
endpoint = "http://127.0.0.1:8899"
network = "localnet"
max_retries = 1

[wallet]
keypair_path = "/tmp/buyer.json"

[confirmation]
tx_timeout_ms = 45000
poll_interval_ms = 1000

[outcomes]
timeout_message = "Still waiting on the network."

[[outcomes.rules]]
program_code = 6010
message = "SOLD OUT!"
reload = true

[monitoring]
enable_metrics = true
"#;

#[test]
fn test_load_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();

    let mut config = Config::from_file(file.path()).unwrap();
    config.apply_env(|_| None).unwrap();
    config.validate().unwrap();

    assert_eq!(
        config.candy_machine_id().unwrap().to_string(),
        "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
    );
    assert_eq!(config.candy_machine.start_date, Some(1_640_995_200));
    assert_eq!(config.ws_endpoint(), "ws://127.0.0.1:8899");
    assert_eq!(config.tx_timeout(), Duration::from_secs(45));
    assert_eq!(config.poll_interval(), Duration::from_secs(1));
    assert_eq!(config.gatekeeper_slack(), Duration::from_secs(10));
    assert_eq!(config.retry_policy().max_attempts, 1);
    assert_eq!(config.keypair_path(), "/tmp/buyer.json");
    assert_eq!(config.outcomes.rules.len(), 1);
    assert_eq!(config.outcomes.timeout_message, "Still waiting on the network.");
    assert!(config.monitoring.enable_metrics);
}

#[test]
fn test_env_overrides_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();

    let mut config = Config::from_file(file.path()).unwrap();
    config
        .apply_env(|key| match key {
            "SOLANA_WS_HOST" => Some("ws://127.0.0.1:8900".to_string()),
            "CANDY_TX_TIMEOUT_MS" => Some("500".to_string()),
            _ => None,
        })
        .unwrap();

    assert_eq!(config.ws_endpoint(), "ws://127.0.0.1:8900");
    // 500ms timeout with a 1s poll interval is rejected
    assert!(config.validate().is_err());
}

#[test]
fn test_malformed_config_is_an_error() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"[confirmation]\ntx_timeout_ms = \"soon\"\n").unwrap();
    assert!(Config::from_file(file.path()).is_err());
}

#[tokio::test]
async fn test_keypair_wallet_from_json_file() {
    let keypair = Keypair::new();
    let mut file = NamedTempFile::new().unwrap();
    let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let wallet = KeypairWallet::from_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(wallet.pubkey(), keypair.pubkey());
    assert!(wallet.connected());
    assert_eq!(wallet.public_key(), Some(keypair.pubkey()));

    wallet.disconnect();
    assert!(wallet.public_key().is_none());
}

#[test]
fn test_all_zero_keypair_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&[0u8; 64]).unwrap();
    assert!(KeypairWallet::from_file(file.path().to_str().unwrap()).is_err());
}
