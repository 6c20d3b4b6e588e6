//! Configuration module for the candy machine mint client
//!
//! Settings come from a TOML file, with environment variables (and a `.env`
//! file) overriding the deployment-specific values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::candy_machine::CANDY_MACHINE_PROGRAM_ID;
use crate::chain::RetryPolicy;
use crate::outcome::OutcomeTable;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub candy_machine: CandyMachineConfig,

    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    /// Program error code / log marker table
    #[serde(default)]
    pub outcomes: OutcomeTable,

    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandyMachineConfig {
    /// Candy machine account address
    pub id: Option<String>,

    #[serde(default = "default_program_id")]
    pub program_id: String,

    /// Fallback go-live date (unix seconds) when the account has none
    pub start_date: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,

    /// Websocket endpoint; derived from `endpoint` when unset
    pub ws_endpoint: Option<String>,

    /// Cluster name (devnet, mainnet-beta, ...)
    #[serde(default = "default_network")]
    pub network: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,

    /// Max retries for transient read failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to keypair file
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    #[serde(default = "default_tx_timeout_ms")]
    pub tx_timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Added to the timeout for gated sales
    #[serde(default = "default_gatekeeper_slack_ms")]
    pub gatekeeper_slack_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Print Prometheus metrics after each command
    #[serde(default)]
    pub enable_metrics: bool,
}

// Default value functions
fn default_program_id() -> String { CANDY_MACHINE_PROGRAM_ID.to_string() }
fn default_rpc_endpoint() -> String { "https://api.devnet.solana.com".to_string() }
fn default_network() -> String { "devnet".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_max_retries() -> u32 { 3 }
fn default_keypair_path() -> String { "~/.config/solana/id.json".to_string() }
fn default_tx_timeout_ms() -> u64 { 30_000 }
fn default_poll_interval_ms() -> u64 { 2_000 }
fn default_gatekeeper_slack_ms() -> u64 { 10_000 }

impl Default for CandyMachineConfig {
    fn default() -> Self {
        Self {
            id: None,
            program_id: default_program_id(),
            start_date: None,
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            ws_endpoint: None,
            network: default_network(),
            timeout_secs: default_rpc_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
        }
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            tx_timeout_ms: default_tx_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            gatekeeper_slack_ms: default_gatekeeper_slack_ms(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load the file (defaults if it does not exist), apply `.env` and
    /// environment overrides, then validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override deployment values from `lookup` (normally the process env)
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(id) = lookup("CANDY_MACHINE_ID") {
            self.candy_machine.id = Some(id);
        }
        if let Some(network) = lookup("SOLANA_NETWORK") {
            self.rpc.network = network;
        }
        if let Some(host) = lookup("SOLANA_RPC_HOST") {
            self.rpc.endpoint = host;
        }
        if let Some(host) = lookup("SOLANA_WS_HOST") {
            self.rpc.ws_endpoint = Some(host);
        }
        if let Some(start) = lookup("CANDY_START_DATE") {
            let start = start
                .trim()
                .parse::<i64>()
                .with_context(|| format!("Invalid CANDY_START_DATE: {}", start))?;
            self.candy_machine.start_date = Some(start);
        }
        if let Some(timeout) = lookup("CANDY_TX_TIMEOUT_MS") {
            self.confirmation.tx_timeout_ms = timeout
                .trim()
                .parse()
                .with_context(|| format!("Invalid CANDY_TX_TIMEOUT_MS: {}", timeout))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.candy_machine.id.as_deref().map_or(true, |id| id.trim().is_empty()) {
            anyhow::bail!("candy_machine.id is required (or set CANDY_MACHINE_ID)");
        }
        self.candy_machine_id()?;
        self.program_id()?;

        let c = &self.confirmation;
        if c.tx_timeout_ms == 0 {
            anyhow::bail!("confirmation.tx_timeout_ms must be greater than zero");
        }
        if c.poll_interval_ms == 0 {
            anyhow::bail!("confirmation.poll_interval_ms must be greater than zero");
        }
        if c.poll_interval_ms > c.tx_timeout_ms {
            anyhow::bail!(
                "confirmation.poll_interval_ms ({}) exceeds tx_timeout_ms ({})",
                c.poll_interval_ms,
                c.tx_timeout_ms
            );
        }
        if self.rpc.timeout_secs == 0 {
            anyhow::bail!("rpc.timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn candy_machine_id(&self) -> Result<Pubkey> {
        let id = self
            .candy_machine
            .id
            .as_deref()
            .context("candy_machine.id is not set")?;
        Pubkey::from_str(id.trim()).with_context(|| format!("Invalid candy machine id: {}", id))
    }

    pub fn program_id(&self) -> Result<Pubkey> {
        Pubkey::from_str(&self.candy_machine.program_id)
            .with_context(|| format!("Invalid program id: {}", self.candy_machine.program_id))
    }

    /// Websocket endpoint, derived from the RPC endpoint when not configured
    pub fn ws_endpoint(&self) -> String {
        match &self.rpc.ws_endpoint {
            Some(ws) => ws.clone(),
            None => {
                let endpoint = &self.rpc.endpoint;
                if let Some(rest) = endpoint.strip_prefix("https://") {
                    format!("wss://{}", rest)
                } else if let Some(rest) = endpoint.strip_prefix("http://") {
                    format!("ws://{}", rest)
                } else {
                    endpoint.clone()
                }
            }
        }
    }

    pub fn keypair_path(&self) -> String {
        match self.wallet.keypair_path.strip_prefix("~/") {
            Some(rest) => match std::env::var("HOME") {
                Ok(home) => format!("{}/{}", home.trim_end_matches('/'), rest),
                Err(_) => self.wallet.keypair_path.clone(),
            },
            None => self.wallet.keypair_path.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.rpc.max_retries,
            ..RetryPolicy::default()
        }
    }

    pub fn tx_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation.tx_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation.poll_interval_ms)
    }

    pub fn gatekeeper_slack(&self) -> Duration {
        Duration::from_millis(self.confirmation.gatekeeper_slack_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn with_id() -> Config {
        let mut config = Config::default();
        config.candy_machine.id = Some(Pubkey::new_unique().to_string());
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.confirmation.tx_timeout_ms, 30_000);
        assert_eq!(config.confirmation.poll_interval_ms, 2_000);
        assert_eq!(config.confirmation.gatekeeper_slack_ms, 10_000);
        assert_eq!(config.program_id().unwrap(), CANDY_MACHINE_PROGRAM_ID);
        assert_eq!(config.outcomes, OutcomeTable::default());
    }

    #[test]
    fn test_missing_candy_machine_id_is_rejected() {
        assert!(Config::default().validate().is_err());
        assert!(with_id().validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut config = with_id();
        config.confirmation.tx_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_longer_than_timeout_is_rejected() {
        let mut config = with_id();
        config.confirmation.tx_timeout_ms = 1_000;
        config.confirmation.poll_interval_ms = 2_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let id = Pubkey::new_unique().to_string();
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("CANDY_MACHINE_ID", &id),
                ("SOLANA_NETWORK", "mainnet-beta"),
                ("SOLANA_RPC_HOST", "https://rpc.example.com"),
                ("CANDY_START_DATE", "1640995200"),
                ("CANDY_TX_TIMEOUT_MS", "45000"),
            ]))
            .unwrap();

        assert_eq!(config.candy_machine.id.as_deref(), Some(id.as_str()));
        assert_eq!(config.rpc.network, "mainnet-beta");
        assert_eq!(config.candy_machine.start_date, Some(1_640_995_200));
        assert_eq!(config.tx_timeout(), Duration::from_millis(45_000));
        assert_eq!(config.ws_endpoint(), "wss://rpc.example.com");
        config.validate().unwrap();
    }

    #[test]
    fn test_bad_env_number() {
        let mut config = Config::default();
        assert!(config
            .apply_env(env(&[("CANDY_TX_TIMEOUT_MS", "soon")]))
            .is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [candy_machine]
            id = "11111111111111111111111111111111"

            [confirmation]
            tx_timeout_ms = 60000
            "#,
        )
        .unwrap();
        assert_eq!(config.confirmation.tx_timeout_ms, 60_000);
        assert_eq!(config.confirmation.poll_interval_ms, 2_000);
        assert_eq!(config.rpc.network, "devnet");
        config.validate().unwrap();
    }
}
