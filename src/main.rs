//! candy-mint: command-line storefront for a candy machine v2 sale
//!
//! - `state`: fetch and print the sale state
//! - `mint`: mint one NFT with the configured keypair and print the alert

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use candy_mint::chain::{ChainClient, RpcChainClient};
use candy_mint::gateway::DerivedGatewayIssuer;
use candy_mint::metrics::metrics;
use candy_mint::wallet::{KeypairWallet, Wallet};
use candy_mint::{
    Config, ConfirmationPoller, MintOrchestrator, MintSession, OutcomeClassifier, SaleStateFetcher,
    SessionEvent,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and print the candy machine sale state
    State,
    /// Mint one NFT and print the resulting alert
    Mint,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.json)?;
    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    info!(version = env!("CARGO_PKG_VERSION"), network = %config.rpc.network, "Starting candy-mint");

    let (session, mut events) = build_session(&config)?;

    match args.command {
        Command::State => {
            let state = session
                .refresh_sale_state()
                .await
                .context("Sale state unavailable")?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Command::Mint => {
            if session.refresh_sale_state().await.is_none() {
                anyhow::bail!("Sale state unavailable; refusing to mint");
            }
            match session.on_mint().await {
                Some(alert) => println!("{}", serde_json::to_string_pretty(&alert)?),
                None => warn!("Mint was not attempted"),
            }
            while let Ok(event) = events.try_recv() {
                if event == SessionEvent::ReloadRequested {
                    info!("Sale state reloaded after sold-out rejection");
                }
            }
        }
    }

    if config.monitoring.enable_metrics {
        print!("{}", metrics().render());
    }
    Ok(())
}

fn build_session(
    config: &Config,
) -> Result<(MintSession, tokio::sync::mpsc::UnboundedReceiver<SessionEvent>)> {
    let candy_machine = config.candy_machine_id()?;
    let program_id = config.program_id()?;

    let keypair_path = config.keypair_path();
    info!(path = %keypair_path, "Loading wallet");
    let wallet = KeypairWallet::from_file(&keypair_path).context("Failed to load wallet")?;
    info!(wallet = %wallet.pubkey(), "Wallet loaded");
    let wallet: Arc<dyn Wallet> = Arc::new(wallet);

    let chain: Arc<dyn ChainClient> = Arc::new(RpcChainClient::new(
        config.rpc.endpoint.clone(),
        config.ws_endpoint(),
        config.request_timeout(),
    ));

    let fetcher = SaleStateFetcher::new(chain.clone(), candy_machine)
        .with_start_date_seed(config.candy_machine.start_date)
        .with_retry_policy(config.retry_policy());
    let poller = ConfirmationPoller::new(chain.clone())
        .with_poll_interval(config.poll_interval())
        .with_gatekeeper_slack(config.gatekeeper_slack());
    let gateway = Arc::new(DerivedGatewayIssuer::new(chain.clone()));
    let orchestrator = MintOrchestrator::new(chain, gateway, poller, program_id)
        .with_tx_timeout(config.tx_timeout());
    let classifier = OutcomeClassifier::new(config.outcomes.clone());

    Ok(MintSession::new(fetcher, orchestrator, classifier, wallet))
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "candy_mint=debug,info"
    } else {
        "candy_mint=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }

    Ok(())
}
