//! Candy machine mint client
//!
//! Fetches the sale state of a candy machine v2, mints one NFT per user
//! action, waits for confirmation and turns every outcome into a single
//! user-facing alert.
//!
//! ## Modules
//!
//! - **chain**: ledger collaborator (`ChainClient`) and its RPC implementation
//! - **wallet**: signing capability
//! - **gateway**: capability-gate tokens for gated sales
//! - **candy_machine**: account decoding, sale state, mint instructions
//! - **mint**: the mint orchestrator and attempt lifecycle
//! - **confirmation**: push/poll confirmation race under a deadline
//! - **outcome**: failure classification into user messages
//! - **session**: headless storefront (minting flag, alerts, reloads)

pub mod candy_machine;
pub mod chain;
pub mod config;
pub mod confirmation;
pub mod gateway;
pub mod metrics;
pub mod mint;
pub mod observability;
pub mod outcome;
pub mod session;
pub mod structured_logging;
pub mod types;
pub mod wallet;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use candy_machine::{SaleState, SaleStateFetcher};
pub use config::Config;
pub use confirmation::{ConfirmationOutcome, ConfirmationPoller};
pub use mint::{MintAttempt, MintError, MintOrchestrator};
pub use outcome::{OutcomeClassifier, OutcomeTable, UserMessage};
pub use session::MintSession;
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
pub use types::{AlertState, MintStatus, SessionEvent, Severity};
