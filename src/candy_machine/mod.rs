//! Candy machine v2 client support
//!
//! - **state**: account layout and the derived [`SaleState`]
//! - **fetcher**: reads and decodes the account
//! - **instructions**: PDAs and the mint transaction plan
//! - **errors**: human messages of the program's custom error codes

use solana_sdk::pubkey::Pubkey;

pub mod errors;
pub mod fetcher;
pub mod instructions;
pub mod state;

pub use fetcher::{FetchError, SaleStateFetcher};
pub use instructions::{plan_mint_instructions, BuildError, MintAccounts, MintPlan};
pub use state::{GatekeeperConfig, SaleState};

pub const CANDY_MACHINE_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("cndy3Z4yapfJBmL3ShUp5exZKqR3z33thTzeNMm2gRZ");

pub const TOKEN_METADATA_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

/// Civic gateway program issuing capability-gate tokens
pub const GATEWAY_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("gatem74V238djXdzWnJf94Wo1DcnuGkfijbf3AuBhfs");
