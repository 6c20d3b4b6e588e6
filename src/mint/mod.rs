//! Mint orchestration
//!
//! - **attempt**: the per-click [`MintAttempt`] and its status machine
//! - **orchestrator**: build, sign, broadcast, then confirm
//! - **errors**: submission and terminal mint failures

pub mod attempt;
pub mod errors;
pub mod orchestrator;

pub use attempt::MintAttempt;
pub use errors::{InvalidTransition, MintError, SubmissionError};
pub use orchestrator::{MintOrchestrator, DEFAULT_TX_TIMEOUT};
