//! Confirmation protocol
//!
//! Two independent watchers race to resolve a submitted signature: a push
//! subscription and a fixed-interval status poll. Both write into a
//! single-resolution slot; the waiter takes the first write or times out,
//! then tears both watchers down.

pub mod poller;
pub mod slot;

pub use poller::{
    ConfirmationError, ConfirmationOutcome, ConfirmationPoller, DEFAULT_GATEKEEPER_SLACK,
    DEFAULT_POLL_INTERVAL,
};
pub use slot::{resolution_slot, Resolution, Resolved, SlotWriter, Watcher};
