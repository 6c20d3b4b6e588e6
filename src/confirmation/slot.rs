use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::chain::ExecutionError;

/// How a watcher saw the transaction end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Confirmed,
    Failed(ExecutionError),
}

/// Which watcher produced a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watcher {
    Push,
    Poll,
}

impl std::fmt::Display for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Watcher::Push => write!(f, "push"),
            Watcher::Poll => write!(f, "poll"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub resolution: Resolution,
    pub by: Watcher,
}

type Sender = oneshot::Sender<Resolved>;

/// Write side of a single-resolution slot, shared by both watchers.
/// The first successful write consumes the slot; later writes are dropped.
#[derive(Debug, Clone)]
pub struct SlotWriter {
    inner: Arc<Mutex<Option<Sender>>>,
}

impl SlotWriter {
    /// Returns `true` if this write won the slot
    pub fn resolve(&self, resolution: Resolution, by: Watcher) -> bool {
        match self.inner.lock().take() {
            Some(tx) => tx.send(Resolved { resolution, by }).is_ok(),
            None => false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.lock().is_none()
    }

    /// Refuse all further writes (deadline passed)
    pub fn close(&self) {
        self.inner.lock().take();
    }
}

/// Create a slot: the writer for the watchers, the receiver for the waiter
pub fn resolution_slot() -> (SlotWriter, oneshot::Receiver<Resolved>) {
    let (tx, rx) = oneshot::channel();
    (
        SlotWriter {
            inner: Arc::new(Mutex::new(Some(tx))),
        },
        rx,
    )
}
