//! Storefront session
//!
//! Headless counterpart of the mint page: caches the sale state, runs one
//! mint at a time, turns every outcome into a single alert and asks for a
//! fresh sale state after a sold-out rejection.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::candy_machine::{SaleState, SaleStateFetcher};
use crate::metrics::metrics;
use crate::mint::{MintAttempt, MintOrchestrator};
use crate::outcome::{OutcomeClassifier, UserMessage};
use crate::structured_logging::MintLogger;
use crate::types::{AlertState, SessionEvent};
use crate::wallet::Wallet;

/// Holds the minting flag for as long as it lives
pub struct MintingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> MintingGuard<'a> {
    /// `None` when a mint is already in flight
    pub fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for MintingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct MintSession {
    fetcher: SaleStateFetcher,
    orchestrator: MintOrchestrator,
    classifier: OutcomeClassifier,
    wallet: RwLock<Arc<dyn Wallet>>,
    sale_state: RwLock<Option<SaleState>>,
    /// Set by a sold-out reload until a fetch succeeds
    stale: AtomicBool,
    alert: RwLock<AlertState>,
    minting: AtomicBool,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl MintSession {
    pub fn new(
        fetcher: SaleStateFetcher,
        orchestrator: MintOrchestrator,
        classifier: OutcomeClassifier,
        wallet: Arc<dyn Wallet>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let session = Self {
            fetcher,
            orchestrator,
            classifier,
            wallet: RwLock::new(wallet),
            sale_state: RwLock::new(None),
            stale: AtomicBool::new(false),
            alert: RwLock::new(AlertState::default()),
            minting: AtomicBool::new(false),
            events,
        };
        (session, rx)
    }

    pub fn sale_state(&self) -> Option<SaleState> {
        self.sale_state.read().clone()
    }

    pub fn alert(&self) -> AlertState {
        self.alert.read().clone()
    }

    /// True while the cached state is known to be outdated by a sold-out
    /// rejection; minting is refused until the next successful fetch.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    pub fn is_user_minting(&self) -> bool {
        self.minting.load(Ordering::Acquire)
    }

    pub fn close_alert(&self) {
        let closed = self.alert.read().closed();
        self.set_alert(closed);
    }

    fn wallet(&self) -> Arc<dyn Wallet> {
        self.wallet.read().clone()
    }

    /// Swap the connected wallet and reload the sale state for it.
    pub async fn set_wallet(&self, wallet: Arc<dyn Wallet>) -> Option<SaleState> {
        debug!(
            connected = wallet.connected(),
            public_key = ?wallet.public_key(),
            "Wallet changed, reloading sale state"
        );
        *self.wallet.write() = wallet;
        self.refresh_sale_state().await
    }

    /// Reload the sale state. Failures are logged and the previous state kept.
    pub async fn refresh_sale_state(&self) -> Option<SaleState> {
        let wallet = self.wallet();
        match self.fetcher.fetch(wallet.as_ref()).await {
            Ok(Some(state)) => {
                *self.sale_state.write() = Some(state.clone());
                self.stale.store(false, Ordering::Release);
                Some(state)
            }
            Ok(None) => self.sale_state(),
            Err(e) => {
                metrics().fetch_failures.inc();
                warn!(
                    candy_machine = %self.fetcher.candy_machine(),
                    error = %e,
                    "There was a problem fetching candy machine state"
                );
                self.sale_state()
            }
        }
    }

    /// Handle one mint click.
    ///
    /// Returns the resulting alert, or `None` when nothing was attempted
    /// (mint already in flight, wallet not ready, no sale state or a stale
    /// one after a failed sold-out reload).
    pub async fn on_mint(&self) -> Option<AlertState> {
        let Some(_guard) = MintingGuard::acquire(&self.minting) else {
            debug!("Mint already in flight, ignoring");
            return None;
        };

        let wallet = self.wallet();
        if !wallet.connected() || wallet.public_key().is_none() {
            debug!("Wallet not ready, ignoring mint");
            return None;
        }
        let Some(sale) = self.sale_state() else {
            debug!("No sale state loaded, ignoring mint");
            return None;
        };
        if self.is_stale() {
            debug!("Sale state is stale after a sold-out rejection, ignoring mint");
            return None;
        }

        let mut attempt = MintAttempt::new();
        let logger = MintLogger::new(attempt.correlation_id.clone());
        let message = match self
            .orchestrator
            .execute(&sale, wallet.as_ref(), &mut attempt)
            .await
        {
            Ok(_) => self.classifier.success(),
            Err(e) => {
                let message = self.classifier.classify(&e.failure_detail());
                logger.log_failure(&e.to_string(), &message.text);
                attempt.error = Some(message.clone());
                message
            }
        };

        let alert = self.report(&message);
        if message.reload {
            self.request_reload().await;
        }
        Some(alert)
    }

    fn report(&self, message: &UserMessage) -> AlertState {
        let alert = AlertState::new(message.text.clone(), message.severity);
        self.set_alert(alert.clone());
        alert
    }

    async fn request_reload(&self) {
        metrics().sold_out_reloads.inc();
        self.stale.store(true, Ordering::Release);
        if self.events.send(SessionEvent::ReloadRequested).is_err() {
            debug!("No listener for reload events");
        }
        self.refresh_sale_state().await;
    }

    fn set_alert(&self, alert: AlertState) {
        *self.alert.write() = alert.clone();
        if self.events.send(SessionEvent::AlertChanged(alert)).is_err() {
            debug!("No listener for alert events");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_is_exclusive_and_released_on_drop() {
        let flag = AtomicBool::new(false);
        {
            let _guard = MintingGuard::acquire(&flag).unwrap();
            assert!(flag.load(Ordering::Acquire));
            assert!(MintingGuard::acquire(&flag).is_none());
        }
        assert!(!flag.load(Ordering::Acquire));
        assert!(MintingGuard::acquire(&flag).is_some());
    }
}
