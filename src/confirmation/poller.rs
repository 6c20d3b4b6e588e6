use solana_sdk::signature::Signature;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::slot::{resolution_slot, Resolution, Resolved, SlotWriter, Watcher};
use crate::chain::{ChainClient, ExecutionError, SignatureNotification};
use crate::metrics::{metrics, Timer};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);
pub const DEFAULT_GATEKEEPER_SLACK: Duration = Duration::from_millis(10_000);

/// Transaction executed but failed on chain
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfirmationError {
    #[error("Transaction failed on chain: {0}")]
    Execution(ExecutionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Confirmed,
    /// Deadline passed with no resolution; an expected outcome, not a fault
    TimedOut,
}

/// Waits for one signature to resolve, racing a push subscription against
/// a status poll under a hard deadline
#[derive(Clone)]
pub struct ConfirmationPoller {
    chain: Arc<dyn ChainClient>,
    poll_interval: Duration,
    gatekeeper_slack: Duration,
}

impl ConfirmationPoller {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self {
            chain,
            poll_interval: DEFAULT_POLL_INTERVAL,
            gatekeeper_slack: DEFAULT_GATEKEEPER_SLACK,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_gatekeeper_slack(mut self, gatekeeper_slack: Duration) -> Self {
        self.gatekeeper_slack = gatekeeper_slack;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn effective_timeout(&self, timeout: Duration, has_gatekeeper: bool) -> Duration {
        if has_gatekeeper {
            timeout + self.gatekeeper_slack
        } else {
            timeout
        }
    }

    /// Resolve `signature` or time out.
    ///
    /// Both watchers are stopped and joined before this returns, whatever
    /// the outcome, so no subscription or poll loop outlives the call.
    pub async fn await_confirmation(
        &self,
        signature: &Signature,
        timeout: Duration,
        has_gatekeeper: bool,
    ) -> Result<ConfirmationOutcome, ConfirmationError> {
        let budget = self.effective_timeout(timeout, has_gatekeeper);
        let deadline = Instant::now() + budget;
        let timer = Timer::with_name("confirmation_latency_seconds");

        let (writer, mut resolved) = resolution_slot();
        let (stop_tx, stop_rx) = watch::channel(false);

        debug!(
            signature = %signature,
            timeout_ms = budget.as_millis() as u64,
            has_gatekeeper,
            "Awaiting confirmation"
        );

        let push = tokio::spawn(push_watcher(
            self.chain.clone(),
            *signature,
            writer.clone(),
            stop_rx.clone(),
        ));
        let poll = tokio::spawn(poll_watcher(
            self.chain.clone(),
            *signature,
            self.poll_interval,
            writer.clone(),
            stop_rx,
        ));

        let mut result = tokio::select! {
            biased;
            r = &mut resolved => r.ok(),
            _ = tokio::time::sleep_until(deadline) => None,
        };

        writer.close();
        let _ = stop_tx.send(true);
        join_watcher("push", push).await;
        join_watcher("poll", poll).await;

        // A write that landed between the deadline firing and the close still won
        if result.is_none() {
            result = resolved.try_recv().ok();
        }

        match result {
            Some(Resolved { resolution, by }) => {
                timer.finish();
                match resolution {
                    Resolution::Confirmed => {
                        info!(signature = %signature, watcher = %by, "Transaction confirmed");
                        Ok(ConfirmationOutcome::Confirmed)
                    }
                    Resolution::Failed(err) => {
                        warn!(signature = %signature, watcher = %by, error = %err, "Transaction failed on chain");
                        Err(ConfirmationError::Execution(err))
                    }
                }
            }
            None => {
                metrics().mints_timed_out.inc();
                warn!(
                    signature = %signature,
                    timeout_ms = budget.as_millis() as u64,
                    "Confirmation timed out"
                );
                Ok(ConfirmationOutcome::TimedOut)
            }
        }
    }
}

async fn join_watcher(name: &str, handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        warn!(watcher = name, error = %e, "Confirmation watcher aborted");
    }
}

fn resolve(writer: &SlotWriter, resolution: Resolution, by: Watcher, signature: &Signature) {
    if !writer.resolve(resolution, by) {
        debug!(signature = %signature, watcher = %by, "Late resolution discarded");
    }
}

async fn push_watcher(
    chain: Arc<dyn ChainClient>,
    signature: Signature,
    writer: SlotWriter,
    mut stop: watch::Receiver<bool>,
) {
    let mut subscription = tokio::select! {
        _ = stop.changed() => return,
        sub = chain.subscribe_signature(&signature) => match sub {
            Ok(sub) => sub,
            Err(e) => {
                warn!(signature = %signature, error = %e, "Signature subscription failed; relying on poll");
                return;
            }
        },
    };

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            update = subscription.next() => match update {
                Some(SignatureNotification::Processed { slot, err }) => {
                    debug!(signature = %signature, slot, "Push notification");
                    let resolution = match err {
                        None => Resolution::Confirmed,
                        Some(err) => Resolution::Failed(err),
                    };
                    resolve(&writer, resolution, Watcher::Push, &signature);
                    break;
                }
                Some(SignatureNotification::Received { slot }) => {
                    debug!(signature = %signature, slot, "Transaction received by leader");
                }
                None => {
                    debug!(signature = %signature, "Signature subscription closed");
                    break;
                }
            },
        }
    }

    subscription.unsubscribe();
}

async fn poll_watcher(
    chain: Arc<dyn ChainClient>,
    signature: Signature,
    interval: Duration,
    writer: SlotWriter,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.changed() => return,
            _ = ticker.tick() => {}
        }
        if writer.is_resolved() {
            return;
        }

        let status = tokio::select! {
            _ = stop.changed() => return,
            status = chain.get_signature_status(&signature) => status,
        };

        match status {
            Ok(Some(status)) => {
                if let Some(err) = status.err {
                    resolve(&writer, Resolution::Failed(err), Watcher::Poll, &signature);
                    return;
                }
                if status.is_final() {
                    resolve(&writer, Resolution::Confirmed, Watcher::Poll, &signature);
                    return;
                }
                debug!(
                    signature = %signature,
                    slot = status.slot,
                    confirmations = ?status.confirmations,
                    "Transaction not final yet"
                );
            }
            Ok(None) => debug!(signature = %signature, "No status yet"),
            Err(e) => warn!(signature = %signature, error = %e, "Status query failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SignatureStatus;
    use crate::test_utils::{final_status, MockChainClient};

    #[tokio::test(start_paused = true)]
    async fn test_push_confirmation_stops_poll_loop() {
        let chain = Arc::new(MockChainClient::new());
        chain.push_after(
            Duration::from_millis(500),
            SignatureNotification::Processed { slot: 7, err: None },
        );
        let poller = ConfirmationPoller::new(chain.clone());
        let sig = Signature::new_unique();

        let started = Instant::now();
        let outcome = poller
            .await_confirmation(&sig, Duration::from_secs(30), false)
            .await
            .unwrap();
        assert_eq!(outcome, ConfirmationOutcome::Confirmed);
        assert!(started.elapsed() < DEFAULT_POLL_INTERVAL);

        let queries = chain.status_queries();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(chain.status_queries(), queries);
        assert_eq!(chain.unsubscribes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_resolves_final_status() {
        let chain = Arc::new(MockChainClient::new());
        chain.script_statuses(vec![None, None, Some(final_status(None))]);
        let poller = ConfirmationPoller::new(chain.clone());

        let outcome = poller
            .await_confirmation(&Signature::new_unique(), Duration::from_secs(30), false)
            .await
            .unwrap();
        assert_eq!(outcome, ConfirmationOutcome::Confirmed);
        assert_eq!(chain.status_queries(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_surfaces_execution_error() {
        let chain = Arc::new(MockChainClient::new());
        let exec = ExecutionError::new("custom program error: 0x137");
        chain.script_statuses(vec![Some(final_status(Some(exec.clone())))]);
        let poller = ConfirmationPoller::new(chain);

        let err = poller
            .await_confirmation(&Signature::new_unique(), Duration::from_secs(30), false)
            .await
            .unwrap_err();
        assert_eq!(err, ConfirmationError::Execution(exec));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_status_does_not_resolve() {
        let chain = Arc::new(MockChainClient::new());
        let pending = SignatureStatus {
            slot: 42,
            confirmations: Some(1),
            finalized: false,
            err: None,
        };
        chain.script_statuses(vec![Some(pending.clone()), Some(pending)]);
        let poller = ConfirmationPoller::new(chain).with_poll_interval(Duration::from_secs(1));

        let outcome = poller
            .await_confirmation(&Signature::new_unique(), Duration::from_secs(5), false)
            .await
            .unwrap();
        assert_eq!(outcome, ConfirmationOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_exact() {
        let chain = Arc::new(MockChainClient::new());
        let poller = ConfirmationPoller::new(chain.clone());
        let timeout = Duration::from_secs(30);

        let started = Instant::now();
        let outcome = poller
            .await_confirmation(&Signature::new_unique(), timeout, false)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(outcome, ConfirmationOutcome::TimedOut);
        assert!(elapsed >= timeout);
        assert!(elapsed <= timeout + poller.poll_interval());
        assert_eq!(chain.unsubscribes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gatekeeper_extends_deadline() {
        let chain = Arc::new(MockChainClient::new());
        let poller = ConfirmationPoller::new(chain);
        let timeout = Duration::from_secs(30);

        let started = Instant::now();
        let outcome = poller
            .await_confirmation(&Signature::new_unique(), timeout, true)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(outcome, ConfirmationOutcome::TimedOut);
        assert!(elapsed >= timeout + DEFAULT_GATEKEEPER_SLACK);
        assert!(elapsed <= timeout + DEFAULT_GATEKEEPER_SLACK + DEFAULT_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_subscription_falls_back_to_poll() {
        let chain = Arc::new(MockChainClient::new());
        chain.fail_subscriptions();
        chain.script_statuses(vec![Some(final_status(None))]);
        let poller = ConfirmationPoller::new(chain);

        let outcome = poller
            .await_confirmation(&Signature::new_unique(), Duration::from_secs(30), false)
            .await
            .unwrap();
        assert_eq!(outcome, ConfirmationOutcome::Confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_error_wins_over_later_poll() {
        let chain = Arc::new(MockChainClient::new());
        let exec = ExecutionError::new("custom program error: 0x135");
        chain.push_after(
            Duration::from_millis(100),
            SignatureNotification::Processed {
                slot: 3,
                err: Some(exec.clone()),
            },
        );
        chain.script_statuses(vec![None, Some(final_status(None))]);
        let poller = ConfirmationPoller::new(chain);

        let err = poller
            .await_confirmation(&Signature::new_unique(), Duration::from_secs(30), false)
            .await
            .unwrap_err();
        assert_eq!(err, ConfirmationError::Execution(exec));
    }
}
