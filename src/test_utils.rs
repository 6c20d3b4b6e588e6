//! Test Utilities Module
//!
//! In-memory stand-ins for the ledger, the wallet and the gateway issuer,
//! plus candy machine account fixtures. Every mock records what it was
//! asked so tests can assert on ordering and teardown.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::candy_machine::instructions::gateway_token_address;
use crate::candy_machine::state::{
    account_discriminator, CandyMachineAccount, CandyMachineData, Creator,
};
use crate::candy_machine::SaleState;
use crate::chain::{
    ChainClient, ChainError, SignatureNotification, SignatureStatus, SignatureSubscription,
};
use crate::gateway::{GatewayError, GatewayIssuer, GatewayToken};
use crate::wallet::{Wallet, WalletError};

/// Rent-exempt minimum of an SPL mint on mainnet
pub const MINT_RENT_LAMPORTS: u64 = 1_461_600;

/// Scripted ledger.
///
/// Signature statuses are served from a queue, one per query, and `None`
/// once the queue is drained. Push notifications are delivered after a
/// delay on every subscription.
pub struct MockChainClient {
    accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
    account_queries: AtomicUsize,
    failing_account_reads: AtomicUsize,
    blockhash: Hash,
    statuses: Mutex<VecDeque<Option<SignatureStatus>>>,
    status_queries: AtomicUsize,
    push: Mutex<Option<(Duration, SignatureNotification)>>,
    fail_subscriptions: AtomicBool,
    subscriptions: Mutex<Vec<oneshot::Receiver<()>>>,
    idle_streams: Mutex<Vec<mpsc::UnboundedSender<SignatureNotification>>>,
    send_error: Mutex<Option<ChainError>>,
    sent: Mutex<Vec<Transaction>>,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            account_queries: AtomicUsize::new(0),
            failing_account_reads: AtomicUsize::new(0),
            blockhash: Hash::new_unique(),
            statuses: Mutex::new(VecDeque::new()),
            status_queries: AtomicUsize::new(0),
            push: Mutex::new(None),
            fail_subscriptions: AtomicBool::new(false),
            subscriptions: Mutex::new(Vec::new()),
            idle_streams: Mutex::new(Vec::new()),
            send_error: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_account(&self, address: Pubkey, data: Vec<u8>) {
        self.accounts.lock().insert(address, data);
    }

    /// Fail the next `n` account reads with a transport error
    pub fn fail_account_reads(&self, n: usize) {
        self.failing_account_reads.store(n, Ordering::SeqCst);
    }

    pub fn account_queries(&self) -> usize {
        self.account_queries.load(Ordering::SeqCst)
    }

    pub fn script_statuses(&self, statuses: Vec<Option<SignatureStatus>>) {
        *self.statuses.lock() = statuses.into();
    }

    pub fn status_queries(&self) -> usize {
        self.status_queries.load(Ordering::SeqCst)
    }

    /// Deliver `notification` `delay` after each subscription is opened
    pub fn push_after(&self, delay: Duration, notification: SignatureNotification) {
        *self.push.lock() = Some((delay, notification));
    }

    pub fn fail_subscriptions(&self) {
        self.fail_subscriptions.store(true, Ordering::SeqCst);
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Subscriptions whose consumer has unsubscribed or dropped them
    pub fn unsubscribes(&self) -> usize {
        self.subscriptions
            .lock()
            .iter_mut()
            .map(|rx| rx.try_recv())
            .filter(|r| !matches!(r, Err(oneshot::error::TryRecvError::Empty)))
            .count()
    }

    pub fn fail_send(&self, err: ChainError) {
        *self.send_error.lock() = Some(err);
    }

    pub fn sent_transactions(&self) -> Vec<Transaction> {
        self.sent.lock().clone()
    }
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

fn transport_error() -> ChainError {
    ChainError::Transport {
        endpoint: "mock".to_string(),
        message: "connection reset".to_string(),
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ChainError> {
        self.account_queries.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_account_reads.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_account_reads.store(failing - 1, Ordering::SeqCst);
            return Err(transport_error());
        }
        Ok(self.accounts.lock().get(address).cloned())
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, ChainError> {
        Ok(self.blockhash)
    }

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        _data_len: usize,
    ) -> Result<u64, ChainError> {
        Ok(MINT_RENT_LAMPORTS)
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, ChainError> {
        if let Some(err) = self.send_error.lock().clone() {
            return Err(err);
        }
        self.sent.lock().push(tx.clone());
        Ok(tx.signatures.first().copied().unwrap_or_default())
    }

    async fn get_signature_status(
        &self,
        _signature: &Signature,
    ) -> Result<Option<SignatureStatus>, ChainError> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.statuses.lock().pop_front().flatten())
    }

    async fn subscribe_signature(
        &self,
        _signature: &Signature,
    ) -> Result<SignatureSubscription, ChainError> {
        if self.fail_subscriptions.load(Ordering::SeqCst) {
            return Err(ChainError::Subscription("websocket refused".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.subscriptions.lock().push(shutdown_rx);

        match self.push.lock().clone() {
            Some((delay, notification)) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(notification);
                });
            }
            None => self.idle_streams.lock().push(tx),
        }
        Ok(SignatureSubscription::new(rx, shutdown_tx))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalletMode {
    Connected,
    Disconnected,
    Rejecting,
}

/// Keypair-backed wallet with a switchable connection and user response
pub struct MockWallet {
    keypair: Keypair,
    mode: WalletMode,
    sign_requests: AtomicUsize,
}

impl MockWallet {
    fn with_mode(mode: WalletMode) -> Self {
        Self {
            keypair: Keypair::new(),
            mode,
            sign_requests: AtomicUsize::new(0),
        }
    }

    pub fn connected() -> Self {
        Self::with_mode(WalletMode::Connected)
    }

    pub fn disconnected() -> Self {
        Self::with_mode(WalletMode::Disconnected)
    }

    /// Connected, but the user declines every signature request
    pub fn rejecting() -> Self {
        Self::with_mode(WalletMode::Rejecting)
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn sign_requests(&self) -> usize {
        self.sign_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Wallet for MockWallet {
    fn connected(&self) -> bool {
        self.mode != WalletMode::Disconnected
    }

    fn public_key(&self) -> Option<Pubkey> {
        self.connected().then(|| self.keypair.pubkey())
    }

    async fn sign_transaction(&self, mut tx: Transaction) -> Result<Transaction, WalletError> {
        self.sign_requests.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            WalletMode::Disconnected => Err(WalletError::NotConnected),
            WalletMode::Rejecting => Err(WalletError::Rejected(
                "User rejected the request.".to_string(),
            )),
            WalletMode::Connected => {
                let blockhash = tx.message.recent_blockhash;
                tx.try_partial_sign(&[&self.keypair], blockhash)
                    .map_err(|e| WalletError::Rejected(e.to_string()))?;
                Ok(tx)
            }
        }
    }
}

/// Gateway issuer that hands out the derived token, or a fixed error
pub struct MockGatewayIssuer {
    error: Option<GatewayError>,
    issued: Mutex<Vec<(Pubkey, Pubkey)>>,
}

impl MockGatewayIssuer {
    pub fn new() -> Self {
        Self {
            error: None,
            issued: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: GatewayError) -> Self {
        Self {
            error: Some(error),
            issued: Mutex::new(Vec::new()),
        }
    }

    /// `(network, owner)` of every successful issuance
    pub fn issued(&self) -> Vec<(Pubkey, Pubkey)> {
        self.issued.lock().clone()
    }
}

impl Default for MockGatewayIssuer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GatewayIssuer for MockGatewayIssuer {
    async fn issue(&self, network: &Pubkey, owner: &Pubkey) -> Result<GatewayToken, GatewayError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        self.issued.lock().push((*network, *owner));
        Ok(GatewayToken {
            account: gateway_token_address(owner, network),
            network: *network,
        })
    }
}

/// Plain public sale: no whitelist, gate, end settings or SPL token price
pub fn candy_machine_account(
    items_available: u64,
    items_redeemed: u64,
    go_live_date: Option<i64>,
) -> CandyMachineAccount {
    CandyMachineAccount {
        authority: Pubkey::new_unique().to_bytes(),
        wallet: Pubkey::new_unique().to_bytes(),
        token_mint: None,
        items_redeemed,
        data: CandyMachineData {
            uuid: "CMTEST".to_string(),
            price: 1_000_000_000,
            symbol: "TEST".to_string(),
            seller_fee_basis_points: 500,
            max_supply: 0,
            is_mutable: true,
            retain_authority: true,
            go_live_date,
            end_settings: None,
            creators: vec![Creator {
                address: Pubkey::new_unique().to_bytes(),
                verified: true,
                share: 100,
            }],
            hidden_settings: None,
            whitelist_mint_settings: None,
            items_available,
            gatekeeper: None,
        },
    }
}

/// Raw account bytes as the program stores them
pub fn encode_candy_machine(account: &CandyMachineAccount) -> Vec<u8> {
    let mut data = account_discriminator().to_vec();
    data.extend(borsh::to_vec(account).expect("candy machine account serializes"));
    data
}

/// Sale that went live in the past with `items_remaining` left
pub fn live_sale_state(items_remaining: u64) -> SaleState {
    let now = chrono::Utc::now().timestamp();
    let account = candy_machine_account(items_remaining + 10, 10, Some(now - 3600));
    SaleState::from_account(Pubkey::new_unique(), &account, now, None)
}

/// Status of a rooted transaction
pub fn final_status(err: Option<crate::chain::ExecutionError>) -> SignatureStatus {
    SignatureStatus {
        slot: 42,
        confirmations: None,
        finalized: true,
        err,
    }
}
