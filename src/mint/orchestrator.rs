use solana_sdk::{
    message::Message,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use spl_token::solana_program::program_pack::Pack;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::attempt::MintAttempt;
use super::errors::{MintError, SubmissionError};
use crate::candy_machine::{plan_mint_instructions, MintAccounts, SaleState};
use crate::chain::ChainClient;
use crate::confirmation::{ConfirmationOutcome, ConfirmationPoller};
use crate::gateway::GatewayIssuer;
use crate::metrics::metrics;
use crate::structured_logging::MintLogger;
use crate::types::MintStatus;
use crate::wallet::Wallet;

pub const DEFAULT_TX_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Builds, signs and broadcasts mint transactions, then drives confirmation
pub struct MintOrchestrator {
    chain: Arc<dyn ChainClient>,
    gateway: Arc<dyn GatewayIssuer>,
    poller: ConfirmationPoller,
    program_id: Pubkey,
    tx_timeout: Duration,
}

impl MintOrchestrator {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        gateway: Arc<dyn GatewayIssuer>,
        poller: ConfirmationPoller,
        program_id: Pubkey,
    ) -> Self {
        Self {
            chain,
            gateway,
            poller,
            program_id,
            tx_timeout: DEFAULT_TX_TIMEOUT,
        }
    }

    pub fn with_tx_timeout(mut self, tx_timeout: Duration) -> Self {
        self.tx_timeout = tx_timeout;
        self
    }

    pub fn tx_timeout(&self) -> Duration {
        self.tx_timeout
    }

    /// Build, sign and broadcast one mint transaction.
    ///
    /// The wallet signs strictly before the broadcast; nothing is sent if
    /// signing fails. A gated sale gets a gateway token only once it is
    /// live; before that the transaction goes out without one.
    pub async fn mint(
        &self,
        sale: &SaleState,
        wallet: &dyn Wallet,
    ) -> Result<Signature, SubmissionError> {
        if !wallet.connected() {
            return Err(SubmissionError::WalletNotConnected);
        }
        let payer = wallet
            .public_key()
            .ok_or(SubmissionError::MissingPublicKey)?;

        let gateway_token = match &sale.gatekeeper {
            Some(gatekeeper) if sale.is_active => {
                let token = self
                    .gateway
                    .issue(&gatekeeper.gatekeeper_network, &payer)
                    .await?;
                Some(token.account)
            }
            _ => None,
        };

        let mint_rent = self
            .chain
            .get_minimum_balance_for_rent_exemption(spl_token::state::Mint::LEN)
            .await
            .map_err(SubmissionError::Chain)?;
        let blockhash = self
            .chain
            .get_latest_blockhash()
            .await
            .map_err(SubmissionError::Chain)?;

        let mint = Keypair::new();
        let accounts = MintAccounts {
            program_id: self.program_id,
            payer,
            mint: mint.pubkey(),
            gateway_token,
        };
        let plan = plan_mint_instructions(sale, &accounts, mint_rent)?;

        let message = Message::new_with_blockhash(&plan.instructions, Some(&payer), &blockhash);
        let mut tx = Transaction::new_unsigned(message);
        tx.try_partial_sign(&[&mint], blockhash)
            .map_err(|e| SubmissionError::MintSigner(e.to_string()))?;

        debug!(mint = %plan.mint, payer = %payer, "Requesting wallet signature");
        let tx = wallet
            .sign_transaction(tx)
            .await
            .map_err(SubmissionError::SigningRejected)?;

        self.chain
            .send_transaction(&tx)
            .await
            .map_err(SubmissionError::Broadcast)
    }

    /// Run one attempt through submission and confirmation.
    ///
    /// `attempt` ends in a terminal status whatever the result.
    pub async fn execute(
        &self,
        sale: &SaleState,
        wallet: &dyn Wallet,
        attempt: &mut MintAttempt,
    ) -> Result<Signature, MintError> {
        let logger = MintLogger::new(attempt.correlation_id.clone());
        let buyer = wallet
            .public_key()
            .map(|k| k.to_string())
            .unwrap_or_default();
        logger.log_mint_start(&sale.address.to_string(), &buyer, sale.gatekeeper.is_some());
        metrics().mints_total.inc();
        metrics().mints_in_flight.inc();

        let result = self.drive(sale, wallet, attempt, &logger).await;

        metrics().mints_in_flight.dec();
        match &result {
            Ok(_) => metrics().mints_success.inc(),
            Err(MintError::TimedOut) => {}
            Err(_) => metrics().mints_failed.inc(),
        }
        result
    }

    async fn drive(
        &self,
        sale: &SaleState,
        wallet: &dyn Wallet,
        attempt: &mut MintAttempt,
        logger: &MintLogger,
    ) -> Result<Signature, MintError> {
        let signature = match self.mint(sale, wallet).await {
            Ok(signature) => signature,
            Err(e) => {
                transition(attempt, logger, MintStatus::Failed)?;
                return Err(e.into());
            }
        };
        let from = attempt.status;
        attempt.submitted(signature)?;
        logger.log_transition(from.as_str(), attempt.status.as_str());
        logger.log_submitted(&signature.to_string());

        transition(attempt, logger, MintStatus::Confirming)?;
        let has_gatekeeper = sale.gatekeeper.is_some();
        match self
            .poller
            .await_confirmation(&signature, self.tx_timeout, has_gatekeeper)
            .await
        {
            Ok(ConfirmationOutcome::Confirmed) => {
                transition(attempt, logger, MintStatus::Succeeded)?;
                logger.log_success(&signature.to_string(), attempt.elapsed_ms());
                Ok(signature)
            }
            Ok(ConfirmationOutcome::TimedOut) => {
                transition(attempt, logger, MintStatus::TimedOut)?;
                let budget = self.poller.effective_timeout(self.tx_timeout, has_gatekeeper);
                logger.log_timeout(&signature.to_string(), budget.as_millis() as u64);
                Err(MintError::TimedOut)
            }
            Err(e) => {
                transition(attempt, logger, MintStatus::Failed)?;
                Err(e.into())
            }
        }
    }
}

fn transition(
    attempt: &mut MintAttempt,
    logger: &MintLogger,
    next: MintStatus,
) -> Result<(), MintError> {
    let from = attempt.status;
    attempt.advance(next)?;
    logger.log_transition(from.as_str(), next.as_str());
    Ok(())
}
