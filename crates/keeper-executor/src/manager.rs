//! The transaction manager.
//!
//! Owns the keeper account's nonce and performs the full submission
//! protocol for `startAuction`. The nonce invariant: it only advances
//! after a transaction (original or replacement) confirms successful; a
//! failed simulate or submit never advances it, and it is refreshed from
//! the chain at the start of every attempt to absorb external
//! transactions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy::primitives::Address;
use tracing::{error, info, warn};

use keeper_chain::{retry, ChainError, DynChainClient, RetryPolicy};
use keeper_core::BoxFuture;
use keeper_telemetry::{AlertLevel, DynAlertSink, Metrics};

use crate::error::{ExecutorError, ExecutorResult};
use crate::liquidator::{AuctionOutcome, Liquidator};

/// Configuration for the transaction manager.
#[derive(Debug, Clone)]
pub struct TxManagerConfig {
    /// The keeper's signing account.
    pub account: Address,
    /// Bound on each confirmation wait.
    pub confirmation_timeout: Duration,
    /// Fee bump applied to the replacement of a stuck transaction.
    pub fee_bump_percent: u64,
}

impl Default for TxManagerConfig {
    fn default() -> Self {
        Self {
            account: Address::ZERO,
            confirmation_timeout: Duration::from_secs(15),
            fee_bump_percent: 20,
        }
    }
}

/// Owns the account nonce and submits liquidation transactions.
///
/// The strategy service guarantees at most one `start_auction` is in
/// flight at a time; the manager does not add its own locking around the
/// protocol, only around the nonce counter itself.
pub struct TransactionManager {
    client: DynChainClient,
    alerts: DynAlertSink,
    cfg: TxManagerConfig,
    retry_policy: RetryPolicy,
    /// Next nonce to use. Monotonic: refresh and advance both take the
    /// max of the current value and the new observation.
    nonce: AtomicU64,
}

impl TransactionManager {
    #[must_use]
    pub fn new(
        client: DynChainClient,
        alerts: DynAlertSink,
        cfg: TxManagerConfig,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            alerts,
            cfg,
            retry_policy,
            nonce: AtomicU64::new(0),
        }
    }

    /// Warm-start the nonce from the chain. Optional: `start_auction`
    /// refreshes again at the top of every attempt.
    pub async fn initialize(&self) -> ExecutorResult<()> {
        let nonce = self.refresh_nonce().await.map_err(ExecutorError::Nonce)?;
        info!(nonce, "transaction manager initialized");
        Ok(())
    }

    /// Attempt to start a liquidation auction on `vault`.
    ///
    /// Never raises to the caller: every failure mode is logged,
    /// counted, alerted where warranted, and returned as a typed
    /// outcome so the strategy can proceed to its next queued vault.
    pub async fn start_auction(&self, vault: Address) -> AuctionOutcome {
        match self.try_start_auction(vault).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let nonce = self.nonce.load(Ordering::SeqCst);
                error!(vault = %vault, nonce, error = %err, "liquidation attempt failed");
                self.alerts.send_alert(
                    AlertLevel::Fatal,
                    "liquidation attempt failed",
                    &format!("vault {vault} nonce {nonce}: {err}"),
                );
                Metrics::tx_failed();
                AuctionOutcome::Failed(err.to_string())
            }
        }
    }

    async fn try_start_auction(&self, vault: Address) -> ExecutorResult<AuctionOutcome> {
        // Refresh from the chain so external transactions interleaved
        // with the keeper cannot cause a collision.
        let nonce = self.refresh_nonce().await.map_err(ExecutorError::Nonce)?;

        // Idempotency guard: another liquidator, or this keeper on a
        // prior pass, may already have started the auction.
        let auction_id = retry(self.retry_policy, || self.client.auction_id(vault))
            .await
            .map_err(ExecutorError::AuctionState)?;
        if !auction_id.is_zero() {
            info!(vault = %vault, %auction_id, "auction already active, skipping");
            Metrics::auction_skipped();
            return Ok(AuctionOutcome::AlreadyActive);
        }

        let fees = retry(self.retry_policy, || self.client.estimate_fees())
            .await
            .map_err(ExecutorError::Fees)?;

        let prepared = match self.client.simulate_start_auction(vault, nonce, fees).await {
            Ok(prepared) => prepared,
            Err(e) => {
                // Expected business outcome: health changed since
                // detection, or someone else got there first.
                warn!(vault = %vault, nonce, error = %e, "simulation failed, skipping");
                return Ok(AuctionOutcome::SimulationFailed);
            }
        };

        let hash = match self.client.submit(prepared).await {
            Ok(hash) => hash,
            Err(e) => {
                warn!(vault = %vault, nonce, error = %e, "submission failed");
                return Ok(AuctionOutcome::SubmissionFailed);
            }
        };
        Metrics::tx_sent();
        info!(vault = %vault, nonce, %hash, "liquidation submitted");

        match self
            .client
            .wait_for_receipt(hash, self.cfg.confirmation_timeout)
            .await
        {
            Ok(receipt) if receipt.success => {
                self.advance_nonce(nonce);
                Metrics::tx_confirmed();
                info!(vault = %vault, nonce, %hash, block = ?receipt.block_number, "liquidation confirmed");
                Ok(AuctionOutcome::Confirmed {
                    hash,
                    replaced: false,
                })
            }
            Ok(receipt) => {
                error!(vault = %vault, nonce, %hash, block = ?receipt.block_number, "liquidation reverted on-chain");
                self.alerts.send_alert(
                    AlertLevel::Fatal,
                    "liquidation reverted on-chain",
                    &format!("vault {vault} nonce {nonce} tx {hash}"),
                );
                Metrics::tx_failed();
                Ok(AuctionOutcome::Failed("reverted on-chain".into()))
            }
            Err(ChainError::ReceiptTimeout) => self.replace_stuck(vault, nonce).await,
            Err(e) => Err(ExecutorError::Receipt(e)),
        }
    }

    /// One-shot replace-by-fee for a transaction presumed stuck.
    ///
    /// Fees are a fresh estimate scaled by the bump factor, not a
    /// mechanical bump of the original. The identical nonce is what
    /// replaces, rather than duplicates, the stuck transaction. No
    /// further replacements follow: a second timeout surfaces as a
    /// failure to avoid runaway fee escalation.
    async fn replace_stuck(&self, vault: Address, nonce: u64) -> ExecutorResult<AuctionOutcome> {
        warn!(vault = %vault, nonce, "confirmation timed out, replacing with bumped fees");

        let fresh = retry(self.retry_policy, || self.client.estimate_fees())
            .await
            .map_err(ExecutorError::Fees)?;
        let bumped = fresh.bumped(self.cfg.fee_bump_percent);

        let prepared = match self
            .client
            .simulate_start_auction(vault, nonce, bumped)
            .await
        {
            Ok(prepared) => prepared,
            Err(e) => {
                return Ok(self.replacement_failed(vault, nonce, &e.to_string()));
            }
        };

        let hash = match self.client.submit(prepared).await {
            Ok(hash) => hash,
            Err(e) => {
                return Ok(self.replacement_failed(vault, nonce, &e.to_string()));
            }
        };
        Metrics::tx_replaced();
        Metrics::tx_sent();
        info!(vault = %vault, nonce, %hash, "replacement submitted");

        match self
            .client
            .wait_for_receipt(hash, self.cfg.confirmation_timeout)
            .await
        {
            Ok(receipt) if receipt.success => {
                self.advance_nonce(nonce);
                Metrics::tx_confirmed();
                info!(vault = %vault, nonce, %hash, "replacement confirmed");
                Ok(AuctionOutcome::Confirmed {
                    hash,
                    replaced: true,
                })
            }
            Ok(_) => Ok(self.replacement_failed(vault, nonce, "replacement reverted on-chain")),
            Err(e) => Ok(self.replacement_failed(vault, nonce, &e.to_string())),
        }
    }

    fn replacement_failed(&self, vault: Address, nonce: u64, reason: &str) -> AuctionOutcome {
        error!(vault = %vault, nonce, reason, "stuck transaction unresolved");
        self.alerts.send_alert(
            AlertLevel::Fatal,
            "stuck transaction unresolved",
            &format!("vault {vault} nonce {nonce}: {reason}"),
        );
        Metrics::tx_failed();
        AuctionOutcome::Failed(reason.to_string())
    }

    /// Pull the chain's transaction count and reconcile monotonically.
    async fn refresh_nonce(&self) -> Result<u64, ChainError> {
        let account = self.cfg.account;
        let chain_count = retry(self.retry_policy, || {
            self.client.transaction_count(account)
        })
        .await?;
        self.nonce.fetch_max(chain_count, Ordering::SeqCst);
        Ok(self.nonce.load(Ordering::SeqCst))
    }

    /// Advance past a confirmed nonce, never moving backward.
    fn advance_nonce(&self, used: u64) {
        self.nonce.fetch_max(used + 1, Ordering::SeqCst);
    }

    /// The next nonce the manager would use (for diagnostics).
    #[must_use]
    pub fn next_nonce(&self) -> u64 {
        self.nonce.load(Ordering::SeqCst)
    }
}

impl Liquidator for TransactionManager {
    fn start_auction(&self, vault: Address) -> BoxFuture<'_, AuctionOutcome> {
        Box::pin(self.start_auction(vault))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use alloy::primitives::U256;

    use keeper_chain::{FeeEstimate, MockChainClient, RecordedCall, TxReceipt};
    use keeper_telemetry::MockAlertSink;

    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(1, Duration::from_millis(1))
    }

    fn setup() -> (Arc<MockChainClient>, Arc<MockAlertSink>, TransactionManager) {
        let chain = Arc::new(MockChainClient::new());
        let alerts = Arc::new(MockAlertSink::new());
        let manager = TransactionManager::new(
            chain.clone(),
            alerts.clone(),
            TxManagerConfig {
                account: addr(0xaa),
                confirmation_timeout: Duration::from_millis(100),
                fee_bump_percent: 20,
            },
            fast_retry(),
        );
        (chain, alerts, manager)
    }

    fn simulate_nonces(chain: &MockChainClient) -> Vec<u64> {
        chain
            .calls()
            .iter()
            .filter_map(|c| match c {
                RecordedCall::Simulate { nonce, .. } => Some(*nonce),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn successive_confirmations_advance_nonce() {
        let (chain, _alerts, manager) = setup();
        chain.set_transaction_count(7);

        let first = manager.start_auction(addr(1)).await;
        let second = manager.start_auction(addr(2)).await;

        assert!(first.is_confirmed());
        assert!(second.is_confirmed());
        assert_eq!(simulate_nonces(&chain), vec![7, 8]);
    }

    #[tokio::test]
    async fn failed_simulation_does_not_advance_nonce() {
        let (chain, alerts, manager) = setup();
        chain.set_transaction_count(3);
        chain.push_simulate_error(ChainError::Revert("vault healthy again".into()));

        let first = manager.start_auction(addr(1)).await;
        assert_eq!(first, AuctionOutcome::SimulationFailed);

        let second = manager.start_auction(addr(1)).await;
        assert!(second.is_confirmed());

        // Both attempts used nonce 3: the failed one must not advance it.
        assert_eq!(simulate_nonces(&chain), vec![3, 3]);
        // No submit happened for the failed simulation.
        let submits = chain
            .calls()
            .iter()
            .filter(|c| matches!(c, RecordedCall::Submit { .. }))
            .count();
        assert_eq!(submits, 1);
        // Simulation failure is silent to alerting.
        assert!(alerts.alerts().is_empty());
    }

    #[tokio::test]
    async fn failed_submission_does_not_advance_nonce() {
        let (chain, _alerts, manager) = setup();
        chain.set_transaction_count(3);
        chain.push_submit_error(ChainError::Rpc("node unavailable".into()));

        let first = manager.start_auction(addr(1)).await;
        assert_eq!(first, AuctionOutcome::SubmissionFailed);

        let second = manager.start_auction(addr(1)).await;
        assert!(second.is_confirmed());
        assert_eq!(simulate_nonces(&chain), vec![3, 3]);
    }

    #[tokio::test]
    async fn active_auction_skips_without_simulating() {
        let (chain, _alerts, manager) = setup();
        chain.set_auction_id(addr(1), U256::from(42));

        let outcome = manager.start_auction(addr(1)).await;
        assert_eq!(outcome, AuctionOutcome::AlreadyActive);

        let calls = chain.calls();
        assert!(!calls
            .iter()
            .any(|c| matches!(c, RecordedCall::Simulate { .. })));
        assert!(!calls.iter().any(|c| matches!(c, RecordedCall::Submit { .. })));
    }

    #[tokio::test]
    async fn timeout_triggers_one_replacement_with_same_nonce_and_bumped_fresh_fees() {
        let (chain, _alerts, manager) = setup();
        chain.set_transaction_count(5);
        // Original attempt estimates 30 gwei, replacement re-estimates 40.
        chain.push_fees(FeeEstimate::new(30_000_000_000, 1_000_000_000));
        chain.push_fees(FeeEstimate::new(40_000_000_000, 2_000_000_000));
        chain.push_receipt(Err(ChainError::ReceiptTimeout));

        let outcome = manager.start_auction(addr(1)).await;
        assert_eq!(
            outcome,
            AuctionOutcome::Confirmed {
                hash: alloy::primitives::B256::from(U256::from(5u64).to_be_bytes::<32>()),
                replaced: true,
            }
        );

        let simulates: Vec<(u64, FeeEstimate)> = chain
            .calls()
            .iter()
            .filter_map(|c| match c {
                RecordedCall::Simulate { nonce, fees, .. } => Some((*nonce, *fees)),
                _ => None,
            })
            .collect();
        assert_eq!(simulates.len(), 2, "exactly one replacement");
        assert_eq!(simulates[0].0, 5);
        assert_eq!(simulates[1].0, 5, "replacement reuses the nonce");
        // Replacement fees are the fresh estimate scaled by 1.2, not the
        // original estimate.
        assert_eq!(
            simulates[1].1,
            FeeEstimate::new(48_000_000_000, 2_400_000_000)
        );

        // Nonce advanced exactly once, on the replacement's confirmation.
        assert_eq!(manager.next_nonce(), 6);
    }

    #[tokio::test]
    async fn replacement_timeout_alerts_and_preserves_nonce() {
        let (chain, alerts, manager) = setup();
        chain.set_transaction_count(5);
        chain.push_receipt(Err(ChainError::ReceiptTimeout));
        chain.push_receipt(Err(ChainError::ReceiptTimeout));

        let outcome = manager.start_auction(addr(1)).await;
        assert!(matches!(outcome, AuctionOutcome::Failed(_)));
        assert_eq!(alerts.alerts_at(AlertLevel::Fatal), 1);
        assert_eq!(manager.next_nonce(), 5);
    }

    #[tokio::test]
    async fn onchain_failure_alerts_and_preserves_nonce() {
        let (chain, alerts, manager) = setup();
        chain.set_transaction_count(9);
        chain.push_receipt(Ok(TxReceipt {
            success: false,
            block_number: Some(100),
        }));

        let outcome = manager.start_auction(addr(1)).await;
        assert!(matches!(outcome, AuctionOutcome::Failed(_)));
        assert_eq!(alerts.alerts_at(AlertLevel::Fatal), 1);

        // The next attempt reuses nonce 9.
        let second = manager.start_auction(addr(1)).await;
        assert!(second.is_confirmed());
        assert_eq!(simulate_nonces(&chain), vec![9, 9]);
    }

    #[tokio::test]
    async fn refresh_adopts_external_transactions() {
        let (chain, _alerts, manager) = setup();
        chain.set_transaction_count(2);
        assert!(manager.start_auction(addr(1)).await.is_confirmed());

        // An external transaction lands: the chain count jumps past the
        // local counter.
        chain.set_transaction_count(10);
        assert!(manager.start_auction(addr(2)).await.is_confirmed());

        assert_eq!(simulate_nonces(&chain), vec![2, 10]);
    }

    #[tokio::test]
    async fn initialize_warm_starts_nonce() {
        let (chain, _alerts, manager) = setup();
        chain.set_transaction_count(4);

        manager.initialize().await.unwrap();
        assert_eq!(manager.next_nonce(), 4);
    }
}
