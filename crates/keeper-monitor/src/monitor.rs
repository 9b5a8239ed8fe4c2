//! Monitor service implementation.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use keeper_chain::{retry, DynChainClient, RetryPolicy};
use keeper_core::{
    CandidateQueue, CollateralRatio, DynUnhealthySink, LiquidationCandidate, VaultHealth,
};
use keeper_telemetry::Metrics;

use crate::error::{MonitorError, MonitorResult};

/// Configuration for the monitor service.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Minimum collateralization ratio in hundredths of a percent
    /// (15000 = 150.00%). Vaults strictly below are unhealthy.
    pub min_ratio: u64,
    /// Sleep between polls when the candidate queue is empty.
    pub poll_interval: Duration,
    /// Replace per-vault reads with one aggregated call per batch.
    pub multicall: bool,
    /// Vaults per aggregated read when multicall is on.
    pub multicall_batch: usize,
    /// The protocol's debt token, stamped into health snapshots.
    pub debt_token: Address,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            min_ratio: 15_000,
            poll_interval: Duration::from_secs(5),
            multicall: false,
            multicall_batch: 20,
            debt_token: Address::ZERO,
        }
    }
}

/// Continuously drains the candidate queue and evaluates vault health.
pub struct MonitorService {
    client: DynChainClient,
    queue: Arc<CandidateQueue>,
    sink: DynUnhealthySink,
    cfg: MonitorConfig,
    retry_policy: RetryPolicy,
    cancel: CancellationToken,
}

impl MonitorService {
    #[must_use]
    pub fn new(
        client: DynChainClient,
        queue: Arc<CandidateQueue>,
        sink: DynUnhealthySink,
        cfg: MonitorConfig,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            queue,
            sink,
            cfg,
            retry_policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Run the poll loop until stopped. Sleeps only when the queue is
    /// observed empty; processes immediately otherwise.
    pub async fn run(&self) {
        info!(
            min_ratio = self.cfg.min_ratio,
            multicall = self.cfg.multicall,
            "monitor started"
        );
        loop {
            if self.cancel.is_cancelled() {
                info!("monitor stopped");
                return;
            }

            let worked = if self.cfg.multicall {
                self.pass_batched().await
            } else {
                self.pass_single().await
            };

            if !worked {
                tokio::select! {
                    () = self.cancel.cancelled() => {}
                    () = tokio::time::sleep(self.cfg.poll_interval) => {}
                }
            }
        }
    }

    /// Request the loop to stop. Cooperative: an in-flight iteration
    /// completes before the flag is honored.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// One sequential-read pass. Returns false when the queue was empty.
    async fn pass_single(&self) -> bool {
        let Some(vault) = self.queue.pop() else {
            return false;
        };

        match self.evaluate(vault).await {
            Ok(Some(candidate)) => self.forward(vec![candidate]).await,
            Ok(None) => {}
            Err(e) => {
                // Containment boundary: a failing vault never takes the
                // monitor down. It will come back on rediscovery.
                warn!(vault = %vault, error = %e, "vault evaluation failed, skipping");
            }
        }
        true
    }

    /// One multicall pass over up to `multicall_batch` vaults. Returns
    /// false when the queue was empty.
    async fn pass_batched(&self) -> bool {
        let mut batch = Vec::with_capacity(self.cfg.multicall_batch);
        while batch.len() < self.cfg.multicall_batch {
            match self.queue.pop() {
                Some(vault) => batch.push(vault),
                None => break,
            }
        }
        if batch.is_empty() {
            return false;
        }

        let states = match retry(self.retry_policy, || {
            self.client.vault_states(batch.clone())
        })
        .await
        {
            Ok(states) => states,
            Err(e) => {
                warn!(batch = batch.len(), error = %e, "batched vault read failed, skipping batch");
                return true;
            }
        };

        let mut unhealthy = Vec::new();
        for state in states {
            if state.debt_amount.is_zero() {
                debug!(vault = %state.vault, "no debt, healthy");
                continue;
            }
            let Some(price) = state.collateral_price else {
                warn!(vault = %state.vault, "price missing from batched read, skipping");
                continue;
            };
            let health = VaultHealth {
                address: state.vault,
                collateral_token: state.collateral_token,
                debt_token: self.cfg.debt_token,
                collateral_amount: state.collateral_amount,
                debt_amount: state.debt_amount,
                collateral_price: price,
                ratio: CollateralRatio::compute(state.collateral_amount, price, state.debt_amount),
            };
            if let Some(candidate) = self.decide(&health) {
                unhealthy.push(candidate);
            }
        }
        if !unhealthy.is_empty() {
            self.forward(unhealthy).await;
        }
        true
    }

    /// Evaluate one vault with sequential reads.
    ///
    /// Reads debt, collateral, and collateral token; when the debt is
    /// zero the vault is healthy by definition and the oracle is never
    /// consulted. That short-circuit is load-bearing: it saves an oracle
    /// read per debt-free vault on every pass.
    async fn evaluate(&self, vault: Address) -> MonitorResult<Option<LiquidationCandidate>> {
        let debt = retry(self.retry_policy, || self.client.debt_amount(vault))
            .await
            .map_err(MonitorError::Read)?;
        let collateral = retry(self.retry_policy, || self.client.collateral_amount(vault))
            .await
            .map_err(MonitorError::Read)?;
        let token = retry(self.retry_policy, || self.client.collateral_token(vault))
            .await
            .map_err(MonitorError::Read)?;

        if debt.is_zero() {
            debug!(vault = %vault, "no debt, healthy");
            return Ok(None);
        }

        let price = retry(self.retry_policy, || self.client.oracle_price(token))
            .await
            .map_err(MonitorError::Price)?;

        let health = VaultHealth {
            address: vault,
            collateral_token: token,
            debt_token: self.cfg.debt_token,
            collateral_amount: collateral,
            debt_amount: debt,
            collateral_price: price,
            ratio: CollateralRatio::compute(collateral, price, debt),
        };
        Ok(self.decide(&health))
    }

    fn decide(&self, health: &VaultHealth) -> Option<LiquidationCandidate> {
        if health.is_unhealthy(self.cfg.min_ratio) {
            info!(
                vault = %health.address,
                ratio = %health.ratio,
                min_ratio = self.cfg.min_ratio,
                "unhealthy vault detected"
            );
            Metrics::unhealthy_detected();
            Some(LiquidationCandidate::new(health.address, health.ratio))
        } else {
            debug!(vault = %health.address, ratio = %health.ratio, "vault healthy");
            None
        }
    }

    async fn forward(&self, candidates: Vec<LiquidationCandidate>) {
        self.sink.process_unhealthy_vaults(candidates).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alloy::primitives::U256;

    use keeper_chain::{ChainError, MockChainClient, RecordedCall};
    use keeper_core::MockVaultSink;

    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn setup(
        cfg: MonitorConfig,
    ) -> (
        Arc<MockChainClient>,
        Arc<CandidateQueue>,
        Arc<MockVaultSink>,
        MonitorService,
    ) {
        let chain = Arc::new(MockChainClient::new());
        let queue = Arc::new(CandidateQueue::new());
        let sink = Arc::new(MockVaultSink::new());
        let service = MonitorService::new(
            chain.clone(),
            queue.clone(),
            sink.clone(),
            cfg,
            RetryPolicy::new(1, Duration::from_millis(1)),
        );
        (chain, queue, sink, service)
    }

    fn set_vault(chain: &MockChainClient, vault: Address, debt: u64, collateral: u64, price: u64) {
        let token = addr(0xee);
        chain.set_debt(vault, U256::from(debt));
        chain.set_collateral(vault, U256::from(collateral));
        chain.set_collateral_token(vault, token);
        chain.set_price(token, U256::from(price));
    }

    #[tokio::test]
    async fn unhealthy_vault_reaches_sink() {
        let (chain, queue, sink, service) = setup(MonitorConfig::default());
        // ratio = 120 * 1 * 10000 / 100 = 12000 = 120.00% < 150.00%
        set_vault(&chain, addr(1), 100, 120, 1);
        queue.push(addr(1));

        assert!(service.pass_single().await);

        let received = sink.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].address, addr(1));
        assert_eq!(received[0].ratio, CollateralRatio::Finite(12_000));
    }

    #[tokio::test]
    async fn healthy_vault_never_reaches_sink() {
        let (chain, queue, sink, service) = setup(MonitorConfig::default());
        // ratio = 200 * 1 * 10000 / 100 = 20000 = 200.00%
        set_vault(&chain, addr(1), 100, 200, 1);
        queue.push(addr(1));

        assert!(service.pass_single().await);
        assert!(sink.received().is_empty());
    }

    #[tokio::test]
    async fn zero_debt_short_circuits_before_oracle() {
        let (chain, queue, sink, service) = setup(MonitorConfig::default());
        let token = addr(0xee);
        chain.set_collateral(addr(1), U256::from(500));
        chain.set_collateral_token(addr(1), token);
        chain.set_price(token, U256::from(3));
        queue.push(addr(1));

        assert!(service.pass_single().await);

        // Exactly the three vault reads happen; the oracle is never
        // consulted and the strategy never hears about the vault.
        assert_eq!(
            chain.calls(),
            vec![
                RecordedCall::DebtAmount(addr(1)),
                RecordedCall::CollateralAmount(addr(1)),
                RecordedCall::CollateralToken(addr(1)),
            ]
        );
        assert!(sink.received().is_empty());
    }

    #[tokio::test]
    async fn read_failure_is_contained() {
        let (chain, queue, sink, service) = setup(MonitorConfig::default());
        chain.set_debt_error(addr(1), ChainError::Rpc("node hiccup".into()));
        set_vault(&chain, addr(2), 100, 120, 1);
        queue.push(addr(1));
        queue.push(addr(2));

        assert!(service.pass_single().await);
        assert!(service.pass_single().await);

        // The failing vault is skipped; the next one still evaluates.
        let received = sink.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].address, addr(2));
    }

    #[tokio::test]
    async fn empty_queue_reports_no_work() {
        let (_chain, _queue, _sink, service) = setup(MonitorConfig::default());
        assert!(!service.pass_single().await);
    }

    #[tokio::test]
    async fn batched_pass_evaluates_whole_batch() {
        let cfg = MonitorConfig {
            multicall: true,
            ..MonitorConfig::default()
        };
        let (chain, queue, sink, service) = setup(cfg);
        set_vault(&chain, addr(1), 100, 120, 1); // 120.00%, unhealthy
        set_vault(&chain, addr(2), 100, 200, 1); // 200.00%, healthy
        chain.set_collateral(addr(3), U256::from(50)); // no debt
        queue.extend([addr(1), addr(2), addr(3)]);

        assert!(service.pass_batched().await);

        let received = sink.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].address, addr(1));

        // One aggregated read for the whole batch.
        let batched = chain
            .calls()
            .iter()
            .filter(|c| matches!(c, RecordedCall::VaultStates(_)))
            .count();
        assert_eq!(batched, 1);
    }

    #[tokio::test]
    async fn run_loop_stops_cooperatively() {
        let (chain, queue, sink, service) = setup(MonitorConfig {
            poll_interval: Duration::from_millis(5),
            ..MonitorConfig::default()
        });
        set_vault(&chain, addr(1), 100, 120, 1);
        queue.push(addr(1));

        let service = Arc::new(service);
        let runner = {
            let service = service.clone();
            tokio::spawn(async move { service.run().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        service.stop();
        runner.await.unwrap();

        assert_eq!(sink.received().len(), 1);
    }
}
