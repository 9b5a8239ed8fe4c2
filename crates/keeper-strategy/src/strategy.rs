//! Strategy service implementation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use keeper_chain::{retry, DynChainClient, RetryPolicy};
use keeper_core::{BoxFuture, LiquidationCandidate, UnhealthyVaultSink};
use keeper_executor::DynLiquidator;
use keeper_telemetry::Metrics;

use crate::error::{StrategyError, StrategyResult};

/// Wei per gwei, for the gas-price ceiling conversion.
const GWEI: u128 = 1_000_000_000;

/// Configuration for the strategy service.
#[derive(Debug, Clone, Copy)]
pub struct StrategyConfig {
    /// Liquidations are skipped while the estimated `max_fee_per_gas`
    /// is at or above this ceiling (gwei).
    pub max_gas_price_gwei: u64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            max_gas_price_gwei: 100,
        }
    }
}

impl StrategyConfig {
    fn ceiling_wei(&self) -> u128 {
        u128::from(self.max_gas_price_gwei) * GWEI
    }
}

/// Sequentially drains an internal liquidation queue.
///
/// The defining property: never more than one liquidation in flight.
/// `process_unhealthy_vaults` only appends while a drain is running;
/// the draining flag guarantees a single drain loop, and the loop
/// awaits each liquidation to completion before popping the next entry.
pub struct StrategyService {
    client: DynChainClient,
    liquidator: DynLiquidator,
    cfg: StrategyConfig,
    retry_policy: RetryPolicy,
    queue: Mutex<VecDeque<LiquidationCandidate>>,
    draining: AtomicBool,
}

impl StrategyService {
    #[must_use]
    pub fn new(
        client: DynChainClient,
        liquidator: DynLiquidator,
        cfg: StrategyConfig,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            liquidator,
            cfg,
            retry_policy,
            queue: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
        }
    }

    /// Append unhealthy vaults and drain the queue.
    ///
    /// Re-entrant calls while a drain is active only enqueue; they never
    /// spawn a second drain loop. Entries for the same vault are not
    /// coalesced: a vault pushed twice is processed twice, which the
    /// transaction manager's active-auction check turns into a no-op.
    pub async fn process_unhealthy_vaults(&self, vaults: Vec<LiquidationCandidate>) {
        if !vaults.is_empty() {
            let mut queue = self.queue.lock();
            debug!(added = vaults.len(), queued = queue.len(), "liquidation candidates enqueued");
            queue.extend(vaults);
        }

        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                // Another call holds the drain; our entries are queued.
                return;
            }

            self.drain().await;
            self.draining.store(false, Ordering::SeqCst);

            // An enqueue may have slipped in between the drain observing
            // empty and the flag release; re-check before returning.
            if self.queue.lock().is_empty() {
                return;
            }
        }
    }

    /// Pop-and-process until empty. Strictly sequential: each entry is
    /// awaited to completion before the next pop.
    async fn drain(&self) {
        loop {
            let Some(entry) = self.queue.lock().pop_front() else {
                return;
            };

            if let Err(e) = self.process_one(entry).await {
                // Per-vault containment: log and move on, never abort
                // the drain or re-enqueue the entry.
                warn!(vault = %entry.address, error = %e, "liquidation processing failed, continuing");
            }
        }
    }

    async fn process_one(&self, entry: LiquidationCandidate) -> StrategyResult<()> {
        let fees = retry(self.retry_policy, || self.client.estimate_fees())
            .await
            .map_err(StrategyError::Fees)?;

        let ceiling = self.cfg.ceiling_wei();
        if fees.max_fee_per_gas >= ceiling {
            info!(
                vault = %entry.address,
                ratio = %entry.ratio,
                max_fee_per_gas = fees.max_fee_per_gas,
                ceiling,
                "gas price above ceiling, liquidation not profitable"
            );
            Metrics::liquidation_analyzed(false);
            return Ok(());
        }
        Metrics::liquidation_analyzed(true);

        info!(vault = %entry.address, ratio = %entry.ratio, "starting liquidation");
        let outcome = self.liquidator.start_auction(entry.address).await;
        debug!(vault = %entry.address, ?outcome, "liquidation attempt finished");
        Ok(())
    }

    /// Entries currently queued (for diagnostics and tests).
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }
}

impl UnhealthyVaultSink for StrategyService {
    fn process_unhealthy_vaults(&self, vaults: Vec<LiquidationCandidate>) -> BoxFuture<'_, ()> {
        Box::pin(self.process_unhealthy_vaults(vaults))
    }
}
