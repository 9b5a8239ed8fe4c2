//! The liquidation entry-point seam.
//!
//! The strategy service drives liquidations through this trait, which the
//! [`crate::TransactionManager`] implements. Tests inject
//! [`MockLiquidator`] to observe invocation ordering without touching a
//! chain.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};

use keeper_core::BoxFuture;

/// Outcome of one liquidation attempt.
///
/// Simulation and submission failures are outcomes, not errors: the
/// caller proceeds to its next queued vault either way, and the vault is
/// re-attempted on its next unhealthy observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuctionOutcome {
    /// The transaction (or its fee-bumped replacement) confirmed.
    Confirmed {
        hash: B256,
        /// Whether confirmation came from the replacement transaction.
        replaced: bool,
    },
    /// The vault already has an active auction; nothing to do.
    AlreadyActive,
    /// The dry-run reverted; no gas spent, nonce unchanged.
    SimulationFailed,
    /// Broadcasting failed; nonce unchanged.
    SubmissionFailed,
    /// Confirmed on-chain failure, unresolved stuck transaction, or an
    /// unexpected error. Alert-worthy; nonce unchanged.
    Failed(String),
}

impl AuctionOutcome {
    /// Whether a transaction confirmed successfully.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}

/// Entry point for starting a liquidation auction on a vault.
pub trait Liquidator: Send + Sync {
    /// Attempt to start an auction. Never fails to the caller; every
    /// failure mode is a typed outcome.
    fn start_auction(&self, vault: Address) -> BoxFuture<'_, AuctionOutcome>;
}

/// Arc wrapper for liquidator trait objects.
pub type DynLiquidator = Arc<dyn Liquidator>;

/// Recording liquidator for tests.
///
/// Records a `start` and `end` event around each invocation (with an
/// optional artificial delay in between) so tests can assert that calls
/// never overlap.
#[derive(Debug, Default)]
pub struct MockLiquidator {
    events: parking_lot::Mutex<Vec<(Address, &'static str)>>,
    delay: parking_lot::Mutex<Option<Duration>>,
    outcome: parking_lot::Mutex<Option<AuctionOutcome>>,
}

impl MockLiquidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside each invocation.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Fix the outcome returned by every invocation.
    pub fn set_outcome(&self, outcome: AuctionOutcome) {
        *self.outcome.lock() = Some(outcome);
    }

    /// `(vault, "start" | "end")` events in occurrence order.
    pub fn events(&self) -> Vec<(Address, &'static str)> {
        self.events.lock().clone()
    }

    /// Vaults whose invocation started, in order.
    pub fn started(&self) -> Vec<Address> {
        self.events
            .lock()
            .iter()
            .filter(|(_, kind)| *kind == "start")
            .map(|(vault, _)| *vault)
            .collect()
    }
}

impl Liquidator for MockLiquidator {
    fn start_auction(&self, vault: Address) -> BoxFuture<'_, AuctionOutcome> {
        Box::pin(async move {
            self.events.lock().push((vault, "start"));
            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.events.lock().push((vault, "end"));
            (*self.outcome.lock())
                .clone()
                .unwrap_or(AuctionOutcome::Confirmed {
                    hash: B256::ZERO,
                    replaced: false,
                })
        })
    }
}
