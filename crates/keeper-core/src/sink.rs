//! The monitor → strategy hand-off seam.
//!
//! The monitor does not depend on the strategy service directly; it pushes
//! confirmed-unhealthy vaults into an injected sink. This keeps the
//! pipeline direction explicit and the monitor testable in isolation.

use std::pin::Pin;
use std::sync::Arc;

use crate::vault::LiquidationCandidate;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Receiver of confirmed-unhealthy vaults.
pub trait UnhealthyVaultSink: Send + Sync {
    /// Accept a batch of unhealthy vaults for liquidation consideration.
    fn process_unhealthy_vaults(&self, vaults: Vec<LiquidationCandidate>) -> BoxFuture<'_, ()>;
}

/// Arc wrapper for sink trait objects.
pub type DynUnhealthySink = Arc<dyn UnhealthyVaultSink>;

/// Recording sink for tests.
#[derive(Debug, Default)]
pub struct MockVaultSink {
    received: parking_lot::Mutex<Vec<LiquidationCandidate>>,
}

impl MockVaultSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All candidates received so far, in arrival order.
    pub fn received(&self) -> Vec<LiquidationCandidate> {
        self.received.lock().clone()
    }
}

impl UnhealthyVaultSink for MockVaultSink {
    fn process_unhealthy_vaults(&self, vaults: Vec<LiquidationCandidate>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.received.lock().extend(vaults);
        })
    }
}
