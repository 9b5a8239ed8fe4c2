//! Discovery service implementation.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use keeper_chain::{retry, DynChainClient, RetryPolicy};
use keeper_core::CandidateQueue;
use keeper_telemetry::Metrics;

use crate::error::{DiscoveryError, DiscoveryResult};

/// Discovery lifecycle. Transitions: Idle → Backfilling → Watching,
/// terminal until stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Idle,
    Backfilling,
    Watching,
    Stopped,
}

/// Finds every vault the factory ever created and keeps finding new ones.
///
/// Guarantee: the backfill fully completes (and its addresses are in the
/// queue) before the live subscription is armed. Each discovery lifetime
/// inserts every existing vault exactly once; the queue deduplicates any
/// overlap between the two phases.
pub struct DiscoveryService {
    client: DynChainClient,
    queue: Arc<CandidateQueue>,
    /// First block the factory could have emitted a creation event in.
    deployment_block: u64,
    retry_policy: RetryPolicy,
    state: Mutex<DiscoveryState>,
    cancel: CancellationToken,
    watch_task: Mutex<Option<JoinHandle<()>>>,
}

impl DiscoveryService {
    #[must_use]
    pub fn new(
        client: DynChainClient,
        queue: Arc<CandidateQueue>,
        deployment_block: u64,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            queue,
            deployment_block,
            retry_policy,
            state: Mutex::new(DiscoveryState::Idle),
            cancel: CancellationToken::new(),
            watch_task: Mutex::new(None),
        }
    }

    /// Backfill all historical creations, then arm the live watch.
    pub async fn start(&self) -> DiscoveryResult<()> {
        {
            let mut state = self.state.lock();
            if *state != DiscoveryState::Idle {
                return Err(DiscoveryError::AlreadyStarted);
            }
            *state = DiscoveryState::Backfilling;
        }

        let vaults = retry(self.retry_policy, || {
            self.client.vault_created_logs(self.deployment_block, None)
        })
        .await
        .map_err(DiscoveryError::Backfill)?;

        let total = vaults.len();
        let inserted = self.queue.extend(vaults.iter().map(|v| v.address));
        Metrics::vaults_backfilled(inserted as u64);
        info!(total, inserted, "backfill complete");

        let mut events = retry(self.retry_policy, || self.client.subscribe_vault_created())
            .await
            .map_err(DiscoveryError::Subscribe)?;

        let queue = self.queue.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("watch task stopped");
                        return;
                    }
                    event = events.recv() => match event {
                        Some(vault) => {
                            if queue.push(vault.address) {
                                Metrics::vault_watched();
                                info!(vault = %vault.address, owner = %vault.owner, "new vault discovered");
                            }
                        }
                        None => {
                            warn!("creation event stream closed");
                            return;
                        }
                    }
                }
            }
        });

        *self.watch_task.lock() = Some(handle);
        *self.state.lock() = DiscoveryState::Watching;
        info!("discovery watching for new vaults");
        Ok(())
    }

    /// Tear down the live subscription and wait for the watch task.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.watch_task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        *self.state.lock() = DiscoveryState::Stopped;
        info!("discovery stopped");
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DiscoveryState {
        *self.state.lock()
    }
}
