//! Candidate queue: an ordered, deduplicating holder of vault addresses
//! awaiting health evaluation.
//!
//! The queue guarantees an address is never enqueued twice while still
//! pending, but re-admits it once it has been popped. It is not a
//! scheduler: `pop` is non-blocking and pollers decide what to do on
//! empty.

use std::collections::{HashSet, VecDeque};

use alloy::primitives::Address;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct QueueInner {
    order: VecDeque<Address>,
    pending: HashSet<Address>,
}

/// Deduplicating FIFO of vault addresses, fed by discovery and drained by
/// the monitor. Push and pop are the only mutation sites.
#[derive(Debug, Default)]
pub struct CandidateQueue {
    inner: Mutex<QueueInner>,
}

impl CandidateQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one address. No-op (returns false) while the address is
    /// already pending.
    pub fn push(&self, address: Address) -> bool {
        let mut inner = self.inner.lock();
        if !inner.pending.insert(address) {
            return false;
        }
        inner.order.push_back(address);
        true
    }

    /// Insert many addresses, skipping those already pending. Returns the
    /// number actually inserted.
    pub fn extend<I>(&self, addresses: I) -> usize
    where
        I: IntoIterator<Item = Address>,
    {
        let mut inner = self.inner.lock();
        let mut inserted = 0;
        for address in addresses {
            if inner.pending.insert(address) {
                inner.order.push_back(address);
                inserted += 1;
            }
        }
        inserted
    }

    /// Remove and return the oldest pending address, or `None` when empty.
    /// The popped address may be re-admitted later.
    pub fn pop(&self) -> Option<Address> {
        let mut inner = self.inner.lock();
        let address = inner.order.pop_front()?;
        inner.pending.remove(&address);
        Some(address)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().order.is_empty()
    }
}
