//! Concurrency gate shared by all upsert workers.
//!
//! Each worker holds one permit for the duration of its delivery so at most
//! `limit` deliveries are in flight. Permits are released when the guard is
//! dropped, on every exit path.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct ConcurrencyGate {
    limit: usize,
    slots: Arc<Semaphore>,
}

/// Releases its slot when dropped.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    /// Create a gate admitting `limit` holders at once, clamped to
    /// `1..=Semaphore::MAX_PERMITS`.
    pub fn new(limit: usize) -> Self {
        let limit = limit.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            limit,
            slots: Arc::new(Semaphore::new(limit)),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.limit.saturating_sub(self.slots.available_permits())
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Wait for a slot. Returns `None` if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<GatePermit> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = Arc::clone(&self.slots).acquire_owned() => {
                permit.ok().map(|p| GatePermit { _permit: p })
            }
        }
    }
}
