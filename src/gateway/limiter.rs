//! Concurrency slot pool for outbound provider calls.
//!
//! Epistemic foundation:
//! - K_i: At most `max_concurrent_calls` calls may be in flight at once
//! - K_i: tokio's semaphore queues waiters in FIFO order, so slots are
//!   granted in request order under sustained load
//! - K_i: A slot is released when its permit drops, on every exit path

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::models::{GatewayError, Result};

/// Shared pool of call slots.
///
/// Constructed once at process start and handed to every gateway instance;
/// cloning shares the same underlying pool. Callers interact only through
/// `acquire`; the pool is never inspected or resized mid-process.
#[derive(Debug, Clone)]
pub struct SlotPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl SlotPool {
    /// Create a pool with `max_concurrent_calls` slots.
    pub fn new(max_concurrent_calls: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent_calls)),
            capacity: max_concurrent_calls,
        }
    }

    /// Wait for a slot, suspending until one is free.
    ///
    /// Grants are FIFO: a caller that starts waiting first is served first.
    pub async fn acquire(&self) -> Result<SlotPermit> {
        debug!(
            available = self.semaphore.available_permits(),
            capacity = self.capacity,
            "Waiting for call slot"
        );
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GatewayError::Internal("Slot pool semaphore closed".to_string()))?;
        Ok(SlotPermit { _permit: permit })
    }

    /// Configured pool size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// One held call slot; dropping it returns the slot to the pool.
#[derive(Debug)]
pub struct SlotPermit {
    _permit: OwnedSemaphorePermit,
}
