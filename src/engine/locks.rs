//! Per-work-order serialization.
//!
//! Two recalculations of the same work order must not interleave inside one
//! process. Recalculations of different work orders run freely.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of one async mutex per work order.
#[derive(Default)]
pub(crate) struct WorkOrderLocks {
    locks: Mutex<HashMap<(String, String), Arc<AsyncMutex<()>>>>,
}

impl WorkOrderLocks {
    /// Waits until no other holder recalculates the work order.
    pub(crate) async fn acquire(&self, tenant: &str, work_order_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = match self.locks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Entries nobody holds or waits on are only referenced here.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry((tenant.to_string(), work_order_id.to_string()))
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        match self.locks.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
