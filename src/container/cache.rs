//! Coalescing instance-cache cells.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::lifecycle::InstanceHandle;

/// A swappable at-most-once cell for a cached instance.
///
/// The inner `OnceCell` provides the coalescing guarantee: concurrent
/// initializers serialize, exactly one construction succeeds, and a failed
/// construction leaves the cell empty. Swapping the cell out (for
/// `destroy_entry`/`reload`) replaces it with a fresh one so the next
/// resolution rebuilds under the same registration.
pub(crate) struct CacheSlot {
    cell: Mutex<Arc<OnceCell<InstanceHandle>>>,
}

impl CacheSlot {
    pub(crate) fn new() -> Self {
        Self {
            cell: Mutex::new(Arc::new(OnceCell::new())),
        }
    }

    /// The current cell, cloned out so the lock is never held across an
    /// await.
    pub(crate) fn cell(&self) -> Arc<OnceCell<InstanceHandle>> {
        self.cell.lock().clone()
    }

    /// The cached instance, if construction has completed.
    pub(crate) fn peek(&self) -> Option<InstanceHandle> {
        self.cell.lock().get().cloned()
    }

    /// Swaps in a fresh cell and returns the previously cached instance.
    pub(crate) fn take(&self) -> Option<InstanceHandle> {
        let mut guard = self.cell.lock();
        let old = std::mem::replace(&mut *guard, Arc::new(OnceCell::new()));
        old.get().cloned()
    }
}
