use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-order async mutex registry.
///
/// Serialises every ledger mutation of one order inside this process while
/// different orders proceed in parallel. Entries are dropped once the last
/// holder or waiter lets go, so the map only holds orders in flight.
#[derive(Clone, Default)]
pub struct OrderLocks {
    locks: Arc<DashMap<i32, Arc<AsyncMutex<()>>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `order_id`.
    pub async fn acquire(&self, order_id: i32) -> OrderLockGuard {
        let lock = self
            .locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let guard = lock.clone().lock_owned().await;

        OrderLockGuard {
            guard: Some(guard),
            lock,
            order_id,
            locks: self.locks.clone(),
        }
    }

    /// Number of orders with a live lock entry.
    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }
}

pub struct OrderLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    lock: Arc<AsyncMutex<()>>,
    order_id: i32,
    locks: Arc<DashMap<i32, Arc<AsyncMutex<()>>>>,
}

impl OrderLockGuard {
    pub fn order_id(&self) -> i32 {
        self.order_id
    }
}

impl Drop for OrderLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map and this guard still reference the mutex: nobody is waiting
        self.locks.remove_if(&self.order_id, |_, existing| {
            Arc::ptr_eq(existing, &self.lock) && Arc::strong_count(existing) == 2
        });
    }
}
