//! Per-aggregate async locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use tania_core::AggregateId;

/// Above this many entries, idle locks are dropped on the next acquire.
const PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per aggregate id, created on first use.
///
/// A command holds its aggregate's guard from loading the stream until the
/// projections have folded its events; commands on other aggregates do not
/// wait on it.
#[derive(Debug, Default)]
pub struct AggregateLocks {
    locks: Mutex<HashMap<AggregateId, Arc<AsyncMutex<()>>>>,
}

impl AggregateLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, aggregate_id: AggregateId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            if locks.len() > PRUNE_THRESHOLD {
                // Only the map holds an idle lock.
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(aggregate_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn the_same_aggregate_waits_and_others_do_not() {
        let locks = Arc::new(AggregateLocks::new());
        let a = AggregateId::new();
        let b = AggregateId::new();

        let held = locks.acquire(a).await;

        let other = tokio::time::timeout(Duration::from_millis(50), locks.acquire(b)).await;
        assert!(other.is_ok());

        let same = tokio::time::timeout(Duration::from_millis(50), locks.acquire(a)).await;
        assert!(same.is_err());

        drop(held);
        let again = tokio::time::timeout(Duration::from_millis(50), locks.acquire(a)).await;
        assert!(again.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
