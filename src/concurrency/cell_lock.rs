use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::RangeRef;

/// Exclusive hold on one cell. Released on drop.
#[derive(Debug)]
pub struct CellGuard {
    range: RangeRef,
    _guard: OwnedMutexGuard<()>,
}

impl CellGuard {
    pub fn range(&self) -> &RangeRef {
        &self.range
    }
}

/// One mutex per physical cell, keyed by sheet name and position, created on
/// first use.
///
/// Concurrent first-time requests for the same cell always converge on the
/// same mutex: creation goes through the map's entry lock.
#[derive(Debug, Default)]
pub struct CellLockRegistry {
    locks: DashMap<RangeRef, Arc<Mutex<()>>>,
}

impl CellLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(
        &self,
        range: &RangeRef,
    ) -> Arc<Mutex<()>> {
        self.locks.entry(range.clone()).or_default().value().clone()
    }

    pub async fn lock(
        &self,
        range: &RangeRef,
    ) -> CellGuard {
        let mutex = self.get_or_create(range);
        let guard = mutex.lock_owned().await;
        debug!(cell = %range, "cell lock acquired");
        CellGuard {
            range: range.clone(),
            _guard: guard,
        }
    }

    /// Runs `f` while holding the lock for `range`
    pub async fn with_lock<F, Fut, T>(
        &self,
        range: &RangeRef,
        f: F,
    ) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let _guard = self.lock(range).await;
        f().await
    }

    /// Drops mutexes nobody holds or waits on. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, m| Arc::strong_count(m) > 1);
        before.saturating_sub(self.locks.len())
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
