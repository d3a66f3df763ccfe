use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::debug;
use tracing::warn;

use crate::metrics::WRITES_TOTAL;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::BackoffPolicy;
use crate::CellGuard;
use crate::CellLockRegistry;
use crate::DataSource;
use crate::DispatchError;
use crate::RangeRef;
use crate::Result;
use crate::SharedRateLimiter;
use crate::SourceError;

/// Writes values back into the data source.
///
/// Every write:
/// 1. holds the cell lock of its target (taken here, or by the caller),
/// 2. occupies one slot of the write pool for its whole duration,
/// 3. waits on the data-source rate limiter before each attempt,
/// 4. retries transient failures with bounded exponential backoff.
///
/// Each attempt overwrites the whole target, so retries are idempotent.
pub struct RetryingWriter {
    source: Arc<dyn DataSource>,
    limiter: Arc<SharedRateLimiter>,
    locks: Arc<CellLockRegistry>,
    slots: Arc<Semaphore>,
    policy: BackoffPolicy,
}

impl std::fmt::Debug for RetryingWriter {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RetryingWriter")
            .field("available_slots", &self.slots.available_permits())
            .field("policy", &self.policy)
            .finish()
    }
}

impl RetryingWriter {
    pub fn new(
        source: Arc<dyn DataSource>,
        limiter: Arc<SharedRateLimiter>,
        locks: Arc<CellLockRegistry>,
        write_pool_size: usize,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            source,
            limiter,
            locks,
            slots: Arc::new(Semaphore::new(write_pool_size)),
            policy,
        }
    }

    pub fn locks(&self) -> &Arc<CellLockRegistry> {
        &self.locks
    }

    /// Locks the target cell for the duration of the write
    pub async fn write(
        &self,
        range: &RangeRef,
        value: &str,
    ) -> Result<()> {
        let guard = self.locks.lock(range).await;
        self.write_held(&guard, value).await
    }

    /// Writes into the cell `guard` already holds
    pub async fn write_held(
        &self,
        guard: &CellGuard,
        value: &str,
    ) -> Result<()> {
        self.put(guard.range(), vec![vec![value.to_string()]], self.policy).await
    }

    /// Writes a block of values whose top-left corner is `range`, without
    /// cell locking. For ranges no worker writes to.
    pub async fn write_block(
        &self,
        range: &RangeRef,
        values: Vec<Vec<String>>,
        policy: BackoffPolicy,
    ) -> Result<()> {
        self.put(range, values, policy).await
    }

    /// Stops admitting new writes. Writes already holding a slot finish.
    pub fn close(&self) {
        self.slots.close();
    }

    /// Creates `sheet` when missing and empties its columns `first..=last`.
    /// Unlocked, like [`Self::write_block`].
    pub async fn reset_sheet(
        &self,
        sheet: &str,
        first: usize,
        last: usize,
        policy: BackoffPolicy,
    ) -> Result<()> {
        self.call(sheet, policy, || self.source.ensure_sheet(sheet)).await?;
        self.call(sheet, policy, || self.source.clear_columns(sheet, first, last))
            .await?;
        debug!(sheet, "sheet reset");
        Ok(())
    }

    async fn put(
        &self,
        range: &RangeRef,
        values: Vec<Vec<String>>,
        policy: BackoffPolicy,
    ) -> Result<()> {
        let label = range.to_string();
        match self
            .call(&label, policy, || self.source.update_range(range, values.clone()))
            .await
        {
            Ok(()) => {
                WRITES_TOTAL.with_label_values(&["ok"]).inc();
                debug!(range = %label, "write completed");
                Ok(())
            }
            Err(e) => {
                WRITES_TOTAL.with_label_values(&["failed"]).inc();
                warn!(range = %label, "write failed: {}", e);
                Err(e)
            }
        }
    }

    /// One data-source mutation under a write slot, the rate limiter and the
    /// retry policy
    async fn call<F, Fut>(
        &self,
        label: &str,
        policy: BackoffPolicy,
        op: F,
    ) -> Result<()>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let _slot = self
            .slots
            .acquire()
            .await
            .map_err(|_| DispatchError::ShuttingDown)?;

        // limiter waits carry their own deadline; call_timeout bounds the call alone
        let call_timeout = policy.timeout();
        let attempt_policy = BackoffPolicy {
            timeout_ms: policy
                .timeout_ms
                .saturating_add(self.limiter.max_wait().as_millis() as u64),
            ..policy
        };

        let op = &op;
        let task = || async move {
            self.limiter.wait().await?;
            match timeout(call_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout(call_timeout).into()),
            }
        };
        task_with_timeout_and_exponential_backoff(label, task, attempt_policy).await
    }
}
