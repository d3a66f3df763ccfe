use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::CacheStore;
use crate::Result;

/// Last observed raw value per cell, keyed by `(row, column name)`.
///
/// Keying by column name rather than position keeps baselines valid when
/// columns are inserted or reordered between polls.
///
/// Only the poll driver calls [`ChangeCache::has_changed`], so its
/// read-then-write sequence is never raced by another detector.
pub struct ChangeCache {
    store: Arc<dyn CacheStore>,
    prefix: String,
}

impl std::fmt::Debug for ChangeCache {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ChangeCache").field("prefix", &self.prefix).finish()
    }
}

impl ChangeCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn key(
        &self,
        row: usize,
        column: &str,
    ) -> String {
        format!("{}:{}:{}", self.prefix, row, column)
    }

    pub async fn get(
        &self,
        row: usize,
        column: &str,
    ) -> Result<Option<String>> {
        self.store.get(&self.key(row, column)).await
    }

    pub async fn set(
        &self,
        row: usize,
        column: &str,
        value: &str,
    ) -> Result<()> {
        self.store.set(&self.key(row, column), value).await
    }

    /// Returns true when the cell has no baseline yet or its baseline differs
    /// from `value`, and in that case records `value` as the new baseline.
    ///
    /// A failed baseline write is logged and still reported as a change: the
    /// same change may then be reported again next cycle.
    pub async fn has_changed(
        &self,
        row: usize,
        column: &str,
        value: &str,
    ) -> Result<bool> {
        let key = self.key(row, column);
        let previous = self.store.get(&key).await?;

        match previous.as_deref() {
            Some(prev) if prev == value => return Ok(false),
            Some(prev) => {
                debug!(row, column, "cell changed from {:?} to {:?}", prev, value);
            }
            None => {
                debug!(row, column, "first observation of cell");
            }
        }

        if let Err(e) = self.store.set(&key, value).await {
            warn!(row, column, "failed to record baseline: {:?}", e);
        }
        Ok(true)
    }

    /// Records `value` as baseline unless one already exists, so restarting
    /// never discards a confirmed baseline. Returns whether it was stored.
    pub async fn seed(
        &self,
        row: usize,
        column: &str,
        value: &str,
    ) -> Result<bool> {
        self.store.set_if_absent(&self.key(row, column), value).await
    }

    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await
    }
}
