//! Cell baseline cache.
//!
//! [`CacheStore`] is the external key/value collaborator; [`ChangeCache`]
//! layers the change-detection contract on top of it.
mod change_cache;
mod mem_store;
mod sled_store;

pub use change_cache::*;
pub use mem_store::*;
pub use sled_store::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<String>>;

    async fn set(
        &self,
        key: &str,
        value: &str,
    ) -> Result<()>;

    /// Stores `value` only when `key` has no value yet.
    /// Returns whether the value was stored.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
    ) -> Result<bool>;

    /// Makes every acknowledged write durable
    async fn flush(&self) -> Result<()>;
}
