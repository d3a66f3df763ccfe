use std::path::Path;

use async_trait::async_trait;
use tracing::debug;
use tracing::warn;

use super::CacheStore;
use crate::CacheError;
use crate::Result;

const BASELINE_TREE: &str = "_cell_baselines";

/// Crash-durable baseline store backed by an embedded sled database.
#[derive(Clone)]
pub struct SledCacheStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl std::fmt::Debug for SledCacheStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledCacheStore")
            .field("tree_len", &self.tree.len())
            .finish()
    }
}

impl SledCacheStore {
    pub fn open(path: impl AsRef<Path> + std::fmt::Debug) -> Result<Self> {
        debug!("open baseline cache at: {:?}", &path);
        let db = sled::Config::default()
            .path(path.as_ref())
            .use_compression(true)
            .open()
            .map_err(|e| {
                warn!("Try to open DB at this location: {:?} and failed: {:?}", path, e);
                CacheError::Sled(e)
            })?;
        Self::from_db(db)
    }

    pub fn from_db(db: sled::Db) -> Result<Self> {
        let tree = db.open_tree(BASELINE_TREE).map_err(CacheError::Sled)?;
        Ok(Self { db, tree })
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[async_trait]
impl CacheStore for SledCacheStore {
    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<String>> {
        match self.tree.get(key).map_err(CacheError::Sled)? {
            Some(ivec) => String::from_utf8(ivec.to_vec())
                .map(Some)
                .map_err(|_| CacheError::Corrupted { key: key.to_string() }.into()),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.tree.insert(key, value.as_bytes()).map_err(CacheError::Sled)?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
    ) -> Result<bool> {
        let swapped = self
            .tree
            .compare_and_swap(key, None::<&[u8]>, Some(value.as_bytes()))
            .map_err(CacheError::Sled)?;
        Ok(swapped.is_ok())
    }

    async fn flush(&self) -> Result<()> {
        let bytes = self.db.flush_async().await.map_err(CacheError::Sled)?;
        debug!("flushed baseline cache, bytes flushed: {}", bytes);
        Ok(())
    }
}
