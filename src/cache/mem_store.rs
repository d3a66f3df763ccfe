use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::CacheStore;
use crate::Result;

/// Volatile store. Baselines are lost on restart, so every cell is seen as
/// new again after a restart.
#[derive(Debug, Default)]
pub struct MemCacheStore {
    values: DashMap<String, String>,
}

impl MemCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemCacheStore {
    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<String>> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
    ) -> Result<bool> {
        match self.values.entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(value.to_string());
                Ok(true)
            }
        }
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
