use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Directory of the sled database holding cell baselines
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Keys are stored as `<prefix>:<row>:<column name>`
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(invalid("cache.db_path cannot be empty"));
        }
        if self.key_prefix.is_empty() || self.key_prefix.contains(':') {
            return Err(invalid(format!(
                "cache.key_prefix '{}' must be non-empty and must not contain ':'",
                self.key_prefix
            )));
        }
        Ok(())
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./db/cache")
}
fn default_key_prefix() -> String {
    "cell".to_string()
}
