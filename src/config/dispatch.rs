use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Worker pool sizes
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DispatchConfig {
    /// Concurrent generation workers. `submit` blocks once all are busy.
    #[serde(default = "default_generation_pool_size")]
    pub generation_pool_size: usize,

    /// Concurrent cell writes across all workers
    #[serde(default = "default_write_pool_size")]
    pub write_pool_size: usize,

    /// How long shutdown waits for in-flight workers (unit: milliseconds)
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            generation_pool_size: default_generation_pool_size(),
            write_pool_size: default_write_pool_size(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl DispatchConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.generation_pool_size == 0 {
            return Err(invalid("dispatch.generation_pool_size must be greater than 0"));
        }
        if self.write_pool_size == 0 {
            return Err(invalid("dispatch.write_pool_size must be greater than 0"));
        }
        Ok(())
    }
}

fn default_generation_pool_size() -> usize {
    10
}
fn default_write_pool_size() -> usize {
    29
}
fn default_drain_timeout_ms() -> u64 {
    30_000
}
