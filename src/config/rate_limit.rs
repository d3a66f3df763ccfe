use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Token bucket parameters for one external dependency
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RateQuota {
    /// Sustained rate (tokens per minute)
    pub per_minute: u32,
    /// Bucket capacity
    pub burst: u32,
}

impl RateQuota {
    pub const fn new(
        per_minute: u32,
        burst: u32,
    ) -> Self {
        Self { per_minute, burst }
    }

    /// The rule sheet only carries a rate; burst follows it.
    pub const fn per_minute(per_minute: u32) -> Self {
        Self::new(per_minute, per_minute)
    }

    /// Interval at which one token is replenished
    pub fn replenish_interval(&self) -> Duration {
        Duration::from_secs(60) / self.per_minute.max(1)
    }

    fn validate(
        &self,
        name: &str,
    ) -> Result<()> {
        if self.per_minute == 0 {
            return Err(invalid(format!("rate_limit.{name}.per_minute must be greater than 0")));
        }
        if self.burst == 0 {
            return Err(invalid(format!("rate_limit.{name}.burst must be greater than 0")));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// Spreadsheet API calls (reads and writes)
    #[serde(default = "default_source_quota")]
    pub source: RateQuota,

    /// Completion API calls
    #[serde(default = "default_completion_quota")]
    pub completion: RateQuota,

    /// Hard deadline on a single `wait()` (unit: milliseconds)
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            source: default_source_quota(),
            completion: default_completion_quota(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

impl RateLimitConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn validate(&self) -> Result<()> {
        self.source.validate("source")?;
        self.completion.validate("completion")?;
        if self.max_wait_ms == 0 {
            return Err(invalid("rate_limit.max_wait_ms cannot be 0"));
        }
        Ok(())
    }
}

fn default_source_quota() -> RateQuota {
    RateQuota::new(29, 29)
}
fn default_completion_quota() -> RateQuota {
    RateQuota::new(10, 10)
}
fn default_max_wait_ms() -> u64 {
    300_000
}
