use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Basic retry policy template
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Maximum number of attempts, at least 1
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Single attempt timeout (unit: milliseconds)
    #[serde(default = "default_op_timeout_ms")]
    pub timeout_ms: u64,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_op_timeout_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    fn validate(
        &self,
        name: &str,
    ) -> Result<()> {
        if self.max_retries == 0 {
            return Err(invalid(format!("retry.{name}.max_retries must be at least 1")));
        }
        if self.timeout_ms == 0 {
            return Err(invalid(format!("retry.{name}.timeout_ms cannot be 0")));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(invalid(format!(
                "retry.{name}.base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

/// Divide strategies by call site
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryPolicies {
    /// Cell write-back (in-flight marker and generated result)
    #[serde(default = "default_write_policy")]
    pub write: BackoffPolicy,

    /// Stats sheet updates (best effort, short)
    #[serde(default = "default_stats_policy")]
    pub stats: BackoffPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            write: default_write_policy(),
            stats: default_stats_policy(),
        }
    }
}

impl RetryPolicies {
    pub fn validate(&self) -> Result<()> {
        self.write.validate("write")?;
        self.stats.validate("stats")?;
        Ok(())
    }
}

fn default_write_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 8,
        timeout_ms: 30_000,
        base_delay_ms: 500,
        max_delay_ms: 30_000,
    }
}
fn default_stats_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 2,
        timeout_ms: 10_000,
        base_delay_ms: 1000,
        max_delay_ms: 5000,
    }
}
fn default_max_retries() -> usize {
    3
}
fn default_op_timeout_ms() -> u64 {
    10_000
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    30_000
}
