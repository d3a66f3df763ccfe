use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Poll loop cadence. The first two values are defaults only: the rule sheet
/// overrides them with `SHEET_REFRESH_FREQUENCY` and
/// `SHEET_NEW_COLUMNS_FREQUENCY` on every settings reload.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PollConfig {
    /// Sleep between two table fetches (unit: milliseconds)
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Minimum spacing between two missing-destination sweeps (unit: milliseconds)
    #[serde(default = "default_column_check_interval_ms")]
    pub column_check_interval_ms: u64,

    /// Minimum spacing between two rule-sheet reloads (unit: milliseconds)
    #[serde(default = "default_settings_reload_interval_ms")]
    pub settings_reload_interval_ms: u64,

    /// Seed absent baselines from the first fetched table and skip its trigger pass
    #[serde(default = "default_seed_on_cold_start")]
    pub seed_on_cold_start: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            column_check_interval_ms: default_column_check_interval_ms(),
            settings_reload_interval_ms: default_settings_reload_interval_ms(),
            seed_on_cold_start: default_seed_on_cold_start(),
        }
    }
}

impl PollConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn column_check_interval(&self) -> Duration {
        Duration::from_millis(self.column_check_interval_ms)
    }

    pub fn settings_reload_interval(&self) -> Duration {
        Duration::from_millis(self.settings_reload_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_ms == 0 {
            return Err(invalid("poll.refresh_interval_ms cannot be 0"));
        }
        if self.column_check_interval_ms < self.refresh_interval_ms {
            return Err(invalid(format!(
                "poll.column_check_interval_ms ({}) must not be shorter than refresh_interval_ms ({})",
                self.column_check_interval_ms, self.refresh_interval_ms
            )));
        }
        Ok(())
    }
}

fn default_refresh_interval_ms() -> u64 {
    5_000
}
fn default_column_check_interval_ms() -> u64 {
    60_000
}
fn default_settings_reload_interval_ms() -> u64 {
    15_000
}
fn default_seed_on_cold_start() -> bool {
    true
}
