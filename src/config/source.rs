use std::fmt::Debug;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Spreadsheet values API settings
#[derive(Serialize, Deserialize, Clone)]
pub struct SourceConfig {
    /// API root, without trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub spreadsheet_id: String,

    /// OAuth bearer token used for every call
    #[serde(default)]
    pub access_token: String,

    /// Sheet polled for changes, unless the rule sheet sets `SHEET_NAME`
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,

    /// A1 range holding the flat key/value rule-definition table
    #[serde(default = "default_settings_range")]
    pub settings_range: String,

    /// Sheet receiving stats when `STATS` is enabled
    #[serde(default = "default_stats_sheet")]
    pub stats_sheet: String,

    /// Network-level timeout on every call (unit: milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Debug for SourceConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("base_url", &self.base_url)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("sheet_name", &self.sheet_name)
            .field("settings_range", &self.settings_range)
            .field("stats_sheet", &self.stats_sheet)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            spreadsheet_id: String::new(),
            access_token: String::new(),
            sheet_name: default_sheet_name(),
            settings_range: default_settings_range(),
            stats_sheet: default_stats_sheet(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl SourceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(invalid("source.base_url cannot be empty"));
        }
        if self.sheet_name.trim().is_empty() {
            return Err(invalid("source.sheet_name cannot be empty"));
        }
        if !self.settings_range.contains('!') {
            return Err(invalid(format!(
                "source.settings_range '{}' must name a sheet, e.g. Settings!A1:B1000",
                self.settings_range
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("source.request_timeout_ms cannot be 0"));
        }
        Ok(())
    }

    /// Credentials are only needed by the HTTP client, not by the engine,
    /// so this is checked separately at startup.
    pub fn validate_credentials(&self) -> Result<()> {
        if self.spreadsheet_id.is_empty() {
            return Err(invalid("source.spreadsheet_id is required"));
        }
        if self.access_token.is_empty() {
            return Err(invalid("source.access_token is required"));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}
fn default_sheet_name() -> String {
    "Sheet1".to_string()
}
fn default_settings_range() -> String {
    "Settings!A1:B1000".to_string()
}
fn default_stats_sheet() -> String {
    "Stats".to_string()
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
