use std::fmt::Debug;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Chat-completion API settings
#[derive(Serialize, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Deadline on a single generation call (unit: milliseconds). This bounds
    /// how long a worker can hold its cell lock on a stalled service.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Debug for CompletionConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_model(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl CompletionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(invalid("completion.base_url cannot be empty"));
        }
        if self.model.is_empty() {
            return Err(invalid("completion.model cannot be empty"));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("completion.request_timeout_ms cannot be 0"));
        }
        Ok(())
    }

    pub fn validate_credentials(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(invalid("completion.api_key is required"));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4".to_string()
}
fn default_request_timeout_ms() -> u64 {
    120_000
}
