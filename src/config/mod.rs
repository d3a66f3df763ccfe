//! Configuration management for the crosstab engine.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Component-wise validation
//!
//! Runtime tunables coming from the rule-definition sheet (refresh cadence,
//! rate limits, ...) are layered on top of these values by the poll loop; see
//! [`crate::SheetSettings`].
mod cache;
mod completion;
mod dispatch;
mod monitoring;
mod poll;
mod rate_limit;
mod retry;
mod source;
pub use cache::*;
pub use completion::*;
pub use dispatch::*;
pub use monitoring::*;
pub use poll::*;
pub use rate_limit::*;
pub use retry::*;
pub use source::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

pub(crate) const ENV_PREFIX: &str = "CROSSTAB";

/// Main configuration container for the engine components
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables with `CROSSTAB__` prefix (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct CrosstabConfig {
    /// Spreadsheet API endpoint and addressing
    #[serde(default)]
    pub source: SourceConfig,
    /// Completion API endpoint and model
    #[serde(default)]
    pub completion: CompletionConfig,
    /// Baseline cache storage
    #[serde(default)]
    pub cache: CacheConfig,
    /// Worker pool sizes
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Token bucket settings per external dependency
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Poll loop cadence
    #[serde(default)]
    pub poll: PollConfig,
    /// Retry policies for write-back
    #[serde(default)]
    pub retry: RetryPolicies,
    /// Logging and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Debug for CrosstabConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        // source/completion carry credentials and have their own redacting Debug
        f.debug_struct("CrosstabConfig")
            .field("source", &self.source)
            .field("completion", &self.completion)
            .field("dispatch", &self.dispatch)
            .field("rate_limit", &self.rate_limit)
            .field("poll", &self.poll)
            .finish()
    }
}

impl CrosstabConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `CROSSTAB__` prefix (highest priority)
    ///
    /// Callers MUST call `validate()` before using the configuration.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    pub fn validate(self) -> Result<Self> {
        self.source.validate()?;
        self.completion.validate()?;
        self.cache.validate()?;
        self.dispatch.validate()?;
        self.rate_limit.validate()?;
        self.poll.validate()?;
        self.retry.validate()?;
        self.monitoring.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

/// Shorthand used by every sub-config validator
pub(crate) fn invalid(msg: impl Into<String>) -> crate::Error {
    crate::Error::Config(config::ConfigError::Message(msg.into()))
}
