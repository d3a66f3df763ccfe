//! External collaborators: the spreadsheet API and the completion API.
//!
//! Both are reached through traits so the engine can run against the real
//! HTTP clients in production and against in-memory doubles in tests. The
//! clients only translate calls into HTTP requests; retry, rate limiting and
//! cell locking are applied by their callers.
mod openai_client;
mod sheets_client;

pub use openai_client::*;
pub use sheets_client::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::RangeRef;
use crate::Result;
use crate::Table;

/// Prompt resolved against one row, ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_message: String,
    pub user_message: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// The polled spreadsheet
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Reads every populated row of `sheet`, header first.
    ///
    /// # Errors
    /// - [`crate::SourceError::Http`] for a non-success status
    /// - [`crate::SourceError::Timeout`] when the request deadline passes
    /// - [`crate::SourceError::UnexpectedResponse`] for an unreadable body
    async fn get_table(
        &self,
        sheet: &str,
    ) -> Result<Table>;

    /// Writes a block of values whose top-left corner is `range`.
    ///
    /// Values are interpreted as if typed by a user.
    async fn update_range(
        &self,
        range: &RangeRef,
        values: Vec<Vec<String>>,
    ) -> Result<()>;

    /// Adds a sheet named `sheet` unless the spreadsheet already has one.
    async fn ensure_sheet(
        &self,
        sheet: &str,
    ) -> Result<()>;

    /// Empties every row of the zero-based columns `first..=last` of `sheet`.
    async fn clear_columns(
        &self,
        sheet: &str,
        first: usize,
        last: usize,
    ) -> Result<()>;
}

/// Where the rule-definition table lives
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SettingsSource: Send + Sync + 'static {
    async fn fetch_settings(&self) -> Result<Table>;
}

/// Text generation service
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CompletionService: Send + Sync + 'static {
    /// Returns the generated text of the first choice.
    ///
    /// # Errors
    /// - [`crate::CompletionError::EmptyResponse`] when no choice came back
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<String>;
}
