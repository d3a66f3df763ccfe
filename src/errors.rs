//! Crosstab Error Hierarchy
//!
//! Errors are grouped by the external collaborator that produced them. The
//! poll loop and the worker tasks only need one question answered about any of
//! them: is it worth retrying? See [`Error::is_transient`].

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Spreadsheet read/write failures
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Completion service failures
    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// Baseline cache failures
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Worker pool and task lifecycle failures
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Non-success HTTP status returned by the spreadsheet API
    #[error("Data source returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Transport level failure (connect, TLS, body decode)
    #[error("Data source request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Request did not complete within the per-attempt deadline
    #[error("Data source call timed out after {0:?}")]
    Timeout(Duration),

    /// A1 range that cannot be parsed or addressed
    #[error("Malformed range reference: {0}")]
    MalformedRange(String),

    /// Response body did not have the expected shape
    #[error("Unexpected response shape: {0}")]
    UnexpectedResponse(String),

    /// Bounded retry gave up
    #[error("Write to {range} failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        range: String,
        attempts: usize,
        last_error: String,
    },

    /// Token bucket did not yield a token before the hard deadline
    #[error("Rate limiter wait exceeded {0:?}")]
    RateLimitTimeout(Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// Non-success HTTP status returned by the completion API
    #[error("Completion service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Completion request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Completion request timed out after {0:?}")]
    Timeout(Duration),

    /// Response contained no choices
    #[error("Completion response contained no choices")]
    EmptyResponse,

    #[error("Rate limiter wait exceeded {0:?}")]
    RateLimitTimeout(Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Embedded database errors
    #[error(transparent)]
    Sled(#[from] sled::Error),

    /// Stored bytes are not valid UTF-8
    #[error("Cached value for {key} is not valid UTF-8")]
    Corrupted { key: String },

    /// Any other backend failure
    #[error("Cache backend error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Submission after shutdown was requested
    #[error("Dispatcher is shutting down")]
    ShuttingDown,

    /// Worker tasks did not finish within the drain deadline
    #[error("{0} worker(s) still running after drain timeout of {1:?}")]
    DrainTimeout(usize, Duration),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),
}

impl Error {
    /// Whether retrying the same call may succeed.
    ///
    /// Timeouts, throttling (HTTP 429), server errors (5xx) and transport
    /// failures are transient. Everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Source(e) => e.is_transient(),
            Error::Completion(e) => e.is_transient(),
            Error::Cache(CacheError::Sled(sled::Error::Io(_))) => true,
            _ => false,
        }
    }
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Http { status, .. } => is_transient_status(*status),
            SourceError::Request(e) => !e.is_builder() && !e.is_decode(),
            SourceError::Timeout(_) => true,
            SourceError::RateLimitTimeout(_) => true,
            SourceError::MalformedRange(_)
            | SourceError::UnexpectedResponse(_)
            | SourceError::RetryExhausted { .. } => false,
        }
    }
}

impl CompletionError {
    pub fn is_transient(&self) -> bool {
        match self {
            CompletionError::Http { status, .. } => is_transient_status(*status),
            CompletionError::Request(e) => !e.is_builder() && !e.is_decode(),
            CompletionError::Timeout(_) | CompletionError::RateLimitTimeout(_) => true,
            CompletionError::EmptyResponse => false,
        }
    }
}

pub(crate) fn is_transient_status(status: u16) -> bool {
    status == 429 || status == 408 || (500..600).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_classification() {
        assert!(is_transient_status(429));
        assert!(is_transient_status(503));
        assert!(is_transient_status(408));
        assert!(!is_transient_status(400));
        assert!(!is_transient_status(403));
        assert!(!is_transient_status(404));
    }

    #[test]
    fn test_error_is_transient() {
        let e: Error = SourceError::Http {
            status: 500,
            body: "backend".into(),
        }
        .into();
        assert!(e.is_transient());

        let e: Error = SourceError::MalformedRange("!!".into()).into();
        assert!(!e.is_transient());

        let e: Error = CompletionError::EmptyResponse.into();
        assert!(!e.is_transient());

        let e: Error = DispatchError::ShuttingDown.into();
        assert!(!e.is_transient());

        let e = Error::Fatal("boom".into());
        assert!(!e.is_transient());
    }
}
