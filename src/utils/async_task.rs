use tokio::time::sleep;
use tokio::time::timeout;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::BackoffPolicy;
use crate::Result;
use crate::SourceError;

/// Runs a data-source call with a per-attempt deadline and exponential
/// backoff between attempts.
///
/// Stops early on a permanent error and returns it unchanged. When every
/// attempt fails transiently, returns [`SourceError::RetryExhausted`] naming
/// `label` and the last error.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, T, P>(
    label: &str,
    task: F,
    policy: BackoffPolicy,
) -> Result<P>
where
    F: Fn() -> T,                               // The type of the async function
    T: std::future::Future<Output = Result<P>>, // The future returned by the async function
{
    let mut retries = 0;
    let mut current_delay = policy.base_delay();
    let timeout_duration = policy.timeout();
    let max_delay = policy.max_delay();
    let max_retries = policy.max_retries.max(1);

    let mut last_error = String::new();
    while retries < max_retries {
        match timeout(timeout_duration, task()).await {
            Ok(Ok(r)) => {
                return Ok(r);
            }
            Ok(Err(error)) if !error.is_transient() => {
                warn!(label, ?error, "permanent failure, not retrying");
                return Err(error);
            }
            Ok(Err(error)) => {
                warn!(label, ?error, attempt = retries + 1, "failed with error.");
                last_error = error.to_string();
            }
            Err(_) => {
                warn!(label, ?timeout_duration, attempt = retries + 1, "Task timed out");
                last_error = SourceError::Timeout(timeout_duration).to_string();
            }
        };

        if retries < max_retries - 1 {
            debug!("Retrying in {:?}...", current_delay);
            sleep(current_delay).await;

            // Exponential backoff (double the delay each time)
            current_delay = (current_delay * 2).min(max_delay);
        }
        retries += 1;
    }

    warn!(label, "Task failed after {} attempts", max_retries);
    Err(SourceError::RetryExhausted {
        range: label.to_string(),
        attempts: max_retries,
        last_error,
    }
    .into())
}

/// Spawns a named background task, logging its error when it stops with one
pub async fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
    handles: Option<&mut Vec<tokio::task::JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        if let Err(e) = task_fn().await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        }
    });

    if let Some(h) = handles {
        h.push(handle);
    }
}

