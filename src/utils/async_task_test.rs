use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use super::async_task::spawn_task;
use super::async_task::task_with_timeout_and_exponential_backoff;
use crate::BackoffPolicy;
use crate::Error;
use crate::SourceError;

fn policy(max_retries: usize) -> BackoffPolicy {
    BackoffPolicy {
        base_delay_ms: 10,
        max_delay_ms: 100,
        timeout_ms: 1000,
        max_retries,
    }
}

fn transient() -> Error {
    SourceError::Http {
        status: 503,
        body: "unavailable".into(),
    }
    .into()
}

#[tokio::test(start_paused = true)]
async fn test_task_with_timeout_and_exponential_backoff_success() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let task = move || {
        let counter = counter_clone.clone();
        async move {
            let current = counter.fetch_add(1, Ordering::SeqCst);
            if current == 0 {
                Err(transient())
            } else {
                Ok::<_, crate::Error>(current)
            }
        }
    };

    let result = task_with_timeout_and_exponential_backoff("Sheet1!A2", task, policy(3)).await;

    assert_eq!(result.unwrap(), 1);
    assert_eq!(counter.load(Ordering::SeqCst), 2); // 1 failure + 1 success
}

#[tokio::test(start_paused = true)]
async fn test_task_with_timeout_and_exponential_backoff_max_retries() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let task = move || {
        let counter = counter_clone.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>(transient())
        }
    };

    let result = task_with_timeout_and_exponential_backoff("Sheet1!A2", task, policy(3)).await;

    assert_eq!(counter.load(Ordering::SeqCst), 3);
    match result {
        Err(Error::Source(SourceError::RetryExhausted {
            range,
            attempts,
            last_error,
        })) => {
            assert_eq!(range, "Sheet1!A2");
            assert_eq!(attempts, 3);
            assert!(last_error.contains("503"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_permanent_error_is_not_retried() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let task = move || {
        let counter = counter_clone.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>(Error::from(SourceError::Http {
                status: 403,
                body: "forbidden".into(),
            }))
        }
    };

    let result = task_with_timeout_and_exponential_backoff("Sheet1!A2", task, policy(5)).await;

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(matches!(
        result,
        Err(Error::Source(SourceError::Http { status: 403, .. }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_task_with_timeout_and_exponential_backoff_timeout() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let task = move || {
        let counter = counter_clone.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<u32, _>(42)
        }
    };

    let policy = BackoffPolicy {
        base_delay_ms: 10,
        max_delay_ms: 100,
        timeout_ms: 100,
        max_retries: 2,
    };

    let result = task_with_timeout_and_exponential_backoff("Sheet1!A2", task, policy).await;

    assert_eq!(counter.load(Ordering::SeqCst), 2);
    match result {
        Err(Error::Source(SourceError::RetryExhausted { last_error, .. })) => {
            assert!(last_error.contains("timed out"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_backoff_delay_is_capped() {
    let started = tokio::time::Instant::now();
    let task = || async { Err::<(), _>(transient()) };

    let policy = BackoffPolicy {
        base_delay_ms: 100,
        max_delay_ms: 150,
        timeout_ms: 1000,
        max_retries: 4,
    };
    let _ = task_with_timeout_and_exponential_backoff("Sheet1!A2", task, policy).await;

    // 100 + 150 + 150 between four attempts
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(450), "{elapsed:?}");
}

#[tokio::test]
async fn test_spawn_task() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let task_fn = move || {
        let counter = counter_clone.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    };

    let mut handles = Vec::new();
    spawn_task("test_task", task_fn, Some(&mut handles)).await;
    assert_eq!(handles.len(), 1);

    join_all(handles).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_spawn_task_with_error() {
    let task_fn = move || async move { Err::<(), _>(Error::Fatal("Task error".to_string())) };

    let mut handles = Vec::new();
    spawn_task("error_task", task_fn, Some(&mut handles)).await;

    assert_eq!(handles.len(), 1);
    for result in join_all(handles).await {
        assert!(result.is_ok());
    }
}
