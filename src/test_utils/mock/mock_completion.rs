use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::CompletionRequest;
use crate::CompletionService;
use crate::Result;

/// Completion double. Queued responses are served first, then every call
/// echoes `generated: {user_message}`.
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    queued: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Mutex<Duration>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

struct Running<'a>(&'a AtomicUsize);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedCompletion {
    pub fn echo() -> Self {
        Self::default()
    }

    pub fn push_response(
        &self,
        response: Result<String>,
    ) {
        self.queued.lock().push_back(response);
    }

    pub fn set_delay(
        &self,
        delay: Duration,
    ) {
        *self.delay.lock() = delay;
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<String> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        let _running = Running(&self.running);
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.queued.lock().pop_front() {
            Some(response) => response,
            None => Ok(format!("generated: {}", request.user_message)),
        }
    }
}
