use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::GenerationJob;
use crate::metrics::COMPLETIONS_TOTAL;
use crate::metrics::GENERATIONS_IN_FLIGHT;
use crate::CompletionError;
use crate::CompletionService;
use crate::DispatchError;
use crate::Error;
use crate::Result;
use crate::RetryingWriter;
use crate::SharedRateLimiter;
use crate::Stats;

/// Bounded-concurrency executor for generation jobs.
///
/// [`Dispatcher::submit`] waits for one of `generation_pool_size` slots, so a
/// saturated pool pushes back on the poll driver instead of growing a
/// backlog. Every worker is tracked and can be drained or cancelled on
/// shutdown; cancellation drops the worker's cell lock and slot.
pub struct Dispatcher {
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    worker: Arc<Worker>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("available_slots", &self.slots.available_permits())
            .field("in_flight", &self.tracker.len())
            .finish()
    }
}

struct Worker {
    writer: Arc<RetryingWriter>,
    completion: Arc<dyn CompletionService>,
    limiter: Arc<SharedRateLimiter>,
    stats: Arc<Stats>,
    completion_timeout: Duration,
}

/// Pipeline step a worker failed in, used as error label
#[derive(Debug, Clone, Copy)]
enum Stage {
    Marker,
    Generation,
    WriteBack,
}

impl Stage {
    fn as_str(&self) -> &'static str {
        match self {
            Stage::Marker => "marker",
            Stage::Generation => "generation",
            Stage::WriteBack => "write",
        }
    }
}

impl Dispatcher {
    pub fn new(
        generation_pool_size: usize,
        writer: Arc<RetryingWriter>,
        completion: Arc<dyn CompletionService>,
        limiter: Arc<SharedRateLimiter>,
        stats: Arc<Stats>,
        completion_timeout: Duration,
    ) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(generation_pool_size)),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            worker: Arc::new(Worker {
                writer,
                completion,
                limiter,
                stats,
                completion_timeout,
            }),
        }
    }

    /// Waits for a free slot, then hands `job` to a tracked worker task.
    ///
    /// # Errors
    /// [`DispatchError::ShuttingDown`] once [`Dispatcher::shutdown`] started,
    /// including for callers already waiting for a slot.
    pub async fn submit(
        &self,
        job: GenerationJob,
    ) -> Result<()> {
        if self.tracker.is_closed() {
            return Err(DispatchError::ShuttingDown.into());
        }
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DispatchError::ShuttingDown)?;

        debug!(
            row = job.row.row_index(),
            rule = %job.rule.name,
            reason = ?job.reason,
            "dispatching generation job"
        );

        let worker = self.worker.clone();
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            let _permit = permit;
            GENERATIONS_IN_FLIGHT.inc();
            tokio::select! {
                _ = worker.run(&job) => {}
                _ = cancel.cancelled() => {
                    warn!(cell = %job.range(), rule = %job.rule.name, "generation job cancelled");
                }
            }
            GENERATIONS_IN_FLIGHT.dec();
        });
        Ok(())
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Stops admission and waits for running workers.
    ///
    /// Workers still running after `drain_timeout` are cancelled.
    ///
    /// # Errors
    /// [`DispatchError::DrainTimeout`] with the number of cancelled workers.
    pub async fn shutdown(
        &self,
        drain_timeout: Duration,
    ) -> Result<()> {
        self.tracker.close();
        self.slots.close();
        info!(in_flight = self.tracker.len(), "draining generation workers");

        if timeout(drain_timeout, self.tracker.wait()).await.is_ok() {
            info!("generation workers drained");
            return Ok(());
        }

        let abandoned = self.tracker.len();
        warn!(abandoned, "drain timed out, cancelling generation workers");
        self.cancel.cancel();
        self.tracker.wait().await;
        Err(DispatchError::DrainTimeout(abandoned, drain_timeout).into())
    }
}

impl Worker {
    async fn run(
        &self,
        job: &GenerationJob,
    ) {
        match self.generate(job).await {
            Ok(()) => {
                self.stats.record_success();
                info!(cell = %job.range(), rule = %job.rule.name, "generated value written");
            }
            Err((stage, e)) => {
                if matches!(stage, Stage::Generation) {
                    COMPLETIONS_TOTAL.with_label_values(&["failed"]).inc();
                }
                warn!(
                    cell = %job.range(),
                    rule = %job.rule.name,
                    stage = stage.as_str(),
                    "generation job abandoned: {}",
                    e
                );
                self.stats.record_error(stage.as_str(), &e);
            }
        }
    }

    /// Lock, clear, generate, write. The cell lock is held throughout and
    /// released on every exit path when the guard drops.
    async fn generate(
        &self,
        job: &GenerationJob,
    ) -> std::result::Result<(), (Stage, Error)> {
        let guard = self.writer.locks().lock(&job.range()).await;

        self.writer
            .write_held(&guard, "")
            .await
            .map_err(|e| (Stage::Marker, e))?;

        let request = job.rule.completion_request(&job.row);
        let text = async {
            self.limiter.wait().await?;
            match timeout(self.completion_timeout, self.completion.complete(request)).await {
                Ok(result) => result,
                Err(_) => Err(CompletionError::Timeout(self.completion_timeout).into()),
            }
        }
        .await
        .map_err(|e| (Stage::Generation, e))?;

        self.writer
            .write_held(&guard, &text)
            .await
            .map_err(|e| (Stage::WriteBack, e))
    }
}
