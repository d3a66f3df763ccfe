use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::error;
use tracing::info;

use super::CycleReport;
use super::PollLoop;
use crate::ChangeCache;
use crate::Dispatcher;
use crate::Result;
use crate::RetryingWriter;
use crate::RuleRegistry;
use crate::Stats;

/// A fully wired engine, produced by [`crate::EngineBuilder`].
pub struct Engine {
    pub(super) poll: PollLoop,
    pub(super) dispatcher: Arc<Dispatcher>,
    pub(super) writer: Arc<RetryingWriter>,
    pub(super) cache: Arc<ChangeCache>,
    pub(super) rules: Arc<RuleRegistry>,
    pub(super) stats: Arc<Stats>,
    pub(super) drain_timeout: Duration,
}

impl std::fmt::Debug for Engine {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("poll", &self.poll)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl Engine {
    /// Polls until `shutdown` fires. Does not drain; call
    /// [`Engine::shutdown`] afterwards.
    pub async fn run(
        &mut self,
        shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        self.poll.run(shutdown).await
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.poll.run_cycle().await
    }

    pub fn poll_loop(&self) -> &PollLoop {
        &self.poll
    }

    pub fn rules(&self) -> &Arc<RuleRegistry> {
        &self.rules
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Generation jobs currently running
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Drains generation workers, stops the writer and flushes baselines.
    ///
    /// The cache is flushed even when draining timed out; the drain error is
    /// returned afterwards.
    pub async fn shutdown(self) -> Result<()> {
        let drained = self.dispatcher.shutdown(self.drain_timeout).await;
        if let Err(e) = &drained {
            error!("generation workers did not drain: {}", e);
        }
        self.writer.close();

        self.cache.flush().await?;
        info!(stats = ?self.stats.snapshot(), "engine stopped");
        drained
    }
}
