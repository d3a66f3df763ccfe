//! Assembles an [`Engine`] from configuration.
//!
//! Every external collaborator (data source, rule-definition source,
//! completion service, cache store, stats sink) defaults to its production
//! implementation and can be replaced before [`EngineBuilder::build`]:
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let mut engine = EngineBuilder::new(config)
//!     .start_metrics_server(shutdown_tx.subscribe())
//!     .build()
//!     .await?;
//! engine.run(shutdown_rx).await?;
//! engine.shutdown().await?;
//! ```
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use super::Engine;
use super::PollDeps;
use super::PollLoop;
use crate::metrics;
use crate::CacheStore;
use crate::CellLockRegistry;
use crate::ChangeCache;
use crate::CompletionService;
use crate::CrosstabConfig;
use crate::DataSource;
use crate::Dispatcher;
use crate::Error;
use crate::LimitedService;
use crate::OpenAiClient;
use crate::Result;
use crate::RetryingWriter;
use crate::RuleRegistry;
use crate::RuleSet;
use crate::SettingsSource;
use crate::SharedRateLimiter;
use crate::SheetStatsSink;
use crate::SheetsClient;
use crate::SledCacheStore;
use crate::Stats;
use crate::StatsSink;

pub struct EngineBuilder {
    config: CrosstabConfig,
    data_source: Option<Arc<dyn DataSource>>,
    settings_source: Option<Arc<dyn SettingsSource>>,
    completion: Option<Arc<dyn CompletionService>>,
    cache_store: Option<Arc<dyn CacheStore>>,
    stats_sink: Option<Arc<dyn StatsSink>>,
}

impl EngineBuilder {
    /// `config` is expected to be validated already
    pub fn new(config: CrosstabConfig) -> Self {
        Self {
            config,
            data_source: None,
            settings_source: None,
            completion: None,
            cache_store: None,
            stats_sink: None,
        }
    }

    pub fn data_source(
        mut self,
        data_source: Arc<dyn DataSource>,
    ) -> Self {
        self.data_source = Some(data_source);
        self
    }

    pub fn settings_source(
        mut self,
        settings_source: Arc<dyn SettingsSource>,
    ) -> Self {
        self.settings_source = Some(settings_source);
        self
    }

    pub fn completion(
        mut self,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn cache_store(
        mut self,
        cache_store: Arc<dyn CacheStore>,
    ) -> Self {
        self.cache_store = Some(cache_store);
        self
    }

    pub fn stats_sink(
        mut self,
        stats_sink: Arc<dyn StatsSink>,
    ) -> Self {
        self.stats_sink = Some(stats_sink);
        self
    }

    /// Spawns the `/metrics` endpoint when enabled in the monitoring config
    pub fn start_metrics_server(
        self,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        let monitoring = &self.config.monitoring;
        if monitoring.prometheus_enabled {
            let port = monitoring.prometheus_port;
            info!("starting metrics server on port {}", port);
            tokio::spawn(metrics::start_server(port, shutdown_signal));
        }
        self
    }

    /// Wires every component and loads the rule set once.
    ///
    /// # Errors
    /// Client construction, cache opening or the initial rule load failing
    /// are fatal: the engine never starts polling.
    pub async fn build(self) -> Result<Engine> {
        let config = self.config;

        let (data_source, settings_source) = match (self.data_source, self.settings_source) {
            (Some(d), Some(s)) => (d, s),
            (d, s) => {
                let sheets = Arc::new(SheetsClient::new(&config.source)?);
                (
                    d.unwrap_or_else(|| sheets.clone() as Arc<dyn DataSource>),
                    s.unwrap_or_else(|| sheets as Arc<dyn SettingsSource>),
                )
            }
        };
        let completion: Arc<dyn CompletionService> = match self.completion {
            Some(c) => c,
            None => Arc::new(OpenAiClient::new(&config.completion)?),
        };
        let cache_store: Arc<dyn CacheStore> = match self.cache_store {
            Some(s) => s,
            None => Arc::new(SledCacheStore::open(&config.cache.db_path)?),
        };

        let max_wait = config.rate_limit.max_wait();
        let source_limiter = Arc::new(SharedRateLimiter::new(
            LimitedService::Source,
            config.rate_limit.source,
            max_wait,
        ));
        let completion_limiter = Arc::new(SharedRateLimiter::new(
            LimitedService::Completion,
            config.rate_limit.completion,
            max_wait,
        ));

        let locks = Arc::new(CellLockRegistry::new());
        let writer = Arc::new(RetryingWriter::new(
            data_source.clone(),
            source_limiter.clone(),
            locks.clone(),
            config.dispatch.write_pool_size,
            config.retry.write,
        ));

        let stats_sink: Arc<dyn StatsSink> = match self.stats_sink {
            Some(s) => s,
            None => Arc::new(SheetStatsSink::new(
                writer.clone(),
                config.source.stats_sheet.clone(),
                config.retry.stats,
            )),
        };
        // enabled by the STATS setting on the first rule load
        let stats = Arc::new(Stats::new(stats_sink, false));

        let dispatcher = Arc::new(Dispatcher::new(
            config.dispatch.generation_pool_size,
            writer.clone(),
            completion,
            completion_limiter.clone(),
            stats.clone(),
            config.completion.request_timeout(),
        ));

        let cache = Arc::new(ChangeCache::new(cache_store, config.cache.key_prefix.clone()));
        let rules = Arc::new(RuleRegistry::new(RuleSet::default()));

        let mut poll = PollLoop::new(
            PollDeps {
                source: data_source,
                settings: settings_source,
                cache: cache.clone(),
                rules: rules.clone(),
                dispatcher: dispatcher.clone(),
                source_limiter,
                completion_limiter,
                locks,
                stats: stats.clone(),
            },
            config.poll.clone(),
            config.rate_limit.clone(),
            config.source.sheet_name.clone(),
        );

        poll.reload_settings()
            .await
            .map_err(|e| Error::Fatal(format!("initial rule load failed: {e}")))?;

        info!(sheet = %poll.sheet_name(), rules = rules.load().len(), "engine ready");
        Ok(Engine {
            poll,
            dispatcher,
            writer,
            cache,
            rules,
            stats,
            drain_timeout: config.dispatch.drain_timeout(),
        })
    }
}
