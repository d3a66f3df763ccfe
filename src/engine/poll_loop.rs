use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::metrics::POLL_CYCLES_TOTAL;
use crate::metrics::POLL_CYCLE_DURATION;
use crate::metrics::TRIGGERS_TOTAL;
use crate::CellLockRegistry;
use crate::ChangeCache;
use crate::DataSource;
use crate::DispatchError;
use crate::Dispatcher;
use crate::Error;
use crate::GenerationJob;
use crate::PollConfig;
use crate::RateLimitConfig;
use crate::Result;
use crate::RuleEvaluator;
use crate::RuleRegistry;
use crate::SettingsSource;
use crate::SharedRateLimiter;
use crate::SheetSettings;
use crate::Stats;
use crate::TableSnapshot;
use crate::TriggerReason;
use crate::Tunables;

/// What one poll cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub rows: usize,
    /// Baselines stored by a cold-start seed; the trigger pass is skipped
    /// when this cycle seeded
    pub seeded: Option<usize>,
    pub column_check: bool,
    pub triggers: usize,
    pub dispatched: usize,
}

/// Values currently in force, from configuration overlaid with the last
/// successfully loaded rule-sheet tunables.
#[derive(Debug, Clone)]
struct Effective {
    sheet_name: String,
    refresh_interval: Duration,
    column_check_interval: Duration,
}

/// Shared handles the poll loop drives
pub struct PollDeps {
    pub source: Arc<dyn DataSource>,
    pub settings: Arc<dyn SettingsSource>,
    pub cache: Arc<ChangeCache>,
    pub rules: Arc<RuleRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub source_limiter: Arc<SharedRateLimiter>,
    pub completion_limiter: Arc<SharedRateLimiter>,
    pub locks: Arc<CellLockRegistry>,
    pub stats: Arc<Stats>,
}

/// Single driver of the engine.
///
/// Each cycle runs `reload rules if due -> fetch table -> (cold start: seed
/// baselines and stop) -> evaluate rows -> dispatch triggered jobs`. A
/// failing step aborts its cycle only; the loop itself never gives up.
pub struct PollLoop {
    deps: PollDeps,
    evaluator: RuleEvaluator,
    poll_config: PollConfig,
    rate_config: RateLimitConfig,
    default_sheet: String,
    effective: Effective,
    cold: bool,
    last_reload: Option<Instant>,
    last_column_check: Option<Instant>,
}

impl std::fmt::Debug for PollLoop {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PollLoop")
            .field("effective", &self.effective)
            .field("cold", &self.cold)
            .finish()
    }
}

impl PollLoop {
    pub fn new(
        deps: PollDeps,
        poll_config: PollConfig,
        rate_config: RateLimitConfig,
        default_sheet: impl Into<String>,
    ) -> Self {
        let default_sheet = default_sheet.into();
        let effective = Effective {
            sheet_name: default_sheet.clone(),
            refresh_interval: poll_config.refresh_interval(),
            column_check_interval: poll_config.column_check_interval(),
        };
        Self {
            evaluator: RuleEvaluator::new(deps.cache.clone()),
            deps,
            poll_config,
            rate_config,
            default_sheet,
            effective,
            cold: true,
            last_reload: None,
            last_column_check: None,
        }
    }

    pub fn sheet_name(&self) -> &str {
        &self.effective.sheet_name
    }

    pub fn refresh_interval(&self) -> Duration {
        self.effective.refresh_interval
    }

    pub fn column_check_interval(&self) -> Duration {
        self.effective.column_check_interval
    }

    /// Fetches and applies the rule-definition table.
    ///
    /// On failure the current rules and tunables stay in force.
    pub async fn reload_settings(&mut self) -> Result<()> {
        self.last_reload = Some(Instant::now());

        self.deps.source_limiter.wait().await?;
        let table = self.deps.settings.fetch_settings().await?;
        let SheetSettings { tunables, rules } = SheetSettings::parse(&table);

        self.apply(&tunables);
        info!(rules = rules.len(), "rule set loaded");
        self.deps.rules.replace(rules);
        Ok(())
    }

    fn apply(
        &mut self,
        tunables: &Tunables,
    ) {
        let next = Effective {
            sheet_name: tunables.sheet_name.clone().unwrap_or_else(|| self.default_sheet.clone()),
            refresh_interval: tunables
                .refresh_interval
                .unwrap_or_else(|| self.poll_config.refresh_interval()),
            column_check_interval: tunables
                .column_check_interval
                .unwrap_or_else(|| self.poll_config.column_check_interval()),
        };
        if next.sheet_name != self.effective.sheet_name {
            info!(from = %self.effective.sheet_name, to = %next.sheet_name, "polled sheet changed");
        }
        self.effective = next;

        let source_quota = tunables.source_quota.unwrap_or(self.rate_config.source);
        if self.deps.source_limiter.reconfigure(source_quota) {
            info!(?source_quota, "source rate limit updated");
        }
        let completion_quota = tunables.completion_quota.unwrap_or(self.rate_config.completion);
        if self.deps.completion_limiter.reconfigure(completion_quota) {
            info!(?completion_quota, "completion rate limit updated");
        }

        self.deps.stats.set_enabled(tunables.stats_enabled);
        for (key, value) in &tunables.extras {
            debug!(key, value, "unrecognised setting kept");
        }
    }

    async fn reload_if_due(&mut self) {
        let due = self
            .last_reload
            .map_or(true, |at| at.elapsed() >= self.poll_config.settings_reload_interval());
        if !due {
            return;
        }
        if let Err(e) = self.reload_settings().await {
            warn!("rule reload failed, keeping current rules: {}", e);
            self.deps.stats.record_error("settings", &e);
        }
    }

    fn column_check_due(&mut self) -> bool {
        let due = self
            .last_column_check
            .map_or(true, |at| at.elapsed() >= self.effective.column_check_interval);
        if due {
            self.last_column_check = Some(Instant::now());
        }
        due
    }

    /// Runs one full cycle.
    ///
    /// # Errors
    /// Fetch failures abort the cycle and are returned after being counted.
    /// [`DispatchError::ShuttingDown`] is returned when the dispatcher stops
    /// admitting jobs mid-cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let started = Instant::now();
        let result = self.cycle().await;

        POLL_CYCLE_DURATION.observe(started.elapsed().as_millis() as f64);
        let outcome = match &result {
            Ok(report) if report.seeded.is_some() => "seeded",
            Ok(_) => "ok",
            Err(_) => "failed",
        };
        POLL_CYCLES_TOTAL.with_label_values(&[outcome]).inc();
        result
    }

    async fn cycle(&mut self) -> Result<CycleReport> {
        self.reload_if_due().await;

        let sheet = self.effective.sheet_name.clone();
        let table = match self.fetch(&sheet).await {
            Ok(table) => table,
            Err(e) => {
                warn!(sheet = %sheet, "table fetch failed, skipping cycle: {}", e);
                self.deps.stats.record_error("fetch", &e);
                return Err(e);
            }
        };
        let snapshot = TableSnapshot::from_table(&table);
        let mut report = CycleReport {
            rows: snapshot.rows.len(),
            ..Default::default()
        };

        if self.cold {
            self.cold = false;
            if self.poll_config.seed_on_cold_start {
                let seeded = self.seed(&snapshot).await;
                info!(rows = report.rows, seeded, "cold start, baselines seeded");
                report.seeded = Some(seeded);
                return Ok(report);
            }
        }

        report.column_check = self.column_check_due();
        let rules = self.deps.rules.load();

        for row in &snapshot.rows {
            let triggers = self.evaluator.evaluate(row, &rules, report.column_check).await;
            for trigger in triggers {
                report.triggers += 1;
                let reason = match trigger.reason {
                    TriggerReason::Changed => "changed",
                    TriggerReason::MissingDestination => "missing_destination",
                };
                TRIGGERS_TOTAL.with_label_values(&[reason]).inc();

                let Some(job) = GenerationJob::new(sheet.clone(), row.clone(), trigger) else {
                    continue;
                };
                match self.deps.dispatcher.submit(job).await {
                    Ok(()) => report.dispatched += 1,
                    Err(Error::Dispatch(DispatchError::ShuttingDown)) => {
                        info!("dispatcher closed, ending cycle early");
                        return Err(DispatchError::ShuttingDown.into());
                    }
                    Err(e) => {
                        error!(row = row.row_index(), "job submission failed: {}", e);
                        self.deps.stats.record_error("dispatch", &e);
                    }
                }
            }
        }

        self.deps.stats.add_rows_processed(report.rows as u64);
        let pruned = self.deps.locks.prune();
        debug!(
            rows = report.rows,
            triggers = report.triggers,
            dispatched = report.dispatched,
            pruned,
            column_check = report.column_check,
            "poll cycle complete"
        );
        Ok(report)
    }

    async fn fetch(
        &self,
        sheet: &str,
    ) -> Result<crate::Table> {
        self.deps.source_limiter.wait().await?;
        self.deps.source.get_table(sheet).await
    }

    /// Stores a baseline for every named cell that has none
    async fn seed(
        &self,
        snapshot: &TableSnapshot,
    ) -> usize {
        let mut seeded = 0;
        for row in &snapshot.rows {
            for (column, value) in row.fields() {
                match self.deps.cache.seed(row.row_index(), column, value).await {
                    Ok(true) => seeded += 1,
                    Ok(false) => {}
                    Err(e) => warn!(row = row.row_index(), column, "failed to seed baseline: {}", e),
                }
            }
        }
        seeded
    }

    /// Runs cycles until `shutdown` fires, sleeping the effective refresh
    /// interval between them.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        info!(sheet = %self.effective.sheet_name, "poll loop started");
        loop {
            match self.run_cycle().await {
                Ok(_) => {}
                Err(Error::Dispatch(DispatchError::ShuttingDown)) => break,
                // already logged and counted
                Err(_) => {}
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    info!("shutdown signal received, poll loop stopping");
                    break;
                }
                _ = tokio::time::sleep(self.effective.refresh_interval) => {}
            }
        }
        Ok(())
    }
}
