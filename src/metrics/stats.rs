use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::sync::OnceCell;
use tracing::debug;
use tracing::warn;

use super::COMPLETIONS_TOTAL;
use super::ERRORS_TOTAL;
use super::ROWS_PROCESSED_TOTAL;
use crate::BackoffPolicy;
use crate::CellRef;
use crate::RangeRef;
use crate::Result;
use crate::RetryingWriter;
use crate::STAT_NAMES;

/// Values of the named stats at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub errors: u64,
    pub last_error: String,
    pub successful_completions: u64,
    pub rows_processed: u64,
}

impl StatsSnapshot {
    /// Values in [`STAT_NAMES`] order
    pub fn values(&self) -> [String; 4] {
        [
            self.errors.to_string(),
            self.last_error.clone(),
            self.successful_completions.to_string(),
            self.rows_processed.to_string(),
        ]
    }
}

/// Receives stats publications. Failures are logged by the caller and never
/// reach the pipeline.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StatsSink: Send + Sync + 'static {
    async fn publish(
        &self,
        snapshot: StatsSnapshot,
    ) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct NoopStatsSink;

#[async_trait]
impl StatsSink for NoopStatsSink {
    async fn publish(
        &self,
        _snapshot: StatsSnapshot,
    ) -> Result<()> {
        Ok(())
    }
}

const NAME_COLUMN: usize = 0;
const VALUE_COLUMN: usize = 1;

/// Publishes stats into a dedicated sheet: names in column A, values in
/// column B.
///
/// Before the first publication the sheet is created if missing, columns A
/// and B are cleared and the names are written.
pub struct SheetStatsSink {
    writer: Arc<RetryingWriter>,
    sheet: String,
    policy: BackoffPolicy,
    names_written: OnceCell<()>,
}

impl std::fmt::Debug for SheetStatsSink {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SheetStatsSink").field("sheet", &self.sheet).finish()
    }
}

impl SheetStatsSink {
    pub fn new(
        writer: Arc<RetryingWriter>,
        sheet: impl Into<String>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            writer,
            sheet: sheet.into(),
            policy,
            names_written: OnceCell::new(),
        }
    }

    fn column(
        &self,
        col: usize,
        values: impl IntoIterator<Item = String>,
    ) -> (RangeRef, Vec<Vec<String>>) {
        (
            RangeRef::new(self.sheet.clone(), CellRef::new(0, col)),
            values.into_iter().map(|v| vec![v]).collect(),
        )
    }
}

#[async_trait]
impl StatsSink for SheetStatsSink {
    async fn publish(
        &self,
        snapshot: StatsSnapshot,
    ) -> Result<()> {
        self.names_written
            .get_or_try_init(|| async {
                self.writer
                    .reset_sheet(&self.sheet, NAME_COLUMN, VALUE_COLUMN, self.policy)
                    .await?;
                let (range, names) = self.column(NAME_COLUMN, STAT_NAMES.iter().map(|n| n.to_string()));
                self.writer.write_block(&range, names, self.policy).await
            })
            .await?;

        let (range, values) = self.column(VALUE_COLUMN, snapshot.values());
        self.writer.write_block(&range, values, self.policy).await
    }
}

/// Process-wide stats counters.
///
/// Counters are always mirrored into prometheus. When publication is
/// enabled, every update also hands the latest snapshot to a background
/// publisher; publications coalesce, so the sink always ends with the newest
/// values.
pub struct Stats {
    enabled: AtomicBool,
    errors: AtomicU64,
    last_error: Mutex<String>,
    successful_completions: AtomicU64,
    rows_processed: AtomicU64,
    publisher: watch::Sender<Option<StatsSnapshot>>,
}

impl std::fmt::Debug for Stats {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Stats")
            .field("enabled", &self.is_enabled())
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl Stats {
    /// Must be called within a tokio runtime: spawns the publisher task,
    /// which ends when the returned value is dropped.
    pub fn new(
        sink: Arc<dyn StatsSink>,
        enabled: bool,
    ) -> Self {
        let (publisher, mut updates) = watch::channel(None::<StatsSnapshot>);

        tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let Some(snapshot) = updates.borrow_and_update().clone() else {
                    continue;
                };
                if let Err(e) = sink.publish(snapshot).await {
                    warn!("failed to publish stats: {}", e);
                }
            }
            debug!("stats publisher stopped");
        });

        Self {
            enabled: AtomicBool::new(enabled),
            errors: AtomicU64::new(0),
            last_error: Mutex::new(String::new()),
            successful_completions: AtomicU64::new(0),
            rows_processed: AtomicU64::new(0),
            publisher,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(
        &self,
        enabled: bool,
    ) {
        let was = self.enabled.swap(enabled, Ordering::Relaxed);
        if enabled && !was {
            self.publish();
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            errors: self.errors.load(Ordering::Relaxed),
            last_error: self.last_error.lock().clone(),
            successful_completions: self.successful_completions.load(Ordering::Relaxed),
            rows_processed: self.rows_processed.load(Ordering::Relaxed),
        }
    }

    /// Counts an error raised at `stage` and remembers it as the last error
    pub fn record_error(
        &self,
        stage: &str,
        error: &crate::Error,
    ) {
        ERRORS_TOTAL.with_label_values(&[stage]).inc();
        self.errors.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock() = error.to_string();
        self.publish();
    }

    pub fn record_success(&self) {
        COMPLETIONS_TOTAL.with_label_values(&["success"]).inc();
        self.successful_completions.fetch_add(1, Ordering::Relaxed);
        self.publish();
    }

    pub fn add_rows_processed(
        &self,
        rows: u64,
    ) {
        if rows == 0 {
            return;
        }
        ROWS_PROCESSED_TOTAL.inc_by(rows);
        self.rows_processed.fetch_add(rows, Ordering::Relaxed);
        self.publish();
    }

    fn publish(&self) {
        if self.is_enabled() {
            self.publisher.send_replace(Some(self.snapshot()));
        }
    }
}
