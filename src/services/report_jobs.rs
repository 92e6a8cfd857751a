//! Report job lifecycle: creation, background computation, and failure capture.
//!
//! A generate request first reserves a [`JobSlot`], then borrows a target
//! connection, creates the record synchronously and hands the window values and
//! the connection to a spawned task. The task owns the slot and the connection
//! from then on and closes the connection exactly once. Every failure is
//! persisted as a `failed` status with a reason instead of being dropped.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use futures_util::FutureExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::report_store::ReportStore;
use super::tables::{ComputationError, TableBuilder};
use super::target::TargetConnection;
use crate::error::{AppError, AppResult};
use crate::models::{ReportWindows, TableDef};

/// Highest progress a computation may report; 100 is reserved for completion.
pub const MAX_INTERMEDIATE_PROGRESS: i32 = 99;

/// Reason recorded for jobs cut short by a server restart.
pub const INTERRUPTED_REASON: &str = "Report generation was interrupted by a server restart";

/// Persists intermediate progress for one report.
///
/// Values are clamped to `[last reported, 99]`. Write failures are logged and
/// never abort the computation.
pub struct ProgressReporter {
    store: Arc<dyn ReportStore>,
    report_id: Uuid,
    last: AtomicI32,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn ReportStore>, report_id: Uuid) -> Self {
        Self {
            store,
            report_id,
            last: AtomicI32::new(0),
        }
    }

    pub async fn report(&self, progress: i32) {
        let progress = progress.clamp(0, MAX_INTERMEDIATE_PROGRESS);
        let previous = self.last.fetch_max(progress, Ordering::SeqCst);
        if progress <= previous {
            return;
        }

        if let Err(e) = self.store.update_progress(self.report_id, progress).await {
            warn!(
                report_id = %self.report_id,
                progress,
                error = %e,
                "Failed to persist report progress"
            );
        }
    }

    pub fn last_reported(&self) -> i32 {
        self.last.load(Ordering::SeqCst)
    }
}

/// Why a background job ended in `failed`.
#[derive(Debug, thiserror::Error)]
pub enum JobFailure {
    #[error("Report computation failed: {0}")]
    Computation(#[from] ComputationError),

    #[error("Report computation panicked: {0}")]
    Panicked(String),

    #[error("Failed to serialize report tables: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to persist report: {0}")]
    Persistence(#[source] AppError),
}

/// Final state of a background job, as seen by whoever awaits its handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed(String),
}

/// One of the manager's concurrency slots, held from before the target
/// connection is opened until the job finishes.
#[derive(Debug)]
pub struct JobSlot(OwnedSemaphorePermit);

/// Creates report jobs and runs their computation in the background.
#[derive(Clone)]
pub struct ReportJobManager {
    store: Arc<dyn ReportStore>,
    builder: Arc<dyn TableBuilder>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl ReportJobManager {
    /// `max_concurrent` bounds how many jobs, and so how many target
    /// connections, may be in flight at once.
    pub fn new(
        store: Arc<dyn ReportStore>,
        builder: Arc<dyn TableBuilder>,
        max_concurrent: usize,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            store,
            builder,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Claim a free slot without waiting.
    ///
    /// Fails with [`AppError::TooManyReports`] when every slot is taken. Call
    /// this before opening a target connection.
    pub fn try_reserve(&self) -> AppResult<JobSlot> {
        self.permits
            .clone()
            .try_acquire_owned()
            .map(JobSlot)
            .map_err(|_| {
                warn!(
                    max_concurrent = self.max_concurrent,
                    "Report rejected: every report slot is taken"
                );
                AppError::TooManyReports(format!(
                    "all {} report slots are taken",
                    self.max_concurrent
                ))
            })
    }

    /// Insert a `pending` record and return its ID.
    pub async fn create(&self, windows: ReportWindows) -> AppResult<Uuid> {
        // UUIDv7 for time-ordered report IDs
        let report_id = Uuid::now_v7();
        self.store.insert_report(report_id, windows).await?;

        info!(
            report_id = %report_id,
            start = %windows.primary.start,
            end = %windows.primary.end,
            comparison = windows.is_comparison(),
            "Report job created"
        );

        Ok(report_id)
    }

    /// Spawn the computation of an existing report.
    ///
    /// Takes ownership of `slot` and `connection`. The slot is freed when the
    /// task ends. The returned handle may be dropped; the task keeps running and
    /// records its outcome in the store.
    pub fn run_async(
        &self,
        slot: JobSlot,
        report_id: Uuid,
        windows: ReportWindows,
        connection: Box<dyn TargetConnection>,
    ) -> JoinHandle<JobOutcome> {
        let manager = self.clone();
        tokio::spawn(async move {
            let outcome = manager.run(report_id, windows, connection).await;
            drop(slot);
            outcome
        })
    }

    /// Create a report and start computing it.
    ///
    /// The connection is closed and the slot freed here if the record cannot be
    /// created.
    pub async fn generate(
        &self,
        slot: JobSlot,
        windows: ReportWindows,
        connection: Box<dyn TargetConnection>,
    ) -> AppResult<(Uuid, JoinHandle<JobOutcome>)> {
        match self.create(windows).await {
            Ok(report_id) => Ok((
                report_id,
                self.run_async(slot, report_id, windows, connection),
            )),
            Err(e) => {
                release_connection(None, connection).await;
                Err(e)
            }
        }
    }

    /// Fail jobs left unfinished by a previous process.
    pub async fn recover_interrupted(&self) -> AppResult<u64> {
        let count = self.store.fail_unfinished(INTERRUPTED_REASON).await?;
        if count > 0 {
            warn!(count, "Marked interrupted report jobs as failed");
        }
        Ok(count)
    }

    /// Jobs currently holding a slot.
    pub fn running_jobs(&self) -> usize {
        self.max_concurrent
            .saturating_sub(self.permits.available_permits())
    }

    async fn run(
        &self,
        report_id: Uuid,
        windows: ReportWindows,
        connection: Box<dyn TargetConnection>,
    ) -> JobOutcome {
        match self.execute(report_id, windows, connection).await {
            Ok(()) => {
                info!(report_id = %report_id, "Report job completed");
                JobOutcome::Completed
            }
            Err(failure) => {
                let reason = failure.to_string();
                error!(report_id = %report_id, error = %reason, "Report job failed");

                if let Err(e) = self.store.mark_failed(report_id, &reason).await {
                    error!(
                        report_id = %report_id,
                        error = %e,
                        "Failed to record report failure; it will be failed at next startup"
                    );
                }

                JobOutcome::Failed(reason)
            }
        }
    }

    /// Content is written before progress reaches 100.
    async fn execute(
        &self,
        report_id: Uuid,
        windows: ReportWindows,
        connection: Box<dyn TargetConnection>,
    ) -> Result<(), JobFailure> {
        let tables = self.compute(report_id, windows, connection).await?;
        let content = serde_json::to_string(&tables)?;

        self.store
            .set_content(report_id, content)
            .await
            .map_err(JobFailure::Persistence)?;
        self.store
            .mark_completed(report_id)
            .await
            .map_err(JobFailure::Persistence)?;

        Ok(())
    }

    /// Run the builder. The connection is released before this returns, on every path.
    async fn compute(
        &self,
        report_id: Uuid,
        windows: ReportWindows,
        connection: Box<dyn TargetConnection>,
    ) -> Result<Vec<TableDef>, JobFailure> {
        if let Err(e) = self.store.mark_running(report_id).await {
            release_connection(Some(report_id), connection).await;
            return Err(JobFailure::Persistence(e));
        }

        let progress = ProgressReporter::new(self.store.clone(), report_id);
        let outcome = AssertUnwindSafe(self.build(windows, &*connection, &progress))
            .catch_unwind()
            .await;

        release_connection(Some(report_id), connection).await;

        match outcome {
            Ok(tables) => Ok(tables?),
            Err(panic) => Err(JobFailure::Panicked(panic_message(panic))),
        }
    }

    async fn build(
        &self,
        windows: ReportWindows,
        conn: &dyn TargetConnection,
        progress: &ProgressReporter,
    ) -> Result<Vec<TableDef>, ComputationError> {
        match windows.compare {
            None => self.builder.build_tables(windows.primary, conn, progress).await,
            Some(baseline) => {
                self.builder
                    .build_compare_tables(baseline, windows.primary, conn, progress)
                    .await
            }
        }
    }
}

async fn release_connection(report_id: Option<Uuid>, connection: Box<dyn TargetConnection>) {
    if let Err(e) = connection.close().await {
        warn!(report_id = ?report_id, error = %e, "Failed to close monitored database connection");
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
