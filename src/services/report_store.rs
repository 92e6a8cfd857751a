//! Persistence seam for report jobs.
//!
//! The job manager and query service only talk to this trait. `DbPool`
//! implements it on SeaORM; tests substitute an in-memory store.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{DiagnoseReport, ReportSummary, ReportWindows};

/// Durable storage of report jobs, keyed by report ID.
///
/// Implementations provide per-record atomicity. Every mutation is guarded so
/// that terminal records (`completed`, `failed`) are never rewritten.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Insert a new `pending` record with progress 0 and no content.
    async fn insert_report(&self, id: Uuid, windows: ReportWindows) -> AppResult<DiagnoseReport>;

    async fn get_report(&self, id: Uuid) -> AppResult<Option<DiagnoseReport>>;

    /// All reports, newest first, without content.
    async fn list_reports(&self) -> AppResult<Vec<ReportSummary>>;

    /// `pending` -> `running`.
    async fn mark_running(&self, id: Uuid) -> AppResult<()>;

    /// Raise progress of an unfinished job. Lower or equal values are ignored.
    async fn update_progress(&self, id: Uuid, progress: i32) -> AppResult<()>;

    /// Store the serialized content. Fails with `Conflict` if content was already set.
    async fn set_content(&self, id: Uuid, content: String) -> AppResult<()>;

    /// Set progress to 100 and status to `completed`. Requires stored content.
    async fn mark_completed(&self, id: Uuid) -> AppResult<()>;

    /// Move an unfinished job to `failed` with a reason.
    async fn mark_failed(&self, id: Uuid, reason: &str) -> AppResult<()>;

    /// Fail every `pending`/`running` job. Returns how many were affected.
    async fn fail_unfinished(&self, reason: &str) -> AppResult<u64>;
}
