//! Database queries for diagnose reports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, FromQueryResult, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::entity::diagnose_report::{self as report, ActiveModel, Entity as Report};
use crate::error::{AppError, AppResult};
use crate::models::{DiagnoseReport, ReportStatus, ReportSummary, ReportWindows};
use crate::services::ReportStore;

use super::DbPool;

/// Statuses that still accept writes.
fn unfinished() -> [&'static str; 2] {
    [
        ReportStatus::Pending.as_str(),
        ReportStatus::Running.as_str(),
    ]
}

/// Summary projection; content is never loaded for listings.
#[derive(Debug, FromQueryResult)]
struct SummaryRow {
    id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    compare_start_time: Option<DateTime<Utc>>,
    compare_end_time: Option<DateTime<Utc>>,
    progress: i32,
    status: String,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<SummaryRow> for ReportSummary {
    fn from(row: SummaryRow) -> Self {
        let (compare_start_time, compare_end_time) =
            match (row.compare_start_time, row.compare_end_time) {
                (Some(start), Some(end)) => (Some(start), Some(end)),
                _ => (None, None),
            };

        ReportSummary {
            id: row.id,
            start_time: row.start_time,
            end_time: row.end_time,
            compare_start_time,
            compare_end_time,
            progress: row.progress,
            status: ReportStatus::parse(&row.status).unwrap_or(ReportStatus::Pending),
            error_message: row.error_message,
            created_at: row.created_at,
        }
    }
}

impl DbPool {
    /// Explain why a guarded update touched no row.
    async fn rejected_update(&self, id: Uuid, action: &str) -> AppError {
        match self.get_report(id).await {
            Ok(Some(existing)) => AppError::Conflict(format!(
                "Report {} is {} (progress {}, content {}); cannot {}",
                id,
                existing.status,
                existing.progress,
                if existing.content.is_some() { "set" } else { "unset" },
                action
            )),
            Ok(None) => AppError::NotFound(format!("Report {}", id)),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl ReportStore for DbPool {
    async fn insert_report(&self, id: Uuid, windows: ReportWindows) -> AppResult<DiagnoseReport> {
        let now = Utc::now();

        let model = ActiveModel {
            id: Set(id),
            start_time: Set(windows.primary.start),
            end_time: Set(windows.primary.end),
            compare_start_time: Set(windows.compare.map(|w| w.start)),
            compare_end_time: Set(windows.compare.map(|w| w.end)),
            progress: Set(0),
            status: Set(ReportStatus::Pending.as_str().to_string()),
            error_message: Set(None),
            content: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert report: {}", e)))?;

        Ok(result.into())
    }

    async fn get_report(&self, id: Uuid) -> AppResult<Option<DiagnoseReport>> {
        let result = Report::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get report: {}", e)))?;

        Ok(result.map(DiagnoseReport::from))
    }

    async fn list_reports(&self) -> AppResult<Vec<ReportSummary>> {
        let rows = Report::find()
            .select_only()
            .columns([
                report::Column::Id,
                report::Column::StartTime,
                report::Column::EndTime,
                report::Column::CompareStartTime,
                report::Column::CompareEndTime,
                report::Column::Progress,
                report::Column::Status,
                report::Column::ErrorMessage,
                report::Column::CreatedAt,
            ])
            .order_by_desc(report::Column::CreatedAt)
            .order_by_desc(report::Column::Id) // UUIDv7 breaks created_at ties
            .into_model::<SummaryRow>()
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list reports: {}", e)))?;

        Ok(rows.into_iter().map(ReportSummary::from).collect())
    }

    async fn mark_running(&self, id: Uuid) -> AppResult<()> {
        let result = Report::update_many()
            .col_expr(
                report::Column::Status,
                Expr::value(ReportStatus::Running.as_str()),
            )
            .col_expr(report::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(report::Column::Id.eq(id))
            .filter(report::Column::Status.eq(ReportStatus::Pending.as_str()))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to mark report running: {}", e)))?;

        if result.rows_affected == 0 {
            return Err(self.rejected_update(id, "start computation").await);
        }

        Ok(())
    }

    async fn update_progress(&self, id: Uuid, progress: i32) -> AppResult<()> {
        Report::update_many()
            .col_expr(report::Column::Progress, Expr::value(progress))
            .col_expr(report::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(report::Column::Id.eq(id))
            .filter(report::Column::Progress.lt(progress))
            .filter(report::Column::Status.is_in(unfinished()))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update report progress: {}", e)))?;

        Ok(())
    }

    async fn set_content(&self, id: Uuid, content: String) -> AppResult<()> {
        let result = Report::update_many()
            .col_expr(report::Column::Content, Expr::value(content))
            .col_expr(report::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(report::Column::Id.eq(id))
            .filter(report::Column::Content.is_null())
            .filter(report::Column::Status.is_in(unfinished()))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to save report content: {}", e)))?;

        if result.rows_affected == 0 {
            return Err(self.rejected_update(id, "store content").await);
        }

        Ok(())
    }

    async fn mark_completed(&self, id: Uuid) -> AppResult<()> {
        let result = Report::update_many()
            .col_expr(report::Column::Progress, Expr::value(100))
            .col_expr(
                report::Column::Status,
                Expr::value(ReportStatus::Completed.as_str()),
            )
            .col_expr(report::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(report::Column::Id.eq(id))
            .filter(report::Column::Content.is_not_null())
            .filter(report::Column::Status.is_in(unfinished()))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to complete report: {}", e)))?;

        if result.rows_affected == 0 {
            return Err(self.rejected_update(id, "mark completed").await);
        }

        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> AppResult<()> {
        let result = Report::update_many()
            .col_expr(
                report::Column::Status,
                Expr::value(ReportStatus::Failed.as_str()),
            )
            .col_expr(report::Column::ErrorMessage, Expr::value(reason))
            .col_expr(report::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(report::Column::Id.eq(id))
            .filter(report::Column::Status.is_in(unfinished()))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to mark report failed: {}", e)))?;

        if result.rows_affected == 0 {
            return Err(self.rejected_update(id, "mark failed").await);
        }

        Ok(())
    }

    async fn fail_unfinished(&self, reason: &str) -> AppResult<u64> {
        let result = Report::update_many()
            .col_expr(
                report::Column::Status,
                Expr::value(ReportStatus::Failed.as_str()),
            )
            .col_expr(report::Column::ErrorMessage, Expr::value(reason))
            .col_expr(report::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(report::Column::Status.is_in(unfinished()))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to fail unfinished reports: {}", e)))?;

        Ok(result.rows_affected)
    }
}
