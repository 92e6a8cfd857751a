//! Diagnose report domain models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::diagnose_report;
use crate::error::{AppError, AppResult};

/// Timestamp layout handed to table builders.
pub const WINDOW_TIME_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

/// Report lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Record created, computation not started yet.
    Pending,
    /// Computation in progress.
    Running,
    /// Content stored and progress at 100.
    Completed,
    /// Computation or persistence failed; see `error_message`.
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A closed time range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window from Unix seconds. Both bounds must be positive and ordered.
    pub fn from_unix(start: i64, end: i64, label: &str) -> AppResult<Self> {
        if start <= 0 || end <= 0 {
            return Err(AppError::InvalidInput(format!(
                "{label} bounds must be positive Unix timestamps"
            )));
        }
        if start >= end {
            return Err(AppError::InvalidInput(format!(
                "{label} start must be before its end"
            )));
        }

        let start = DateTime::from_timestamp(start, 0).ok_or_else(|| {
            AppError::InvalidInput(format!("{label} start is out of range"))
        })?;
        let end = DateTime::from_timestamp(end, 0)
            .ok_or_else(|| AppError::InvalidInput(format!("{label} end is out of range")))?;

        Ok(Self { start, end })
    }

    pub fn start_str(&self) -> String {
        self.start.format(WINDOW_TIME_LAYOUT).to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format(WINDOW_TIME_LAYOUT).to_string()
    }
}

/// Analysis windows of a report. The comparison mode is fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindows {
    /// Primary analysis window.
    pub primary: TimeWindow,
    /// Baseline window contrasted against the primary one.
    pub compare: Option<TimeWindow>,
}

impl ReportWindows {
    pub fn single(primary: TimeWindow) -> Self {
        Self {
            primary,
            compare: None,
        }
    }

    pub fn comparison(primary: TimeWindow, compare: TimeWindow) -> Self {
        Self {
            primary,
            compare: Some(compare),
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.compare.is_some()
    }
}

/// A persisted report job.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnoseReport {
    pub id: Uuid,
    pub windows: ReportWindows,
    pub progress: i32,
    pub status: ReportStatus,
    pub error_message: Option<String>,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiagnoseReport {
    /// Content is only exposed once the job reached 100%.
    pub fn finished_content(&self) -> Option<&str> {
        match self.status {
            ReportStatus::Completed if self.progress >= 100 => self.content.as_deref(),
            _ => None,
        }
    }
}

impl From<diagnose_report::Model> for DiagnoseReport {
    fn from(model: diagnose_report::Model) -> Self {
        let primary = TimeWindow {
            start: model.start_time,
            end: model.end_time,
        };
        let windows = match (model.compare_start_time, model.compare_end_time) {
            (Some(start), Some(end)) => ReportWindows::comparison(primary, TimeWindow { start, end }),
            _ => ReportWindows::single(primary),
        };

        Self {
            id: model.id,
            windows,
            progress: model.progress,
            status: ReportStatus::parse(&model.status).unwrap_or(ReportStatus::Pending),
            error_message: model.error_message,
            content: model.content,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Request to generate a diagnose report.
///
/// Timestamps are Unix seconds. Comparison mode is selected only when both
/// compare fields are present and non-zero; a single compare field is ignored.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GenerateReportRequest {
    pub start_time: i64,
    pub end_time: i64,
    #[serde(default)]
    pub compare_start_time: Option<i64>,
    #[serde(default)]
    pub compare_end_time: Option<i64>,
}

impl GenerateReportRequest {
    /// Validate the request and resolve its analysis windows.
    pub fn into_windows(self) -> AppResult<ReportWindows> {
        let primary = TimeWindow::from_unix(self.start_time, self.end_time, "report window")?;

        let compare_start = self.compare_start_time.filter(|t| *t != 0);
        let compare_end = self.compare_end_time.filter(|t| *t != 0);

        match (compare_start, compare_end) {
            (Some(start), Some(end)) => Ok(ReportWindows::comparison(
                primary,
                TimeWindow::from_unix(start, end, "compare window")?,
            )),
            _ => Ok(ReportWindows::single(primary)),
        }
    }
}

/// Response after a report job was created.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateReportResponse {
    /// Report UUID (UUIDv7, time-ordered).
    pub report_id: Uuid,
}

/// Report summary for the history list. Never carries content.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReportSummary {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_end_time: Option<DateTime<Utc>>,
    pub progress: i32,
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Current snapshot of a report job.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReportStatusResponse {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_end_time: Option<DateTime<Utc>>,
    /// Percentage in [0, 100]; 100 only once content is available.
    pub progress: i32,
    pub status: ReportStatus,
    /// Failure reason when `status` is `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// True when content can be fetched from `data.js`.
    pub has_content: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&DiagnoseReport> for ReportStatusResponse {
    fn from(report: &DiagnoseReport) -> Self {
        Self {
            id: report.id,
            start_time: report.windows.primary.start,
            end_time: report.windows.primary.end,
            compare_start_time: report.windows.compare.map(|w| w.start),
            compare_end_time: report.windows.compare.map(|w| w.end),
            progress: report.progress,
            status: report.status,
            error_message: report.error_message.clone(),
            has_content: report.finished_content().is_some(),
            created_at: report.created_at,
            updated_at: report.updated_at,
        }
    }
}
