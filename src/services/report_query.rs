//! Read side of diagnose reports: history, status, and content delivery.

use std::sync::Arc;

use uuid::Uuid;

use super::report_store::ReportStore;
use crate::error::{AppError, AppResult};
use crate::models::{DiagnoseReport, ReportSummary};

/// Global the report viewer reads its tables from.
pub const DATA_SCRIPT_GLOBAL: &str = "window.__diagnosis_data__";

/// Lookups over the report store.
#[derive(Clone)]
pub struct ReportQueryService {
    store: Arc<dyn ReportStore>,
}

impl ReportQueryService {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    /// Report history, newest first.
    pub async fn list_reports(&self) -> AppResult<Vec<ReportSummary>> {
        self.store.list_reports().await
    }

    /// Current record of a report. IDs that do not parse are treated as unknown.
    pub async fn get_status(&self, id: &str) -> AppResult<DiagnoseReport> {
        let not_found = || AppError::NotFound(format!("Report {}", id));
        let report_id = Uuid::parse_str(id).map_err(|_| not_found())?;

        self.store.get_report(report_id).await?.ok_or_else(not_found)
    }

    /// Serialized tables of a completed report; `None` while unfinished or failed.
    pub async fn get_content(&self, id: &str) -> AppResult<Option<String>> {
        let report = self.get_status(id).await?;
        Ok(report.finished_content().map(str::to_string))
    }

    /// JavaScript assigning the report content to the viewer global.
    ///
    /// Unfinished reports render `null` so the viewer can tell "not ready" apart
    /// from an empty table set.
    pub async fn render_data_script(&self, id: &str) -> AppResult<String> {
        let content = self.get_content(id).await?;
        Ok(format!(
            "{} = {};",
            DATA_SCRIPT_GLOBAL,
            content.as_deref().unwrap_or("null")
        ))
    }
}
