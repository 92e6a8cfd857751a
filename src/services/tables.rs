//! Report table computation seam.
//!
//! Metric tables are produced by a [`TableBuilder`]. The shipped
//! [`SummaryTableBuilder`] emits the time-range header tables the viewer
//! always renders; metric-specific builders plug in behind the same trait.

use async_trait::async_trait;

use super::report_jobs::ProgressReporter;
use super::target::TargetConnection;
use crate::models::{TableDef, TableRowDef, TimeWindow};

/// Errors raised while computing report tables.
#[derive(Debug, thiserror::Error)]
pub enum ComputationError {
    /// The monitored database rejected or dropped the connection
    #[error("monitored database error: {0}")]
    Target(String),

    /// A metric query returned something the builder cannot use
    #[error("query failed: {0}")]
    Query(String),
}

/// Computes the table set of a report from its window(s).
#[async_trait]
pub trait TableBuilder: Send + Sync {
    /// Tables for a single analysis window.
    async fn build_tables(
        &self,
        window: TimeWindow,
        conn: &dyn TargetConnection,
        progress: &ProgressReporter,
    ) -> Result<Vec<TableDef>, ComputationError>;

    /// Tables contrasting `baseline` against `target`.
    async fn build_compare_tables(
        &self,
        baseline: TimeWindow,
        target: TimeWindow,
        conn: &dyn TargetConnection,
        progress: &ProgressReporter,
    ) -> Result<Vec<TableDef>, ComputationError>;
}

/// Builder producing the report header tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct SummaryTableBuilder;

const HEADER_CATEGORY: &str = "header";

fn time_range_table(title: &str, columns: &[&str], values: Vec<String>) -> TableDef {
    TableDef {
        category: vec![HEADER_CATEGORY.to_string()],
        title: title.to_string(),
        comment: String::new(),
        column: columns.iter().map(|c| c.to_string()).collect(),
        rows: vec![TableRowDef::new(values)],
    }
}

#[async_trait]
impl TableBuilder for SummaryTableBuilder {
    async fn build_tables(
        &self,
        window: TimeWindow,
        conn: &dyn TargetConnection,
        progress: &ProgressReporter,
    ) -> Result<Vec<TableDef>, ComputationError> {
        conn.ping()
            .await
            .map_err(|e| ComputationError::Target(e.to_string()))?;
        progress.report(50).await;

        Ok(vec![time_range_table(
            "Report Time Range",
            &["START_TIME", "END_TIME"],
            vec![window.start_str(), window.end_str()],
        )])
    }

    async fn build_compare_tables(
        &self,
        baseline: TimeWindow,
        target: TimeWindow,
        conn: &dyn TargetConnection,
        progress: &ProgressReporter,
    ) -> Result<Vec<TableDef>, ComputationError> {
        conn.ping()
            .await
            .map_err(|e| ComputationError::Target(e.to_string()))?;
        progress.report(50).await;

        Ok(vec![time_range_table(
            "Compare Report Time Range",
            &[
                "T1.START_TIME",
                "T1.END_TIME",
                "T2.START_TIME",
                "T2.END_TIME",
            ],
            vec![
                baseline.start_str(),
                baseline.end_str(),
                target.start_str(),
                target.end_str(),
            ],
        )])
    }
}
