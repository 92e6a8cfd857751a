//! Domain models for the diagnose report server.

pub mod report;
pub mod table;

pub use report::{
    DiagnoseReport, GenerateReportRequest, GenerateReportResponse, ReportStatus,
    ReportStatusResponse, ReportSummary, ReportWindows, TimeWindow,
};
pub use table::{TableDef, TableRowDef};
