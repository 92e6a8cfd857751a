//! Business logic services.

pub mod report_jobs;
pub mod report_query;
pub mod report_store;
pub mod tables;
pub mod target;


pub use report_jobs::{JobOutcome, JobSlot, ProgressReporter, ReportJobManager};
pub use report_query::ReportQueryService;
pub use report_store::ReportStore;
pub use tables::{ComputationError, SummaryTableBuilder, TableBuilder};
pub use target::{SeaOrmTargetConnector, TargetConnection, TargetConnector};
