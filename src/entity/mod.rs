//! SeaORM entity definitions for the report store.

pub mod diagnose_report;
