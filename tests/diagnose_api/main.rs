//! Diagnose report API test suite.
//!
//! Drives the HTTP API against an in-memory SQLite report store and a fake
//! monitored database.
//!
//! Run with: cargo test --test diagnose_api

mod test_helpers;

mod test_generate;
mod test_query;
