//! API endpoint modules.

pub mod diagnose;
pub mod health;
pub mod openapi;

pub use diagnose::{configure_routes as configure_diagnose_routes, ViewerAssets};
pub use health::configure_health_routes;
pub use openapi::ApiDoc;
