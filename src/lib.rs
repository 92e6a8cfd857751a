//! Diagnose Report Server library.
//!
//! Report job lifecycle, report store, monitored-database connections and the
//! HTTP API serving report status and content.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;
