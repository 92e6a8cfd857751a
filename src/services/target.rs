//! Connections to the monitored database.
//!
//! A connection is acquired per generate request and handed, by value, to the
//! background report task. Whoever holds the box last must call [`TargetConnection::close`].

use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::config::TargetSettings;
use crate::error::{AppError, AppResult};

/// A single-owner connection to the monitored database.
#[async_trait]
pub trait TargetConnection: Send + Sync {
    /// Round-trip check against the monitored database.
    async fn ping(&self) -> AppResult<()>;

    /// Underlying SeaORM connection, for builders that query directly.
    fn database(&self) -> Option<&DatabaseConnection> {
        None
    }

    /// Release the connection. Consumes the box so it cannot be used afterwards.
    async fn close(self: Box<Self>) -> AppResult<()>;
}

/// Opens connections to the monitored database.
#[async_trait]
pub trait TargetConnector: Send + Sync {
    async fn connect(&self) -> AppResult<Box<dyn TargetConnection>>;
}

/// Connector backed by SeaORM (MySQL protocol for TiDB-compatible targets).
pub struct SeaOrmTargetConnector {
    url: SecretString,
    connect_timeout: Duration,
}

impl SeaOrmTargetConnector {
    pub fn new(settings: &TargetSettings) -> Self {
        Self {
            url: settings.url.clone(),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
        }
    }
}

#[async_trait]
impl TargetConnector for SeaOrmTargetConnector {
    async fn connect(&self) -> AppResult<Box<dyn TargetConnection>> {
        let mut options = ConnectOptions::new(self.url.expose_secret().to_string());
        // One report task owns the whole pool
        options
            .max_connections(1)
            .min_connections(1)
            .connect_timeout(self.connect_timeout)
            .sqlx_logging(false);

        let conn = Database::connect(options)
            .await
            .map_err(|e| AppError::TargetUnavailable(e.to_string()))?;

        debug!("Opened monitored database connection");
        Ok(Box::new(SeaOrmTargetConnection { conn }))
    }
}

/// Connection returned by [`SeaOrmTargetConnector`].
pub struct SeaOrmTargetConnection {
    conn: DatabaseConnection,
}

#[async_trait]
impl TargetConnection for SeaOrmTargetConnection {
    async fn ping(&self) -> AppResult<()> {
        self.conn
            .ping()
            .await
            .map_err(|e| AppError::TargetUnavailable(e.to_string()))
    }

    fn database(&self) -> Option<&DatabaseConnection> {
        Some(&self.conn)
    }

    async fn close(self: Box<Self>) -> AppResult<()> {
        self.conn
            .close()
            .await
            .map_err(|e| AppError::TargetUnavailable(format!("Failed to close connection: {}", e)))?;
        debug!("Closed monitored database connection");
        Ok(())
    }
}
