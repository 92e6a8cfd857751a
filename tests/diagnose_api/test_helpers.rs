//! Shared test helpers for diagnose API tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use actix_web::{App, dev::ServiceResponse, http::StatusCode, test, web};
use async_trait::async_trait;
use diagnose_report_lib::api::{self, ViewerAssets};
use diagnose_report_lib::auth::ApiKey;
use diagnose_report_lib::config::{API_KEY_HEADER, DatabaseSettings};
use diagnose_report_lib::db::DbPool;
use diagnose_report_lib::error::{AppError, AppResult};
use diagnose_report_lib::services::{
    ReportJobManager, ReportQueryService, ReportStore, SummaryTableBuilder, TargetConnection,
    TargetConnector,
};
use secrecy::SecretString;
use serde_json::Value;
use tokio::sync::Semaphore;

/// API key used in tests.
pub const TEST_API_KEY: &str = "test-api-key-for-diagnose-api";

/// Report slots of the test app.
pub const TEST_MAX_CONCURRENT_REPORTS: usize = 2;

/// How the fake monitored database behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    /// Connects and answers pings
    Healthy,
    /// Connects, but every ping fails
    Broken,
    /// Refuses connections
    Down,
}

/// Fake connector that counts opened and closed connections.
pub struct FakeConnector {
    mode: TargetMode,
    gate: Option<Arc<Semaphore>>,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new(mode: TargetMode) -> Self {
        Self {
            mode,
            gate: None,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Healthy target whose pings hang until [`FakeConnector::release`].
    pub fn stalled() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new(TargetMode::Healthy)
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            // Waiters on a closed semaphore return immediately
            gate.close();
        }
    }

    /// Connections opened and not yet closed.
    pub fn open_connections(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.closed.load(Ordering::SeqCst)
    }
}

struct FakeConnection {
    healthy: bool,
    gate: Option<Arc<Semaphore>>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl TargetConnection for FakeConnection {
    async fn ping(&self) -> AppResult<()> {
        if let Some(gate) = &self.gate {
            let _ = gate.acquire().await;
        }
        if self.healthy {
            Ok(())
        } else {
            Err(AppError::TargetUnavailable("lost connection".to_string()))
        }
    }

    async fn close(self: Box<Self>) -> AppResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl TargetConnector for FakeConnector {
    async fn connect(&self) -> AppResult<Box<dyn TargetConnection>> {
        if self.mode == TargetMode::Down {
            return Err(AppError::TargetUnavailable("connection refused".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            healthy: self.mode == TargetMode::Healthy,
            gate: self.gate.clone(),
            closed: self.closed.clone(),
        }))
    }
}

/// Create an in-memory report store with migrations applied.
pub async fn create_test_pool() -> DbPool {
    let settings = DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        // One connection keeps the in-memory database alive
        max_connections: 1,
        min_connections: 1,
    };

    let pool = DbPool::new(&settings)
        .await
        .expect("Failed to open in-memory database");
    tokio_test::assert_ok!(pool.run_migrations().await);
    pool
}

/// Create a test app wired like the server binary.
pub async fn create_test_app(
    pool: &DbPool,
    connector: Arc<FakeConnector>,
    static_dir: Option<PathBuf>,
) -> impl actix_web::dev::Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>
{
    let store: Arc<dyn ReportStore> = Arc::new(pool.clone());
    let jobs = ReportJobManager::new(
        store.clone(),
        Arc::new(SummaryTableBuilder),
        TEST_MAX_CONCURRENT_REPORTS,
    );
    let query = ReportQueryService::new(store);
    let connector: Arc<dyn TargetConnector> = connector;

    test::init_service(
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(jobs))
            .app_data(web::Data::new(query))
            .app_data(web::Data::from(connector))
            .app_data(web::Data::new(ApiKey::new(SecretString::from(TEST_API_KEY))))
            .app_data(web::Data::new(ViewerAssets::new(static_dir)))
            .service(
                web::scope("/api/v1")
                    .configure(api::configure_health_routes)
                    .configure(api::configure_diagnose_routes),
            ),
    )
    .await
}

/// POST a generate request with the test API key.
pub async fn generate_report<S>(app: &S, body: Value) -> (StatusCode, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = test::TestRequest::post()
        .uri("/api/v1/diagnose/reports")
        .insert_header((API_KEY_HEADER, TEST_API_KEY))
        .set_json(body)
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

/// GET a path with the test API key and return the status and raw body.
pub async fn get_authed<S>(app: &S, uri: &str) -> (StatusCode, String)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = test::TestRequest::get()
        .uri(uri)
        .insert_header((API_KEY_HEADER, TEST_API_KEY))
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    (status, String::from_utf8_lossy(&body).into_owned())
}

/// Poll the status endpoint until the report leaves `pending`/`running`.
pub async fn wait_for_terminal_status<S>(app: &S, report_id: &str) -> Value
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let uri = format!("/api/v1/diagnose/reports/{}/status", report_id);
    for _ in 0..200 {
        let (status, body) = get_authed(app, &uri).await;
        assert_eq!(status, StatusCode::OK, "status lookup failed: {}", body);

        let snapshot: Value = serde_json::from_str(&body).unwrap();
        match snapshot["status"].as_str() {
            Some("completed") | Some("failed") => return snapshot,
            _ => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
    panic!("report {} did not finish in time", report_id);
}

/// Poll the readiness endpoint until no report holds a slot.
pub async fn wait_for_free_slots<S>(app: &S)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    for _ in 0..200 {
        let (status, body) = get_authed(app, "/api/v1/ready").await;
        assert_eq!(status, StatusCode::OK, "readiness check failed: {}", body);

        let ready: Value = serde_json::from_str(&body).unwrap();
        if ready["running_reports"] == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("report slots were not freed in time");
}
