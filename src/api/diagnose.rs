//! Diagnose report API handlers.

use std::path::PathBuf;

use actix_files::NamedFile;
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use tracing::{info, warn};

use crate::auth::ApiKeyAuth;
use crate::error::{AppError, AppResult};
use crate::models::{
    GenerateReportRequest, GenerateReportResponse, ReportStatusResponse, ReportSummary,
};
use crate::services::{ReportJobManager, ReportQueryService, TargetConnector};

/// Viewer page served by the detail endpoint.
pub const REPORT_PAGE: &str = "diagnose_report.html";

/// Location of the built report viewer UI, if any.
#[derive(Debug, Clone, Default)]
pub struct ViewerAssets {
    dir: Option<PathBuf>,
}

impl ViewerAssets {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    fn report_page(&self) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(REPORT_PAGE))
            .filter(|page| page.is_file())
    }
}

/// List all diagnose reports, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/diagnose/reports",
    tag = "Diagnose Reports",
    responses(
        (status = 200, description = "Report history", body = [ReportSummary]),
        (status = 401, description = "Unauthorized", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = []))
)]
#[get("/diagnose/reports")]
pub async fn list_reports(
    _auth: ApiKeyAuth,
    query: web::Data<ReportQueryService>,
) -> AppResult<HttpResponse> {
    let reports = query.list_reports().await?;
    Ok(HttpResponse::Ok().json(reports))
}

/// Start generating a diagnose report.
///
/// The report is computed in the background; poll the status endpoint with the
/// returned ID.
#[utoipa::path(
    post,
    path = "/api/v1/diagnose/reports",
    tag = "Diagnose Reports",
    request_body = GenerateReportRequest,
    responses(
        (status = 200, description = "Report job created", body = GenerateReportResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ErrorResponse),
        (status = 429, description = "All report slots are taken", body = crate::error::ErrorResponse),
        (status = 503, description = "Monitored database unavailable", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = []))
)]
#[post("/diagnose/reports")]
pub async fn generate_report(
    _auth: ApiKeyAuth,
    body: web::Json<GenerateReportRequest>,
    connector: web::Data<dyn TargetConnector>,
    jobs: web::Data<ReportJobManager>,
) -> AppResult<HttpResponse> {
    let windows = body.into_inner().into_windows()?;

    // Validated and given a slot before borrowing a connection, so rejected
    // requests never touch the target
    let slot = jobs.try_reserve()?;
    let connection = connector.connect().await?;
    let (report_id, _handle) = jobs.generate(slot, windows, connection).await?;

    info!(report_id = %report_id, "Diagnose report generation started");

    Ok(HttpResponse::Ok().json(GenerateReportResponse { report_id }))
}

/// Get the current status of a report.
#[utoipa::path(
    get,
    path = "/api/v1/diagnose/reports/{id}/status",
    tag = "Diagnose Reports",
    params(("id" = String, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report status", body = ReportStatusResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ErrorResponse),
        (status = 404, description = "Report not found", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = []))
)]
#[get("/diagnose/reports/{id}/status")]
pub async fn get_report_status(
    _auth: ApiKeyAuth,
    path: web::Path<String>,
    query: web::Data<ReportQueryService>,
) -> AppResult<HttpResponse> {
    let report = query.get_status(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ReportStatusResponse::from(&report)))
}

/// Report tables as a script assigning `window.__diagnosis_data__`.
///
/// Evaluates to `null` until the report is completed. Accepts the API key as
/// an `api_key` query parameter for `<script>` loads.
#[utoipa::path(
    get,
    path = "/api/v1/diagnose/reports/{id}/data.js",
    tag = "Diagnose Reports",
    params(("id" = String, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report data script", content_type = "text/javascript", body = String),
        (status = 401, description = "Unauthorized", body = crate::error::ErrorResponse),
        (status = 404, description = "Report not found", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = []))
)]
#[get("/diagnose/reports/{id}/data.js")]
pub async fn get_report_data_script(
    _auth: ApiKeyAuth,
    path: web::Path<String>,
    query: web::Data<ReportQueryService>,
) -> AppResult<HttpResponse> {
    let script = query.render_data_script(&path.into_inner()).await?;
    Ok(HttpResponse::Ok()
        .content_type("text/javascript; charset=utf-8")
        .body(script))
}

/// Serve the report viewer page.
#[utoipa::path(
    get,
    path = "/api/v1/diagnose/reports/{id}/detail",
    tag = "Diagnose Reports",
    params(("id" = String, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report viewer page", content_type = "text/html", body = String),
        (status = 404, description = "UI is not built", body = crate::error::ErrorResponse)
    )
)]
#[get("/diagnose/reports/{id}/detail")]
pub async fn get_report_detail(
    req: HttpRequest,
    assets: web::Data<ViewerAssets>,
) -> AppResult<HttpResponse> {
    let not_built = || AppError::NotFound("Report viewer (UI is not built)".to_string());

    let page = assets.report_page().ok_or_else(not_built)?;
    let file = NamedFile::open_async(&page).await.map_err(|e| {
        warn!(page = %page.display(), error = %e, "Failed to open report viewer page");
        not_built()
    })?;

    Ok(file.into_response(&req))
}

/// Configure diagnose report routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default()
        .error_handler(|err, _req| AppError::InvalidInput(err.to_string()).into());

    cfg.app_data(json_config)
        .service(list_reports)
        .service(generate_report)
        .service(get_report_status)
        .service(get_report_data_script)
        .service(get_report_detail);
}
