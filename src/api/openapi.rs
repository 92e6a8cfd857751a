//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Diagnose Report Server",
        version = "0.1.0",
        description = "Generates database diagnose reports in the background and serves their status and content"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        api::health::health,
        api::health::ready,
        api::diagnose::list_reports,
        api::diagnose::generate_report,
        api::diagnose::get_report_status,
        api::diagnose::get_report_data_script,
        api::diagnose::get_report_detail,
    ),
    components(
        schemas(
            error::ErrorResponse,
            api::health::HealthResponse,
            api::health::ReadyResponse,
            models::ReportStatus,
            models::GenerateReportRequest,
            models::GenerateReportResponse,
            models::ReportSummary,
            models::ReportStatusResponse,
            models::TableDef,
            models::TableRowDef,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Diagnose Reports", description = "Report generation, status and content")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Add API key security scheme.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new("X-API-Key"),
                    ),
                ),
            );
        }
    }
}
