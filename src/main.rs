//! Diagnose Report Server - Main entry point.
//!
//! Starts the Actix-web server with configured routes and middleware.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, http::header, web};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use diagnose_report_lib::api::{self, ApiDoc, ViewerAssets};
use diagnose_report_lib::auth::ApiKey;
use diagnose_report_lib::config::Config;
use diagnose_report_lib::db::DbPool;
use diagnose_report_lib::middleware::RequestLogger;
use diagnose_report_lib::services::{
    ReportJobManager, ReportQueryService, ReportStore, SeaOrmTargetConnector,
    SummaryTableBuilder, TableBuilder, TargetConnector,
};

/// Perform health check (for Docker healthcheck).
fn health_check() -> bool {
    Config::from_env().is_ok()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // --health-check is used by the Docker HEALTHCHECK
    if std::env::args().any(|arg| arg == "--health-check") {
        dotenvy::dotenv().ok();
        std::process::exit(if health_check() { 0 } else { 1 });
    }

    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, DIAG_DATABASE_URL and DIAG_API_KEY must be set");
            error!("  - In production, values must not match development defaults");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Diagnose Report Server");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
        info!("Using development defaults for DIAG_DATABASE_URL and DIAG_API_KEY");
    }

    let pool = DbPool::new(&config.database)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    info!("Report store connection established");

    pool.run_migrations()
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    info!("Report store migrations complete");

    let store: Arc<dyn ReportStore> = Arc::new(pool.clone());
    let builder: Arc<dyn TableBuilder> = Arc::new(SummaryTableBuilder);
    let connector: Arc<dyn TargetConnector> = Arc::new(SeaOrmTargetConnector::new(&config.target));

    let jobs = ReportJobManager::new(store.clone(), builder, config.max_concurrent_reports);
    let query = ReportQueryService::new(store);

    // A previous process may have died mid-computation
    match jobs.recover_interrupted().await {
        Ok(0) => {}
        Ok(count) => info!(count, "Recovered interrupted report jobs"),
        Err(e) => error!(error = %e, "Failed to recover interrupted report jobs"),
    }

    let bind_address = config.bind_address();
    let api_key = ApiKey::new(config.api_key.clone());
    let assets = ViewerAssets::new(config.static_dir.clone());
    let is_development = config.is_development();

    match &config.static_dir {
        Some(dir) => info!("Report viewer served from {:?}", dir),
        None => warn!("DIAG_STATIC_DIR not set; report detail pages are unavailable"),
    }
    info!(
        "Report computations limited to {} concurrent jobs",
        config.max_concurrent_reports
    );

    let worker_count = if is_development {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!(
            "Starting server at http://{} ({} workers)",
            bind_address, cpus
        );
        cpus
    };

    let server = HttpServer::new(move || {
        let cors = if is_development {
            Cors::default()
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                .allowed_headers(vec![
                    header::ACCEPT,
                    header::CONTENT_TYPE,
                    header::HeaderName::from_static("x-api-key"),
                ])
                .max_age(3600)
        } else {
            // Same-origin only
            Cors::default()
                .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                .allowed_headers(vec![
                    header::ACCEPT,
                    header::CONTENT_TYPE,
                    header::HeaderName::from_static("x-api-key"),
                ])
                .max_age(3600)
        };

        App::new()
            // CORS must wrap before the logger
            .wrap(cors)
            .wrap(RequestLogger)
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(jobs.clone()))
            .app_data(web::Data::new(query.clone()))
            .app_data(web::Data::from(connector.clone()))
            .app_data(web::Data::new(api_key.clone()))
            .app_data(web::Data::new(assets.clone()))
            .service(
                web::scope("/api/v1")
                    .configure(api::configure_health_routes)
                    .configure(api::configure_diagnose_routes),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    });

    server
        .workers(worker_count)
        .bind(&bind_address)?
        .run()
        .await
}
