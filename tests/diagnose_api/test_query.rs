//! Report history, status lookups and the viewer page.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::{Value, json};

use super::test_helpers::*;

#[actix_rt::test]
async fn test_status_of_unknown_report_is_not_found() {
    let pool = create_test_pool().await;
    let app = create_test_app(&pool, Arc::new(FakeConnector::new(TargetMode::Healthy)), None).await;

    for id in ["nonexistent-id", "0191f3a2-0000-7000-8000-000000000000"] {
        let (status, body) =
            get_authed(&app, &format!("/api/v1/diagnose/reports/{}/status", id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "NOT_FOUND");

        let (status, _) =
            get_authed(&app, &format!("/api/v1/diagnose/reports/{}/data.js", id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[actix_rt::test]
async fn test_list_reports_newest_first() {
    let pool = create_test_pool().await;
    let app = create_test_app(&pool, Arc::new(FakeConnector::new(TargetMode::Healthy)), None).await;

    let (_, first) = generate_report(&app, json!({"start_time": 1000, "end_time": 2000})).await;
    let (_, second) = generate_report(&app, json!({"start_time": 3000, "end_time": 4000})).await;
    wait_for_terminal_status(&app, first["report_id"].as_str().unwrap()).await;
    wait_for_terminal_status(&app, second["report_id"].as_str().unwrap()).await;

    let (status, body) = get_authed(&app, "/api/v1/diagnose/reports").await;
    assert_eq!(status, StatusCode::OK);
    let reports: Value = serde_json::from_str(&body).unwrap();
    let reports = reports.as_array().unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["id"], second["report_id"]);
    assert_eq!(reports[1]["id"], first["report_id"]);
    assert_eq!(reports[0]["progress"], 100);
    assert!(reports[0].get("content").is_none());
}

#[actix_rt::test]
async fn test_detail_without_built_ui_is_not_found() {
    let pool = create_test_pool().await;
    let app = create_test_app(&pool, Arc::new(FakeConnector::new(TargetMode::Healthy)), None).await;

    let req = test::TestRequest::get()
        .uri("/api/v1/diagnose/reports/any-id/detail")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_detail_serves_viewer_page() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("diagnose_report.html"),
        "<html><body>diagnose report viewer</body></html>",
    )
    .unwrap();

    let pool = create_test_pool().await;
    let app = create_test_app(
        &pool,
        Arc::new(FakeConnector::new(TargetMode::Healthy)),
        Some(dir.path().to_path_buf()),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/diagnose/reports/any-id/detail")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/html"), "{}", content_type);

    let body = test::read_body(resp).await;
    assert!(String::from_utf8_lossy(&body).contains("diagnose report viewer"));
}

#[actix_rt::test]
async fn test_ready_reports_store() {
    let pool = create_test_pool().await;
    let app = create_test_app(&pool, Arc::new(FakeConnector::new(TargetMode::Healthy)), None).await;

    let req = test::TestRequest::get().uri("/api/v1/ready").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["database"], "connected");
}
