//! Report generation through the HTTP API.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use actix_web::http::StatusCode;
use serde_json::{Value, json};

use super::test_helpers::*;

/// Single-window request completes and exposes its content.
#[actix_rt::test]
async fn test_generate_single_window_report() {
    let pool = create_test_pool().await;
    let connector = Arc::new(FakeConnector::new(TargetMode::Healthy));
    let app = create_test_app(&pool, connector.clone(), None).await;

    let (status, body) =
        generate_report(&app, json!({"start_time": 1000, "end_time": 2000})).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let report_id = body["report_id"].as_str().expect("report_id").to_string();

    let snapshot = wait_for_terminal_status(&app, &report_id).await;
    assert_eq!(snapshot["status"], "completed");
    assert_eq!(snapshot["progress"], 100);
    assert_eq!(snapshot["has_content"], true);
    assert!(snapshot.get("compare_start_time").is_none());

    let (status, script) =
        get_authed(&app, &format!("/api/v1/diagnose/reports/{}/data.js", report_id)).await;
    assert_eq!(status, StatusCode::OK);
    let payload = script
        .strip_prefix("window.__diagnosis_data__ = ")
        .and_then(|s| s.strip_suffix(';'))
        .expect("data script wrapper");
    let tables: Value = serde_json::from_str(payload).unwrap();
    let tables = tables.as_array().expect("table array");
    assert!(!tables.is_empty());
    assert_eq!(tables[0]["title"], "Report Time Range");

    assert_eq!(connector.opened.load(Ordering::SeqCst), 1);
    assert_eq!(connector.closed.load(Ordering::SeqCst), 1);
}

/// Both compare fields select the comparison computation.
#[actix_rt::test]
async fn test_generate_comparison_report() {
    let pool = create_test_pool().await;
    let connector = Arc::new(FakeConnector::new(TargetMode::Healthy));
    let app = create_test_app(&pool, connector.clone(), None).await;

    let (status, body) = generate_report(
        &app,
        json!({
            "start_time": 1000,
            "end_time": 2000,
            "compare_start_time": 500,
            "compare_end_time": 900
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let report_id = body["report_id"].as_str().unwrap().to_string();

    let snapshot = wait_for_terminal_status(&app, &report_id).await;
    assert_eq!(snapshot["status"], "completed");
    assert!(snapshot["compare_start_time"].is_string());

    let (_, script) =
        get_authed(&app, &format!("/api/v1/diagnose/reports/{}/data.js", report_id)).await;
    assert!(script.contains("Compare Report Time Range"), "{}", script);
    assert_eq!(connector.closed.load(Ordering::SeqCst), 1);
}

/// One compare field alone falls back to a single-window report.
#[actix_rt::test]
async fn test_single_compare_field_is_ignored() {
    let pool = create_test_pool().await;
    let connector = Arc::new(FakeConnector::new(TargetMode::Healthy));
    let app = create_test_app(&pool, connector, None).await;

    let (status, body) = generate_report(
        &app,
        json!({"start_time": 1000, "end_time": 2000, "compare_start_time": 500}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let snapshot = wait_for_terminal_status(&app, body["report_id"].as_str().unwrap()).await;
    assert_eq!(snapshot["status"], "completed");
    assert!(snapshot.get("compare_start_time").is_none());
}

/// Malformed bodies and bad windows are rejected before any connection is opened.
#[actix_rt::test]
async fn test_invalid_requests_rejected() {
    let pool = create_test_pool().await;
    let connector = Arc::new(FakeConnector::new(TargetMode::Healthy));
    let app = create_test_app(&pool, connector.clone(), None).await;

    for body in [
        json!({"end_time": 2000}),
        json!({"start_time": "yesterday", "end_time": 2000}),
        json!({"start_time": 2000, "end_time": 1000}),
        json!({"start_time": 1000, "end_time": 2000, "compare_start_time": 900, "compare_end_time": 500}),
    ] {
        let (status, resp) = generate_report(&app, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {} -> {}", body, resp);
        assert_eq!(resp["error"], "INVALID_INPUT");
    }

    assert_eq!(connector.opened.load(Ordering::SeqCst), 0);
    let (_, list) = get_authed(&app, "/api/v1/diagnose/reports").await;
    assert_eq!(list, "[]");
}

/// No report is created when the monitored database is down.
#[actix_rt::test]
async fn test_target_unavailable() {
    let pool = create_test_pool().await;
    let connector = Arc::new(FakeConnector::new(TargetMode::Down));
    let app = create_test_app(&pool, connector, None).await;

    let (status, body) =
        generate_report(&app, json!({"start_time": 1000, "end_time": 2000})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "TARGET_UNAVAILABLE");

    let (_, list) = get_authed(&app, "/api/v1/diagnose/reports").await;
    assert_eq!(list, "[]");
}

/// A computation failure ends in `failed` with a reason, never in a stuck job.
#[actix_rt::test]
async fn test_computation_failure_is_reported() {
    let pool = create_test_pool().await;
    let connector = Arc::new(FakeConnector::new(TargetMode::Broken));
    let app = create_test_app(&pool, connector.clone(), None).await;

    let (status, body) =
        generate_report(&app, json!({"start_time": 1000, "end_time": 2000})).await;
    assert_eq!(status, StatusCode::OK);
    let report_id = body["report_id"].as_str().unwrap().to_string();

    let snapshot = wait_for_terminal_status(&app, &report_id).await;
    assert_eq!(snapshot["status"], "failed");
    assert!(snapshot["progress"].as_i64().unwrap() < 100);
    assert_eq!(snapshot["has_content"], false);
    assert!(
        snapshot["error_message"]
            .as_str()
            .unwrap()
            .contains("lost connection")
    );

    let (status, script) =
        get_authed(&app, &format!("/api/v1/diagnose/reports/{}/data.js", report_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(script, "window.__diagnosis_data__ = null;");

    assert_eq!(connector.closed.load(Ordering::SeqCst), 1);
}

/// Requests beyond the slot limit are turned away before a connection is borrowed.
#[actix_rt::test]
async fn test_generate_rejected_when_slots_taken() {
    let pool = create_test_pool().await;
    let connector = Arc::new(FakeConnector::stalled());
    let app = create_test_app(&pool, connector.clone(), None).await;

    let mut report_ids = Vec::new();
    for _ in 0..TEST_MAX_CONCURRENT_REPORTS {
        let (status, body) =
            generate_report(&app, json!({"start_time": 1000, "end_time": 2000})).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        report_ids.push(body["report_id"].as_str().unwrap().to_string());
    }

    for _ in 0..3 {
        let (status, body) =
            generate_report(&app, json!({"start_time": 1000, "end_time": 2000})).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS, "{}", body);
        assert_eq!(body["error"], "TOO_MANY_REPORTS");
        assert!(connector.open_connections() <= TEST_MAX_CONCURRENT_REPORTS);
    }
    assert_eq!(
        connector.opened.load(Ordering::SeqCst),
        TEST_MAX_CONCURRENT_REPORTS
    );

    let (_, list) = get_authed(&app, "/api/v1/diagnose/reports").await;
    let list: Value = serde_json::from_str(&list).unwrap();
    assert_eq!(list.as_array().unwrap().len(), TEST_MAX_CONCURRENT_REPORTS);

    connector.release();
    for report_id in &report_ids {
        let snapshot = wait_for_terminal_status(&app, report_id).await;
        assert_eq!(snapshot["status"], "completed");
    }
    wait_for_free_slots(&app).await;
    assert_eq!(connector.open_connections(), 0);

    let (status, body) =
        generate_report(&app, json!({"start_time": 3000, "end_time": 4000})).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}
