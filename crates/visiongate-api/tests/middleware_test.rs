//! Request pipeline integration tests: correlation ids, error envelopes,
//! security headers, CORS, metrics, health and docs.
//!
//! Run with: `cargo test -p visiongate-api --test middleware_test`

mod helpers;

use async_trait::async_trait;
use axum::http::StatusCode;
use helpers::{api_path, fixtures, setup_test_app, setup_test_app_with, upload_form, Fakes};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use visiongate_api::services::Capabilities;
use visiongate_core::CategoryScores;
use visiongate_processing::{CapabilityError, ContentClassifier, DecodedImage};

fn request_id(response: &axum_test::TestResponse) -> String {
    response
        .headers()
        .get("x-request-id")
        .expect("missing X-Request-ID")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_every_response_has_unique_request_id() {
    let app = setup_test_app();
    let mut ids = HashSet::new();
    for path in ["/", "/health", "/metrics", "/does-not-exist"] {
        let response = app.client().get(path).await;
        ids.insert(request_id(&response));
    }
    assert_eq!(ids.len(), 4);
}

#[tokio::test]
async fn test_inbound_request_id_is_ignored() {
    let app = setup_test_app();
    let response = app
        .client()
        .get("/health")
        .add_header("x-request-id", "client-chosen-id")
        .await;
    assert_ne!(request_id(&response), "client-chosen-id");
}

#[tokio::test]
async fn test_unknown_route_returns_not_found_envelope() {
    let app = setup_test_app();
    let response = app.client().get("/api/v1/nothing-here").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error_kind"], "NotFound");
    assert_eq!(body["request_id"], request_id(&response).as_str());
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_wrong_method_returns_method_not_allowed_envelope() {
    let app = setup_test_app();
    let response = app.client().get(&api_path("/detect")).await;

    assert_eq!(response.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    let body: Value = response.json();
    assert_eq!(body["error_kind"], "MethodNotAllowed");
    assert_eq!(body["request_id"], request_id(&response).as_str());
    let allow = response.headers().get("allow").unwrap().to_str().unwrap();
    assert!(allow.contains("POST"));
}

#[tokio::test]
async fn test_error_envelope_matches_response_header() {
    let app = setup_test_app();
    let response = app
        .client()
        .post(&api_path("/detect"))
        .multipart(upload_form(fixtures::png(8, 8), "x.jpg", "image/jpeg"))
        .await;

    let body: Value = response.json();
    assert_eq!(body["request_id"], request_id(&response).as_str());
    assert_eq!(
        body.as_object().unwrap().keys().collect::<Vec<_>>(),
        vec!["error_kind", "message", "request_id"]
    );
}

#[tokio::test]
async fn test_security_headers_on_success_and_error() {
    let app = setup_test_app();
    for path in ["/health", "/missing"] {
        let response = app.client().get(path).await;
        let headers = response.headers();
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert!(headers.get("content-security-policy").is_some());
        assert!(headers.get("referrer-policy").is_some());
        assert!(headers.get("strict-transport-security").is_none());
    }
}

#[tokio::test]
async fn test_hsts_in_production() {
    let app = setup_test_app_with(
        &[
            ("ENVIRONMENT", "production"),
            ("CORS_ORIGINS", "https://app.example.com"),
        ],
        Fakes::default(),
    );
    let response = app.client().get("/health").await;
    assert!(response
        .headers()
        .get("strict-transport-security")
        .is_some());
}

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let app = setup_test_app_with(
        &[("CORS_ORIGINS", "https://app.example.com")],
        Fakes::default(),
    );
    let response = app
        .client()
        .get("/health")
        .add_header("origin", "https://app.example.com")
        .await;
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "https://app.example.com"
    );
    let exposed = response
        .headers()
        .get("access-control-expose-headers")
        .unwrap()
        .to_str()
        .unwrap()
        .to_lowercase();
    assert!(exposed.contains("x-request-id"));
}

#[tokio::test]
async fn test_metrics_endpoint_renders_request_metrics() {
    let app = setup_test_app();
    app.client().get("/health").await;
    app.client().get("/definitely-missing").await;

    let response = app.client().get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));

    let text = response.text();
    assert!(text.contains("visiongate_http_requests_total"));
    assert!(text.contains("endpoint=\"/health\""));
    assert!(text.contains("endpoint=\"unmatched\""));
    assert!(!text.contains("definitely-missing"));
    assert!(text.contains("visiongate_errors_total{error_kind=\"NotFound\"} 1"));
    assert!(text.contains("visiongate_http_request_duration_seconds"));
}

#[tokio::test]
async fn test_metrics_disabled_returns_not_found() {
    let app = setup_test_app_with(&[("METRICS_ENABLED", "false")], Fakes::default());
    let response = app.client().get("/metrics").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error_kind"], "NotFound");
    assert_eq!(body["message"], "Metrics disabled");
}

#[tokio::test]
async fn test_health_ready() {
    let app = setup_test_app();
    let response = app.client().get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model"], "yolov8n.pt");
    assert_eq!(body["classifier_model"], "Falconsai/nsfw_image_detection");
    assert_eq!(body["environment"], "development");
    assert_eq!(body["detector"], "ready");
    assert_eq!(body["classifier"], "ready");
    assert!(body["uptime_seconds"].is_u64());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_health_without_detector_reports_unavailable() {
    let app = setup_test_app_with(&[], Fakes::none());
    let response = app.client().get("/health").await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    // The health report itself, not an error envelope
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["detector"], "not_configured");
    assert_eq!(body["classifier"], "not_configured");
    assert!(body.get("error_kind").is_none());
}

#[tokio::test]
async fn test_health_while_detector_loading() {
    let app = setup_test_app();
    app.detector.as_ref().unwrap().set_ready(false);

    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["detector"], "loading");
}

#[tokio::test]
async fn test_root_lists_endpoints() {
    let app = setup_test_app();
    let response = app.client().get("/").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["name"], "Vision Gate API");
    assert_eq!(body["endpoints"]["detect"], "/api/v1/detect");
    assert_eq!(body["endpoints"]["detect_annotated"], "/api/v1/detect/annotated");
    assert_eq!(body["endpoints"]["moderate"], "/api/v1/moderate");
    assert_eq!(body["endpoints"]["classes"], "/api/v1/classes");
}

#[tokio::test]
async fn test_openapi_document_and_docs_page() {
    let app = setup_test_app();

    let response = app.client().get("/api/openapi.json").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let spec: Value = response.json();
    assert!(spec["paths"]["/api/v1/detect"].is_object());
    assert!(spec["paths"]["/api/v1/moderate"].is_object());

    let response = app.client().get("/docs").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().to_lowercase().contains("rapi-doc"));
}

struct PanickingClassifier;

#[async_trait]
impl ContentClassifier for PanickingClassifier {
    fn model_name(&self) -> &str {
        "panicking"
    }

    async fn classify(&self, _image: Arc<DecodedImage>) -> Result<CategoryScores, CapabilityError> {
        panic!("classifier exploded at /opt/secret/path");
    }
}

#[tokio::test]
async fn test_panic_becomes_internal_error_envelope() {
    let (server, _state, _decoder) = helpers::build_app(
        &[],
        Capabilities {
            detector: None,
            classifier: Some(Arc::new(PanickingClassifier)),
        },
    );

    let response = server
        .post(&api_path("/moderate"))
        .multipart(upload_form(fixtures::jpeg(8, 8), "a.jpg", "image/jpeg"))
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = response.text();
    assert!(!text.contains("/opt/secret/path"));
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["error_kind"], "InternalError");
    assert_eq!(body["request_id"], request_id(&response).as_str());
}
