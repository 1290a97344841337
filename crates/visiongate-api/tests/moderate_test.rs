//! Moderation endpoint integration tests.
//!
//! Run with: `cargo test -p visiongate-api --test moderate_test`

mod helpers;

use axum::http::StatusCode;
use helpers::{
    api_path, fixtures, setup_test_app, setup_test_app_with, upload_form, FakeClassifier, Fakes,
};
use serde_json::Value;
use std::sync::Arc;

fn app_with_scores(scores: &[(&str, f64)]) -> helpers::TestApp {
    setup_test_app_with(
        &[],
        Fakes {
            detector: None,
            classifier: Some(Arc::new(FakeClassifier::new(scores))),
        },
    )
}

#[tokio::test]
async fn test_moderate_flags_unsafe_category() {
    let app = setup_test_app();
    let response = app
        .client()
        .post(&api_path("/moderate"))
        .add_query_param("threshold", 0.5)
        .multipart(upload_form(fixtures::jpeg(32, 32), "upload.jpg", "image/jpeg"))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["is_safe"], false);
    assert_eq!(body["flagged_category"], "nsfw");
    assert_eq!(body["severity"], "low");
    assert_eq!(body["overall_score"], 0.6);
    assert_eq!(body["threshold"], 0.5);
    assert_eq!(body["flags"].as_array().unwrap().len(), 1);
    assert_eq!(body["flags"][0]["category"], "nsfw");
    assert_eq!(body["categories"]["normal"], 0.4);
    assert_eq!(body["categories"]["nsfw"], 0.6);
    assert_eq!(
        body["message"],
        "Image flagged as potentially inappropriate. Primary concern: nsfw (confidence: 60.00%)"
    );

    let header = response.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert_eq!(body["request_id"], header);
}

#[tokio::test]
async fn test_moderate_default_threshold_passes() {
    // MODERATION_THRESHOLD defaults to 0.7
    let app = setup_test_app();
    let response = app
        .client()
        .post(&api_path("/moderate"))
        .multipart(upload_form(fixtures::jpeg(32, 32), "upload.jpg", "image/jpeg"))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["is_safe"], true);
    assert!(body["flagged_category"].is_null());
    assert!(body["flags"].as_array().unwrap().is_empty());
    assert_eq!(body["threshold"], 0.7);
    assert_eq!(body["message"], "Image passed content moderation checks.");
}

#[tokio::test]
async fn test_score_equal_to_threshold_is_flagged() {
    let app = app_with_scores(&[("normal", 0.3), ("nsfw", 0.7)]);
    let response = app
        .client()
        .post(&api_path("/moderate"))
        .add_query_param("threshold", 0.7)
        .multipart(upload_form(fixtures::png(16, 16), "a.png", "image/png"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["is_safe"], false);
    assert_eq!(body["flagged_category"], "nsfw");
    assert_eq!(body["severity"], "medium");
}

#[tokio::test]
async fn test_high_severity_with_multiple_flags() {
    let app = app_with_scores(&[("normal", 0.01), ("porn", 0.95), ("hentai", 0.8)]);
    let response = app
        .client()
        .post(&api_path("/moderate"))
        .add_query_param("threshold", 0.5)
        .multipart(upload_form(fixtures::jpeg(16, 16), "a.jpg", "image/jpeg"))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["severity"], "high");
    assert_eq!(body["flagged_category"], "porn");
    let flags: Vec<&str> = body["flags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["category"].as_str().unwrap())
        .collect();
    assert_eq!(flags, vec!["porn", "hentai"]);
}

#[tokio::test]
async fn test_invalid_threshold_is_rejected() {
    let app = setup_test_app();
    for value in ["0", "1.5", "-1", "NaN", "high"] {
        let response = app
            .client()
            .post(&api_path("/moderate"))
            .add_query_param("threshold", value)
            .multipart(upload_form(fixtures::jpeg(8, 8), "a.jpg", "image/jpeg"))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "threshold={}", value);
        let body: Value = response.json();
        assert_eq!(body["error_kind"], "InvalidRequest");
    }
    assert_eq!(app.decoder.count(), 0);
}

#[tokio::test]
async fn test_classifier_failure_does_not_leak_detail() {
    let app = setup_test_app_with(
        &[],
        Fakes {
            detector: None,
            classifier: Some(Arc::new(FakeClassifier::failing(
                "connection refused to 10.0.0.7:9000 /srv/models/nsfw.bin",
            ))),
        },
    );
    let response = app
        .client()
        .post(&api_path("/moderate"))
        .multipart(upload_form(fixtures::jpeg(8, 8), "a.jpg", "image/jpeg"))
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = response.text();
    assert!(!text.contains("10.0.0.7"));
    assert!(!text.contains("/srv/models"));
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["error_kind"], "ModerationError");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn test_moderate_without_classifier_is_unavailable() {
    let app = setup_test_app_with(&[], Fakes::none());
    let response = app
        .client()
        .post(&api_path("/moderate"))
        .multipart(upload_form(fixtures::jpeg(8, 8), "a.jpg", "image/jpeg"))
        .await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["error_kind"], "ServiceUnavailable");
}

#[tokio::test]
async fn test_custom_safe_categories() {
    let app = setup_test_app_with(
        &[("MODERATION_SAFE_CATEGORIES", "neutral,drawings")],
        Fakes {
            detector: None,
            classifier: Some(Arc::new(FakeClassifier::new(&[
                ("neutral", 0.9),
                ("drawings", 0.8),
                ("sexy", 0.1),
            ]))),
        },
    );
    let response = app
        .client()
        .post(&api_path("/moderate"))
        .multipart(upload_form(fixtures::jpeg(8, 8), "a.jpg", "image/jpeg"))
        .await;

    let body: Value = response.json();
    assert_eq!(body["is_safe"], true);
    assert_eq!(body["overall_score"], 0.1);
    assert_eq!(body["severity"], "none");
}

#[tokio::test]
async fn test_moderation_outcome_metrics() {
    let app = setup_test_app();
    app.client()
        .post(&api_path("/moderate"))
        .add_query_param("threshold", 0.5)
        .multipart(upload_form(fixtures::jpeg(8, 8), "a.jpg", "image/jpeg"))
        .await;

    let metrics = app.client().get("/metrics").await.text();
    assert!(metrics.contains("visiongate_moderation_outcomes_total{outcome=\"unsafe\",severity=\"low\"} 1"));
}
