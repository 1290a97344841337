//! Health check handler and response type.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::PreserveBody;
use crate::services::CapabilityStatus;
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "healthy" when the detector is ready, "unhealthy" otherwise
    pub status: String,
    pub model: String,
    pub classifier_model: String,
    pub environment: String,
    pub version: String,
    pub detector: CapabilityStatus,
    pub classifier: CapabilityStatus,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

/// Service readiness
///
/// Answers 200 once the detection capability is ready and 503 while it is
/// loading or not configured. The body is the same in both cases.
#[utoipa::path(
    get,
    path = "/health",
    tag = "monitoring",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 503, description = "Detector not ready", body = HealthResponse)
    )
)]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Extension<PreserveBody>, Json<HealthResponse>) {
    let detector = state.analysis.detector_status();
    let classifier = state.analysis.classifier_status();
    let healthy = detector == CapabilityStatus::Ready;

    let models = &state.config.models;
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        model: models.detector_model.clone(),
        classifier_model: models.classifier_model.clone(),
        environment: state.config.server.environment.clone(),
        version: state.config.server.app_version.clone(),
        detector,
        classifier,
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now(),
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        tracing::debug!(detector = ?detector, "Health check reports not ready");
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Extension(PreserveBody), Json(response))
}
