use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, rejection::QueryRejection, Multipart, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use visiongate_core::{DetectionReport, RequestContext};

use super::{multipart_or_invalid, query_or_invalid};
use crate::constants::OBJECTS_DETECTED_HEADER;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use crate::utils::upload::extract_multipart_file;

/// Per-request overrides for the configured detection thresholds
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DetectQuery {
    /// Minimum confidence (0.0-1.0)
    pub confidence: Option<f64>,
    /// IoU threshold for non-maximum suppression (0.0-1.0)
    pub iou: Option<f64>,
}

/// Detect objects in an uploaded image
///
/// Runs the upload through FileGuard and ImageGuard, then the object
/// detector. Every returned detection meets the effective confidence
/// threshold.
#[utoipa::path(
    post,
    path = "/api/v1/detect",
    tag = "detection",
    params(DetectQuery),
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Objects detected", body = DetectionReport),
        (status = 400, description = "Invalid image or parameters", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "Unsupported file type", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
        (status = 500, description = "Detection failed", body = ErrorResponse),
        (status = 503, description = "Detector not available", body = ErrorResponse),
        (status = 504, description = "Detection timed out", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(operation = "detect"))]
pub async fn detect_objects(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<DetectQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectionReport>, HttpAppError> {
    let query = query_or_invalid(query)?;
    let params = state
        .analysis
        .detection_params(query.confidence, query.iou)?;
    let blob = extract_multipart_file(multipart_or_invalid(multipart)?).await?;

    tracing::info!(
        filename = %blob.filename,
        size = blob.len(),
        "Detection request received"
    );

    let outcome = state
        .analysis
        .detect(&blob, params, ctx.request_id.clone())
        .await?;
    Ok(Json(outcome.report))
}

/// Detect objects and return the image with boxes drawn
#[utoipa::path(
    post,
    path = "/api/v1/detect/annotated",
    tag = "detection",
    params(DetectQuery),
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Annotated JPEG; X-Objects-Detected carries the object count",
            body = Vec<u8>, content_type = "image/jpeg"),
        (status = 400, description = "Invalid image or parameters", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "Unsupported file type", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
        (status = 500, description = "Detection failed", body = ErrorResponse),
        (status = 503, description = "Detector not available", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(operation = "detect_annotated"))]
pub async fn detect_annotated(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<DetectQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, HttpAppError> {
    let query = query_or_invalid(query)?;
    let params = state
        .analysis
        .detection_params(query.confidence, query.iou)?;
    let blob = extract_multipart_file(multipart_or_invalid(multipart)?).await?;

    tracing::info!(
        filename = %blob.filename,
        size = blob.len(),
        "Annotated detection request received"
    );

    let outcome = state
        .analysis
        .detect(&blob, params, ctx.request_id.clone())
        .await?;
    let jpeg = state.analysis.annotate(&outcome).await?;

    let mut response = (StatusCode::OK, jpeg).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&blob.filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Ok(value) = HeaderValue::from_str(&outcome.report.total_objects.to_string()) {
        headers.insert(OBJECTS_DETECTED_HEADER, value);
    }
    Ok(response)
}

/// `inline; filename="annotated_<name>"` with the name reduced to a safe
/// basename.
fn content_disposition(filename: &str) -> String {
    let basename = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let safe: String = basename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && c.is_ascii())
        .collect();
    format!("inline; filename=\"annotated_{}\"", safe)
}
