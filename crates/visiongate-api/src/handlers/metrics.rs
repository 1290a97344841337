use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use visiongate_core::AppError;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Prometheus text exposition of the service metrics
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "monitoring",
    responses(
        (status = 200, description = "Metrics in text exposition format", body = String, content_type = "text/plain"),
        (status = 404, description = "Metrics disabled", body = ErrorResponse)
    )
)]
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response, HttpAppError> {
    if !state.config.observability.metrics_enabled {
        return Err(AppError::NotFound("Metrics disabled".to_string()).into());
    }

    let body = state.metrics.render()?;
    let mut response = (StatusCode::OK, body).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(EXPOSITION_CONTENT_TYPE),
    );
    Ok(response)
}
