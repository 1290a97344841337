pub mod classes;
pub mod detect;
pub mod health;
pub mod metrics;
pub mod moderate;
pub mod root;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Query};
use axum::http::Uri;
use visiongate_core::AppError;

use crate::error::HttpAppError;

/// Router fallback for unknown paths
pub async fn not_found(uri: Uri) -> HttpAppError {
    HttpAppError(AppError::NotFound(format!(
        "No route for {}",
        uri.path()
    )))
}

pub(crate) fn query_or_invalid<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(q)| q)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid query parameters: {}", e.body_text())))
}

pub(crate) fn multipart_or_invalid(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Multipart, AppError> {
    multipart.map_err(|e| {
        AppError::InvalidRequest(format!(
            "Expected a multipart/form-data upload: {}",
            e.body_text()
        ))
    })
}
