//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. The response
//! produced here carries an [`ErrorDescriptor`] extension; the
//! error-normalization middleware turns it into the final envelope with the
//! request's correlation id.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use visiongate_core::{AppError, ErrorKind, ErrorMetadata, LogLevel};
use visiongate_processing::ValidationError;

/// Uniform error envelope returned for every failed request
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error category
    pub error_kind: String,
    /// Client-safe description
    pub message: String,
    /// Correlation id of the request
    pub request_id: Option<String>,
}

/// What the normalization stage needs to render an error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
    pub retry_after_secs: Option<u64>,
}

impl ErrorDescriptor {
    /// Descriptor for an error status produced outside the typed error path.
    pub fn from_status(status: StatusCode) -> Self {
        let kind = ErrorKind::from_status(status.as_u16());
        Self {
            kind,
            message: kind.default_message().to_string(),
            retry_after_secs: None,
        }
    }

    pub fn to_envelope(&self, request_id: Option<String>) -> ErrorResponse {
        ErrorResponse {
            error_kind: self.kind.as_str().to_string(),
            message: self.message.clone(),
            request_id,
        }
    }
}

/// Marks a non-2xx response whose body is already the intended payload
/// (the health report). Normalization leaves it untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreserveBody;

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from visiongate-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<ValidationError> for HttpAppError {
    fn from(err: ValidationError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(err.into())
    }
}

fn log_error(error: &AppError) {
    let error_kind = error.error_kind().as_str();
    let details = error.detailed_message();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %details, error_kind, "Request rejected");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %details, error_kind, "Request failed");
        }
        LogLevel::Error => {
            tracing::error!(error = %details, error_kind, "Request failed");
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let descriptor = ErrorDescriptor {
            kind: app_error.error_kind(),
            message: app_error.client_message(),
            retry_after_secs: app_error.retry_after_secs(),
        };

        let mut response = (status, Json(descriptor.to_envelope(None))).into_response();
        if let Some(secs) = descriptor.retry_after_secs {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response.extensions_mut().insert(descriptor);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_carries_descriptor() {
        let response = HttpAppError(AppError::UnsupportedFileType(
            "File extension '.exe' not allowed".to_string(),
        ))
        .into_response();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let descriptor = response.extensions().get::<ErrorDescriptor>().unwrap();
        assert_eq!(descriptor.kind, ErrorKind::UnsupportedFileType);
        assert_eq!(descriptor.message, "File extension '.exe' not allowed");
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = HttpAppError(AppError::RateLimitExceeded {
            retry_after_secs: 7,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "7");
    }

    #[test]
    fn test_sensitive_detail_not_in_message() {
        let response =
            HttpAppError(AppError::Detection("socket hang up 10.1.2.3".to_string())).into_response();
        let descriptor = response.extensions().get::<ErrorDescriptor>().unwrap();
        assert_eq!(descriptor.message, "Object detection failed");
    }

    #[test]
    fn test_descriptor_from_bare_status() {
        let descriptor = ErrorDescriptor::from_status(StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(descriptor.kind, ErrorKind::MethodNotAllowed);
        let envelope = descriptor.to_envelope(Some("abc".to_string()));
        assert_eq!(envelope.error_kind, "MethodNotAllowed");
        assert_eq!(envelope.request_id.as_deref(), Some("abc"));
    }
}
