use axum::extract::{Request, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::{middleware::Next, Json};
use std::sync::Arc;
use visiongate_infra::get_request_context;

use crate::error::{ErrorDescriptor, PreserveBody};
use crate::state::AppState;

/// Error-normalization stage
///
/// Every 4xx/5xx leaving the inner stages is rewritten into the
/// `{error_kind, message, request_id}` envelope. Typed errors carry an
/// `ErrorDescriptor`; anything else (router 404/405, body-limit 413, extractor
/// rejections, caught panics) is classified from its status code.
pub async fn error_normalization_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = get_request_context(&request).map(|ctx| ctx.request_id.to_string());

    let response = next.run(request).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }
    if response.extensions().get::<PreserveBody>().is_some() {
        return response;
    }

    let (parts, _body) = response.into_parts();
    let descriptor = match parts.extensions.get::<ErrorDescriptor>() {
        Some(descriptor) => descriptor.clone(),
        None => {
            let descriptor = ErrorDescriptor::from_status(status);
            tracing::debug!(
                status = status.as_u16(),
                error_kind = descriptor.kind.as_str(),
                "Normalized untyped error response"
            );
            descriptor
        }
    };

    state.metrics.record_error(descriptor.kind.as_str());

    let mut normalized = (status, Json(descriptor.to_envelope(request_id))).into_response();
    for (name, value) in parts.headers.iter() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            normalized.headers_mut().append(name.clone(), value.clone());
        }
    }
    if let Some(secs) = descriptor.retry_after_secs {
        if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
            normalized.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    normalized.extensions_mut().insert(descriptor);
    normalized
}
