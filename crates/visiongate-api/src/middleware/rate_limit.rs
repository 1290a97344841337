use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::middleware::Next;
use std::sync::Arc;
use visiongate_core::AppError;
use visiongate_infra::ip_extraction::UNKNOWN_CLIENT_KEY;
use visiongate_infra::{get_request_context, Admission};

use crate::constants::{RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER};
use crate::error::HttpAppError;
use crate::state::AppState;

fn set_limit_headers(response: &mut Response, limit: u32, remaining: u32) {
    if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
        response.headers_mut().insert(RATE_LIMIT_LIMIT_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
        response
            .headers_mut()
            .insert(RATE_LIMIT_REMAINING_HEADER, value);
    }
}

/// HTTP rate limiting middleware
///
/// Keys on the client key resolved by the correlation stage. Rejections
/// short-circuit with `RateLimitExceeded`; the handler never runs.
///
/// # Headers
/// - `X-RateLimit-Limit`: requests allowed per window
/// - `X-RateLimit-Remaining`: requests left in the current window
/// - `Retry-After`: seconds until the window resets (429 only)
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return next.run(request).await;
    };

    let key = get_request_context(&request)
        .map(|ctx| ctx.client_key.clone())
        .unwrap_or_else(|| UNKNOWN_CLIENT_KEY.to_string());

    match limiter.admit(&key).await {
        Admission::Allowed { limit, remaining } => {
            let mut response = next.run(request).await;
            set_limit_headers(&mut response, limit, remaining);
            response
        }
        Admission::Rejected { limit, retry_after } => {
            state.metrics.record_rate_limit_rejection();
            // Round up so clients never retry before the window resets.
            let retry_after_secs = retry_after
                .as_secs()
                .saturating_add(u64::from(retry_after.subsec_nanos() > 0))
                .max(1);
            tracing::warn!(
                client_key = %key,
                limit,
                retry_after_secs,
                path = %request.uri().path(),
                "Rate limit exceeded"
            );

            let mut response =
                HttpAppError(AppError::RateLimitExceeded { retry_after_secs }).into_response();
            set_limit_headers(&mut response, limit, 0);
            response
        }
    }
}
