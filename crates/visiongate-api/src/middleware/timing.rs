use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::{middleware::Next, response::Response};
use std::sync::Arc;
use tracing::Level;
use visiongate_core::RequestContext;
use visiongate_infra::get_request_context;
use visiongate_infra::ip_extraction::UNKNOWN_CLIENT_KEY;
use visiongate_infra::metrics::UNMATCHED_ENDPOINT;

use crate::error::ErrorDescriptor;
use crate::state::AppState;

/// Log level of the completion event for a response status.
fn completion_level(status: StatusCode) -> Level {
    if status.is_server_error() {
        Level::ERROR
    } else if status.is_client_error() {
        Level::WARN
    } else {
        Level::INFO
    }
}

/// Timing stage
///
/// Measures the request from the correlation stage's start time, records
/// request count and latency under the matched route template, and logs the
/// completed request at a level chosen by status class. The resulting
/// `RequestOutcome` is left in the response extensions.
pub async fn timing_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ENDPOINT.to_string());
    let mut context = get_request_context(&request)
        .cloned()
        .unwrap_or_else(|| RequestContext::new(UNKNOWN_CLIENT_KEY));

    let mut response = next.run(request).await;

    let elapsed = context.elapsed();
    let status = response.status();
    let error_kind = response
        .extensions()
        .get::<ErrorDescriptor>()
        .map(|d| d.kind);
    let outcome = context.complete(status.as_u16(), error_kind);

    state
        .metrics
        .record_request(&method, &endpoint, outcome.status, elapsed);

    let latency_ms = elapsed.as_secs_f64() * 1000.0;
    let error_kind = outcome.error_kind.map(|k| k.as_str()).unwrap_or("");
    let level = completion_level(status);
    if level == Level::ERROR {
        tracing::error!(
            status = outcome.status,
            latency_ms,
            error_kind,
            endpoint = %endpoint,
            "Request completed"
        );
    } else if level == Level::WARN {
        tracing::warn!(
            status = outcome.status,
            latency_ms,
            error_kind,
            endpoint = %endpoint,
            "Request completed"
        );
    } else {
        tracing::info!(
            status = outcome.status,
            latency_ms,
            endpoint = %endpoint,
            "Request completed"
        );
    }

    response.extensions_mut().insert(outcome);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpAppError;
    use crate::state::test_state;
    use axum::body::Body;
    use axum::routing::get;
    use axum::{middleware, Router};
    use tower::ServiceExt;
    use visiongate_core::{AppError, ErrorKind, RequestOutcome};

    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/items/{id}", get(|| async { "ok" }))
            .route(
                "/broken",
                get(|| async {
                    HttpAppError(AppError::InvalidImage("truncated".to_string()))
                }),
            )
            .layer(middleware::from_fn_with_state(state, timing_middleware))
    }

    fn request(uri: &str) -> Request {
        let mut request = axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(RequestContext::new("ip:192.0.2.1"));
        request
    }

    #[tokio::test]
    async fn test_records_outcome_under_route_template() {
        let state = test_state(&[]);
        let response = app(state.clone()).oneshot(request("/items/42")).await.unwrap();

        let outcome = response.extensions().get::<RequestOutcome>().unwrap();
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.error_kind, None);

        let text = state.metrics.render().unwrap();
        assert!(text.contains(
            r#"visiongate_http_requests_total{endpoint="/items/{id}",method="GET",status="200"} 1"#
        ));
    }

    #[tokio::test]
    async fn test_typed_error_kind_is_recorded() {
        let state = test_state(&[]);
        let response = app(state).oneshot(request("/broken")).await.unwrap();

        let outcome = response.extensions().get::<RequestOutcome>().unwrap();
        assert_eq!(outcome.status, 400);
        assert_eq!(outcome.error_kind, Some(ErrorKind::InvalidImage));
    }

    #[tokio::test]
    async fn test_fallback_uses_unmatched_label() {
        let state = test_state(&[]);
        let response = app(state.clone()).oneshot(request("/nowhere")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let text = state.metrics.render().unwrap();
        assert!(text.contains(
            r#"visiongate_http_requests_total{endpoint="unmatched",method="GET",status="404"} 1"#
        ));
    }

    #[test]
    fn test_completion_level_by_status_class() {
        assert_eq!(completion_level(StatusCode::OK), Level::INFO);
        assert_eq!(completion_level(StatusCode::TOO_MANY_REQUESTS), Level::WARN);
        assert_eq!(completion_level(StatusCode::NOT_FOUND), Level::WARN);
        assert_eq!(completion_level(StatusCode::GATEWAY_TIMEOUT), Level::ERROR);
    }
}
