use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderValue;
use axum::{middleware::Next, response::Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::Instrument;
use visiongate_core::RequestContext;

use super::REQUEST_ID_HEADER;
use crate::ip_extraction::client_key;

#[derive(Debug, Clone)]
pub struct RequestContextConfig {
    pub trusted_proxy_count: usize,
}

/// Correlation middleware.
///
/// Creates the `RequestContext` for the request and exposes it:
/// - Request extensions (for handlers and inner middleware)
/// - The `http_request` tracing span
/// - Response headers (X-Request-ID)
///
/// The id is always generated here; an inbound `X-Request-ID` is ignored.
pub async fn request_context_middleware(
    State(config): State<Arc<RequestContextConfig>>,
    mut request: Request,
    next: Next,
) -> Response {
    let socket_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), socket_addr, config.trusted_proxy_count);
    let context = RequestContext::new(key);
    let request_id = context.request_id.clone();

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    request.extensions_mut().insert(context);

    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// Extract the request context from request extensions
pub fn get_request_context(request: &Request) -> Option<&RequestContext> {
    request.extensions().get::<RequestContext>()
}
