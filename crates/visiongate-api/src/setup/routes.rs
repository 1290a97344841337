//! Route configuration and setup

use crate::api_doc::get_openapi_spec;
use crate::constants::{
    API_PREFIX, DOCS_PATH, DOCS_SCRIPT_SOURCE, OBJECTS_DETECTED_HEADER, OPENAPI_PATH,
    RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER, REQUEST_ID_HEADER,
};
use crate::error::HttpAppError;
use crate::handlers;
use crate::middleware::{
    error_normalization_middleware, rate_limit_middleware, request_context_middleware,
    security_headers_middleware, timing_middleware, RequestContextConfig, SecurityHeadersConfig,
};
use crate::state::AppState;
use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa_rapidoc::RapiDoc;
use visiongate_core::{AppError, Config};

/// Setup all application routes
///
/// Layers are listed innermost first; see `crate::middleware` for the
/// resulting order.
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let security_headers_config = Arc::new(SecurityHeadersConfig::new(
        config.is_production(),
        &[DOCS_SCRIPT_SOURCE],
    ));
    let request_context_config = Arc::new(RequestContextConfig {
        trusted_proxy_count: config.rate_limit.trusted_proxy_count,
    });

    let app = Router::new()
        .merge(public_routes())
        .merge(analysis_routes(config, state.clone()))
        .merge(RapiDoc::with_openapi(
            OPENAPI_PATH,
            get_openapi_spec(&config.server.app_version),
        )
        .path(DOCS_PATH))
        .fallback(handlers::not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            error_normalization_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            timing_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            request_context_config,
            request_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum::middleware::from_fn_with_state(
            security_headers_config,
            security_headers_middleware,
        ))
        .with_state(state);

    Ok(app)
}

/// Unauthenticated informational routes, never rate limited
fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::root::service_info))
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            &format!("{}/classes", API_PREFIX),
            get(handlers::classes::list_classes),
        )
}

/// Upload endpoints: rate limited per client, body capped at the file
/// limit plus multipart slack.
fn analysis_routes(config: &Config, state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/detect", API_PREFIX),
            post(handlers::detect::detect_objects),
        )
        .route(
            &format!("{}/detect/annotated", API_PREFIX),
            post(handlers::detect::detect_annotated),
        )
        .route(
            &format!("{}/moderate", API_PREFIX),
            post(handlers::moderate::moderate_image),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.request_body_limit()))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            rate_limit_middleware,
        ))
}

/// Panics become a typed internal error so the normalization stage renders
/// the usual envelope.
fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    HttpAppError(AppError::Internal(format!("Handler panicked: {}", detail))).into_response()
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let exposed = [
        HeaderName::from_static(REQUEST_ID_HEADER),
        HeaderName::from_static(OBJECTS_DETECTED_HEADER),
        HeaderName::from_static(RATE_LIMIT_LIMIT_HEADER),
        HeaderName::from_static(RATE_LIMIT_REMAINING_HEADER),
        header::RETRY_AFTER,
        header::CONTENT_DISPOSITION,
    ];

    let cors = if config.server.cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(AnyOrigin)
            .allow_methods(methods)
            .allow_headers(AnyOrigin)
            .expose_headers(exposed)
    } else {
        let origins = config
            .server
            .cors_origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .with_context(|| format!("Invalid CORS origin '{}'", o))
            })
            .collect::<Result<Vec<_>, _>>()?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(AnyOrigin)
            .expose_headers(exposed)
    };
    Ok(cors)
}
