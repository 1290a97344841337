use axum::http::HeaderValue;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Security headers configuration
#[derive(Debug, Clone)]
pub struct SecurityHeadersConfig {
    is_production: bool,
    csp: HeaderValue,
}

impl SecurityHeadersConfig {
    /// `script_sources` are extra script origins the API docs page loads from.
    pub fn new(is_production: bool, script_sources: &[&str]) -> Self {
        Self {
            is_production,
            csp: build_csp(script_sources),
        }
    }

    pub fn is_production(&self) -> bool {
        self.is_production
    }
}

fn build_csp(script_sources: &[&str]) -> HeaderValue {
    let mut script_src = String::from("script-src 'self'");
    for source in script_sources {
        script_src.push(' ');
        script_src.push_str(source);
    }
    let policy = [
        "default-src 'self'",
        script_src.as_str(),
        "style-src 'self' 'unsafe-inline'",
        "img-src 'self' data: https:",
        "font-src 'self' data:",
        "connect-src 'self'",
        "frame-ancestors 'none'",
    ]
    .join("; ");

    HeaderValue::from_str(&policy)
        .unwrap_or_else(|_| HeaderValue::from_static("default-src 'self'; frame-ancestors 'none'"))
}

/// Security headers middleware
/// Adds security headers to every response, error responses included
pub async fn security_headers_middleware(
    State(config): State<Arc<SecurityHeadersConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();

    // X-Content-Type-Options: Prevent MIME type sniffing
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );

    // X-Frame-Options: Prevent clickjacking
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));

    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    // HSTS header (only set in production over HTTPS)
    if config.is_production {
        headers.insert(
            "Strict-Transport-Security",
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    headers.insert("Content-Security-Policy", config.csp.clone());

    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{middleware, Router};
    use tower::ServiceExt;

    fn app(is_production: bool) -> Router {
        let config = Arc::new(SecurityHeadersConfig::new(
            is_production,
            &["https://unpkg.com"],
        ));
        Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route(
                "/fail",
                get(|| async { (StatusCode::BAD_REQUEST, "nope") }),
            )
            .layer(middleware::from_fn_with_state(
                config,
                security_headers_middleware,
            ))
    }

    async fn headers(is_production: bool, uri: &str) -> axum::http::HeaderMap {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app(is_production)
            .oneshot(request)
            .await
            .unwrap()
            .headers()
            .clone()
    }

    #[tokio::test]
    async fn test_headers_on_success_and_failure() {
        for uri in ["/ok", "/fail"] {
            let headers = headers(false, uri).await;
            assert_eq!(headers["x-content-type-options"], "nosniff");
            assert_eq!(headers["x-frame-options"], "DENY");
            assert!(headers.contains_key("content-security-policy"));
            assert!(!headers.contains_key("strict-transport-security"));
        }
    }

    #[tokio::test]
    async fn test_hsts_only_in_production() {
        let headers = headers(true, "/ok").await;
        assert!(headers.contains_key("strict-transport-security"));
    }

    #[test]
    fn test_csp_includes_script_sources() {
        let csp = build_csp(&["https://unpkg.com"]);
        let csp = csp.to_str().unwrap();
        assert!(csp.contains("script-src 'self' https://unpkg.com"));
        assert!(csp.contains("frame-ancestors 'none'"));
    }
}
