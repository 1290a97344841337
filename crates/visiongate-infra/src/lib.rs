//! Vision Gate infrastructure library
//!
//! Shared infrastructure used by the API binary:
//! - Middleware (request correlation, security headers)
//! - Client IP extraction
//! - Rate limiting
//! - Prometheus metrics registry
//! - Tracing initialization

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

pub mod ip_extraction;
pub mod metrics;

#[cfg(feature = "middleware")]
pub use middleware::{
    get_request_context, request_context_middleware, security_headers_middleware,
    RequestContextConfig, SecurityHeadersConfig,
};

#[cfg(feature = "observability-basic")]
pub use telemetry::init_telemetry;

#[cfg(feature = "rate-limit")]
pub use rate_limit::{Admission, RateLimiter};

pub use ip_extraction::extract_client_ip;
pub use metrics::MetricsRegistry;
