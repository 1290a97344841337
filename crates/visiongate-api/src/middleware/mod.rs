//! Request pipeline stages
//!
//! Outermost first: security headers, CORS, correlation (infra), timing,
//! error normalization, panic capture, rate limiting (analysis routes only),
//! body limit, handler.

pub mod error_normalization;
pub mod rate_limit;
pub mod timing;

pub use error_normalization::error_normalization_middleware;
pub use rate_limit::rate_limit_middleware;
pub use timing::timing_middleware;
pub use visiongate_infra::middleware::{
    request_context_middleware, security_headers_middleware, RequestContextConfig,
    SecurityHeadersConfig,
};
