//! Shared HTTP middleware

pub mod request_context;
pub mod security_headers;

pub use request_context::{get_request_context, request_context_middleware, RequestContextConfig};
pub use security_headers::{security_headers_middleware, SecurityHeadersConfig};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
