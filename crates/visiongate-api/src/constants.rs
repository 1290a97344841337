//! API constants

/// Versioned prefix for the analysis endpoints
pub const API_PREFIX: &str = "/api/v1";

/// Location of the served OpenAPI document
pub const OPENAPI_PATH: &str = "/api/openapi.json";

pub const DOCS_PATH: &str = "/docs";

/// Script origin the RapiDoc page loads its bundle from
pub const DOCS_SCRIPT_SOURCE: &str = "https://unpkg.com";

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const OBJECTS_DETECTED_HEADER: &str = "x-objects-detected";
pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Multipart field carrying the uploaded image
pub const UPLOAD_FIELD: &str = "file";
