//! OpenAPI documentation, served at `crate::constants::OPENAPI_PATH` and
//! rendered by RapiDoc under `crate::constants::DOCS_PATH`.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use crate::services::CapabilityStatus;
use visiongate_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vision Gate API",
        description = "Object detection and content moderation for uploaded images. Uploads are checked for extension, size and magic number before decoding; analysis endpoints are rate limited per client."
    ),
    paths(
        // General
        handlers::root::service_info,
        // Monitoring
        handlers::health::health_check,
        handlers::metrics::metrics,
        // Detection
        handlers::detect::detect_objects,
        handlers::detect::detect_annotated,
        handlers::classes::list_classes,
        // Moderation
        handlers::moderate::moderate_image,
    ),
    components(
        schemas(
            models::Detection,
            models::BoundingBox,
            models::ImageShape,
            models::DetectionReport,
            models::ModerationVerdict,
            models::ModerationFlag,
            models::Severity,
            models::CategoryScores,
            handlers::classes::ClassesResponse,
            handlers::health::HealthResponse,
            handlers::root::ServiceInfo,
            CapabilityStatus,
            // Error
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "general", description = "Service information"),
        (name = "monitoring", description = "Health and Prometheus metrics"),
        (name = "detection", description = "Object detection and annotated output"),
        (name = "moderation", description = "Content moderation verdicts")
    )
)]
pub struct ApiDoc;

/// The OpenAPI document with the running service's version.
pub fn get_openapi_spec(version: &str) -> utoipa::openapi::OpenApi {
    let mut spec = ApiDoc::openapi();
    spec.info.version = version.to_string();
    spec
}
