use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, rejection::QueryRejection, Multipart, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use visiongate_core::{ModerationVerdict, RequestContext};

use super::{multipart_or_invalid, query_or_invalid};
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use crate::utils::upload::extract_multipart_file;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ModerateQuery {
    /// Flagging threshold (0.0 exclusive to 1.0 inclusive); defaults to MODERATION_THRESHOLD
    pub threshold: Option<f64>,
}

/// Classify an uploaded image for inappropriate content
///
/// A category scoring exactly the threshold is flagged. Severity tiers
/// follow the highest unsafe score: below 0.5 none, then low, medium from
/// 0.7, high from 0.9.
#[utoipa::path(
    post,
    path = "/api/v1/moderate",
    tag = "moderation",
    params(ModerateQuery),
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Moderation verdict", body = ModerationVerdict),
        (status = 400, description = "Invalid image or parameters", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "Unsupported file type", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
        (status = 500, description = "Moderation failed", body = ErrorResponse),
        (status = 503, description = "Classifier not available", body = ErrorResponse),
        (status = 504, description = "Moderation timed out", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(operation = "moderate"))]
pub async fn moderate_image(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<ModerateQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ModerationVerdict>, HttpAppError> {
    let query = query_or_invalid(query)?;
    let threshold = state.analysis.moderation_threshold(query.threshold)?;
    let blob = extract_multipart_file(multipart_or_invalid(multipart)?).await?;

    tracing::info!(
        filename = %blob.filename,
        size = blob.len(),
        threshold = threshold.value(),
        "Moderation request received"
    );

    let verdict = state
        .analysis
        .moderate(&blob, threshold, ctx.request_id.clone())
        .await?;
    Ok(Json(verdict))
}
