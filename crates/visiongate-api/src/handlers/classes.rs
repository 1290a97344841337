use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ClassesResponse {
    pub total_classes: usize,
    /// Class names indexed by class id
    pub classes: Vec<String>,
}

/// List the object classes the detector can report
#[utoipa::path(
    get,
    path = "/api/v1/classes",
    tag = "detection",
    responses(
        (status = 200, description = "Available classes", body = ClassesResponse),
        (status = 503, description = "Detector not available", body = ErrorResponse)
    )
)]
pub async fn list_classes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClassesResponse>, HttpAppError> {
    let classes = state.analysis.classes()?;
    Ok(Json(ClassesResponse {
        total_classes: classes.len(),
        classes,
    }))
}
