use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::constants::{API_PREFIX, DOCS_PATH, OPENAPI_PATH};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub environment: String,
    pub endpoints: BTreeMap<String, String>,
}

fn endpoint_map() -> BTreeMap<String, String> {
    [
        ("health", "/health".to_string()),
        ("metrics", "/metrics".to_string()),
        ("detect", format!("{}/detect", API_PREFIX)),
        ("detect_annotated", format!("{}/detect/annotated", API_PREFIX)),
        ("moderate", format!("{}/moderate", API_PREFIX)),
        ("classes", format!("{}/classes", API_PREFIX)),
        ("docs", DOCS_PATH.to_string()),
        ("openapi", OPENAPI_PATH.to_string()),
    ]
    .into_iter()
    .map(|(name, path)| (name.to_string(), path))
    .collect()
}

/// Service name, version and endpoint map
#[utoipa::path(
    get,
    path = "/",
    tag = "general",
    responses((status = 200, description = "Service information", body = ServiceInfo))
)]
pub async fn service_info(State(state): State<Arc<AppState>>) -> Json<ServiceInfo> {
    let server = &state.config.server;
    Json(ServiceInfo {
        name: server.app_name.clone(),
        version: server.app_version.clone(),
        environment: server.environment.clone(),
        endpoints: endpoint_map(),
    })
}
