//! Application setup and initialization
//!
//! Everything main.rs needs to go from a validated `Config` to a router
//! ready to serve.

pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use visiongate_core::Config;
use visiongate_processing::ImageGuard;

const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    visiongate_infra::init_telemetry(&config.observability)
        .context("Failed to initialize telemetry")?;

    tracing::info!(
        environment = %config.server.environment,
        version = %config.server.app_version,
        "Configuration loaded and validated successfully"
    );

    let config = Arc::new(config);

    let capabilities = services::remote_capabilities(&config)?;
    let decoder = Arc::new(ImageGuard::new(config.upload.max_image_dimension));
    let state = services::build_state(config.clone(), decoder, capabilities)?;

    if let Some(limiter) = &state.rate_limiter {
        limiter.spawn_cleanup(RATE_LIMIT_CLEANUP_INTERVAL);
        tracing::info!(
            requests = limiter.limit(),
            window_secs = limiter.window().as_secs(),
            "Rate limiting enabled for analysis endpoints"
        );
    } else {
        tracing::warn!("Rate limiting disabled");
    }

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
