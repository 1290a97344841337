//! Service construction: model backends, inference pool, metrics and the
//! shared application state.

use anyhow::{Context, Result};
use std::sync::Arc;
use visiongate_core::Config;
use visiongate_infra::MetricsRegistry;
use visiongate_processing::{ContentClassifier, ImageDecoder, InferencePool, ObjectDetector};

use crate::services::{AnalysisService, Capabilities, RemoteClassifier, RemoteDetector};
use crate::state::AppState;

/// HTTP backends for every capability whose URL is configured.
///
/// The detector starts not ready; a background probe loads its class list
/// and flips it ready once the backend answers.
pub fn remote_capabilities(config: &Config) -> Result<Capabilities> {
    let models = &config.models;
    let timeout = config.inference.timeout;

    let detector = match &models.detector_url {
        Some(url) => {
            let detector = Arc::new(
                RemoteDetector::new(url, &models.detector_model, timeout)
                    .context("Failed to create detection backend")?,
            );
            detector.spawn_readiness_probe();
            tracing::info!(url = %url, model = %models.detector_model, "Detection backend configured");
            Some(detector as Arc<dyn ObjectDetector>)
        }
        None => {
            tracing::warn!("DETECTOR_URL not set - object detection endpoints will return 503");
            None
        }
    };

    let classifier = match &models.classifier_url {
        Some(url) => {
            let classifier = RemoteClassifier::new(url, &models.classifier_model, timeout)
                .context("Failed to create classification backend")?;
            tracing::info!(url = %url, model = %models.classifier_model, "Classification backend configured");
            Some(Arc::new(classifier) as Arc<dyn ContentClassifier>)
        }
        None => {
            tracing::warn!("CLASSIFIER_URL not set - moderation endpoint will return 503");
            None
        }
    };

    Ok(Capabilities {
        detector,
        classifier,
    })
}

/// Build the application state around the given decoder and capabilities.
pub fn build_state(
    config: Arc<Config>,
    decoder: Arc<dyn ImageDecoder>,
    capabilities: Capabilities,
) -> Result<Arc<AppState>> {
    let metrics = MetricsRegistry::new().context("Failed to create metrics registry")?;

    let pool = InferencePool::new(
        config.inference.max_concurrency,
        config.inference.queue_depth,
        config.inference.timeout,
    );
    tracing::info!(
        max_concurrency = pool.max_concurrency(),
        capacity = pool.capacity(),
        timeout_secs = pool.timeout().as_secs(),
        "Inference pool initialized"
    );

    let analysis = AnalysisService::new(&config, decoder, pool, capabilities, metrics.clone());

    Ok(Arc::new(AppState::new(config, analysis, metrics)))
}
