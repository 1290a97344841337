//! Application state shared by handlers and middleware.

use std::sync::Arc;
use std::time::Instant;
use visiongate_core::Config;
use visiongate_infra::{MetricsRegistry, RateLimiter};

use crate::services::AnalysisService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub analysis: AnalysisService,
    pub metrics: MetricsRegistry,
    /// `None` when rate limiting is disabled.
    pub rate_limiter: Option<RateLimiter>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        analysis: AnalysisService,
        metrics: MetricsRegistry,
    ) -> Self {
        let rate_limiter = config
            .rate_limit
            .enabled
            .then(|| RateLimiter::new(config.rate_limit.requests, config.rate_limit.window));
        Self {
            config,
            analysis,
            metrics,
            rate_limiter,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// State over the given config keys with no model capabilities.
#[cfg(test)]
pub(crate) fn test_state(overrides: &[(&str, &str)]) -> Arc<AppState> {
    use crate::services::Capabilities;
    use visiongate_processing::ImageGuard;

    let pairs: Vec<(String, String)> = overrides
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let config = Config::from_lookup(move |key| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
    .unwrap();
    let config = Arc::new(config);
    let decoder = Arc::new(ImageGuard::new(config.upload.max_image_dimension));
    crate::setup::services::build_state(config, decoder, Capabilities::default()).unwrap()
}
