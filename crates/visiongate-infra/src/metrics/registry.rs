use anyhow::{Context, Result};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

const NAMESPACE: &str = "visiongate";

/// Endpoint label for requests that matched no route.
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Process-wide metrics, registered on a private registry.
///
/// Counters and histograms are atomics, so recording from many requests at
/// once never blocks and a scrape never blocks writers.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    http_requests: IntCounterVec,
    http_duration: HistogramVec,
    errors: IntCounterVec,
    rate_limit_rejections: IntCounter,
    detections: IntCounterVec,
    moderation_outcomes: IntCounterVec,
    inference_duration: HistogramVec,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests").namespace(NAMESPACE),
            &["method", "endpoint", "status"],
        )?;
        let http_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["method", "endpoint"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new("errors_total", "Error responses by kind").namespace(NAMESPACE),
            &["error_kind"],
        )?;
        let rate_limit_rejections = IntCounter::with_opts(
            Opts::new(
                "rate_limit_rejections_total",
                "Requests rejected by the rate limiter",
            )
            .namespace(NAMESPACE),
        )?;
        let detections = IntCounterVec::new(
            Opts::new("detections_total", "Objects detected by class").namespace(NAMESPACE),
            &["class_name"],
        )?;
        let moderation_outcomes = IntCounterVec::new(
            Opts::new("moderation_outcomes_total", "Moderation verdicts").namespace(NAMESPACE),
            &["outcome", "severity"],
        )?;
        let inference_duration = HistogramVec::new(
            HistogramOpts::new(
                "inference_duration_seconds",
                "External model call latency in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["capability"],
        )?;

        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(http_duration.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(rate_limit_rejections.clone()))?;
        registry.register(Box::new(detections.clone()))?;
        registry.register(Box::new(moderation_outcomes.clone()))?;
        registry.register(Box::new(inference_duration.clone()))?;

        Ok(Self {
            registry,
            http_requests,
            http_duration,
            errors,
            rate_limit_rejections,
            detections,
            moderation_outcomes,
            inference_duration,
        })
    }

    pub fn record_request(&self, method: &str, endpoint: &str, status: u16, elapsed: Duration) {
        self.http_requests
            .with_label_values(&[method, endpoint, &status.to_string()])
            .inc();
        self.http_duration
            .with_label_values(&[method, endpoint])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_error(&self, error_kind: &str) {
        self.errors.with_label_values(&[error_kind]).inc();
    }

    pub fn record_rate_limit_rejection(&self) {
        self.rate_limit_rejections.inc();
    }

    pub fn record_detections<'a>(&self, class_names: impl IntoIterator<Item = &'a str>) {
        for class_name in class_names {
            self.detections.with_label_values(&[class_name]).inc();
        }
    }

    pub fn record_moderation(&self, is_safe: bool, severity: &str) {
        let outcome = if is_safe { "safe" } else { "unsafe" };
        self.moderation_outcomes
            .with_label_values(&[outcome, severity])
            .inc();
    }

    pub fn record_inference(&self, capability: &str, elapsed: Duration) {
        self.inference_duration
            .with_label_values(&[capability])
            .observe(elapsed.as_secs_f64());
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("failed to encode metrics")?;
        String::from_utf8(buffer).context("metrics output is not valid UTF-8")
    }
}
