//! Test helpers: build AppState and router for integration tests.
//!
//! The router is the production one from `setup::routes`; only the model
//! capabilities and the decoder are replaced with in-memory doubles.
//! Run with: `cargo test -p visiongate-api`.

#![allow(dead_code)]

pub mod fixtures;

use async_trait::async_trait;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use visiongate_api::constants;
use visiongate_api::services::Capabilities;
use visiongate_api::setup::{routes, services};
use visiongate_api::state::AppState;
use visiongate_core::{CategoryScores, Config, Detection, ImageKind};
use visiongate_processing::{
    CapabilityError, ContentClassifier, DecodedImage, DetectionParams, ImageDecoder, ImageGuard,
    ObjectDetector, ValidationError,
};

/// API path prefix for tests (e.g. `/api/v1`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

/// Config parsed from the given keys only; everything else takes defaults.
pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let pairs: Vec<(String, String)> = overrides
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(move |key| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
    .expect("test config must be valid")
}

/// Detector double returning a fixed list of detections.
pub struct FakeDetector {
    detections: Vec<Detection>,
    classes: Vec<String>,
    ready: AtomicBool,
    pub calls: AtomicUsize,
    pub last_params: std::sync::Mutex<Option<DetectionParams>>,
}

impl FakeDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            classes: fixtures::class_names(),
            ready: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            last_params: std::sync::Mutex::new(None),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectDetector for FakeDetector {
    fn model_name(&self) -> &str {
        "fake-detector"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn classes(&self) -> Vec<String> {
        self.classes.clone()
    }

    async fn detect(
        &self,
        _image: Arc<DecodedImage>,
        params: DetectionParams,
    ) -> Result<Vec<Detection>, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock().unwrap() = Some(params);
        Ok(self.detections.clone())
    }
}

/// Classifier double returning fixed scores, or an error.
pub struct FakeClassifier {
    result: Result<CategoryScores, String>,
    pub calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn new(scores: &[(&str, f64)]) -> Self {
        Self {
            result: Ok(scores.iter().map(|(k, v)| (*k, *v)).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ContentClassifier for FakeClassifier {
    fn model_name(&self) -> &str {
        "fake-classifier"
    }

    async fn classify(&self, _image: Arc<DecodedImage>) -> Result<CategoryScores, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .map_err(CapabilityError::Inference)
    }
}

/// Real `ImageGuard` that counts how often it is asked to decode.
pub struct CountingDecoder {
    inner: ImageGuard,
    pub calls: AtomicUsize,
}

impl CountingDecoder {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            inner: ImageGuard::new(max_dimension),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageDecoder for CountingDecoder {
    fn decode(&self, bytes: Bytes, kind: ImageKind) -> Result<DecodedImage, ValidationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.decode(bytes, kind)
    }
}

/// Which capabilities the test app is wired with.
pub struct Fakes {
    pub detector: Option<Arc<FakeDetector>>,
    pub classifier: Option<Arc<FakeClassifier>>,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            detector: Some(Arc::new(FakeDetector::new(fixtures::sample_detections()))),
            classifier: Some(Arc::new(FakeClassifier::new(&[("normal", 0.4), ("nsfw", 0.6)]))),
        }
    }
}

impl Fakes {
    pub fn none() -> Self {
        Self {
            detector: None,
            classifier: None,
        }
    }
}

/// Test application: server plus handles on the doubles.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub decoder: Arc<CountingDecoder>,
    pub detector: Option<Arc<FakeDetector>>,
    pub classifier: Option<Arc<FakeClassifier>>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

/// Default config with both capabilities wired.
pub fn setup_test_app() -> TestApp {
    setup_test_app_with(&[], Fakes::default())
}

pub fn setup_test_app_with(overrides: &[(&str, &str)], fakes: Fakes) -> TestApp {
    let capabilities = Capabilities {
        detector: fakes
            .detector
            .clone()
            .map(|d| d as Arc<dyn ObjectDetector>),
        classifier: fakes
            .classifier
            .clone()
            .map(|c| c as Arc<dyn ContentClassifier>),
    };
    let (server, state, decoder) = build_app(overrides, capabilities);

    TestApp {
        server,
        state,
        decoder,
        detector: fakes.detector,
        classifier: fakes.classifier,
    }
}

/// Production router over arbitrary capabilities.
pub fn build_app(
    overrides: &[(&str, &str)],
    capabilities: Capabilities,
) -> (TestServer, Arc<AppState>, Arc<CountingDecoder>) {
    let config = Arc::new(test_config(overrides));
    let decoder = Arc::new(CountingDecoder::new(config.upload.max_image_dimension));

    let state = services::build_state(config.clone(), decoder.clone(), capabilities)
        .expect("Failed to build state");
    let router = routes::setup_routes(&config, state.clone()).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to start test server");

    (server, state, decoder)
}

/// Multipart form with a single `file` part.
pub fn upload_form(bytes: Vec<u8>, filename: &str, mime: &str) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(bytes).file_name(filename).mime_type(mime),
    )
}
