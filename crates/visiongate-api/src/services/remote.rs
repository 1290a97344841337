//! HTTP model backends
//!
//! The detector and classifier run as separate inference services. The
//! original encoded upload is forwarded as the request body; decoding here is
//! only for validation and annotation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use visiongate_core::{CategoryScores, Detection};
use visiongate_processing::{
    CapabilityError, ContentClassifier, DecodedImage, DetectionParams, ObjectDetector,
};

const MAX_PROBE_BACKOFF: Duration = Duration::from_secs(30);

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client for model backend")
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CapabilityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
        return Err(CapabilityError::NotReady(error_text));
    }
    Err(CapabilityError::Inference(format!(
        "backend returned {} - {}",
        status, error_text
    )))
}

fn transport_error(err: reqwest::Error) -> CapabilityError {
    if err.is_decode() {
        CapabilityError::MalformedOutput(err.to_string())
    } else {
        CapabilityError::Inference(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    detections: Vec<Detection>,
}

#[derive(Debug, Deserialize)]
struct ClassesResponse {
    classes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// Either `{"scores": {label: score}}` or `[{"label", "score"}]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifyResponse {
    Map { scores: BTreeMap<String, f64> },
    List(Vec<LabelScore>),
}

impl From<ClassifyResponse> for CategoryScores {
    fn from(response: ClassifyResponse) -> Self {
        match response {
            ClassifyResponse::Map { scores } => CategoryScores(scores),
            ClassifyResponse::List(items) => {
                items.into_iter().map(|item| (item.label, item.score)).collect()
            }
        }
    }
}

/// Object detector behind `{DETECTOR_URL}/detect`.
pub struct RemoteDetector {
    http_client: reqwest::Client,
    base_url: String,
    model_name: String,
    classes: RwLock<Vec<String>>,
    ready: AtomicBool,
}

impl Debug for RemoteDetector {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RemoteDetector")
            .field("base_url", &self.base_url)
            .field("model_name", &self.model_name)
            .field("ready", &self.ready.load(Ordering::Acquire))
            .finish()
    }
}

impl RemoteDetector {
    pub fn new(base_url: &str, model_name: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http_client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model_name: model_name.to_string(),
            classes: RwLock::new(Vec::new()),
            ready: AtomicBool::new(false),
        })
    }

    /// Fetch the class list; the detector is ready once this succeeds.
    pub async fn load_classes(&self) -> Result<usize, CapabilityError> {
        let response = self
            .http_client
            .get(format!("{}/classes", self.base_url))
            .send()
            .await
            .map_err(transport_error)?;
        let body: ClassesResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(transport_error)?;

        let count = body.classes.len();
        if let Ok(mut classes) = self.classes.write() {
            *classes = body.classes;
        }
        if !self.ready.swap(true, Ordering::AcqRel) {
            tracing::info!(
                model = %self.model_name,
                classes = count,
                "Detection model is ready"
            );
        }
        Ok(count)
    }

    /// Retry `load_classes` in the background until it succeeds.
    pub fn spawn_readiness_probe(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let detector = self.clone();
        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);
            loop {
                match detector.load_classes().await {
                    Ok(_) => break,
                    Err(e) => {
                        tracing::warn!(
                            model = %detector.model_name,
                            error = %e,
                            retry_in_secs = backoff.as_secs(),
                            "Detection model not reachable yet"
                        );
                    }
                }
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_PROBE_BACKOFF);
            }
        })
    }
}

#[async_trait]
impl ObjectDetector for RemoteDetector {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn classes(&self) -> Vec<String> {
        self.classes.read().map(|c| c.clone()).unwrap_or_default()
    }

    async fn detect(
        &self,
        image: Arc<DecodedImage>,
        params: DetectionParams,
    ) -> Result<Vec<Detection>, CapabilityError> {
        let response = self
            .http_client
            .post(format!("{}/detect", self.base_url))
            .query(&[("confidence", params.confidence), ("iou", params.iou)])
            .header(reqwest::header::CONTENT_TYPE, image.kind.mime_type())
            .body(image.source.clone())
            .send()
            .await
            .map_err(transport_error)?;
        let body: DetectResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(transport_error)?;
        Ok(body.detections)
    }
}

/// Content classifier behind `{CLASSIFIER_URL}/classify`.
pub struct RemoteClassifier {
    http_client: reqwest::Client,
    base_url: String,
    model_name: String,
}

impl Debug for RemoteClassifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RemoteClassifier")
            .field("base_url", &self.base_url)
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl RemoteClassifier {
    pub fn new(base_url: &str, model_name: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http_client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model_name: model_name.to_string(),
        })
    }
}

#[async_trait]
impl ContentClassifier for RemoteClassifier {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn classify(&self, image: Arc<DecodedImage>) -> Result<CategoryScores, CapabilityError> {
        let response = self
            .http_client
            .post(format!("{}/classify", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, image.kind.mime_type())
            .body(image.source.clone())
            .send()
            .await
            .map_err(transport_error)?;
        let body: ClassifyResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(transport_error)?;
        Ok(body.into())
    }
}
