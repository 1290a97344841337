//! External model capabilities.
//!
//! The pipeline never loads weights itself. It talks to an `ObjectDetector`
//! and a `ContentClassifier`, which may be remote services or in-process
//! models wrapped with [`Blocking`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use visiongate_core::{AppError, CategoryScores, Detection};

use crate::imaging::DecodedImage;
use crate::pool::{Lease, PoolError};

/// Per-request detection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    pub confidence: f64,
    pub iou: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("model is not ready: {0}")]
    NotReady(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    #[error("inference timed out after {0:?}")]
    Timeout(Duration),

    #[error("inference capacity exhausted: {0}")]
    Saturated(String),
}

impl From<PoolError> for CapabilityError {
    fn from(err: PoolError) -> Self {
        let message = err.to_string();
        match err {
            PoolError::Timeout(d) => CapabilityError::Timeout(d),
            PoolError::Saturated(_) | PoolError::Closed => CapabilityError::Saturated(message),
            PoolError::Worker(msg) => CapabilityError::Inference(msg),
        }
    }
}

impl CapabilityError {
    pub fn into_detection_error(self) -> AppError {
        match self {
            CapabilityError::Timeout(d) => AppError::DetectionTimeout(d.as_secs()),
            CapabilityError::NotReady(msg) => {
                AppError::ServiceUnavailable(format!("Detection model is not ready: {}", msg))
            }
            CapabilityError::Saturated(_) => AppError::ServiceUnavailable(
                "Detection capacity exhausted, retry shortly".to_string(),
            ),
            other => AppError::Detection(other.to_string()),
        }
    }

    pub fn into_moderation_error(self) -> AppError {
        match self {
            CapabilityError::Timeout(d) => AppError::ModerationTimeout(d.as_secs()),
            CapabilityError::NotReady(msg) => {
                AppError::ServiceUnavailable(format!("Moderation model is not ready: {}", msg))
            }
            CapabilityError::Saturated(_) => AppError::ServiceUnavailable(
                "Moderation capacity exhausted, retry shortly".to_string(),
            ),
            other => AppError::Moderation(other.to_string()),
        }
    }
}

#[async_trait]
pub trait ObjectDetector: Send + Sync {
    fn model_name(&self) -> &str;

    fn is_ready(&self) -> bool {
        true
    }

    /// Class names indexed by class id.
    fn classes(&self) -> Vec<String>;

    /// Raw detections in model output order. IoU suppression is the model's job.
    async fn detect(
        &self,
        image: Arc<DecodedImage>,
        params: DetectionParams,
    ) -> Result<Vec<Detection>, CapabilityError>;
}

#[async_trait]
pub trait ContentClassifier: Send + Sync {
    fn model_name(&self) -> &str;

    fn is_ready(&self) -> bool {
        true
    }

    async fn classify(&self, image: Arc<DecodedImage>) -> Result<CategoryScores, CapabilityError>;
}

/// Synchronous, CPU-bound detector (e.g. an in-process model).
pub trait SyncObjectDetector: Send + Sync + 'static {
    fn model_name(&self) -> &str;
    fn classes(&self) -> Vec<String>;
    fn detect(
        &self,
        image: &DecodedImage,
        params: DetectionParams,
    ) -> Result<Vec<Detection>, CapabilityError>;
}

/// Synchronous, CPU-bound classifier.
pub trait SyncContentClassifier: Send + Sync + 'static {
    fn model_name(&self) -> &str;
    fn classify(&self, image: &DecodedImage) -> Result<CategoryScores, CapabilityError>;
}

/// Runs a synchronous model on tokio's blocking pool so it never stalls the
/// async workers. When called under [`InferencePool::run`](crate::pool::InferencePool::run)
/// the pool slot moves onto the blocking thread, so a timed-out request does
/// not free capacity while the model is still computing.
pub struct Blocking<T>(Arc<T>);

impl<T> Blocking<T> {
    pub fn new(inner: T) -> Self {
        Self(Arc::new(inner))
    }
}

fn join_error(err: tokio::task::JoinError) -> CapabilityError {
    CapabilityError::Inference(format!("model worker failed: {}", err))
}

#[async_trait]
impl<T: SyncObjectDetector> ObjectDetector for Blocking<T> {
    fn model_name(&self) -> &str {
        self.0.model_name()
    }

    fn classes(&self) -> Vec<String> {
        self.0.classes()
    }

    async fn detect(
        &self,
        image: Arc<DecodedImage>,
        params: DetectionParams,
    ) -> Result<Vec<Detection>, CapabilityError> {
        let model = self.0.clone();
        let lease = Lease::current();
        tokio::task::spawn_blocking(move || {
            let _lease = lease;
            model.detect(&image, params)
        })
        .await
        .map_err(join_error)?
    }
}

#[async_trait]
impl<T: SyncContentClassifier> ContentClassifier for Blocking<T> {
    fn model_name(&self) -> &str {
        self.0.model_name()
    }

    async fn classify(&self, image: Arc<DecodedImage>) -> Result<CategoryScores, CapabilityError> {
        let model = self.0.clone();
        let lease = Lease::current();
        tokio::task::spawn_blocking(move || {
            let _lease = lease;
            model.classify(&image)
        })
        .await
        .map_err(join_error)?
    }
}
