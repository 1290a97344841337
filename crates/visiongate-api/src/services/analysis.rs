//! Analysis service
//!
//! Explicit handle for the admission and decision pipeline:
//! FileGuard, then ImageGuard (decode on the bounded pool), then the
//! detection adapter or the moderation adapter.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use utoipa::ToSchema;
use visiongate_core::{
    AppError, Config, DetectionReport, ImageKind, ModerationVerdict, RequestId, Threshold,
    UploadedBlob,
};
use visiongate_infra::MetricsRegistry;
use visiongate_processing::{
    annotate_jpeg, ContentClassifier, DecodedImage, DetectionAdapter, DetectionParams, FileGuard,
    ImageDecoder, InferencePool, ModerationAdapter, ModerationDecisionEngine, ObjectDetector,
    PoolError,
};

/// Model backends available to the service. Either may be absent.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub detector: Option<Arc<dyn ObjectDetector>>,
    pub classifier: Option<Arc<dyn ContentClassifier>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityStatus {
    Ready,
    Loading,
    NotConfigured,
}

/// A finished detection plus the decoded image, kept for annotation.
pub struct DetectionOutcome {
    pub report: DetectionReport,
    pub image: Arc<DecodedImage>,
}

#[derive(Clone)]
pub struct AnalysisService {
    file_guard: FileGuard,
    decoder: Arc<dyn ImageDecoder>,
    pool: InferencePool,
    detection: Option<DetectionAdapter>,
    moderation: Option<ModerationAdapter>,
    default_params: DetectionParams,
    default_threshold: Threshold,
    metrics: MetricsRegistry,
}

fn processing_error(err: PoolError) -> AppError {
    match err {
        PoolError::Saturated(_) | PoolError::Closed => AppError::ServiceUnavailable(
            "Image processing capacity exhausted, retry shortly".to_string(),
        ),
        PoolError::Timeout(d) => AppError::ServiceUnavailable(format!(
            "Image processing timed out after {}s",
            d.as_secs()
        )),
        PoolError::Worker(msg) => AppError::Internal(msg),
    }
}

fn unit_interval(name: &str, value: f64) -> Result<f64, AppError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(AppError::InvalidRequest(format!(
            "{} must be between 0 and 1, got {}",
            name, value
        )))
    }
}

impl AnalysisService {
    pub fn new(
        config: &Config,
        decoder: Arc<dyn ImageDecoder>,
        pool: InferencePool,
        capabilities: Capabilities,
        metrics: MetricsRegistry,
    ) -> Self {
        let engine = ModerationDecisionEngine::new(&config.models.safe_categories);
        Self {
            file_guard: FileGuard::from_config(&config.upload),
            decoder,
            detection: capabilities
                .detector
                .map(|d| DetectionAdapter::new(d, pool.clone())),
            moderation: capabilities
                .classifier
                .map(|c| ModerationAdapter::new(c, pool.clone(), engine)),
            pool,
            default_params: DetectionParams {
                confidence: config.models.confidence_threshold,
                iou: config.models.iou_threshold,
            },
            default_threshold: config.models.moderation_threshold,
            metrics,
        }
    }

    pub fn detector_status(&self) -> CapabilityStatus {
        match &self.detection {
            None => CapabilityStatus::NotConfigured,
            Some(adapter) if adapter.detector().is_ready() => CapabilityStatus::Ready,
            Some(_) => CapabilityStatus::Loading,
        }
    }

    pub fn classifier_status(&self) -> CapabilityStatus {
        match &self.moderation {
            None => CapabilityStatus::NotConfigured,
            Some(adapter) if adapter.classifier().is_ready() => CapabilityStatus::Ready,
            Some(_) => CapabilityStatus::Loading,
        }
    }

    /// Query overrides on top of the configured detection defaults.
    pub fn detection_params(
        &self,
        confidence: Option<f64>,
        iou: Option<f64>,
    ) -> Result<DetectionParams, AppError> {
        Ok(DetectionParams {
            confidence: confidence
                .map(|v| unit_interval("confidence", v))
                .transpose()?
                .unwrap_or(self.default_params.confidence),
            iou: iou
                .map(|v| unit_interval("iou", v))
                .transpose()?
                .unwrap_or(self.default_params.iou),
        })
    }

    pub fn moderation_threshold(&self, threshold: Option<f64>) -> Result<Threshold, AppError> {
        match threshold {
            None => Ok(self.default_threshold),
            Some(value) => Threshold::new(value).map_err(|e| AppError::InvalidRequest(e.to_string())),
        }
    }

    fn detection_adapter(&self) -> Result<&DetectionAdapter, AppError> {
        self.detection.as_ref().ok_or_else(|| {
            AppError::ServiceUnavailable("Object detection is not configured".to_string())
        })
    }

    fn moderation_adapter(&self) -> Result<&ModerationAdapter, AppError> {
        self.moderation.as_ref().ok_or_else(|| {
            AppError::ServiceUnavailable("Content moderation is not configured".to_string())
        })
    }

    pub fn classes(&self) -> Result<Vec<String>, AppError> {
        let adapter = self.detection_adapter()?;
        let detector = adapter.detector();
        if !detector.is_ready() {
            return Err(AppError::ServiceUnavailable(format!(
                "Detection model is not ready: {}",
                detector.model_name()
            )));
        }
        Ok(detector.classes())
    }

    /// FileGuard then ImageGuard. Nothing is decoded unless the byte-level
    /// checks pass.
    pub async fn admit(&self, blob: &UploadedBlob) -> Result<Arc<DecodedImage>, AppError> {
        let kind = self.file_guard.validate(blob)?;
        self.decode(blob, kind).await
    }

    async fn decode(&self, blob: &UploadedBlob, kind: ImageKind) -> Result<Arc<DecodedImage>, AppError> {
        let decoder = self.decoder.clone();
        let bytes = blob.bytes.clone();
        let image = self
            .pool
            .run_blocking(move || decoder.decode(bytes, kind))
            .await
            .map_err(processing_error)??;
        Ok(Arc::new(image))
    }

    pub async fn detect(
        &self,
        blob: &UploadedBlob,
        params: DetectionParams,
        request_id: RequestId,
    ) -> Result<DetectionOutcome, AppError> {
        let adapter = self.detection_adapter()?;
        let image = self.admit(blob).await?;

        let started = Instant::now();
        let result = adapter.run(image.clone(), params, request_id).await;
        self.metrics.record_inference("detection", started.elapsed());
        let report = result?;

        self.metrics.record_detections(
            report
                .detections
                .iter()
                .map(|d| d.class_name.as_str()),
        );
        Ok(DetectionOutcome { report, image })
    }

    /// Draw the report's boxes onto the decoded image and encode as JPEG.
    pub async fn annotate(&self, outcome: &DetectionOutcome) -> Result<Vec<u8>, AppError> {
        let image = outcome.image.clone();
        let detections = outcome.report.detections.clone();
        self.pool
            .run_blocking(move || annotate_jpeg(&image, &detections))
            .await
            .map_err(processing_error)?
            .map_err(|e| AppError::Internal(format!("Failed to render annotated image: {}", e)))
    }

    pub async fn moderate(
        &self,
        blob: &UploadedBlob,
        threshold: Threshold,
        request_id: RequestId,
    ) -> Result<ModerationVerdict, AppError> {
        let adapter = self.moderation_adapter()?;
        let image = self.admit(blob).await?;

        let started = Instant::now();
        let result = adapter.run(image, threshold, request_id).await;
        self.metrics.record_inference("moderation", started.elapsed());
        let verdict = result?;

        self.metrics
            .record_moderation(verdict.is_safe, verdict.severity.as_str());
        Ok(verdict)
    }
}
