use std::sync::Arc;
use visiongate_core::{AppError, Detection, DetectionReport, RequestId};

use crate::capability::{CapabilityError, DetectionParams, ObjectDetector};
use crate::imaging::DecodedImage;
use crate::pool::InferencePool;

/// Calls the detection capability and shapes its output into a report.
#[derive(Clone)]
pub struct DetectionAdapter {
    detector: Arc<dyn ObjectDetector>,
    pool: InferencePool,
}

impl DetectionAdapter {
    pub fn new(detector: Arc<dyn ObjectDetector>, pool: InferencePool) -> Self {
        Self { detector, pool }
    }

    pub fn detector(&self) -> &Arc<dyn ObjectDetector> {
        &self.detector
    }

    pub async fn run(
        &self,
        image: Arc<DecodedImage>,
        params: DetectionParams,
        request_id: RequestId,
    ) -> Result<DetectionReport, AppError> {
        if !self.detector.is_ready() {
            return Err(CapabilityError::NotReady(self.detector.model_name().to_string())
                .into_detection_error());
        }

        let shape = image.shape();
        let raw = self
            .pool
            .run(self.detector.detect(image, params))
            .await
            .map_err(|e| CapabilityError::from(e).into_detection_error())?
            .map_err(CapabilityError::into_detection_error)?;

        let detections =
            filter_detections(raw, params.confidence).map_err(CapabilityError::into_detection_error)?;

        tracing::info!(
            request_id = %request_id,
            total_objects = detections.len(),
            width = shape.width,
            height = shape.height,
            "Detection completed"
        );

        Ok(DetectionReport::new(detections, shape, request_id))
    }
}

/// Validate raw model output and keep detections at or above `confidence`,
/// preserving model order.
pub fn filter_detections(
    raw: Vec<Detection>,
    confidence: f64,
) -> Result<Vec<Detection>, CapabilityError> {
    for (index, detection) in raw.iter().enumerate() {
        if !detection.confidence.is_finite() || !(0.0..=1.0).contains(&detection.confidence) {
            return Err(CapabilityError::MalformedOutput(format!(
                "detection {} has confidence {}",
                index, detection.confidence
            )));
        }
        if !detection.bbox.is_well_formed() {
            return Err(CapabilityError::MalformedOutput(format!(
                "detection {} has a degenerate bounding box {:?}",
                index, detection.bbox
            )));
        }
    }
    Ok(raw
        .into_iter()
        .filter(|d| d.confidence >= confidence)
        .collect())
}
