use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::request::RequestId;

/// Axis-aligned box in pixel coordinates of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Finite coordinates with `x1 < x2` and `y1 < y2`.
    pub fn is_well_formed(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
            && self.x1 < self.x2
            && self.y1 < self.y2
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_name: String,
    pub class_id: u32,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ImageShape {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

/// Detection results for one image, in model output order.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DetectionReport {
    pub total_objects: usize,
    pub detections: Vec<Detection>,
    pub image_shape: ImageShape,
    #[schema(value_type = String)]
    pub request_id: RequestId,
}

impl DetectionReport {
    pub fn new(detections: Vec<Detection>, image_shape: ImageShape, request_id: RequestId) -> Self {
        Self {
            total_objects: detections.len(),
            detections,
            image_shape,
            request_id,
        }
    }
}
