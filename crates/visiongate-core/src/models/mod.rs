pub mod detection;
pub mod moderation;
pub mod request;
pub mod upload;

pub use detection::{BoundingBox, Detection, DetectionReport, ImageShape};
pub use moderation::{
    CategoryScores, ModerationFlag, ModerationVerdict, Severity, Threshold, ThresholdError,
};
pub use request::{RequestContext, RequestId, RequestOutcome};
pub use upload::{ImageKind, UploadedBlob};
