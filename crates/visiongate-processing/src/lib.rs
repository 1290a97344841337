//! Admission checks and model-facing logic for the analysis pipeline.
//!
//! - `validator`: byte-level FileGuard (extension, size, magic number)
//! - `imaging`: decoding with sanity checks, and annotation rendering
//! - `capability`: the detector/classifier traits the pipeline consumes
//! - `detection` / `moderation`: shaping model output into responses
//! - `pool`: bounded executor for CPU-heavy and model work

pub mod capability;
pub mod detection;
pub mod imaging;
pub mod moderation;
pub mod pool;
pub mod validator;

pub use capability::{
    Blocking, CapabilityError, ContentClassifier, DetectionParams, ObjectDetector,
    SyncContentClassifier, SyncObjectDetector,
};
pub use detection::DetectionAdapter;
pub use imaging::{annotate_jpeg, AnnotateError, DecodedImage, ImageDecoder, ImageGuard};
pub use moderation::{ModerationAdapter, ModerationDecisionEngine};
pub use pool::{InferencePool, PoolError};
pub use validator::{FileGuard, ValidationError, ValidationVerdict};
