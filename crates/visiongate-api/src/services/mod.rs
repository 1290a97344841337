//! Application services

pub mod analysis;
pub mod remote;

pub use analysis::{AnalysisService, CapabilityStatus, Capabilities, DetectionOutcome};
pub use remote::{RemoteClassifier, RemoteDetector};
