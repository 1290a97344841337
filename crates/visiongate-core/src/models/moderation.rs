use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::request::RequestId;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ThresholdError {
    #[error("threshold must be within (0, 1], got {0}")]
    OutOfRange(f64),
}

/// A moderation threshold in the half-open interval (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Result<Self, ThresholdError> {
        if value.is_finite() && value > 0.0 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(ThresholdError::OutOfRange(value))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Raw per-category scores as reported by the classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct CategoryScores(pub BTreeMap<String, f64>);

impl CategoryScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: impl Into<String>, score: f64) {
        self.0.insert(category.into(), score);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for CategoryScores {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    /// Tier for an unsafe score. Each cut point belongs to the tier above it.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Severity::High
        } else if score >= 0.7 {
            Severity::Medium
        } else if score >= 0.5 {
            Severity::Low
        } else {
            Severity::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ModerationFlag {
    pub category: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ModerationVerdict {
    pub is_safe: bool,
    /// Highest score among unsafe categories (0 when there are none)
    pub overall_score: f64,
    pub flagged_category: Option<String>,
    pub severity: Severity,
    /// Unsafe categories at or above the threshold, highest score first
    pub flags: Vec<ModerationFlag>,
    pub categories: CategoryScores,
    #[schema(value_type = f64)]
    pub threshold: Threshold,
    pub message: String,
    #[schema(value_type = String)]
    pub request_id: RequestId,
}
