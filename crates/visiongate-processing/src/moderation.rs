//! Moderation decision engine
//!
//! Turns raw classifier scores and a threshold into a `ModerationVerdict`.
//! `decide` is a pure function of its inputs: no clock, no randomness, no
//! shared state. Severity tiers come from `Severity::from_score`.

use std::sync::Arc;
use visiongate_core::{
    AppError, CategoryScores, ModerationFlag, ModerationVerdict, RequestId, Severity, Threshold,
};

use crate::capability::{CapabilityError, ContentClassifier};
use crate::imaging::DecodedImage;
use crate::pool::InferencePool;

pub const SAFE_MESSAGE: &str = "Image passed content moderation checks.";

#[derive(Debug, Clone)]
pub struct ModerationDecisionEngine {
    /// Lower-cased names of categories that never count as unsafe.
    safe_categories: Vec<String>,
}

impl Default for ModerationDecisionEngine {
    fn default() -> Self {
        Self::new(["normal", "safe"])
    }
}

impl ModerationDecisionEngine {
    pub fn new<I, S>(safe_categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            safe_categories: safe_categories
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn is_safe_category(&self, category: &str) -> bool {
        let lower = category.to_lowercase();
        self.safe_categories.iter().any(|c| *c == lower)
    }

    pub fn decide(
        &self,
        scores: &CategoryScores,
        threshold: Threshold,
        request_id: RequestId,
    ) -> ModerationVerdict {
        let unsafe_scores: Vec<(&str, f64)> = scores
            .iter()
            .filter(|(category, _)| !self.is_safe_category(category))
            .collect();

        let overall_score = unsafe_scores
            .iter()
            .map(|(_, score)| *score)
            .fold(0.0_f64, f64::max);

        let is_safe = overall_score < threshold.value();

        let mut flags: Vec<ModerationFlag> = unsafe_scores
            .iter()
            .filter(|(_, score)| *score >= threshold.value())
            .map(|(category, score)| ModerationFlag {
                category: category.to_string(),
                confidence: *score,
            })
            .collect();
        flags.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.category.cmp(&b.category))
        });

        let flagged_category = flags.first().map(|f| f.category.clone());
        let severity = Severity::from_score(overall_score);
        let message = verdict_message(flagged_category.as_deref(), overall_score);

        ModerationVerdict {
            is_safe,
            overall_score,
            flagged_category,
            severity,
            flags,
            categories: scores.clone(),
            threshold,
            message,
            request_id,
        }
    }
}

fn verdict_message(flagged_category: Option<&str>, overall_score: f64) -> String {
    match flagged_category {
        Some(category) => format!(
            "Image flagged as potentially inappropriate. Primary concern: {} (confidence: {:.2}%)",
            category,
            overall_score * 100.0
        ),
        None => SAFE_MESSAGE.to_string(),
    }
}

/// Validate classifier output: non-empty, every score finite and within [0, 1].
pub fn validate_scores(scores: &CategoryScores) -> Result<(), CapabilityError> {
    if scores.is_empty() {
        return Err(CapabilityError::MalformedOutput(
            "classifier returned no categories".to_string(),
        ));
    }
    if let Some((category, score)) = scores
        .iter()
        .find(|(_, score)| !score.is_finite() || !(0.0..=1.0).contains(score))
    {
        return Err(CapabilityError::MalformedOutput(format!(
            "category {:?} has score {}",
            category, score
        )));
    }
    Ok(())
}

/// Calls the classification capability and runs the decision engine on its output.
#[derive(Clone)]
pub struct ModerationAdapter {
    classifier: Arc<dyn ContentClassifier>,
    pool: InferencePool,
    engine: ModerationDecisionEngine,
}

impl ModerationAdapter {
    pub fn new(
        classifier: Arc<dyn ContentClassifier>,
        pool: InferencePool,
        engine: ModerationDecisionEngine,
    ) -> Self {
        Self {
            classifier,
            pool,
            engine,
        }
    }

    pub fn classifier(&self) -> &Arc<dyn ContentClassifier> {
        &self.classifier
    }

    pub async fn run(
        &self,
        image: Arc<DecodedImage>,
        threshold: Threshold,
        request_id: RequestId,
    ) -> Result<ModerationVerdict, AppError> {
        if !self.classifier.is_ready() {
            return Err(
                CapabilityError::NotReady(self.classifier.model_name().to_string())
                    .into_moderation_error(),
            );
        }

        let scores = self
            .pool
            .run(self.classifier.classify(image))
            .await
            .map_err(|e| CapabilityError::from(e).into_moderation_error())?
            .map_err(CapabilityError::into_moderation_error)?;
        validate_scores(&scores).map_err(CapabilityError::into_moderation_error)?;

        let verdict = self.engine.decide(&scores, threshold, request_id);
        tracing::info!(
            request_id = %verdict.request_id,
            is_safe = verdict.is_safe,
            severity = verdict.severity.as_str(),
            overall_score = verdict.overall_score,
            "Moderation completed"
        );
        Ok(verdict)
    }
}
