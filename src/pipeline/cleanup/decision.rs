//! Activation decision: confidence-gated choice of whether a cleaned record
//! goes live.
//!
//! ```text
//! confidence >= auto            → AutoActivated
//! review_min <= confidence < auto → review agent
//!     approved && review confidence >= approval → ReviewApproved
//!     otherwise (incl. error / timeout)         → ReviewRejected
//! confidence < review_min       → LowConfidenceHeld
//! ```

use super::reviewer::ReviewInvoker;
use super::types::*;

pub struct ActivationDecisionEngine {
    auto_activate_confidence: f32,
    review_min_confidence: f32,
    review_approval_confidence: f32,
}

impl ActivationDecisionEngine {
    pub fn from_config(config: &CleanupConfig) -> Self {
        Self {
            auto_activate_confidence: config.auto_activate_confidence,
            review_min_confidence: config.review_min_confidence,
            review_approval_confidence: config.review_approval_confidence,
        }
    }

    pub async fn decide(
        &self,
        confidence: f32,
        reviewer: &ReviewInvoker,
        content: &str,
        alternatives: &[Alternative],
    ) -> ActivationOutcome {
        if confidence >= self.auto_activate_confidence {
            return ActivationOutcome::new(
                ActivationDecision::AutoActivated,
                "High confidence in cleanup",
            );
        }

        if confidence < self.review_min_confidence {
            return ActivationOutcome::new(
                ActivationDecision::LowConfidenceHeld,
                format!("Cleanup confidence too low for review: {confidence}"),
            );
        }

        tracing::info!(confidence, "Mid-tier confidence, sending to review");
        match reviewer.review(content, alternatives).await {
            Ok(verdict) if verdict.approved && verdict.confidence >= self.review_approval_confidence => {
                ActivationOutcome::new(
                    ActivationDecision::ReviewApproved,
                    format!("Approved in review: {}", verdict.reason),
                )
            }
            Ok(verdict) => ActivationOutcome::new(
                ActivationDecision::ReviewRejected,
                format!("Rejected in review: {}", verdict.reason),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Review failed; keeping record inactive");
                ActivationOutcome::new(ActivationDecision::ReviewRejected, format!("Review error: {e}"))
            }
        }
    }
}
