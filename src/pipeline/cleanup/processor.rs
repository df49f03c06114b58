//! Per-record orchestration.
//!
//! fetch → signature check → extraction → validation → image merge →
//! activation decision → update. Every failure inside the chain is caught
//! here and reported as an `error` outcome so the enclosing batch continues.

use std::sync::Arc;

use super::decision::ActivationDecisionEngine;
use super::error::CleanupError;
use super::extractor::ExtractionInvoker;
use super::images::{embed_missing_images, extract_images, merge_images};
use super::pacing::CancellationToken;
use super::reviewer::ReviewInvoker;
use super::signature::matches_signature;
use super::traits::{AgentClient, QuestionStore};
use super::types::*;
use super::updater::RecordUpdater;
use super::validator::ContentValidator;

pub struct RecordProcessor {
    store: Arc<dyn QuestionStore>,
    extractor: ExtractionInvoker,
    validator: ContentValidator,
    decision: ActivationDecisionEngine,
    reviewer: ReviewInvoker,
    updater: RecordUpdater,
    cancel: CancellationToken,
}

impl RecordProcessor {
    /// Extraction and review may be served by the same agent or by two
    /// independent ones.
    pub fn new(
        store: Arc<dyn QuestionStore>,
        extraction_agent: Arc<dyn AgentClient>,
        review_agent: Arc<dyn AgentClient>,
        config: &CleanupConfig,
    ) -> Self {
        Self {
            extractor: ExtractionInvoker::new(extraction_agent, config),
            validator: ContentValidator::from_config(config),
            decision: ActivationDecisionEngine::from_config(config),
            reviewer: ReviewInvoker::new(review_agent, config),
            updater: RecordUpdater::new(store.clone()),
            store,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.extractor = self.extractor.with_cancellation(cancel.clone());
        self.reviewer = self.reviewer.with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Run the whole chain for one record. Never fails; problems become the
    /// outcome's action and details.
    pub async fn process(&self, record_id: i64) -> RecordOutcome {
        match self.try_process(record_id).await {
            Ok(outcome) => {
                tracing::info!(
                    record_id,
                    action = outcome.action.as_str(),
                    details = outcome.details.as_deref().unwrap_or(""),
                    "Record processed"
                );
                outcome
            }
            Err(e) => {
                tracing::error!(record_id, error = %e, "Record processing failed");
                RecordOutcome::new(record_id, RecordAction::Error, e.to_string())
            }
        }
    }

    async fn try_process(&self, record_id: i64) -> Result<RecordOutcome, CleanupError> {
        let record = self
            .store
            .fetch(record_id)
            .await?
            .ok_or(CleanupError::RecordNotFound(record_id))?;

        let Some(raw) = record.statement.as_deref().filter(|s| !s.trim().is_empty()) else {
            return Ok(RecordOutcome::new(record_id, RecordAction::Skipped, "No statement to clean"));
        };

        // Already repaired (or never corrupted): re-running is a no-op.
        if !matches_signature(raw) {
            return Ok(RecordOutcome::new(
                record_id,
                RecordAction::Skipped,
                "Statement carries no template markup",
            ));
        }

        if self.cancel.is_cancelled() {
            return Err(CleanupError::Cancelled);
        }

        let original_images = extract_images(raw);
        tracing::debug!(record_id, images = original_images.len(), "Sending record to extraction");

        let extraction = self.extractor.clean(raw).await;
        if !extraction.success {
            let reason = extraction
                .error
                .unwrap_or_else(|| "Extraction failed".to_string());
            return Ok(RecordOutcome::new(record_id, RecordAction::Failed, reason));
        }

        let verdict = self.validator.validate(&extraction, raw);
        if !verdict.is_valid() {
            tracing::warn!(record_id, violations = ?verdict.violations, "Extraction failed validation");
            return Ok(RecordOutcome::new(
                record_id,
                RecordAction::ValidationFailed,
                verdict.violations.join("; "),
            ));
        }

        let images = merge_images(&extraction.images, &original_images);
        let content = embed_missing_images(extraction.content_str(), &images);

        // Restored image URLs can reintroduce a signature token; content the
        // detector would still list must not be written as cleaned.
        if matches_signature(&content) {
            tracing::warn!(record_id, "Restored content still matches the corruption signature");
            return Ok(RecordOutcome::new(
                record_id,
                RecordAction::ValidationFailed,
                "Restored content still carries template markup",
            ));
        }

        let confidence = extraction.confidence_or_zero();

        let decision = self
            .decision
            .decide(confidence, &self.reviewer, &content, &extraction.alternatives)
            .await;

        // A cut-off review must not be written as a rejection.
        if self.cancel.is_cancelled() {
            return Err(CleanupError::Cancelled);
        }

        let update = RecordUpdate {
            content,
            alternatives: extraction.alternatives,
            images,
            active: decision.activates(),
            note: decision.justification,
        };
        self.updater.apply(record_id, &update).await?;

        let action = if update.active {
            RecordAction::CleanedReactivated
        } else {
            RecordAction::CleanedPendingReview
        };
        let details = format!(
            "Confidence: {confidence:.2}, Type: {}, Images: {}, Activated: {} ({}: {})",
            extraction.content_type.as_str(),
            update.images.len(),
            update.active,
            decision.decision.as_str(),
            update.note,
        );
        Ok(RecordOutcome::new(record_id, action, details))
    }
}
