//! Core types for the question cleanup pipeline.
//!
//! These types model the full lifecycle of one polluted record:
//! Record → Extraction → Validation → Activation decision → Update,
//! and the reports folded from it at batch and run level.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CleanupError;

// ═══════════════════════════════════════════
// Stored record
// ═══════════════════════════════════════════

/// Descriptive metadata carried by a question. Never modified here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub subject: Option<String>,
    pub board: Option<String>,
    pub year: Option<i64>,
    pub agency: Option<String>,
}

/// A question record as read from the store.
///
/// `statement` is the rich-text field that may carry leaked template markup.
/// `alternatives` is kept raw because polluted rows hold arbitrary JSON there.
#[derive(Debug, Clone, PartialEq)]
pub struct CorruptedRecord {
    pub id: i64,
    pub statement: Option<String>,
    pub alternatives: Option<serde_json::Value>,
    pub images: Option<String>,
    pub metadata: RecordMetadata,
    pub active: bool,
}

/// One answer alternative, e.g. `{"letter": "A", "text": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    pub letter: String,
    #[serde(default)]
    pub text: String,
}

/// Everything the record updater writes back for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub content: String,
    pub alternatives: Vec<Alternative>,
    /// Empty means "keep whatever image list is already stored".
    pub images: Vec<String>,
    pub active: bool,
    pub note: String,
}

// ═══════════════════════════════════════════
// Extraction
// ═══════════════════════════════════════════

/// Question shape reported by the extraction agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    TrueFalse,
    MultipleChoice,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrueFalse => "true_false",
            Self::MultipleChoice => "multiple_choice",
            Self::Unknown => "unknown",
        }
    }
}

/// Structured content reconstructed by the extraction agent.
///
/// Invariant: `success == true` implies `content` and `confidence` are set.
/// Only [`ExtractionResult::extracted`] and [`ExtractionResult::failure`]
/// construct values, so the invariant holds everywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub success: bool,
    pub content: Option<String>,
    pub alternatives: Vec<Alternative>,
    pub images: Vec<String>,
    pub content_type: ContentType,
    pub confidence: Option<f32>,
    pub notes: Option<String>,
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn extracted(
        content: String,
        confidence: f32,
        alternatives: Vec<Alternative>,
        images: Vec<String>,
        content_type: ContentType,
        notes: Option<String>,
    ) -> Self {
        Self {
            success: true,
            content: Some(content),
            alternatives,
            images,
            content_type,
            confidence: Some(confidence),
            notes,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: None,
            alternatives: Vec::new(),
            images: Vec::new(),
            content_type: ContentType::Unknown,
            confidence: None,
            notes: None,
            error: Some(error.into()),
        }
    }

    pub fn confidence_or_zero(&self) -> f32 {
        self.confidence.unwrap_or(0.0)
    }

    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

// ═══════════════════════════════════════════
// Validation & review
// ═══════════════════════════════════════════

/// Complete diagnostic from the validation rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationVerdict {
    pub violations: Vec<String>,
}

impl ValidationVerdict {
    /// Valid exactly when no rule was violated.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Second-opinion verdict from the review agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewVerdict {
    pub approved: bool,
    pub confidence: f32,
    pub reason: String,
}

impl ReviewVerdict {
    pub fn rejected(confidence: f32, reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            confidence,
            reason: reason.into(),
        }
    }
}

// ═══════════════════════════════════════════
// Activation decision
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationDecision {
    AutoActivated,
    ReviewApproved,
    ReviewRejected,
    LowConfidenceHeld,
}

impl ActivationDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoActivated => "auto_activated",
            Self::ReviewApproved => "review_approved",
            Self::ReviewRejected => "review_rejected",
            Self::LowConfidenceHeld => "low_confidence_held",
        }
    }

    /// Whether the record becomes visible to downstream consumers.
    pub fn activates(&self) -> bool {
        matches!(self, Self::AutoActivated | Self::ReviewApproved)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivationOutcome {
    pub decision: ActivationDecision,
    pub justification: String,
}

impl ActivationOutcome {
    pub fn new(decision: ActivationDecision, justification: impl Into<String>) -> Self {
        Self {
            decision,
            justification: justification.into(),
        }
    }

    pub fn activates(&self) -> bool {
        self.decision.activates()
    }
}

// ═══════════════════════════════════════════
// Per-record outcome
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordAction {
    Skipped,
    Failed,
    ValidationFailed,
    CleanedReactivated,
    CleanedPendingReview,
    Error,
}

impl RecordAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::ValidationFailed => "validation_failed",
            Self::CleanedReactivated => "cleaned_reactivated",
            Self::CleanedPendingReview => "cleaned_pending_review",
            Self::Error => "error",
        }
    }

    /// Whether the record's content was rewritten and it left the backlog.
    pub fn is_cleaned(&self) -> bool {
        matches!(self, Self::CleanedReactivated | Self::CleanedPendingReview)
    }
}

impl std::fmt::Display for RecordAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub record_id: i64,
    pub action: RecordAction,
    pub details: Option<String>,
}

impl RecordOutcome {
    pub fn new(record_id: i64, action: RecordAction, details: impl Into<String>) -> Self {
        Self {
            record_id,
            action,
            details: Some(details.into()),
        }
    }
}

// ═══════════════════════════════════════════
// Reports
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordError {
    pub record_id: i64,
    pub reason: String,
}

/// Counters for one batch, built additively while it runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Records attempted. Fetched records a cancellation cut off are not
    /// counted, so the outcome counters always add up to this.
    pub total: u32,
    pub cleaned: u32,
    pub reactivated: u32,
    pub pending_review: u32,
    pub failed: u32,
    pub validation_failed: u32,
    pub skipped: u32,
    pub errors: Vec<RecordError>,
    /// Set when the batch stopped early on cancellation.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fold one record's outcome into the counters.
    pub fn record(&mut self, outcome: &RecordOutcome) {
        let reason = || outcome.details.clone().unwrap_or_else(|| outcome.action.to_string());
        self.total += 1;
        match outcome.action {
            RecordAction::CleanedReactivated => {
                self.cleaned += 1;
                self.reactivated += 1;
            }
            RecordAction::CleanedPendingReview => {
                self.cleaned += 1;
                self.pending_review += 1;
            }
            RecordAction::ValidationFailed => {
                self.validation_failed += 1;
                self.errors.push(RecordError { record_id: outcome.record_id, reason: reason() });
            }
            RecordAction::Failed | RecordAction::Error => {
                self.failed += 1;
                self.errors.push(RecordError { record_id: outcome.record_id, reason: reason() });
            }
            RecordAction::Skipped => self.skipped += 1,
        }
    }

    /// Records that are still in the backlog after this batch.
    pub fn left_in_backlog(&self) -> u32 {
        self.total.saturating_sub(self.cleaned)
    }
}

/// Counters accumulated across every batch of a continuous run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub total: u32,
    pub cleaned: u32,
    pub reactivated: u32,
    pub pending_review: u32,
    pub failed: u32,
    pub validation_failed: u32,
    pub skipped: u32,
    pub errors: Vec<RecordError>,
    pub batches_run: u32,
    /// Index (1-based) of the batch the run ended on; 0 if none ran.
    pub last_batch: u32,
    pub cancelled: bool,
}

impl RunReport {
    /// Fold a finished batch into the running totals.
    pub fn absorb(&mut self, batch_index: u32, batch: BatchReport) {
        self.total += batch.total;
        self.cleaned += batch.cleaned;
        self.reactivated += batch.reactivated;
        self.pending_review += batch.pending_review;
        self.failed += batch.failed;
        self.validation_failed += batch.validation_failed;
        self.skipped += batch.skipped;
        self.errors.extend(batch.errors);
        self.batches_run += 1;
        self.last_batch = batch_index;
        self.cancelled |= batch.cancelled;
    }
}

// ═══════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════

/// Tunables for the whole pipeline.
///
/// The validation cutoff and the decision engine's review floor are separate
/// values. With both at 0.70 the low-confidence tier is never reached;
/// lowering only `validation_min_confidence` enables it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub model_name: String,
    /// Minimum extraction confidence accepted by validation.
    pub validation_min_confidence: f32,
    /// At or above this the record is activated without review.
    pub auto_activate_confidence: f32,
    /// At or above this (and below auto) the review agent is consulted.
    pub review_min_confidence: f32,
    /// Minimum reviewer confidence for an approval to activate.
    pub review_approval_confidence: f32,
    pub min_content_chars: usize,
    pub min_alternatives: usize,
    /// Raw content beyond this is truncated before the agent call.
    pub max_input_chars: usize,
    pub extraction_timeout_ms: u64,
    pub review_timeout_ms: u64,
    pub batch_size: u32,
    pub inter_record_delay_ms: u64,
    pub inter_batch_delay_ms: u64,
    pub max_batches: u32,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            model_name: crate::config::DEFAULT_MODEL.to_string(),
            validation_min_confidence: 0.70,
            auto_activate_confidence: 0.90,
            review_min_confidence: 0.70,
            review_approval_confidence: 0.80,
            min_content_chars: 30,
            min_alternatives: 2,
            max_input_chars: 50_000,
            extraction_timeout_ms: 60_000,
            review_timeout_ms: 30_000,
            batch_size: 10,
            inter_record_delay_ms: 500,
            inter_batch_delay_ms: 5_000,
            max_batches: 100,
        }
    }
}

impl CleanupConfig {
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_millis(self.extraction_timeout_ms)
    }

    pub fn review_timeout(&self) -> Duration {
        Duration::from_millis(self.review_timeout_ms)
    }

    pub fn inter_record_delay(&self) -> Duration {
        Duration::from_millis(self.inter_record_delay_ms)
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    /// Reject threshold combinations that make the decision tiers overlap.
    pub fn validate(&self) -> Result<(), CleanupError> {
        let thresholds = [
            ("validation_min_confidence", self.validation_min_confidence),
            ("auto_activate_confidence", self.auto_activate_confidence),
            ("review_min_confidence", self.review_min_confidence),
            ("review_approval_confidence", self.review_approval_confidence),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(CleanupError::Config(format!("{name} must be within [0, 1], got {value}")));
            }
        }
        if self.auto_activate_confidence < self.review_min_confidence {
            return Err(CleanupError::Config(format!(
                "auto_activate_confidence ({}) is below review_min_confidence ({})",
                self.auto_activate_confidence, self.review_min_confidence
            )));
        }
        if self.batch_size == 0 {
            return Err(CleanupError::Config("batch_size must be at least 1".to_string()));
        }
        if self.model_name.trim().is_empty() {
            return Err(CleanupError::Config("model_name is empty".to_string()));
        }
        Ok(())
    }
}
