//! Question Cleanup Pipeline
//!
//! Repairs exam-question records whose statement was polluted by unrendered
//! AngularJS template markup during scraping, then decides whether each
//! repaired record may go live again.
//!
//! ## Architecture
//!
//! ```text
//! ContinuousRunner → BatchController → CorruptionDetector (page of backlog)
//!   per record: ExtractionInvoker → ContentValidator → image merge
//!               → ActivationDecisionEngine (→ ReviewInvoker) → RecordUpdater
//! ```
//!
//! Records are processed one at a time. Every per-record failure is caught at
//! the record boundary and folded into the batch report.

pub mod error;
pub mod types;
pub mod traits;
pub mod signature;
pub mod images;
pub mod json_block;
pub mod validator;
pub mod extractor;
pub mod reviewer;
pub mod decision;
pub mod store;
pub mod detector;
pub mod updater;
pub mod processor;
pub mod pacing;
pub mod runner;

pub use error::{AgentError, CleanupError};
pub use types::*;
pub use traits::*;
pub use signature::{matches_signature, CORRUPTION_SIGNATURE, RESIDUAL_TEMPLATE_TOKENS};
pub use images::{embed_missing_images, extract_images, merge_images};
pub use validator::ContentValidator;
pub use extractor::ExtractionInvoker;
pub use reviewer::ReviewInvoker;
pub use decision::ActivationDecisionEngine;
pub use store::SqliteQuestionStore;
pub use detector::CorruptionDetector;
pub use updater::RecordUpdater;
pub use processor::RecordProcessor;
pub use pacing::{CancellationToken, RateLimiter};
pub use runner::{BatchController, ContinuousRunner, ProgressFn};
