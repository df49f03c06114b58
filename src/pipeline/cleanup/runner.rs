//! Batch controller and continuous runner.
//!
//! Records are processed strictly one at a time: the agent endpoints are a
//! shared, upstream rate-limited resource. Reports are plain values folded
//! upward (record → batch → run).

use std::time::{Duration, Instant};

use tracing::Instrument;
use uuid::Uuid;

use super::detector::CorruptionDetector;
use super::pacing::{CancellationToken, RateLimiter};
use super::processor::RecordProcessor;
use super::types::*;

/// Progress observer: `(cumulative report, 1-based batch index)`.
pub type ProgressFn<'a> = &'a (dyn Fn(&RunReport, u32) + Send + Sync);

pub struct BatchController {
    detector: CorruptionDetector,
    processor: RecordProcessor,
    inter_record_delay: Duration,
    cancel: CancellationToken,
}

impl BatchController {
    pub fn new(
        detector: CorruptionDetector,
        processor: RecordProcessor,
        inter_record_delay: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        Self {
            detector,
            processor: processor.with_cancellation(cancel.clone()),
            inter_record_delay,
            cancel,
        }
    }

    /// Share `cancel` with the processor and both agent invokers.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.processor = self.processor.with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn count_backlog(&self) -> u64 {
        self.detector.count_corrupted().await
    }

    pub async fn process_record(&self, record_id: i64) -> RecordOutcome {
        self.processor.process(record_id).await
    }

    /// Fetch up to `batch_size` corrupted records starting at `offset` and
    /// process them in id order. One record's failure never stops the batch.
    pub async fn process_batch(&self, batch_size: u32, offset: u32) -> BatchReport {
        let start = Instant::now();
        let records = self.detector.list_corrupted(batch_size, offset).await;

        let mut report = BatchReport::empty();
        if records.is_empty() {
            tracing::info!(offset, "No corrupted records to process");
            return report;
        }

        let mut limiter = RateLimiter::per_interval(self.inter_record_delay);
        for record in &records {
            if !limiter.acquire(&self.cancel).await {
                report.cancelled = true;
                break;
            }

            let outcome = self.processor.process(record.id).await;

            if self.cancel.is_cancelled() {
                // An interrupted record was not judged; it stays in the backlog.
                if outcome.action.is_cleaned() {
                    report.record(&outcome);
                }
                report.cancelled = true;
                break;
            }
            report.record(&outcome);
        }

        tracing::info!(
            fetched = records.len(),
            total = report.total,
            cleaned = report.cleaned,
            reactivated = report.reactivated,
            pending_review = report.pending_review,
            failed = report.failed,
            validation_failed = report.validation_failed,
            skipped = report.skipped,
            cancelled = report.cancelled,
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch finished"
        );
        report
    }
}

pub struct ContinuousRunner {
    controller: BatchController,
    cancel: CancellationToken,
}

impl ContinuousRunner {
    /// Uses the controller's cancellation token.
    pub fn new(controller: BatchController) -> Self {
        let cancel = controller.cancellation();
        Self { controller, cancel }
    }

    pub fn controller(&self) -> &BatchController {
        &self.controller
    }

    /// Drive batches until the backlog is exhausted, `max_batches` is reached
    /// or the run is cancelled.
    ///
    /// The fetch offset advances past records that stayed in the backlog, so
    /// unrepairable records are not fetched again within the same run.
    pub async fn run(
        &self,
        batch_size: u32,
        inter_batch_delay: Duration,
        max_batches: u32,
        on_progress: Option<ProgressFn<'_>>,
    ) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("cleanup_run", %run_id);
        self.run_batches(batch_size, inter_batch_delay, max_batches, on_progress)
            .instrument(span)
            .await
    }

    async fn run_batches(
        &self,
        batch_size: u32,
        inter_batch_delay: Duration,
        max_batches: u32,
        on_progress: Option<ProgressFn<'_>>,
    ) -> RunReport {
        let start = Instant::now();
        let mut report = RunReport::default();
        let mut offset: u32 = 0;

        tracing::info!(batch_size, max_batches, "Cleanup run started");

        for batch_index in 1..=max_batches {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            tracing::info!(batch_index, offset, "Processing batch");
            let batch = self.controller.process_batch(batch_size, offset).await;
            let attempted = batch.total;
            offset = offset.saturating_add(batch.left_in_backlog());
            report.absorb(batch_index, batch);

            if let Some(progress) = on_progress {
                progress(&report, batch_index);
            }

            if report.cancelled {
                break;
            }
            if attempted == 0 {
                tracing::info!(batch_index, "Backlog exhausted");
                break;
            }
            if batch_index < max_batches && !self.cancel.sleep(inter_batch_delay).await {
                report.cancelled = true;
                break;
            }
        }

        tracing::info!(
            batches = report.batches_run,
            total = report.total,
            cleaned = report.cleaned,
            reactivated = report.reactivated,
            pending_review = report.pending_review,
            failed = report.failed,
            validation_failed = report.validation_failed,
            skipped = report.skipped,
            cancelled = report.cancelled,
            duration_ms = start.elapsed().as_millis() as u64,
            "Cleanup run finished"
        );
        report
    }
}
