//! Job context, progress counters and the final summary.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Everything a job run carries through the pipeline.
///
/// Cloning is cheap and clones share counters and cancellation.
#[derive(Clone, Debug)]
pub struct JobContext {
    job_id: String,
    counters: Arc<JobCounters>,
    cancel: CancellationToken,
    span: Span,
}

impl JobContext {
    /// Creates a context with fresh counters and its own `job` span.
    pub fn new(job_id: impl Into<String>) -> Self {
        let job_id = job_id.into();
        let span = tracing::info_span!("job", job_id = %job_id);
        Self {
            job_id,
            counters: Arc::new(JobCounters::default()),
            cancel: CancellationToken::new(),
            span,
        }
    }

    /// Uses an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn counters(&self) -> &JobCounters {
        &self.counters
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Requests cancellation; the running job stops at the next batch
    /// boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Atomic job counters.
///
/// Readable from any thread at any time. Written only by the batch uploader,
/// once per batch after all of its tiles have finished.
#[derive(Debug, Default)]
pub struct JobCounters {
    processed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    recorded: AtomicU64,
    total: AtomicU64,
}

impl JobCounters {
    pub(crate) fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
    }

    pub(crate) fn apply(&self, tally: &BatchTally) {
        self.recorded.fetch_add(tally.recorded, Ordering::SeqCst);
        self.skipped.fetch_add(tally.skipped, Ordering::SeqCst);
        self.failed.fetch_add(tally.failed, Ordering::SeqCst);
        self.processed
            .fetch_add(tally.recorded + tally.skipped, Ordering::SeqCst);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> JobProgress {
        JobProgress {
            processed: self.processed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            recorded: self.recorded.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
        }
    }
}

/// Per-batch outcome counts, folded into [`JobCounters`] after the join.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct BatchTally {
    pub recorded: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Snapshot of job progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JobProgress {
    /// Tiles that are stored and recorded, including skipped ones.
    pub processed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub recorded: u64,
    pub total: u64,
}

impl JobProgress {
    /// Share of tiles that reached a terminal state, 0-100.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.processed + self.failed) as f64 * 100.0 / self.total as f64
    }
}

impl fmt::Display for JobProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} tiles ({:.1}%), {} failed",
            self.processed + self.failed,
            self.total,
            self.percent(),
            self.failed
        )
    }
}

/// Final counts of a job run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JobSummary {
    /// `recorded + skipped`
    pub processed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub recorded: u64,
    pub total: u64,
    /// The run stopped at a batch boundary before every tile was attempted.
    pub cancelled: bool,
}

impl JobSummary {
    pub(crate) fn from_progress(progress: JobProgress, cancelled: bool) -> Self {
        Self {
            processed: progress.processed,
            failed: progress.failed,
            skipped: progress.skipped,
            recorded: progress.recorded,
            total: progress.total,
            cancelled,
        }
    }

    /// Every tile was attempted and none failed.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed == 0 && self.processed == self.total
    }
}
