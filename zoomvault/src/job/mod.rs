//! Tile job execution.
//!
//! A job takes the signed tile URLs of one image and drives every tile to a
//! terminal state: recorded, skipped or failed. The [`BatchUploader`] does
//! the work; a [`JobContext`] carries the job id, cancellation, the tracing
//! span and the progress counters that observers read while it runs.

mod context;
mod outcome;
mod policy;
mod uploader;

pub use context::{JobContext, JobCounters, JobProgress, JobSummary};
pub use outcome::{SkipReason, TileOutcome, TileState};
pub use policy::RetryPolicy;
pub use uploader::{sniff_format, BatchUploader};
