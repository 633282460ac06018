//! Per-tile processing states and outcomes.

use std::fmt;

use crate::error::PipelineError;

/// Where a tile is in its lifecycle.
///
/// ```text
/// Pending → Skipped
///         → Downloading → Decrypting → Uploading → Recorded
///                 ↘            ↘            ↘
///                              Failed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileState {
    Pending,
    Skipped,
    Downloading,
    Decrypting,
    Uploading,
    Recorded,
    Failed,
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TileState::Pending => "pending",
            TileState::Skipped => "skipped",
            TileState::Downloading => "downloading",
            TileState::Decrypting => "decrypting",
            TileState::Uploading => "uploading",
            TileState::Recorded => "recorded",
            TileState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a tile was skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// A record already existed before processing started.
    AlreadyRecorded,
    /// The record was created concurrently by another run.
    Duplicate,
}

/// Terminal result of processing one tile.
#[derive(Debug)]
pub enum TileOutcome {
    Recorded {
        tile_id: String,
        url: String,
    },
    Skipped {
        tile_id: String,
        reason: SkipReason,
    },
    Failed {
        tile_id: String,
        /// State in which the error occurred.
        stage: TileState,
        error: PipelineError,
    },
}

impl TileOutcome {
    /// The terminal state this outcome represents.
    pub fn state(&self) -> TileState {
        match self {
            TileOutcome::Recorded { .. } => TileState::Recorded,
            TileOutcome::Skipped { .. } => TileState::Skipped,
            TileOutcome::Failed { .. } => TileState::Failed,
        }
    }

    pub fn tile_id(&self) -> &str {
        match self {
            TileOutcome::Recorded { tile_id, .. }
            | TileOutcome::Skipped { tile_id, .. }
            | TileOutcome::Failed { tile_id, .. } => tile_id,
        }
    }
}
