//! Error taxonomy for the tile pipeline.
//!
//! Only resolver-level failures abort a job. Everything raised while a single
//! tile is processed is caught by the batch uploader, logged with its
//! [`ErrorKind`], and reflected in the job summary counters.

use std::fmt;

use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Coarse classification of a [`PipelineError`], used as a log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Discovery,
    Format,
    Network,
    Duplicate,
    Storage,
    Metadata,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Discovery => "discovery",
            ErrorKind::Format => "format",
            ErrorKind::Network => "network",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::Storage => "storage",
            ErrorKind::Metadata => "metadata",
            ErrorKind::Config => "config",
        };
        f.write_str(name)
    }
}

/// Malformed input: pyramid XML or a binary tile container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The descriptor has no `TileInfo` root element.
    #[error("descriptor has no TileInfo root element (found <{found}>)")]
    MissingRoot { found: String },

    /// The descriptor is not well-formed XML.
    #[error("invalid descriptor XML: {0}")]
    InvalidXml(String),

    /// The descriptor declares no pyramid levels.
    #[error("descriptor declares no pyramid levels")]
    EmptyPyramid,

    /// An attribute is present but cannot be parsed as a number.
    #[error("invalid value {value:?} for attribute {name}")]
    InvalidAttribute { name: String, value: String },

    /// A container offset points past the end of the buffer.
    #[error("container {field} ends at byte {end} but buffer holds {len} bytes")]
    OffsetOutOfBounds {
        field: &'static str,
        end: usize,
        len: usize,
    },

    /// The cipher rejected the encrypted section.
    #[error("cipher error: {0}")]
    Cipher(String),
}

/// Failure of an HTTP fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// The request exceeded its deadline.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The response body exceeded the configured cap.
    #[error("response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: u64 },

    /// Connection, TLS or body read failure.
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
}

/// Errors that can occur anywhere in the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The asset page does not carry the embedded tile-service literal.
    #[error("no tile service reference found on {url}: {reason}")]
    Discovery { url: String, reason: String },

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    /// The metadata store already holds a record for this tile.
    #[error("tile record {tile_id} already exists")]
    Duplicate { tile_id: String },

    /// Blob upload or existence check failed.
    #[error("blob store error for {key}: {reason}")]
    Storage { key: String, reason: String },

    /// Metadata store failure other than a uniqueness violation.
    #[error("metadata store error: {0}")]
    Metadata(String),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

impl PipelineError {
    /// Returns the coarse classification used in log records.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Discovery { .. } => ErrorKind::Discovery,
            PipelineError::Format(_) => ErrorKind::Format,
            PipelineError::Network(_) => ErrorKind::Network,
            PipelineError::Duplicate { .. } => ErrorKind::Duplicate,
            PipelineError::Storage { .. } => ErrorKind::Storage,
            PipelineError::Metadata(_) => ErrorKind::Metadata,
            PipelineError::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether a retry policy may attempt the operation again.
    ///
    /// Uniqueness violations and malformed payloads are deterministic and
    /// never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Network(_) | PipelineError::Storage { .. } | PipelineError::Metadata(_)
        )
    }

    pub(crate) fn storage(key: impl Into<String>, reason: impl fmt::Display) -> Self {
        PipelineError::Storage {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}
