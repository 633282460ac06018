//! Configuration structs and their defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::decrypt::{CONTAINER_MARKER, DEFAULT_AES_IV, DEFAULT_AES_KEY};
use crate::job::RetryPolicy;
use crate::signer::DEFAULT_HMAC_KEY;

/// Per-request timeout for descriptor, tile and store calls.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Largest tile body accepted from the tile service (10MB).
pub const DEFAULT_MAX_TILE_BYTES: u64 = 10 * 1024 * 1024;

/// Number of tiles processed concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Top-level configuration for a tile ingest job.
#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
    pub download: DownloadConfig,
    pub job: JobConfig,
    pub crypto: CryptoConfig,
    pub blob_store: BlobStoreConfig,
    pub metadata: MetadataConfig,
    pub logging: LoggingConfig,
}

/// HTTP limits applied to every fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadConfig {
    pub timeout: Duration,
    pub max_tile_bytes: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            max_tile_bytes: DEFAULT_MAX_TILE_BYTES,
        }
    }
}

/// Batch scheduling and retry behaviour.
#[derive(Clone, Debug, PartialEq)]
pub struct JobConfig {
    pub batch_size: usize,
    pub retry: RetryPolicy,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::None,
        }
    }
}

/// Fixed secrets shared with the third-party tile client.
///
/// The values are reverse-engineered and may rotate upstream, so every one of
/// them can be overridden from the `[crypto]` section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CryptoConfig {
    pub container_marker: u32,
    pub aes_key: [u8; 16],
    pub aes_iv: [u8; 16],
    pub hmac_key: Vec<u8>,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            container_marker: CONTAINER_MARKER,
            aes_key: DEFAULT_AES_KEY,
            aes_iv: DEFAULT_AES_IV,
            hmac_key: DEFAULT_HMAC_KEY.to_vec(),
        }
    }
}

/// Where decrypted tiles are stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BlobStoreConfig {
    /// Process-local store; contents are lost on exit.
    #[default]
    Memory,
    /// Files under a local directory.
    Local {
        directory: PathBuf,
        public_base_url: Option<String>,
    },
    /// S3-compatible object store with path-style addressing.
    S3(S3Config),
}

/// Connection settings for an S3-compatible endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Base for public object URLs; defaults to `{endpoint}/{bucket}`.
    pub public_base_url: Option<String>,
}

impl S3Config {
    /// Public URL prefix for objects in the bucket.
    pub fn public_base(&self) -> String {
        match &self.public_base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("{}/{}", self.endpoint.trim_end_matches('/'), self.bucket),
        }
    }
}

/// CMS content API used for tile records and job progress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataConfig {
    /// API root; `None` selects the in-memory store.
    pub base_url: Option<String>,
    pub api_token: Option<String>,
    pub tile_collection: String,
    pub job_collection: String,
    pub progress_field: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            tile_collection: "tiles".to_string(),
            job_collection: "artworks".to_string(),
            progress_field: "tilesProcessed".to_string(),
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub level: String,
    /// Directory for a log file; stdout only when `None`.
    pub directory: Option<PathBuf>,
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file: "zoomvault.log".to_string(),
        }
    }
}
