//! Pipeline configuration loaded from an INI file.
//!
//! Every key is optional; a missing file yields [`PipelineConfig::default`].
//! Settings structs live in [`settings`], INI key mapping in [`parser`], and
//! file handling in [`file`].
//!
//! # Example
//!
//! ```
//! use zoomvault::config::PipelineConfig;
//!
//! let config = PipelineConfig::from_ini_str("[job]\nbatch_size = 25\n").unwrap();
//! assert_eq!(config.job.batch_size, 25);
//! assert_eq!(config.download.timeout.as_secs(), 30);
//! ```

mod file;
mod parser;
mod settings;
mod size;

pub use file::{config_file_path, ConfigError};
pub use settings::{
    BlobStoreConfig, CryptoConfig, DownloadConfig, JobConfig, LoggingConfig, MetadataConfig,
    PipelineConfig, S3Config, DEFAULT_BATCH_SIZE, DEFAULT_DOWNLOAD_TIMEOUT_SECS,
    DEFAULT_MAX_TILE_BYTES,
};
pub use size::{parse_size, SizeParseError};
