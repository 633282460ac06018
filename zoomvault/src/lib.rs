//! ZoomVault - deep-zoom artwork tile acquisition
//!
//! This library mirrors the tile pyramid of a deep-zoom artwork into owned
//! storage. For one artwork it:
//!
//! 1. resolves the pyramid geometry from the public asset page
//! 2. signs a request path for every tile of every level
//! 3. downloads the tiles and strips their container encryption
//! 4. stores the plain images in a blob store
//! 5. records each stored tile in a metadata store, so that re-runs skip
//!    work already done
//!
//! Tiles are processed in bounded concurrent batches. Per-tile failures are
//! isolated and counted; only failure to resolve the artwork aborts a job.
//!
//! # Example
//!
//! ```no_run
//! use zoomvault::config::PipelineConfig;
//! use zoomvault::ingest::ArtworkIngest;
//! use zoomvault::job::JobContext;
//!
//! # async fn run() -> zoomvault::error::PipelineResult<()> {
//! let config = PipelineConfig::load()?;
//! let ingest = ArtworkIngest::from_config(&config)?;
//!
//! let ctx = JobContext::new("artwork-17");
//! let summary = ingest
//!     .ingest(&ctx, "https://arts.example.com/asset/starry-night/bgEuwDxel93-Pg", "img-17")
//!     .await?;
//! println!("{} stored, {} failed", summary.processed, summary.failed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decrypt;
pub mod descriptor;
pub mod error;
pub mod http;
pub mod ingest;
pub mod job;
pub mod logging;
pub mod signer;
pub mod store;
pub mod tile;

pub use error::{PipelineError, PipelineResult};
pub use ingest::ArtworkIngest;
