//! Interfaces of the external blob and metadata stores.
//!
//! Both traits return [`BoxFuture`] so backends can be chosen at runtime
//! from configuration and shared as `Arc<dyn BlobStore>` /
//! `Arc<dyn MetadataStore>`.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::error::PipelineResult;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persisted record of one stored tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileRecord {
    pub tile_id: String,
    pub tile_url: String,
}

/// Object storage for decrypted tiles.
///
/// Objects are public-read; `put` returns the URL under which the object is
/// served.
pub trait BlobStore: Send + Sync {
    /// Whether an object exists under `key`.
    fn exists(&self, key: &str) -> BoxFuture<'_, PipelineResult<bool>>;

    /// Stores `body` under `key` and returns its public URL.
    ///
    /// Overwrites any existing object.
    fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> BoxFuture<'_, PipelineResult<String>>;

    /// Public URL of `key`, whether or not it exists.
    fn public_url(&self, key: &str) -> String;
}

/// Document store holding tile records and job progress.
pub trait MetadataStore: Send + Sync {
    /// Looks up a tile record by its identifier.
    fn find_tile_by_id(&self, tile_id: &str) -> BoxFuture<'_, PipelineResult<Option<TileRecord>>>;

    /// Creates a tile record.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Duplicate`](crate::error::PipelineError::Duplicate)
    /// if a record with the same `tile_id` already exists.
    fn create_tile_record(
        &self,
        tile_id: &str,
        tile_url: &str,
    ) -> BoxFuture<'_, PipelineResult<TileRecord>>;

    /// Stores the number of processed tiles on the job's progress field.
    fn update_progress_counter(&self, job_id: &str, processed: u64)
        -> BoxFuture<'_, PipelineResult<()>>;
}
