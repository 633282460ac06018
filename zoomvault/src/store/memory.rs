//! In-memory stores backed by `DashMap`.
//!
//! Used when no external backend is configured and throughout the tests.
//! Both stores count writes so callers can assert idempotency.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::traits::{BlobStore, BoxFuture, MetadataStore, TileRecord};
use crate::error::{PipelineError, PipelineResult};

/// Default URL prefix for objects in a [`MemoryBlobStore`].
pub const MEMORY_BASE_URL: &str = "memory://tiles";

/// A stored object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

/// Process-local blob store.
pub struct MemoryBlobStore {
    objects: DashMap<String, StoredObject>,
    base_url: String,
    puts: AtomicU64,
    failing_puts: AtomicU32,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::with_base_url(MEMORY_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            objects: DashMap::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            puts: AtomicU64::new(0),
            failing_puts: AtomicU32::new(0),
        }
    }

    /// Number of successful `put` calls.
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.get(key).map(|entry| entry.value().clone())
    }

    /// Makes the next `count` puts fail with a storage error.
    pub fn fail_next_puts(&self, count: u32) {
        self.failing_puts.store(count, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for MemoryBlobStore {
    fn exists(&self, key: &str) -> BoxFuture<'_, PipelineResult<bool>> {
        let found = self.objects.contains_key(key);
        Box::pin(async move { Ok(found) })
    }

    fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> BoxFuture<'_, PipelineResult<String>> {
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            if self.take_failure() {
                return Err(PipelineError::storage(key, "injected failure"));
            }
            let url = self.public_url(&key);
            self.objects.insert(key, StoredObject { body, content_type });
            self.puts.fetch_add(1, Ordering::SeqCst);
            Ok(url)
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

/// Process-local metadata store enforcing `tile_id` uniqueness.
#[derive(Default)]
pub struct MemoryMetadataStore {
    records: DashMap<String, TileRecord>,
    progress: DashMap<String, u64>,
    creates: AtomicU64,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records created.
    pub fn create_count(&self) -> u64 {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn record(&self, tile_id: &str) -> Option<TileRecord> {
        self.records.get(tile_id).map(|entry| entry.value().clone())
    }

    /// Last persisted progress value of a job.
    pub fn progress(&self, job_id: &str) -> Option<u64> {
        self.progress.get(job_id).map(|entry| *entry.value())
    }

    /// Inserts a record without counting it as a create.
    pub fn seed(&self, tile_id: &str, tile_url: &str) {
        self.records.insert(
            tile_id.to_string(),
            TileRecord {
                tile_id: tile_id.to_string(),
                tile_url: tile_url.to_string(),
            },
        );
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn find_tile_by_id(
        &self,
        tile_id: &str,
    ) -> BoxFuture<'_, PipelineResult<Option<TileRecord>>> {
        let record = self.record(tile_id);
        Box::pin(async move { Ok(record) })
    }

    fn create_tile_record(
        &self,
        tile_id: &str,
        tile_url: &str,
    ) -> BoxFuture<'_, PipelineResult<TileRecord>> {
        let record = TileRecord {
            tile_id: tile_id.to_string(),
            tile_url: tile_url.to_string(),
        };
        Box::pin(async move {
            match self.records.entry(record.tile_id.clone()) {
                Entry::Occupied(_) => Err(PipelineError::Duplicate {
                    tile_id: record.tile_id,
                }),
                Entry::Vacant(slot) => {
                    slot.insert(record.clone());
                    self.creates.fetch_add(1, Ordering::SeqCst);
                    Ok(record)
                }
            }
        })
    }

    fn update_progress_counter(
        &self,
        job_id: &str,
        processed: u64,
    ) -> BoxFuture<'_, PipelineResult<()>> {
        self.progress.insert(job_id.to_string(), processed);
        Box::pin(async move { Ok(()) })
    }
}
