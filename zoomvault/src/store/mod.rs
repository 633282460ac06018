//! External collaborators: blob storage and the metadata store.
//!
//! Backends are selected from configuration:
//!
//! | `[blob_store] backend` | Store |
//! |---|---|
//! | `memory` | [`MemoryBlobStore`] |
//! | `local` | [`LocalBlobStore`] |
//! | `s3` | [`S3BlobStore`] |
//!
//! The metadata store is a [`CmsMetadataStore`] when `[metadata] base_url` is
//! set and a [`MemoryMetadataStore`] otherwise.

mod cms;
mod local;
mod memory;
mod s3;
mod sigv4;
mod traits;

use std::sync::Arc;

pub use cms::CmsMetadataStore;
pub use local::LocalBlobStore;
pub use memory::{MemoryBlobStore, MemoryMetadataStore, StoredObject, MEMORY_BASE_URL};
pub use s3::S3BlobStore;
pub use traits::{BlobStore, BoxFuture, MetadataStore, TileRecord};

use crate::config::{BlobStoreConfig, MetadataConfig};
use crate::error::PipelineResult;

/// Builds the configured blob store.
pub fn blob_store_from_config(
    config: &BlobStoreConfig,
    client: reqwest::Client,
) -> PipelineResult<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config {
        BlobStoreConfig::Memory => Arc::new(MemoryBlobStore::new()),
        BlobStoreConfig::Local {
            directory,
            public_base_url,
        } => Arc::new(LocalBlobStore::new(directory, public_base_url.clone())),
        BlobStoreConfig::S3(s3) => Arc::new(S3BlobStore::new(client, s3)?),
    };
    Ok(store)
}

/// Builds the configured metadata store.
pub fn metadata_store_from_config(
    config: &MetadataConfig,
    client: reqwest::Client,
) -> Arc<dyn MetadataStore> {
    let store: Arc<dyn MetadataStore> = match &config.base_url {
        Some(base_url) => Arc::new(CmsMetadataStore::new(client, base_url, config)),
        None => Arc::new(MemoryMetadataStore::new()),
    };
    store
}
