//! Filesystem blob store for offline runs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tracing::trace;

use super::traits::{BlobStore, BoxFuture};
use crate::error::{PipelineError, PipelineResult};

/// Stores each object as a file named by its key under one directory.
///
/// Writes go through a temporary file and a rename so a crash never leaves a
/// truncated object behind. Every write gets its own temporary file, so
/// concurrent writers of one key each replace the object whole.
pub struct LocalBlobStore {
    directory: PathBuf,
    public_base_url: String,
    writes: AtomicU64,
}

impl LocalBlobStore {
    /// Creates a store rooted at `directory`.
    ///
    /// Public URLs default to `file://{directory}`.
    pub fn new(directory: impl Into<PathBuf>, public_base_url: Option<String>) -> Self {
        let directory = directory.into();
        let public_base_url = public_base_url
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("file://{}", directory.display()));
        Self {
            directory,
            public_base_url,
            writes: AtomicU64::new(0),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn key_path(&self, key: &str) -> PipelineResult<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(PipelineError::storage(key, "key is not a plain file name"));
        }
        Ok(self.directory.join(key))
    }

    /// Unique temporary path for one write of `key`.
    ///
    /// The leading dot keeps it outside the key namespace.
    fn temp_path(&self, key: &str) -> PathBuf {
        let n = self.writes.fetch_add(1, Ordering::Relaxed);
        self.directory
            .join(format!(".{}.{}.{}.tmp", key, std::process::id(), n))
    }
}

impl BlobStore for LocalBlobStore {
    fn exists(&self, key: &str) -> BoxFuture<'_, PipelineResult<bool>> {
        let path = self.key_path(key);
        Box::pin(async move {
            let path = path?;
            tokio::fs::try_exists(&path)
                .await
                .map_err(|e| PipelineError::storage(path.display().to_string(), e))
        })
    }

    fn put(
        &self,
        key: &str,
        body: Bytes,
        _content_type: &str,
    ) -> BoxFuture<'_, PipelineResult<String>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.key_path(&key)?;
            let io_err = |e: std::io::Error| PipelineError::storage(&key, e);

            tokio::fs::create_dir_all(&self.directory)
                .await
                .map_err(io_err)?;

            let temp_path = self.temp_path(&key);
            tokio::fs::write(&temp_path, &body).await.map_err(io_err)?;
            if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(io_err(e));
            }

            trace!(key = %key, bytes = body.len(), "Stored tile on disk");
            Ok(self.public_url(&key))
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}
