//! Batch-parallel fetch, decrypt, store and record.
//!
//! Tiles are processed in fixed-size batches. Batches run one after another;
//! the tiles of a batch run concurrently and are all joined before the next
//! batch starts. After each join the uploader folds the outcomes into the job
//! counters and persists the processed count.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use tracing::{debug, info, trace, warn, Instrument};

use super::context::{BatchTally, JobContext, JobSummary};
use super::outcome::{SkipReason, TileOutcome, TileState};
use crate::config::JobConfig;
use crate::decrypt::TileDecryptor;
use crate::error::{PipelineError, PipelineResult};
use crate::http::AsyncHttpClient;
use crate::store::{BlobStore, MetadataStore};
use crate::tile::tile_id;

/// Extension and content type used when the image format is not recognised.
const FALLBACK_FORMAT: (&str, &str) = ("jpg", "image/jpeg");

/// Drives a tile set through download, decryption, upload and recording.
pub struct BatchUploader<C: AsyncHttpClient> {
    client: C,
    decryptor: TileDecryptor,
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    config: JobConfig,
}

impl<C: AsyncHttpClient> BatchUploader<C> {
    pub fn new(
        client: C,
        decryptor: TileDecryptor,
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        config: JobConfig,
    ) -> Self {
        Self {
            client,
            decryptor,
            blobs,
            metadata,
            config,
        }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Processes every tile in `tiles` (tile key → request URL).
    ///
    /// Never fails: per-tile errors are logged and counted. Cancellation is
    /// honoured between batches only.
    pub async fn run(
        &self,
        ctx: &JobContext,
        tiles: &BTreeMap<String, String>,
        image_id: &str,
    ) -> JobSummary {
        self.run_batches(ctx, tiles, image_id)
            .instrument(ctx.span().clone())
            .await
    }

    async fn run_batches(
        &self,
        ctx: &JobContext,
        tiles: &BTreeMap<String, String>,
        image_id: &str,
    ) -> JobSummary {
        let batch_size = self.config.batch_size.max(1);
        let entries: Vec<(&String, &String)> = tiles.iter().collect();
        let batches = entries.len().div_ceil(batch_size);
        let mut cancelled = false;

        ctx.counters().set_total(entries.len() as u64);
        info!(
            image_id,
            tiles = entries.len(),
            batches,
            batch_size,
            "Starting tile job"
        );

        for (index, batch) in entries.chunks(batch_size).enumerate() {
            if ctx.is_cancelled() {
                warn!(
                    batch = index + 1,
                    batches, "Job cancelled, stopping at batch boundary"
                );
                cancelled = true;
                break;
            }

            let outcomes = join_all(
                batch
                    .iter()
                    .map(|(key, url)| self.process_tile(key, url, image_id)),
            )
            .await;

            let mut tally = BatchTally::default();
            for (key, outcome) in batch.iter().map(|(key, _)| key).zip(outcomes) {
                trace!(
                    tile_key = %key,
                    tile_id = outcome.tile_id(),
                    state = %outcome.state(),
                    "Tile finished"
                );
                match outcome {
                    TileOutcome::Recorded { .. } => tally.recorded += 1,
                    TileOutcome::Skipped { .. } => tally.skipped += 1,
                    TileOutcome::Failed {
                        tile_id,
                        stage,
                        error,
                    } => {
                        tally.failed += 1;
                        warn!(
                            tile_key = %key,
                            tile_id = %tile_id,
                            stage = %stage,
                            error_kind = %error.kind(),
                            error = %error,
                            "Tile failed"
                        );
                    }
                }
            }

            ctx.counters().apply(&tally);
            let progress = ctx.counters().snapshot();
            info!(
                batch = index + 1,
                batches,
                recorded = tally.recorded,
                skipped = tally.skipped,
                failed = tally.failed,
                "Batch complete: {}",
                progress
            );

            if let Err(e) = self
                .metadata
                .update_progress_counter(ctx.job_id(), progress.processed)
                .await
            {
                warn!(error_kind = %e.kind(), error = %e, "Failed to persist job progress");
            }
        }

        let summary = JobSummary::from_progress(ctx.counters().snapshot(), cancelled);
        info!(
            processed = summary.processed,
            failed = summary.failed,
            skipped = summary.skipped,
            total = summary.total,
            cancelled = summary.cancelled,
            "Tile job finished"
        );
        summary
    }

    /// Runs one tile through its state machine.
    async fn process_tile(&self, key: &str, url: &str, image_id: &str) -> TileOutcome {
        let tile_id = tile_id(image_id, key);

        let existing = self
            .config
            .retry
            .run("find record", || self.metadata.find_tile_by_id(&tile_id))
            .await;
        match existing {
            Ok(Some(_)) => {
                trace!(tile_id = %tile_id, "Tile already recorded");
                return TileOutcome::Skipped {
                    tile_id,
                    reason: SkipReason::AlreadyRecorded,
                };
            }
            Ok(None) => {}
            Err(error) => {
                return TileOutcome::Failed {
                    tile_id,
                    stage: TileState::Pending,
                    error,
                }
            }
        }

        let mut stage = TileState::Downloading;
        match self.fetch_and_store(&tile_id, url, &mut stage).await {
            Ok(public_url) => self.record(tile_id, public_url).await,
            Err(error) => TileOutcome::Failed {
                tile_id,
                stage,
                error,
            },
        }
    }

    async fn fetch_and_store(
        &self,
        tile_id: &str,
        url: &str,
        stage: &mut TileState,
    ) -> PipelineResult<String> {
        *stage = TileState::Downloading;
        let client = &self.client;
        let body = self
            .config
            .retry
            .run("download", || async move {
                client.get(url).await.map_err(PipelineError::from)
            })
            .await?;

        *stage = TileState::Decrypting;
        let plain = self.decryptor.decrypt(body)?;

        *stage = TileState::Uploading;
        let (extension, content_type) = sniff_format(&plain);
        let blob_key = format!("{}.{}", tile_id, extension);

        if self.blobs.exists(&blob_key).await? {
            debug!(key = %blob_key, "Blob already stored, reusing");
            return Ok(self.blobs.public_url(&blob_key));
        }

        let body = Bytes::from(plain);
        self.config
            .retry
            .run("upload", || {
                self.blobs.put(&blob_key, body.clone(), content_type)
            })
            .await
    }

    async fn record(&self, tile_id: String, public_url: String) -> TileOutcome {
        let created = self
            .config
            .retry
            .run("create record", || {
                self.metadata.create_tile_record(&tile_id, &public_url)
            })
            .await;

        match created {
            Ok(_) => {
                trace!(tile_id = %tile_id, url = %public_url, "Tile recorded");
                TileOutcome::Recorded {
                    tile_id,
                    url: public_url,
                }
            }
            Err(PipelineError::Duplicate { .. }) => {
                debug!(tile_id = %tile_id, "Tile recorded concurrently, skipping");
                TileOutcome::Skipped {
                    tile_id,
                    reason: SkipReason::Duplicate,
                }
            }
            Err(error) => TileOutcome::Failed {
                tile_id,
                stage: TileState::Uploading,
                error,
            },
        }
    }
}

/// File extension and MIME type of decrypted tile bytes.
pub fn sniff_format(bytes: &[u8]) -> (&'static str, &'static str) {
    match image::guess_format(bytes) {
        Ok(format) => match format.extensions_str().first() {
            Some(extension) => (*extension, format.to_mime_type()),
            None => FALLBACK_FORMAT,
        },
        Err(_) => FALLBACK_FORMAT,
    }
}
