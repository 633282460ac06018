//! End-to-end ingestion of one artwork.
//!
//! ```text
//! asset page ──► TileInfoResolver ──► TilePlan ──► BatchUploader ──► JobSummary
//!                 (location, geometry)  (signed URLs)  (download, decrypt,
//!                                                       store, record)
//! ```

use std::sync::Arc;

use tracing::{info, Instrument};

use crate::config::{ConfigError, JobConfig, PipelineConfig};
use crate::decrypt::TileDecryptor;
use crate::descriptor::TileInfoResolver;
use crate::error::PipelineResult;
use crate::http::{AsyncHttpClient, AsyncReqwestClient};
use crate::job::{BatchUploader, JobContext, JobSummary};
use crate::signer::UrlSigner;
use crate::store::{blob_store_from_config, metadata_store_from_config, BlobStore, MetadataStore};
use crate::tile::TilePlan;

/// Resolves an artwork and runs its full tile job.
pub struct ArtworkIngest<C: AsyncHttpClient> {
    resolver: TileInfoResolver<C>,
    signer: UrlSigner,
    uploader: BatchUploader<C>,
}

impl<C: AsyncHttpClient + Clone> ArtworkIngest<C> {
    /// Wires the components around a shared HTTP client.
    pub fn new(
        client: C,
        signer: UrlSigner,
        decryptor: TileDecryptor,
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        job: JobConfig,
    ) -> Self {
        Self {
            resolver: TileInfoResolver::new(client.clone()),
            signer,
            uploader: BatchUploader::new(client, decryptor, blobs, metadata, job),
        }
    }
}

impl ArtworkIngest<AsyncReqwestClient> {
    /// Builds the reqwest client, the stores and the crypto from configuration.
    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        let client = AsyncReqwestClient::from_config(&config.download)?;
        let signer = UrlSigner::new(&config.crypto.hmac_key).ok_or_else(|| {
            ConfigError::InvalidValue {
                section: "crypto".to_string(),
                key: "hmac_key".to_string(),
                value: "<redacted>".to_string(),
                reason: "not a usable HMAC key".to_string(),
            }
        })?;
        let blobs = blob_store_from_config(&config.blob_store, client.inner().clone())?;
        let metadata = metadata_store_from_config(&config.metadata, client.inner().clone());

        Ok(Self::new(
            client,
            signer,
            TileDecryptor::from_config(&config.crypto),
            blobs,
            metadata,
            config.job.clone(),
        ))
    }
}

impl<C: AsyncHttpClient> ArtworkIngest<C> {
    /// Ingests the artwork behind `asset_url` under `image_id`.
    ///
    /// Returns an error only when the image cannot be resolved. Tile-level
    /// failures are counted in the returned summary.
    pub async fn ingest(
        &self,
        ctx: &JobContext,
        asset_url: &str,
        image_id: &str,
    ) -> PipelineResult<JobSummary> {
        let resolved = self
            .resolver
            .resolve(asset_url)
            .instrument(ctx.span().clone())
            .await?;

        let plan = TilePlan::build(&self.signer, &resolved.location, &resolved.tile_info);
        ctx.span().in_scope(|| {
            info!(
                image_id,
                tiles = plan.len(),
                levels = resolved.tile_info.pyramid_levels.len(),
                "Planned tile job"
            )
        });

        let tiles = plan.into_urls();
        Ok(self.uploader.run(ctx, &tiles, image_id).await)
    }

    pub fn uploader(&self) -> &BatchUploader<C> {
        &self.uploader
    }
}
