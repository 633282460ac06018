//! Asset page → pyramid geometry.

use tracing::{debug, info};

use super::discovery::{find_descriptor_url, ImageLocation};
use super::parser::parse_descriptor;
use super::types::TileInfo;
use crate::error::PipelineResult;
use crate::http::AsyncHttpClient;

/// Result of resolving an asset: where the image lives and its geometry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedImage {
    pub location: ImageLocation,
    pub tile_info: TileInfo,
}

/// Fetches the asset page and the pyramid descriptor.
pub struct TileInfoResolver<C: AsyncHttpClient> {
    client: C,
}

impl<C: AsyncHttpClient> TileInfoResolver<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Resolves an asset page URL to the image location and its geometry.
    ///
    /// Any failure here aborts the job: without geometry there is nothing to
    /// fetch.
    pub async fn resolve(&self, base_asset_url: &str) -> PipelineResult<ResolvedImage> {
        let location = self.find_location(base_asset_url).await?;
        let tile_info = self.fetch_tile_info(&location).await?;
        Ok(ResolvedImage {
            location,
            tile_info,
        })
    }

    /// Fetches the asset page and extracts the embedded image location.
    pub async fn find_location(&self, base_asset_url: &str) -> PipelineResult<ImageLocation> {
        let page = self.client.get(base_asset_url).await?;
        let location = find_descriptor_url(&String::from_utf8_lossy(&page), base_asset_url)?;

        debug!(
            asset = base_asset_url,
            image = %location.image_url(),
            "Found tile service reference"
        );
        Ok(location)
    }

    /// Fetches and parses the descriptor for a known image location.
    pub async fn fetch_tile_info(&self, location: &ImageLocation) -> PipelineResult<TileInfo> {
        let xml = self.client.get(&location.descriptor_url()).await?;
        let tile_info = parse_descriptor(&String::from_utf8_lossy(&xml), &location.origin)?;

        info!(
            image = %location.image_url(),
            width = tile_info.width,
            height = tile_info.height,
            levels = tile_info.pyramid_levels.len(),
            tiles = tile_info.num_tiles,
            "Resolved pyramid descriptor"
        );
        Ok(tile_info)
    }
}
