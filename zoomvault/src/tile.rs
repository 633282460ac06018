//! Tile addressing: coordinates, keys, identifiers and the signed URL plan.
//!
//! A tile key has the form `{token}/{x}/{y}/{z}` where `z` is the pyramid
//! level index. The persistent tile identifier is the image id followed by
//! the key with every `/` replaced by `_`:
//!
//! ```
//! use zoomvault::tile::tile_id;
//!
//! assert_eq!(tile_id("img-42", "abc123/2/3/4"), "img-42abc123_2_3_4");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::descriptor::{ImageLocation, TileInfo};
use crate::signer::UrlSigner;

/// Position of a tile in the pyramid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileCoordinate {
    pub x: u32,
    pub y: u32,
    /// Pyramid level index.
    pub z: u32,
}

impl TileCoordinate {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

/// Error parsing a tile key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid tile key {0:?}: expected token/x/y/z")]
pub struct TileKeyError(String);

/// Tile key `{token}/{x}/{y}/{z}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub token: String,
    pub coordinate: TileCoordinate,
}

impl TileKey {
    pub fn new(token: impl Into<String>, coordinate: TileCoordinate) -> Self {
        Self {
            token: token.into(),
            coordinate,
        }
    }

    /// The persistent identifier of this tile under `image_id`.
    pub fn tile_id(&self, image_id: &str) -> String {
        tile_id(image_id, &self.to_string())
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let TileCoordinate { x, y, z } = self.coordinate;
        write!(f, "{}/{}/{}/{}", self.token, x, y, z)
    }
}

impl FromStr for TileKey {
    type Err = TileKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TileKeyError(s.to_string());
        let mut parts = s.rsplitn(4, '/');

        let z = parts.next().and_then(|v| v.parse().ok()).ok_or_else(err)?;
        let y = parts.next().and_then(|v| v.parse().ok()).ok_or_else(err)?;
        let x = parts.next().and_then(|v| v.parse().ok()).ok_or_else(err)?;
        let token = parts.next().ok_or_else(err)?;

        Ok(Self::new(token, TileCoordinate::new(x, y, z)))
    }
}

/// Derives the persistent tile identifier from an image id and a tile key.
pub fn tile_id(image_id: &str, key: &str) -> String {
    let mut id = String::with_capacity(image_id.len() + key.len());
    id.push_str(image_id);
    id.extend(key.chars().map(|c| if c == '/' { '_' } else { c }));
    id
}

/// Every tile of an image, keyed by tile key, with its signed request URL.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TilePlan {
    urls: BTreeMap<String, String>,
}

impl TilePlan {
    /// Enumerates all levels and grid positions and signs each request path.
    pub fn build(signer: &UrlSigner, location: &ImageLocation, info: &TileInfo) -> Self {
        let mut urls = BTreeMap::new();

        for coordinate in coordinates(info) {
            let TileCoordinate { x, y, z } = coordinate;
            let key = TileKey::new(location.token.as_str(), coordinate);
            let signed = signer.compute_signed_path(&location.path, &location.token, x, y, z);
            urls.insert(key.to_string(), format!("{}{}", info.origin, signed));
        }

        Self { urls }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Tile key → request URL.
    pub fn urls(&self) -> &BTreeMap<String, String> {
        &self.urls
    }

    pub fn into_urls(self) -> BTreeMap<String, String> {
        self.urls
    }
}

/// All tile coordinates of a pyramid, level by level, row-major.
pub fn coordinates(info: &TileInfo) -> impl Iterator<Item = TileCoordinate> + '_ {
    info.pyramid_levels
        .iter()
        .enumerate()
        .flat_map(|(z, level)| {
            (0..level.num_tiles_y).flat_map(move |y| {
                (0..level.num_tiles_x).map(move |x| TileCoordinate::new(x, y, z as u32))
            })
        })
}
