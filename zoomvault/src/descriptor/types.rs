//! Pyramid geometry types.

/// One zoom resolution of a deep-zoom pyramid.
///
/// Pixel dimensions are derived from the tile grid and the number of unused
/// pixels in the last column/row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PyramidLevel {
    pub num_tiles_x: u32,
    pub num_tiles_y: u32,
    pub inverse_scale: u32,
    pub empty_pels_x: u32,
    pub empty_pels_y: u32,
    pub width: u32,
    pub height: u32,
}

impl PyramidLevel {
    /// Builds a level and computes its pixel size for the given tile size.
    pub fn new(
        num_tiles_x: u32,
        num_tiles_y: u32,
        inverse_scale: u32,
        empty_pels_x: u32,
        empty_pels_y: u32,
        tile_width: u32,
        tile_height: u32,
    ) -> Self {
        Self {
            num_tiles_x,
            num_tiles_y,
            inverse_scale,
            empty_pels_x,
            empty_pels_y,
            width: num_tiles_x
                .saturating_mul(tile_width)
                .saturating_sub(empty_pels_x),
            height: num_tiles_y
                .saturating_mul(tile_height)
                .saturating_sub(empty_pels_y),
        }
    }

    /// Number of tiles in this level.
    pub fn tile_count(&self) -> u64 {
        u64::from(self.num_tiles_x) * u64::from(self.num_tiles_y)
    }
}

/// Parsed pyramid descriptor.
///
/// `pyramid_levels` is ordered coarsest first; the last entry is the full
/// resolution image and supplies `width` and `height`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileInfo {
    pub width: u32,
    pub height: u32,
    /// Tile edge length in pixels (`tile_width`).
    pub tile_size: u32,
    pub tile_height: u32,
    pub num_tiles: u64,
    pub max_zoom_level: u32,
    /// Scheme and host of the tile service, e.g. `https://lh3.example.com`.
    pub origin: String,
    pub full_pyramid_depth: u32,
    pub timestamp: u64,
    pub tiler_version_number: u32,
    pub pyramid_levels: Vec<PyramidLevel>,
}

impl TileInfo {
    /// Returns the level for zoom index `z`.
    pub fn level(&self, z: u32) -> Option<&PyramidLevel> {
        self.pyramid_levels.get(z as usize)
    }

    /// The full-resolution level.
    pub fn top_level(&self) -> Option<&PyramidLevel> {
        self.pyramid_levels.last()
    }
}
