//! Geographic (equirectangular) tiling scheme.
//!
//! Level 0 covers the globe with two tiles side by side, west and east of
//! the antimeridian-to-prime-meridian split. Each level doubles the tile
//! count along both axes. Tile rows count from the north:
//!
//! ```text
//! level 0:  +-------+-------+
//!           | (0,0) | (1,0) |    x → east, y ↓ south
//!           +-------+-------+
//! ```

use super::{Ellipsoid, Extent};
use crate::tile::TileKey;

/// Number of level-zero tiles along the longitude axis.
pub const LEVEL_ZERO_TILES_X: u32 = 2;

/// Number of level-zero tiles along the latitude axis.
pub const LEVEL_ZERO_TILES_Y: u32 = 1;

/// Deepest level whose tile counts fit in `u32`.
pub const MAX_TILE_LEVEL: u32 = 30;

/// Tiling scheme mapping tile keys to geographic extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeographicTilingScheme {
    ellipsoid: Ellipsoid,
    extent: Extent,
}

impl GeographicTilingScheme {
    pub fn new(ellipsoid: Ellipsoid) -> Self {
        Self {
            ellipsoid,
            extent: Extent::MAX_VALUE,
        }
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    /// The scheme's native coordinates are geographic radians.
    pub fn is_geographic(&self) -> bool {
        true
    }

    /// Tile columns at `level`. Levels past [`MAX_TILE_LEVEL`] are clamped.
    pub fn number_of_x_tiles_at_level(&self, level: u32) -> u32 {
        LEVEL_ZERO_TILES_X << level.min(MAX_TILE_LEVEL)
    }

    /// Tile rows at `level`. Levels past [`MAX_TILE_LEVEL`] are clamped.
    pub fn number_of_y_tiles_at_level(&self, level: u32) -> u32 {
        LEVEL_ZERO_TILES_Y << level.min(MAX_TILE_LEVEL)
    }

    /// True if `key` names a cell of this grid.
    pub fn contains(&self, key: TileKey) -> bool {
        key.level() <= MAX_TILE_LEVEL
            && key.x() < self.number_of_x_tiles_at_level(key.level())
            && key.y() < self.number_of_y_tiles_at_level(key.level())
    }

    /// Root tiles of the quadtree.
    pub fn root_tiles(&self) -> Vec<TileKey> {
        let mut roots = Vec::with_capacity((LEVEL_ZERO_TILES_X * LEVEL_ZERO_TILES_Y) as usize);
        for y in 0..LEVEL_ZERO_TILES_Y {
            for x in 0..LEVEL_ZERO_TILES_X {
                roots.push(TileKey::new(0, x, y));
            }
        }
        roots
    }

    /// Returns the geographic extent covered by a tile.
    pub fn tile_to_extent(&self, key: TileKey) -> Extent {
        let x_tiles = self.number_of_x_tiles_at_level(key.level()) as f64;
        let y_tiles = self.number_of_y_tiles_at_level(key.level()) as f64;

        let tile_width = self.extent.width() / x_tiles;
        let west = self.extent.west + key.x() as f64 * tile_width;
        let east = self.extent.west + (key.x() as f64 + 1.0) * tile_width;

        let tile_height = self.extent.height() / y_tiles;
        let north = self.extent.north - key.y() as f64 * tile_height;
        let south = self.extent.north - (key.y() as f64 + 1.0) * tile_height;

        Extent::new(west, south, east, north)
    }
}

impl Default for GeographicTilingScheme {
    fn default() -> Self {
        Self::new(Ellipsoid::wgs84())
    }
}
