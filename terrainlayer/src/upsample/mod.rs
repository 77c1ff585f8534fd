//! Ancestor upsampling.
//!
//! When a tile has no heightmap of its own, the nearest ancestor that holds
//! real data is resampled over the tile's extent. Interpolation follows the
//! mesh triangulation: each source cell is split along its southwest to
//! northeast diagonal and the height is interpolated linearly inside the
//! triangle containing the sample. Blending all four corners bilinearly
//! would not match the rendered ancestor surface along tile seams.
//!
//! ```text
//!  nw ────── ne
//!   │ upper ╱│
//!   │ left ╱ │     dy < dx  → lower-right triangle (sw, se, ne)
//!   │     ╱  │     otherwise → upper-left triangle (sw, nw, ne)
//!   │    ╱   │
//!   │   ╱lower
//!   │  ╱ right
//!  sw ────── se
//! ```

use crate::codec::{HeightCodec, HeightRaster};
use crate::error::{TerrainError, TerrainResult};
use crate::geo::Extent;
use crate::tile::{TileKey, TileTree};

/// Synthesizes heightmaps for tiles without real data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AncestorUpsampler {
    width: u32,
}

impl AncestorUpsampler {
    /// Creates an upsampler producing `width × width` rasters.
    pub fn new(width: u32) -> Self {
        Self { width }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Builds a heightmap for `key` from its nearest real-data ancestor.
    ///
    /// # Errors
    ///
    /// Returns [`TerrainError::NoAncestorData`] if no ancestor in `tree` has
    /// a fetched heightmap, and [`TerrainError::MissingGeometry`] if `key`
    /// itself is not in the tree.
    pub fn upsample(&self, tree: &TileTree, key: TileKey) -> TerrainResult<HeightRaster> {
        let tile = tree.get(key).ok_or(TerrainError::MissingGeometry(key))?;
        let ancestor = tree
            .nearest_real_data_ancestor(key)
            .ok_or(TerrainError::NoAncestorData(key))?;
        let source = ancestor
            .geometry()
            .ok_or(TerrainError::MissingGeometry(ancestor.key()))?;

        tracing::debug!(
            tile = %key,
            ancestor = %ancestor.key(),
            levels = key.level() - ancestor.level(),
            "Upsampling heightmap from ancestor"
        );

        Ok(self.upsample_from(source, ancestor.extent(), tile.extent()))
    }

    /// Resamples `source` (covering `source_extent`) over `target_extent`.
    pub fn upsample_from(
        &self,
        source: &HeightRaster,
        source_extent: &Extent,
        target_extent: &Extent,
    ) -> HeightRaster {
        let width = self.width;
        let height = self.width;
        let mut target = HeightRaster::filled(width, height, 0);

        for j in 0..height {
            let latitude = lerp(
                target_extent.north,
                target_extent.south,
                j as f64 / (height - 1) as f64,
            );
            for i in 0..width {
                let longitude = lerp(
                    target_extent.west,
                    target_extent.east,
                    i as f64 / (width - 1) as f64,
                );
                let sample = interpolate_height(source, source_extent, longitude, latitude);
                target.set_height(j, i, HeightCodec::quantize(sample));
            }
        }

        target
    }
}

#[inline]
fn lerp(start: f64, end: f64, t: f64) -> f64 {
    (1.0 - t) * start + t * end
}

/// Samples `source` at a geographic position inside `source_extent`.
fn interpolate_height(
    source: &HeightRaster,
    source_extent: &Extent,
    longitude: f64,
    latitude: f64,
) -> f64 {
    let width = source.width();
    let height = source.height();

    let from_west = (longitude - source_extent.west) * (width - 1) as f64 / source_extent.width();
    let from_south =
        (latitude - source_extent.south) * (height - 1) as f64 / source_extent.height();

    let (west_index, east_index) = cell_bounds(from_west, width);
    let (south_index, north_index) = cell_bounds(from_south, height);

    let dx = from_west - west_index as f64;
    let dy = from_south - south_index as f64;

    // Raster rows run from the north edge.
    let south_row = height - 1 - south_index;
    let north_row = height - 1 - north_index;

    let southwest = source.height_at(south_row, west_index) as f64;
    let southeast = source.height_at(south_row, east_index) as f64;
    let northwest = source.height_at(north_row, west_index) as f64;
    let northeast = source.height_at(north_row, east_index) as f64;

    triangle_interpolate_height(dx, dy, southwest, southeast, northwest, northeast)
}

/// Integer bounds of the grid cell containing `position`.
///
/// Positions on or past the last sample pin to the last interior cell.
fn cell_bounds(position: f64, samples: u32) -> (u32, u32) {
    let lower = if position <= 0.0 {
        0
    } else {
        position as u32
    };
    if lower + 1 >= samples {
        (samples - 2, samples - 1)
    } else {
        (lower, lower + 1)
    }
}

/// Interpolates inside a grid cell split along its southwest–northeast diagonal.
///
/// `dx` and `dy` are the offsets from the southwest corner in cell units.
pub fn triangle_interpolate_height(
    dx: f64,
    dy: f64,
    southwest: f64,
    southeast: f64,
    northwest: f64,
    northeast: f64,
) -> f64 {
    if dy < dx {
        southwest + dx * (southeast - southwest) + dy * (northeast - southeast)
    } else {
        southwest + dx * (northeast - northwest) + dy * (northwest - southwest)
    }
}
