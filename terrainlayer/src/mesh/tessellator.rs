//! Heightmap to vertex grid conversion.
//!
//! The grid is generated row by row from the north edge. With a non-zero
//! skirt height the grid grows by one vertex on every side; those border
//! vertices repeat the nearest edge sample and are lowered by the skirt
//! height so that cracks against coarser neighbours are hidden.

use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use glam::DVec3;

use crate::codec::{HeightRaster, BYTES_PER_HEIGHT, BYTES_PER_SAMPLE, ELEMENT_MULTIPLIER};
use crate::error::{TerrainError, TerrainResult};
use crate::geo::Extent;

use super::indices::check_index_range;
use super::VERTEX_STRIDE;

/// Heights in the raster are `height / scale + offset` fixed-point values.
pub const DEFAULT_HEIGHT_SCALE: f64 = 0.2;

/// Elevation of a zero sample, in metres.
pub const DEFAULT_HEIGHT_OFFSET: f64 = -1000.0;

/// Everything the offloaded tessellation needs, detached from the tile.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub heightmap: Arc<HeightRaster>,
    pub height_scale: f64,
    pub height_offset: f64,
    pub bytes_per_height: usize,
    pub stride: usize,
    pub width: u32,
    pub height: u32,
    /// Extent in the tiling scheme's native units: radians when geographic,
    /// Web Mercator metres otherwise.
    pub native_extent: Extent,
    pub relative_to_center: DVec3,
    pub radii_squared: DVec3,
    pub one_over_semimajor_axis: f64,
    pub skirt_height: f64,
    pub is_geographic: bool,
}

impl TransformRequest {
    /// Request with the standard 24-bit sample layout.
    pub fn new(heightmap: Arc<HeightRaster>, native_extent: Extent) -> Self {
        let width = heightmap.width();
        let height = heightmap.height();
        Self {
            heightmap,
            height_scale: DEFAULT_HEIGHT_SCALE,
            height_offset: DEFAULT_HEIGHT_OFFSET,
            bytes_per_height: BYTES_PER_HEIGHT,
            stride: BYTES_PER_SAMPLE,
            width,
            height,
            native_extent,
            relative_to_center: DVec3::ZERO,
            radii_squared: DVec3::ONE,
            one_over_semimajor_axis: 1.0,
            skirt_height: 0.0,
            is_geographic: true,
        }
    }

    /// Number of vertices per row and column, skirt included.
    pub fn grid_size(&self) -> (u32, u32) {
        if self.skirt_height > 0.0 {
            (self.width + 2, self.height + 2)
        } else {
            (self.width, self.height)
        }
    }
}

/// Height range of the mesh, skirt excluded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshStatistics {
    pub min_height: f64,
    pub max_height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub vertices: Vec<f32>,
    pub statistics: MeshStatistics,
}

/// Builds the vertex buffer for a heightmap.
///
/// Each vertex is `[x, y, z, height, u, v]` with the position relative to
/// `relative_to_center`.
pub fn tessellate(request: &TransformRequest) -> TerrainResult<TransformOutput> {
    validate(request)?;

    let width = request.width as i64;
    let height = request.height as i64;
    let extent = &request.native_extent;
    let one_over_axis = request.one_over_semimajor_axis;

    let (geo_west, geo_south, geo_east, geo_north) = if request.is_geographic {
        (extent.west, extent.south, extent.east, extent.north)
    } else {
        (
            extent.west * one_over_axis,
            mercator_to_latitude(extent.south * one_over_axis),
            extent.east * one_over_axis,
            mercator_to_latitude(extent.north * one_over_axis),
        )
    };

    let granularity_x = (extent.east - extent.west) / (width - 1) as f64;
    let granularity_y = (extent.north - extent.south) / (height - 1) as f64;

    let border = if request.skirt_height > 0.0 { 1 } else { 0 };
    let (grid_width, grid_height) = request.grid_size();
    let mut vertices =
        Vec::with_capacity(grid_width as usize * grid_height as usize * VERTEX_STRIDE);

    let mut min_height = f64::INFINITY;
    let mut max_height = f64::NEG_INFINITY;

    for row_index in -border..height + border {
        let row = row_index.clamp(0, height - 1);

        let latitude = if request.is_geographic {
            extent.north - granularity_y * row as f64
        } else {
            mercator_to_latitude((extent.north - granularity_y * row as f64) * one_over_axis)
        };
        let (sin_latitude, cos_latitude) = latitude.sin_cos();
        let v = (latitude - geo_south) / (geo_north - geo_south);

        for col_index in -border..width + border {
            let col = col_index.clamp(0, width - 1);

            let mut longitude = extent.west + granularity_x * col as f64;
            if !request.is_geographic {
                longitude *= one_over_axis;
            }
            let u = (longitude - geo_west) / (geo_east - geo_west);

            let mut sample = read_height(request, row as usize, col as usize);
            min_height = min_height.min(sample);
            max_height = max_height.max(sample);

            if row != row_index || col != col_index {
                sample -= request.skirt_height;
            }

            let (sin_longitude, cos_longitude) = longitude.sin_cos();
            let normal = DVec3::new(
                cos_latitude * cos_longitude,
                cos_latitude * sin_longitude,
                sin_latitude,
            );
            let k = request.radii_squared * normal;
            let gamma = normal.dot(k).sqrt();
            let position = k / gamma + normal * sample - request.relative_to_center;

            vertices.extend_from_slice(&[
                position.x as f32,
                position.y as f32,
                position.z as f32,
                sample as f32,
                u as f32,
                v as f32,
            ]);
        }
    }

    Ok(TransformOutput {
        vertices,
        statistics: MeshStatistics {
            min_height,
            max_height,
        },
    })
}

fn validate(request: &TransformRequest) -> TerrainResult<()> {
    if request.width < 2 || request.height < 2 {
        return Err(TerrainError::Transform(format!(
            "heightmap {}x{} is smaller than one cell",
            request.width, request.height
        )));
    }
    if request.heightmap.width() != request.width || request.heightmap.height() != request.height {
        return Err(TerrainError::Transform(format!(
            "heightmap is {}x{}, request expects {}x{}",
            request.heightmap.width(),
            request.heightmap.height(),
            request.width,
            request.height
        )));
    }
    if request.bytes_per_height == 0 || request.bytes_per_height > request.stride {
        return Err(TerrainError::Transform(format!(
            "{} bytes per height does not fit a {}-byte sample",
            request.bytes_per_height, request.stride
        )));
    }
    let samples = request.width as usize * request.height as usize;
    if request.heightmap.as_bytes().len() < samples * request.stride {
        return Err(TerrainError::Transform(format!(
            "heightmap holds {} bytes, {} needed at stride {}",
            request.heightmap.as_bytes().len(),
            samples * request.stride,
            request.stride
        )));
    }
    let (grid_width, grid_height) = request.grid_size();
    check_index_range(grid_width, grid_height)
}

/// Decodes one big-endian sample into metres.
#[inline]
fn read_height(request: &TransformRequest, row: usize, col: usize) -> f64 {
    let bytes = request.heightmap.as_bytes();
    let start = (row * request.width as usize + col) * request.stride;
    let raw = bytes[start..start + request.bytes_per_height]
        .iter()
        .fold(0.0, |acc, &b| acc * ELEMENT_MULTIPLIER + b as f64);
    raw * request.height_scale + request.height_offset
}

#[inline]
fn mercator_to_latitude(mercator_y: f64) -> f64 {
    FRAC_PI_2 - 2.0 * (-mercator_y).exp().atan()
}
