//! Geometry transformation.
//!
//! Converts a received heightmap into a skirted vertex grid off the caller's
//! thread. The index buffer depends only on the grid size, so it is built
//! once and shared by every tile.

mod indices;
mod pool;
mod tessellator;

pub use indices::{check_index_range, regular_grid_indices, MAX_INDEXED_VERTICES};
pub use pool::{default_max_active_transforms, TransformPermit, TransformPool};
pub use tessellator::{
    tessellate, MeshStatistics, TransformOutput, TransformRequest, DEFAULT_HEIGHT_OFFSET,
    DEFAULT_HEIGHT_SCALE,
};

use std::fmt;
use std::sync::Arc;

use glam::DVec3;

use crate::codec::{BYTES_PER_HEIGHT, BYTES_PER_SAMPLE};
use crate::error::{TerrainError, TerrainResult};
use crate::geo::{Ellipsoid, GeographicTilingScheme};
use crate::tile::Tile;

/// Number of `f32` components per vertex: x, y, z, height, u, v.
pub const VERTEX_STRIDE: usize = 6;

/// Mesh buffers produced for one tile and waiting for assembly.
#[derive(Clone)]
pub struct TransformedGeometry {
    pub vertices: Vec<f32>,
    pub indices: Arc<[u16]>,
    pub statistics: MeshStatistics,
    /// Origin the vertex positions are relative to.
    pub center: DVec3,
}

impl TransformedGeometry {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }
}

impl fmt::Debug for TransformedGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformedGeometry")
            .field("vertices", &self.vertex_count())
            .field("indices", &self.indices.len())
            .field("statistics", &self.statistics)
            .field("center", &self.center)
            .finish()
    }
}

/// Result of asking the transformer to start work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformStart {
    Scheduled,
    /// Every worker slot is busy; nothing was started.
    Postponed,
}

/// Schedules heightmap tessellation on the transform pool.
#[derive(Debug)]
pub struct GeometryTransformer {
    ellipsoid: Ellipsoid,
    is_geographic: bool,
    height_scale: f64,
    height_offset: f64,
    pool: Arc<TransformPool>,
    grid: (u32, u32),
    indices: Arc<[u16]>,
}

impl GeometryTransformer {
    /// Creates a transformer for `heightmap_width`-square rasters.
    ///
    /// # Errors
    ///
    /// Returns [`TerrainError::Transform`] if a skirted grid of that width
    /// cannot be indexed with `u16`.
    pub fn new(
        scheme: &GeographicTilingScheme,
        heightmap_width: u32,
        height_scale: f64,
        height_offset: f64,
        pool: Arc<TransformPool>,
    ) -> TerrainResult<Self> {
        let grid = (heightmap_width + 2, heightmap_width + 2);
        Ok(Self {
            ellipsoid: *scheme.ellipsoid(),
            is_geographic: scheme.is_geographic(),
            height_scale,
            height_offset,
            pool,
            grid,
            indices: regular_grid_indices(grid.0, grid.1)?.into(),
        })
    }

    pub fn with_pool(mut self, pool: Arc<TransformPool>) -> Self {
        self.pool = pool;
        self
    }

    pub fn pool(&self) -> &Arc<TransformPool> {
        &self.pool
    }

    /// Shared indices for a skirted `width × height` heightmap.
    pub fn indices_for(&self, width: u32, height: u32) -> TerrainResult<Arc<[u16]>> {
        let grid = (width.saturating_add(2), height.saturating_add(2));
        if grid == self.grid {
            Ok(Arc::clone(&self.indices))
        } else {
            Ok(regular_grid_indices(grid.0, grid.1)?.into())
        }
    }

    /// Builds the offload request for a received tile.
    pub fn request_for(&self, tile: &Tile, skirt_height: f64) -> TerrainResult<TransformRequest> {
        let heightmap = tile
            .geometry()
            .cloned()
            .ok_or(TerrainError::MissingGeometry(tile.key()))?;
        let extent = *tile.extent();

        Ok(TransformRequest {
            width: heightmap.width(),
            height: heightmap.height(),
            heightmap,
            height_scale: self.height_scale,
            height_offset: self.height_offset,
            bytes_per_height: BYTES_PER_HEIGHT,
            stride: BYTES_PER_SAMPLE,
            native_extent: extent,
            relative_to_center: self.ellipsoid.cartographic_to_cartesian(&extent.center()),
            radii_squared: self.ellipsoid.radii_squared(),
            one_over_semimajor_axis: 1.0 / self.ellipsoid.maximum_radius(),
            skirt_height,
            is_geographic: self.is_geographic,
        })
    }

    /// Starts tessellating `tile` on the pool.
    ///
    /// `on_complete` runs on a pool thread once the mesh is built. It is not
    /// called when the pool is saturated, or when the heightmap is too large
    /// to index, in which case the error is returned directly.
    pub fn start<F>(&self, tile: &Tile, skirt_height: f64, on_complete: F) -> TerrainResult<TransformStart>
    where
        F: FnOnce(TerrainResult<TransformedGeometry>) + Send + 'static,
    {
        let request = self.request_for(tile, skirt_height)?;

        let (grid_width, grid_height) = request.grid_size();
        let indices = if skirt_height > 0.0 {
            self.indices_for(request.width, request.height)?
        } else {
            regular_grid_indices(grid_width, grid_height)?.into()
        };

        let Some(permit) = self.pool.try_acquire() else {
            tracing::trace!(tile = %tile.key(), "Transform pool saturated");
            return Ok(TransformStart::Postponed);
        };

        tracing::debug!(tile = %tile.key(), skirt_height, "Scheduling transform");

        self.pool.spawn(
            permit,
            move || {
                tessellate(&request).map(|output| TransformedGeometry {
                    vertices: output.vertices,
                    indices,
                    statistics: output.statistics,
                    center: request.relative_to_center,
                })
            },
            on_complete,
        );

        Ok(TransformStart::Scheduled)
    }
}
