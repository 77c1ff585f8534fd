//! Resource assembly.
//!
//! The last pipeline stage runs on the thread that owns the graphics
//! context. It uploads the mesh through a [`RenderContext`] and derives the
//! culling data a renderer needs for the tile: corner positions, the four
//! planes bounding the tile's sides, a bounding sphere and the
//! horizon-occlusion point.

use glam::DVec3;

use crate::error::{TerrainError, TerrainResult};
use crate::geo::{BoundingSphere, Ellipsoid, EllipsoidalOccluder, Extent};
use crate::mesh::{TransformedGeometry, VERTEX_STRIDE};
use crate::tile::Tile;

/// Opaque handle to an uploaded vertex array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexArrayHandle(pub u64);

/// Graphics-side resource creation.
///
/// Implemented by the renderer. Calls arrive only from the thread driving
/// the provider.
pub trait RenderContext {
    /// Uploads interleaved vertices and triangle indices.
    ///
    /// `stride` is the number of `f32` components per vertex.
    fn create_vertex_array(
        &mut self,
        vertices: &[f32],
        indices: &[u16],
        stride: usize,
    ) -> VertexArrayHandle;
}

/// Everything a renderer needs to draw and cull a ready tile.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderAttributes {
    pub center: DVec3,
    pub southwest_corner: DVec3,
    pub southeast_corner: DVec3,
    pub northeast_corner: DVec3,
    pub northwest_corner: DVec3,
    pub west_normal: DVec3,
    pub east_normal: DVec3,
    pub south_normal: DVec3,
    pub north_normal: DVec3,
    pub max_height: f64,
    pub bounding_sphere: BoundingSphere,
    /// `None` when the tile is too large for a meaningful point.
    pub occludee_point_in_scaled_space: Option<DVec3>,
    pub vertex_array: VertexArrayHandle,
}

/// Builds [`RenderAttributes`] from transformed geometry.
#[derive(Debug, Clone, Copy)]
pub struct ResourceAssembler {
    ellipsoid: Ellipsoid,
    occluder: EllipsoidalOccluder,
}

impl ResourceAssembler {
    pub fn new(ellipsoid: Ellipsoid) -> Self {
        Self {
            ellipsoid,
            occluder: EllipsoidalOccluder::new(ellipsoid),
        }
    }

    /// Consumes the tile's transformed geometry and marks it ready.
    pub fn assemble<R>(&self, tile: &mut Tile, context: &mut R) -> TerrainResult<()>
    where
        R: RenderContext + ?Sized,
    {
        let geometry = tile
            .take_transformed_geometry()
            .ok_or(TerrainError::MissingGeometry(tile.key()))?;
        let attributes = self.build(tile.extent(), &geometry, context);
        tile.set_render(attributes);
        Ok(())
    }

    pub fn build<R>(
        &self,
        extent: &Extent,
        geometry: &TransformedGeometry,
        context: &mut R,
    ) -> RenderAttributes
    where
        R: RenderContext + ?Sized,
    {
        let vertex_array =
            context.create_vertex_array(&geometry.vertices, &geometry.indices, VERTEX_STRIDE);

        let ellipsoid = &self.ellipsoid;
        let southwest = ellipsoid.cartographic_to_cartesian(&extent.southwest());
        let southeast = ellipsoid.cartographic_to_cartesian(&extent.southeast());
        let northeast = ellipsoid.cartographic_to_cartesian(&extent.northeast());
        let northwest = ellipsoid.cartographic_to_cartesian(&extent.northwest());

        let west_normal = DVec3::Z.cross(-southwest).normalize();
        let east_normal = (-northeast).cross(DVec3::Z).normalize();
        let south_normal = ellipsoid
            .geodetic_surface_normal(southeast)
            .cross(southwest - southeast)
            .normalize();
        let north_normal = ellipsoid
            .geodetic_surface_normal(northwest)
            .cross(northeast - northwest)
            .normalize();

        RenderAttributes {
            center: geometry.center,
            southwest_corner: southwest,
            southeast_corner: southeast,
            northeast_corner: northeast,
            northwest_corner: northwest,
            west_normal,
            east_normal,
            south_normal,
            north_normal,
            max_height: geometry.statistics.max_height,
            bounding_sphere: BoundingSphere::from_vertices(
                &geometry.vertices,
                geometry.center,
                VERTEX_STRIDE,
            ),
            occludee_point_in_scaled_space: self
                .occluder
                .compute_horizon_culling_point_from_extent(extent),
            vertex_array,
        }
    }
}

impl Default for ResourceAssembler {
    fn default() -> Self {
        Self::new(Ellipsoid::wgs84())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::HeightRaster;
    use crate::geo::GeographicTilingScheme;
    use crate::mesh::{tessellate, TransformRequest};
    use crate::tile::{TileKey, TileState};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingContext {
        uploads: Vec<(usize, usize, usize)>,
    }

    impl RenderContext for RecordingContext {
        fn create_vertex_array(
            &mut self,
            vertices: &[f32],
            indices: &[u16],
            stride: usize,
        ) -> VertexArrayHandle {
            self.uploads.push((vertices.len(), indices.len(), stride));
            VertexArrayHandle(self.uploads.len() as u64)
        }
    }

    fn transformed_tile(key: TileKey) -> Tile {
        let scheme = GeographicTilingScheme::default();
        let ellipsoid = *scheme.ellipsoid();
        let extent = scheme.tile_to_extent(key);
        let raster = Arc::new(HeightRaster::filled(4, 4, 5000));

        let mut request = TransformRequest::new(Arc::clone(&raster), extent);
        request.relative_to_center = ellipsoid.cartographic_to_cartesian(&extent.center());
        request.radii_squared = ellipsoid.radii_squared();
        request.skirt_height = 10.0;
        let output = tessellate(&request).unwrap();

        let mut tile = Tile::new(key, extent);
        tile.set_real_geometry(HeightRaster::filled(4, 4, 5000));
        tile.set_transformed_geometry(TransformedGeometry {
            vertices: output.vertices,
            indices: crate::mesh::regular_grid_indices(6, 6).unwrap().into(),
            statistics: output.statistics,
            center: request.relative_to_center,
        });
        tile
    }

    #[test]
    fn test_assemble_marks_ready_and_clears_buffers() {
        let mut tile = transformed_tile(TileKey::new(4, 17, 5));
        let mut context = RecordingContext::default();

        ResourceAssembler::default()
            .assemble(&mut tile, &mut context)
            .unwrap();

        assert_eq!(tile.state(), TileState::Ready);
        assert!(tile.transformed_geometry().is_none());
        assert_eq!(context.uploads, vec![(36 * VERTEX_STRIDE, 150, VERTEX_STRIDE)]);

        let render = tile.render().unwrap();
        assert_eq!(render.vertex_array, VertexArrayHandle(1));
        assert_eq!(render.max_height, 0.0);
    }

    #[test]
    fn test_assemble_without_geometry_fails() {
        let key = TileKey::new(1, 0, 0);
        let mut tile = Tile::new(key, GeographicTilingScheme::default().tile_to_extent(key));
        let result = ResourceAssembler::default().assemble(&mut tile, &mut RecordingContext::default());
        assert_eq!(result, Err(TerrainError::MissingGeometry(key)));
        assert_eq!(tile.state(), TileState::Unloaded);
    }

    #[test]
    fn test_normals_point_away_from_tile() {
        let mut tile = transformed_tile(TileKey::new(5, 30, 10));
        ResourceAssembler::default()
            .assemble(&mut tile, &mut RecordingContext::default())
            .unwrap();
        let render = tile.render().unwrap();

        let east_of_center = render.northeast_corner - render.northwest_corner;
        assert!(render.east_normal.dot(east_of_center) > 0.0);
        assert!(render.west_normal.dot(east_of_center) < 0.0);

        let north_of_center = render.northwest_corner - render.southwest_corner;
        assert!(render.north_normal.dot(north_of_center) > 0.0);
        assert!(render.south_normal.dot(north_of_center) < 0.0);

        for normal in [
            render.west_normal,
            render.east_normal,
            render.south_normal,
            render.north_normal,
        ] {
            assert!((normal.length() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_bounding_sphere_contains_corners_and_occludee_exists() {
        let mut tile = transformed_tile(TileKey::new(6, 40, 20));
        ResourceAssembler::default()
            .assemble(&mut tile, &mut RecordingContext::default())
            .unwrap();
        let render = tile.render().unwrap();

        for corner in [
            render.southwest_corner,
            render.southeast_corner,
            render.northeast_corner,
            render.northwest_corner,
        ] {
            let distance = (corner - render.bounding_sphere.center).length();
            assert!(distance <= render.bounding_sphere.radius + 1.0);
        }

        let point = render.occludee_point_in_scaled_space.unwrap();
        assert!(point.length() >= 1.0);
    }

    #[test]
    fn test_corners_follow_extent() {
        let key = TileKey::new(2, 1, 0);
        let mut tile = transformed_tile(key);
        ResourceAssembler::default()
            .assemble(&mut tile, &mut RecordingContext::default())
            .unwrap();
        let render = tile.render().unwrap();
        let ellipsoid = Ellipsoid::wgs84();
        let expected = ellipsoid.cartographic_to_cartesian(&tile.extent().southwest());
        assert!((render.southwest_corner - expected).length() < 1e-6);
    }
}
