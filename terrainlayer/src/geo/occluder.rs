//! Horizon culling against the ellipsoid.
//!
//! A tile is hidden behind the horizon when a single test point, computed
//! once per tile, is occluded by the ellipsoid. The point is expressed in
//! the ellipsoid's scaled space, where the ellipsoid becomes the unit sphere
//! and the visibility test reduces to sphere geometry.

use glam::DVec3;

use super::{BoundingSphere, Ellipsoid, Extent};

/// Computes horizon-culling points for a given ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipsoidalOccluder {
    ellipsoid: Ellipsoid,
}

impl EllipsoidalOccluder {
    pub fn new(ellipsoid: Ellipsoid) -> Self {
        Self { ellipsoid }
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    /// Computes a scaled-space point along `direction_to_point` that is
    /// occluded only when every one of `positions` is occluded.
    ///
    /// Returns `None` when no finite point exists.
    pub fn compute_horizon_culling_point(
        &self,
        direction_to_point: DVec3,
        positions: &[DVec3],
    ) -> Option<DVec3> {
        let scaled_direction = self
            .ellipsoid
            .transform_position_to_scaled_space(direction_to_point)
            .normalize();
        if !scaled_direction.is_finite() {
            return None;
        }

        let mut result_magnitude: f64 = 0.0;
        for &position in positions {
            let candidate = self.compute_magnitude(position, scaled_direction);
            result_magnitude = result_magnitude.max(candidate);
        }

        if !result_magnitude.is_finite() || result_magnitude <= 0.0 {
            return None;
        }
        Some(scaled_direction * result_magnitude)
    }

    /// Computes the horizon-culling point for the surface of an extent.
    ///
    /// Returns `None` for extents whose bounding sphere centre sits too close
    /// to the ellipsoid centre for a direction to be meaningful.
    pub fn compute_horizon_culling_point_from_extent(&self, extent: &Extent) -> Option<DVec3> {
        let positions = extent.subsample(&self.ellipsoid, 0.0);
        let bounding_sphere = BoundingSphere::from_points(&positions);

        if bounding_sphere.center.length() < 0.1 * self.ellipsoid.minimum_radius() {
            return None;
        }
        self.compute_horizon_culling_point(bounding_sphere.center, &positions)
    }

    fn compute_magnitude(&self, position: DVec3, scaled_direction: DVec3) -> f64 {
        let scaled_position = self.ellipsoid.transform_position_to_scaled_space(position);
        let mut magnitude_squared = scaled_position.length_squared();
        let mut magnitude = magnitude_squared.sqrt();
        let direction = scaled_position / magnitude;

        // Points below the ellipsoid are treated as lying on it.
        magnitude_squared = magnitude_squared.max(1.0);
        magnitude = magnitude.max(1.0);

        let cos_alpha = direction.dot(scaled_direction);
        let sin_alpha = direction.cross(scaled_direction).length();
        let cos_beta = 1.0 / magnitude;
        let sin_beta = (magnitude_squared - 1.0).sqrt() * cos_beta;

        1.0 / (cos_alpha * cos_beta - sin_alpha * sin_beta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Cartographic;

    #[test]
    fn test_single_surface_point_yields_point_on_surface() {
        let ellipsoid = Ellipsoid::wgs84();
        let occluder = EllipsoidalOccluder::new(ellipsoid);
        let p = ellipsoid.cartographic_to_cartesian(&Cartographic::from_degrees(20.0, 10.0, 0.0));
        let point = occluder.compute_horizon_culling_point(p, &[p]).unwrap();
        assert!((point.length() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_small_extent_point_is_just_above_unit_sphere() {
        let occluder = EllipsoidalOccluder::new(Ellipsoid::wgs84());
        let extent = Extent::from_degrees(10.0, 40.0, 11.0, 41.0);
        let point = occluder
            .compute_horizon_culling_point_from_extent(&extent)
            .unwrap();
        let magnitude = point.length();
        assert!(magnitude > 1.0);
        assert!(magnitude < 1.01);
    }

    #[test]
    fn test_whole_globe_extent_is_degenerate() {
        // The samples of the whole globe are centred on the ellipsoid centre.
        let occluder = EllipsoidalOccluder::new(Ellipsoid::wgs84());
        assert!(occluder
            .compute_horizon_culling_point_from_extent(&Extent::MAX_VALUE)
            .is_none());
    }
}
