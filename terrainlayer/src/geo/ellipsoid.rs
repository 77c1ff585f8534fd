//! Reference ellipsoid.

use glam::DVec3;

use super::Cartographic;

/// A triaxial ellipsoid centred at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    radii: DVec3,
    radii_squared: DVec3,
    one_over_radii: DVec3,
    one_over_radii_squared: DVec3,
    minimum_radius: f64,
    maximum_radius: f64,
}

impl Ellipsoid {
    pub fn new(radii: DVec3) -> Self {
        Self {
            radii,
            radii_squared: radii * radii,
            one_over_radii: DVec3::ONE / radii,
            one_over_radii_squared: DVec3::ONE / (radii * radii),
            minimum_radius: radii.min_element(),
            maximum_radius: radii.max_element(),
        }
    }

    /// The WGS84 ellipsoid.
    pub fn wgs84() -> Self {
        Self::new(DVec3::new(6378137.0, 6378137.0, 6356752.314_245_179))
    }

    pub fn radii(&self) -> DVec3 {
        self.radii
    }

    pub fn radii_squared(&self) -> DVec3 {
        self.radii_squared
    }

    pub fn one_over_radii(&self) -> DVec3 {
        self.one_over_radii
    }

    pub fn minimum_radius(&self) -> f64 {
        self.minimum_radius
    }

    pub fn maximum_radius(&self) -> f64 {
        self.maximum_radius
    }

    /// Surface normal at a geographic position.
    pub fn geodetic_surface_normal_cartographic(&self, position: &Cartographic) -> DVec3 {
        let cos_latitude = position.latitude.cos();
        DVec3::new(
            cos_latitude * position.longitude.cos(),
            cos_latitude * position.longitude.sin(),
            position.latitude.sin(),
        )
        .normalize()
    }

    /// Surface normal of the ellipsoid at (or radially above) a Cartesian position.
    pub fn geodetic_surface_normal(&self, position: DVec3) -> DVec3 {
        (position * self.one_over_radii_squared).normalize()
    }

    pub fn cartographic_to_cartesian(&self, position: &Cartographic) -> DVec3 {
        let n = self.geodetic_surface_normal_cartographic(position);
        let k = self.radii_squared * n;
        let gamma = n.dot(k).sqrt();
        k / gamma + n * position.height
    }

    /// Scales a position so the ellipsoid becomes the unit sphere.
    pub fn transform_position_to_scaled_space(&self, position: DVec3) -> DVec3 {
        position * self.one_over_radii
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::wgs84()
    }
}
