//! Geographic positions and rectangles.

use std::f64::consts::{FRAC_PI_2, PI};

use glam::DVec3;

use super::Ellipsoid;

/// A position given as longitude, latitude (radians) and height (metres).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cartographic {
    pub longitude: f64,
    pub latitude: f64,
    pub height: f64,
}

impl Cartographic {
    pub fn new(longitude: f64, latitude: f64, height: f64) -> Self {
        Self {
            longitude,
            latitude,
            height,
        }
    }

    pub fn from_degrees(longitude: f64, latitude: f64, height: f64) -> Self {
        Self::new(longitude.to_radians(), latitude.to_radians(), height)
    }
}

/// A geographic rectangle in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Extent {
    /// The whole globe.
    pub const MAX_VALUE: Extent = Extent {
        west: -PI,
        south: -FRAC_PI_2,
        east: PI,
        north: FRAC_PI_2,
    };

    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    pub fn from_degrees(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self::new(
            west.to_radians(),
            south.to_radians(),
            east.to_radians(),
            north.to_radians(),
        )
    }

    /// Longitudinal span in radians.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Latitudinal span in radians.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn center(&self) -> Cartographic {
        Cartographic::new(
            (self.west + self.east) * 0.5,
            (self.south + self.north) * 0.5,
            0.0,
        )
    }

    pub fn southwest(&self) -> Cartographic {
        Cartographic::new(self.west, self.south, 0.0)
    }

    pub fn southeast(&self) -> Cartographic {
        Cartographic::new(self.east, self.south, 0.0)
    }

    pub fn northeast(&self) -> Cartographic {
        Cartographic::new(self.east, self.north, 0.0)
    }

    pub fn northwest(&self) -> Cartographic {
        Cartographic::new(self.west, self.north, 0.0)
    }

    /// Returns true if the position lies inside or on the edge of the extent.
    pub fn contains(&self, position: &Cartographic) -> bool {
        position.longitude >= self.west
            && position.longitude <= self.east
            && position.latitude >= self.south
            && position.latitude <= self.north
    }

    /// Samples Cartesian points that enclose the extent's surface.
    ///
    /// Returns the four corners, plus points where the extent crosses the
    /// multiples of 90° longitude along its latitude closest to the equator,
    /// plus the equator crossings at the west and east edges when the extent
    /// straddles the equator. Those extra points bulge beyond the corners.
    pub fn subsample(&self, ellipsoid: &Ellipsoid, surface_height: f64) -> Vec<DVec3> {
        let mut positions = Vec::with_capacity(10);
        let corner = |lon: f64, lat: f64| {
            ellipsoid.cartographic_to_cartesian(&Cartographic::new(lon, lat, surface_height))
        };

        positions.push(corner(self.west, self.north));
        positions.push(corner(self.east, self.north));
        positions.push(corner(self.east, self.south));
        positions.push(corner(self.west, self.south));

        let latitude = if self.north < 0.0 {
            self.north
        } else if self.south > 0.0 {
            self.south
        } else {
            0.0
        };

        for i in 1..8 {
            let longitude = -PI + i as f64 * FRAC_PI_2;
            let sample = Cartographic::new(longitude, latitude, surface_height);
            if self.contains(&sample) {
                positions.push(ellipsoid.cartographic_to_cartesian(&sample));
            }
        }

        if latitude == 0.0 {
            positions.push(corner(self.west, latitude));
            positions.push(corner(self.east, latitude));
        }

        positions
    }
}
