//! Geodesy primitives used by the tile pipeline.
//!
//! Positions are `glam::DVec3` in Earth-centered, Earth-fixed metres.
//! Geographic coordinates are radians.
//!
//! - [`Ellipsoid`] converts cartographic positions to Cartesian and gives
//!   geodetic surface normals.
//! - [`GeographicTilingScheme`] maps `(level, x, y)` to an [`Extent`].
//! - [`BoundingSphere`] and [`EllipsoidalOccluder`] produce the culling
//!   volumes attached to a ready tile.

mod bounding;
mod cartographic;
mod ellipsoid;
mod occluder;
mod tiling;

pub use bounding::BoundingSphere;
pub use cartographic::{Cartographic, Extent};
pub use ellipsoid::Ellipsoid;
pub use occluder::EllipsoidalOccluder;
pub use tiling::GeographicTilingScheme;
