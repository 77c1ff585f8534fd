//! Bounding spheres.

use glam::DVec3;

/// A sphere enclosing a set of points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

impl BoundingSphere {
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Computes a tight sphere around `points`.
    ///
    /// Runs Ritter's algorithm seeded with the widest axis-aligned span and
    /// keeps it unless the sphere centred on the axis-aligned box is smaller.
    pub fn from_points(points: &[DVec3]) -> Self {
        let Some(&first) = points.first() else {
            return Self::new(DVec3::ZERO, 0.0);
        };

        let (mut x_min, mut y_min, mut z_min) = (first, first, first);
        let (mut x_max, mut y_max, mut z_max) = (first, first, first);

        for &p in points {
            if p.x < x_min.x {
                x_min = p;
            }
            if p.x > x_max.x {
                x_max = p;
            }
            if p.y < y_min.y {
                y_min = p;
            }
            if p.y > y_max.y {
                y_max = p;
            }
            if p.z < z_min.z {
                z_min = p;
            }
            if p.z > z_max.z {
                z_max = p;
            }
        }

        let x_span = (x_max - x_min).length_squared();
        let y_span = (y_max - y_min).length_squared();
        let z_span = (z_max - z_min).length_squared();

        let (mut diameter1, mut diameter2, mut max_span) = (x_min, x_max, x_span);
        if y_span > max_span {
            max_span = y_span;
            diameter1 = y_min;
            diameter2 = y_max;
        }
        if z_span > max_span {
            diameter1 = z_min;
            diameter2 = z_max;
        }

        let mut ritter_center = (diameter1 + diameter2) * 0.5;
        let mut radius_squared = (diameter2 - ritter_center).length_squared();
        let mut ritter_radius = radius_squared.sqrt();

        let min_box = DVec3::new(x_min.x, y_min.y, z_min.z);
        let max_box = DVec3::new(x_max.x, y_max.y, z_max.z);
        let naive_center = (min_box + max_box) * 0.5;
        let mut naive_radius: f64 = 0.0;

        for &p in points {
            naive_radius = naive_radius.max((p - naive_center).length());

            let old_center_to_point_squared = (p - ritter_center).length_squared();
            if old_center_to_point_squared > radius_squared {
                let old_center_to_point = old_center_to_point_squared.sqrt();
                ritter_radius = (ritter_radius + old_center_to_point) * 0.5;
                radius_squared = ritter_radius * ritter_radius;
                let old_to_new = old_center_to_point - ritter_radius;
                ritter_center =
                    (ritter_center * ritter_radius + p * old_to_new) / old_center_to_point;
            }
        }

        if ritter_radius < naive_radius {
            Self::new(ritter_center, ritter_radius)
        } else {
            Self::new(naive_center, naive_radius)
        }
    }

    /// Computes a sphere around packed `f32` vertices stored relative to `center`.
    ///
    /// The first three components of every `stride`-sized vertex are x, y, z.
    pub fn from_vertices(vertices: &[f32], center: DVec3, stride: usize) -> Self {
        let points: Vec<DVec3> = vertices
            .chunks_exact(stride)
            .map(|v| DVec3::new(v[0] as f64, v[1] as f64, v[2] as f64) + center)
            .collect();
        Self::from_points(&points)
    }

    pub fn contains(&self, point: DVec3) -> bool {
        (point - self.center).length() <= self.radius
    }
}
