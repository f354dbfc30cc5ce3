use super::MassData;
use crate::{
    collision::{Aabb, RayCastInput, RayCastOutput},
    error::ShapeError,
    math::{self as m, Transform, Vec2},
    settings::POLYGON_RADIUS,
};

/// A line segment. Edges may carry the neighboring vertices of a chain
/// ("ghost" vertices) so that bodies slide smoothly over internal corners.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub struct EdgeShape {
    pub(crate) v1: Vec2,
    pub(crate) v2: Vec2,
    /// Ghost vertex before `v1`.
    pub(crate) v0: Option<Vec2>,
    /// Ghost vertex after `v2`.
    pub(crate) v3: Option<Vec2>,
    pub(crate) radius: f64,
}

impl EdgeShape {
    pub fn new(v1: Vec2, v2: Vec2) -> Result<Self, ShapeError> {
        if !m::is_valid_vec(v1) || !m::is_valid_vec(v2) || m::distance_sq(v1, v2) <= f64::EPSILON
        {
            return Err(ShapeError::DegenerateEdge);
        }
        Ok(EdgeShape {
            v1,
            v2,
            v0: None,
            v3: None,
            radius: POLYGON_RADIUS,
        })
    }

    /// Set the ghost vertices adjacent to this edge.
    pub fn with_adjacent(mut self, v0: Option<Vec2>, v3: Option<Vec2>) -> Self {
        self.v0 = v0;
        self.v3 = v3;
        self
    }

    #[inline]
    pub fn vertices(&self) -> (Vec2, Vec2) {
        (self.v1, self.v2)
    }

    #[inline]
    pub fn adjacent(&self) -> (Option<Vec2>, Option<Vec2>) {
        (self.v0, self.v3)
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        // put the ray into the edge's frame of reference
        let p1 = xf.apply_inv(input.p1);
        let p2 = xf.apply_inv(input.p2);
        let d = p2 - p1;

        let e = self.v2 - self.v1;
        let normal = m::right_normal(e).normalized();

        // q = p1 + t * d
        // dot(normal, q - v1) = 0
        // dot(normal, p1 - v1) + t * dot(normal, d) = 0
        let numerator = normal.dot(self.v1 - p1);
        let denominator = normal.dot(d);
        if denominator == 0.0 {
            return None;
        }

        let t = numerator / denominator;
        if t < 0.0 || input.max_fraction < t {
            return None;
        }

        let q = p1 + t * d;
        // q = v1 + s * r
        // s = dot(q - v1, r) / dot(r, r)
        let rr = e.dot(e);
        let s = (q - self.v1).dot(e) / rr;
        if !(0.0..=1.0).contains(&s) {
            return None;
        }

        let normal = xf.q.apply(normal);
        Some(RayCastOutput {
            fraction: t,
            normal: if numerator > 0.0 { -normal } else { normal },
        })
    }

    pub fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let v1 = xf.apply(self.v1);
        let v2 = xf.apply(self.v2);
        Aabb::new(v1.min_by_component(v2), v1.max_by_component(v2)).padded(self.radius)
    }

    /// Edges have no area and thus no mass.
    pub fn compute_mass(&self) -> MassData {
        MassData {
            mass: 0.0,
            center: 0.5 * (self.v1 + self.v2),
            inertia: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_hits_from_either_side() {
        let edge = EdgeShape::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)).unwrap();
        let xf = Transform::identity();

        let down = RayCastInput {
            p1: Vec2::new(0.5, 2.0),
            p2: Vec2::new(0.5, -2.0),
            max_fraction: 1.0,
        };
        let out = edge.ray_cast(&down, &xf).unwrap();
        assert!((out.fraction - 0.5).abs() < 1e-12);
        assert!((out.normal - Vec2::unit_y()).mag() < 1e-12);

        let up = RayCastInput {
            p1: Vec2::new(0.5, -2.0),
            p2: Vec2::new(0.5, 2.0),
            max_fraction: 1.0,
        };
        let out = edge.ray_cast(&up, &xf).unwrap();
        assert!((out.normal + Vec2::unit_y()).mag() < 1e-12);

        let miss = RayCastInput {
            p1: Vec2::new(1.5, 2.0),
            p2: Vec2::new(1.5, -2.0),
            max_fraction: 1.0,
        };
        assert!(edge.ray_cast(&miss, &xf).is_none());
    }

    #[test]
    fn zero_length_is_rejected() {
        let v = Vec2::new(1.0, 1.0);
        assert_eq!(EdgeShape::new(v, v), Err(ShapeError::DegenerateEdge));
    }
}
