use super::MassData;
use crate::{
    collision::{Aabb, RayCastInput, RayCastOutput},
    error::ShapeError,
    math::{Transform, Vec2},
};

use std::f64::consts::PI;

/// A solid circle.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub struct CircleShape {
    pub(crate) radius: f64,
    /// Center of the circle in the local frame of the body.
    pub(crate) position: Vec2,
}

impl CircleShape {
    pub fn new(radius: f64) -> Result<Self, ShapeError> {
        if !radius.is_finite() || radius <= f64::EPSILON {
            return Err(ShapeError::RadiusTooSmall);
        }
        Ok(CircleShape {
            radius,
            position: Vec2::zero(),
        })
    }

    /// Offset the circle from the body origin.
    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        let center = xf.apply(self.position);
        (p - center).mag_sq() <= self.radius * self.radius
    }

    /// Solve `|s + t*d|^2 = r^2` for the smallest non-negative `t`,
    /// where `s` is the ray start relative to the center.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        let position = xf.apply(self.position);
        let s = input.p1 - position;
        let b = s.dot(s) - self.radius * self.radius;

        let r = input.p2 - input.p1;
        let c = s.dot(r);
        let rr = r.dot(r);
        let sigma = c * c - rr * b;

        // negative discriminant or short segment
        if sigma < 0.0 || rr < f64::EPSILON {
            return None;
        }

        let a = -(c + sigma.sqrt());
        if 0.0 <= a && a <= input.max_fraction * rr {
            let fraction = a / rr;
            return Some(RayCastOutput {
                fraction,
                normal: (s + fraction * r).normalized(),
            });
        }
        None
    }

    pub fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let p = xf.apply(self.position);
        Aabb::from_center(p, Vec2::new(self.radius, self.radius))
    }

    pub fn compute_mass(&self, density: f64) -> MassData {
        let r_sq = self.radius * self.radius;
        let mass = density * PI * r_sq;
        MassData {
            mass,
            center: self.position,
            // inertia about the local origin
            inertia: mass * (0.5 * r_sq + self.position.dot(self.position)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_tiny_radius() {
        assert_eq!(CircleShape::new(0.0), Err(ShapeError::RadiusTooSmall));
        assert_eq!(CircleShape::new(f64::NAN), Err(ShapeError::RadiusTooSmall));
    }

    #[test]
    fn ray_hits_front_of_circle() {
        let circle = CircleShape::new(1.0).unwrap();
        let xf = Transform::from_angle(Vec2::new(5.0, 0.0), 0.3);
        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 1.0,
        };
        let out = circle.ray_cast(&input, &xf).unwrap();
        assert!((out.fraction - 0.4).abs() < 1e-12);
        assert!((out.normal - Vec2::new(-1.0, 0.0)).mag() < 1e-12);
    }

    #[test]
    fn offset_mass_uses_parallel_axis() {
        let circle = CircleShape::new(2.0)
            .unwrap()
            .with_position(Vec2::new(1.0, 0.0));
        let md = circle.compute_mass(1.0);
        let mass = PI * 4.0;
        assert!((md.mass - mass).abs() < 1e-12);
        assert!((md.inertia - mass * (2.0 + 1.0)).abs() < 1e-9);
        assert_eq!(md.center, Vec2::new(1.0, 0.0));
    }
}
