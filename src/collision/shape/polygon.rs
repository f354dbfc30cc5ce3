use super::MassData;
use crate::{
    collision::{Aabb, RayCastInput, RayCastOutput},
    error::ShapeError,
    math::{self as m, Rot, Transform, Vec2},
    settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES, POLYGON_RADIUS},
};

/// A solid convex polygon with counterclockwise winding
/// and at most [`MAX_POLYGON_VERTICES`] vertices.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub struct PolygonShape {
    pub(crate) centroid: Vec2,
    pub(crate) vertices: [Vec2; MAX_POLYGON_VERTICES],
    pub(crate) normals: [Vec2; MAX_POLYGON_VERTICES],
    pub(crate) count: usize,
    pub(crate) radius: f64,
}

impl PolygonShape {
    /// Build the convex hull of the given points.
    ///
    /// Points closer than half the linear slop are welded together,
    /// and points in the interior of the hull or on its edges are dropped.
    pub fn new(points: &[Vec2]) -> Result<Self, ShapeError> {
        if points.len() < 3 {
            return Err(ShapeError::TooFewVertices);
        }
        if points.len() > MAX_POLYGON_VERTICES {
            return Err(ShapeError::TooManyVertices);
        }

        // weld close points
        let weld_dist_sq = (0.5 * LINEAR_SLOP) * (0.5 * LINEAR_SLOP);
        let mut ps: Vec<Vec2> = Vec::with_capacity(points.len());
        for &p in points {
            if !m::is_valid_vec(p) {
                return Err(ShapeError::DegeneratePolygon);
            }
            if ps.iter().all(|&q| m::distance_sq(p, q) >= weld_dist_sq) {
                ps.push(p);
            }
        }
        if ps.len() < 3 {
            return Err(ShapeError::DegeneratePolygon);
        }

        // gift wrapping, starting from the rightmost (then lowest) point
        let mut i0 = 0;
        for (i, p) in ps.iter().enumerate().skip(1) {
            if p.x > ps[i0].x || (p.x == ps[i0].x && p.y < ps[i0].y) {
                i0 = i;
            }
        }

        let mut hull: Vec<usize> = Vec::with_capacity(ps.len());
        let mut ih = i0;
        loop {
            if hull.len() >= ps.len() {
                // wrapping failed to close, only possible with non-finite input
                return Err(ShapeError::DegeneratePolygon);
            }
            hull.push(ih);

            let mut ie = 0;
            for j in 1..ps.len() {
                if ie == ih {
                    ie = j;
                    continue;
                }
                let r = ps[ie] - ps[ih];
                let v = ps[j] - ps[ih];
                let c = m::cross(r, v);
                if c < 0.0 {
                    ie = j;
                }
                // collinear, keep the farthest
                if c == 0.0 && v.mag_sq() > r.mag_sq() {
                    ie = j;
                }
            }

            ih = ie;
            if ie == i0 {
                break;
            }
        }

        if hull.len() < 3 {
            return Err(ShapeError::DegeneratePolygon);
        }

        let mut poly = PolygonShape {
            centroid: Vec2::zero(),
            vertices: [Vec2::zero(); MAX_POLYGON_VERTICES],
            normals: [Vec2::zero(); MAX_POLYGON_VERTICES],
            count: hull.len(),
            radius: POLYGON_RADIUS,
        };
        for (dst, &src) in poly.vertices.iter_mut().zip(&hull) {
            *dst = ps[src];
        }
        for i in 0..poly.count {
            let edge = poly.vertices[(i + 1) % poly.count] - poly.vertices[i];
            if edge.mag_sq() <= f64::EPSILON * f64::EPSILON {
                return Err(ShapeError::DegeneratePolygon);
            }
            poly.normals[i] = m::right_normal(edge).normalized();
        }

        poly.centroid = compute_centroid(poly.vertices())?;
        Ok(poly)
    }

    /// An axis-aligned box centered at the origin.
    pub fn new_box(half_width: f64, half_height: f64) -> Result<Self, ShapeError> {
        if !(half_width > LINEAR_SLOP && half_height > LINEAR_SLOP) {
            return Err(ShapeError::DegeneratePolygon);
        }
        let (hw, hh) = (half_width, half_height);
        let mut poly = PolygonShape {
            centroid: Vec2::zero(),
            vertices: [Vec2::zero(); MAX_POLYGON_VERTICES],
            normals: [Vec2::zero(); MAX_POLYGON_VERTICES],
            count: 4,
            radius: POLYGON_RADIUS,
        };
        poly.vertices[..4].copy_from_slice(&[
            Vec2::new(-hw, -hh),
            Vec2::new(hw, -hh),
            Vec2::new(hw, hh),
            Vec2::new(-hw, hh),
        ]);
        poly.normals[..4].copy_from_slice(&[
            Vec2::new(0.0, -1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(-1.0, 0.0),
        ]);
        Ok(poly)
    }

    /// A box with the given center and rotation in the body frame.
    pub fn new_oriented_box(
        half_width: f64,
        half_height: f64,
        center: Vec2,
        angle: f64,
    ) -> Result<Self, ShapeError> {
        let mut poly = Self::new_box(half_width, half_height)?;
        let xf = Transform::new(center, Rot::from_angle(angle));
        for i in 0..poly.count {
            poly.vertices[i] = xf.apply(poly.vertices[i]);
            poly.normals[i] = xf.q.apply(poly.normals[i]);
        }
        poly.centroid = center;
        Ok(poly)
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    /// Outward edge normals. Normal `i` belongs to the edge from vertex `i` to `i + 1`.
    #[inline]
    pub fn normals(&self) -> &[Vec2] {
        &self.normals[..self.count]
    }

    #[inline]
    pub fn centroid(&self) -> Vec2 {
        self.centroid
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        let p_local = xf.apply_inv(p);
        self.vertices()
            .iter()
            .zip(self.normals())
            .all(|(&v, &n)| n.dot(p_local - v) <= 0.0)
    }

    /// Clip the ray against every edge plane.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        // put the ray into the polygon's frame of reference
        let p1 = xf.apply_inv(input.p1);
        let p2 = xf.apply_inv(input.p2);
        let d = p2 - p1;

        let mut lower = 0.0;
        let mut upper = input.max_fraction;
        let mut index = None;

        for i in 0..self.count {
            // p = p1 + a * d
            // dot(normal, p - v) = 0
            // dot(normal, p1 - v) + a * dot(normal, d) = 0
            let numerator = self.normals[i].dot(self.vertices[i] - p1);
            let denominator = self.normals[i].dot(d);

            if denominator == 0.0 {
                if numerator < 0.0 {
                    return None;
                }
            } else if denominator < 0.0 && numerator < lower * denominator {
                // the segment enters this half space
                lower = numerator / denominator;
                index = Some(i);
            } else if denominator > 0.0 && numerator < upper * denominator {
                // the segment exits this half space
                upper = numerator / denominator;
            }

            if upper < lower {
                return None;
            }
        }

        index.map(|i| RayCastOutput {
            fraction: lower,
            normal: xf.q.apply(self.normals[i]),
        })
    }

    pub fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let first = xf.apply(self.vertices[0]);
        let (lower, upper) = self.vertices()[1..]
            .iter()
            .map(|&v| xf.apply(v))
            .fold((first, first), |(lo, hi), v| {
                (lo.min_by_component(v), hi.max_by_component(v))
            });
        Aabb::new(lower, upper).padded(self.radius)
    }

    /// Mass, centroid and inertia by summing triangles fanned out from the first vertex.
    pub fn compute_mass(&self, density: f64) -> MassData {
        const INV3: f64 = 1.0 / 3.0;

        let mut center = Vec2::zero();
        let mut area = 0.0;
        let mut inertia = 0.0;

        // the reference point keeps the sums well conditioned for polygons far from the origin
        let s = self.vertices[0];

        for i in 0..self.count {
            let e1 = self.vertices[i] - s;
            let e2 = self.vertices[(i + 1) % self.count] - s;
            let d = m::cross(e1, e2);

            let triangle_area = 0.5 * d;
            area += triangle_area;
            center += triangle_area * INV3 * (e1 + e2);

            let int_x2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
            let int_y2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
            inertia += (0.25 * INV3 * d) * (int_x2 + int_y2);
        }

        let mass = density * area;
        center /= area;
        let world_center = center + s;
        // inertia relative to the reference point, shifted to the center of mass
        // and from there to the shape origin
        let inertia = density * inertia
            + mass * (world_center.dot(world_center) - center.dot(center));

        MassData {
            mass,
            center: world_center,
            inertia,
        }
    }
}

fn compute_centroid(vs: &[Vec2]) -> Result<Vec2, ShapeError> {
    const INV3: f64 = 1.0 / 3.0;
    let s = vs[0];
    let mut c = Vec2::zero();
    let mut area = 0.0;
    for i in 0..vs.len() {
        let e1 = vs[i] - s;
        let e2 = vs[(i + 1) % vs.len()] - s;
        let triangle_area = 0.5 * m::cross(e1, e2);
        area += triangle_area;
        c += triangle_area * INV3 * (e1 + e2);
    }
    if area <= f64::EPSILON {
        return Err(ShapeError::DegeneratePolygon);
    }
    Ok(c / area + s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hull_drops_interior_and_duplicate_points() {
        let poly = PolygonShape::new(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(1.0, 0.5),
            Vec2::new(2.0, 2.0),
            Vec2::new(2.0, 2.0 + 1e-4),
            Vec2::new(0.0, 2.0),
        ])
        .unwrap();
        assert_eq!(poly.vertices().len(), 4);
        // counterclockwise: every cross product of consecutive edges is positive
        let vs = poly.vertices();
        for i in 0..vs.len() {
            let e1 = vs[(i + 1) % vs.len()] - vs[i];
            let e2 = vs[(i + 2) % vs.len()] - vs[(i + 1) % vs.len()];
            assert!(m::cross(e1, e2) > 0.0);
        }
        assert!((poly.centroid() - Vec2::new(1.0, 1.0)).mag() < 1e-3);
    }

    #[test]
    fn rejects_bad_input() {
        let line = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(2.0, 2.0),
        ];
        assert_eq!(PolygonShape::new(&line), Err(ShapeError::DegeneratePolygon));
        assert_eq!(
            PolygonShape::new(&line[..2]),
            Err(ShapeError::TooFewVertices)
        );
        let many: Vec<Vec2> = (0..9)
            .map(|i| Vec2::new((i as f64).cos(), (i as f64).sin()))
            .collect();
        assert_eq!(PolygonShape::new(&many), Err(ShapeError::TooManyVertices));
        assert!(PolygonShape::new_box(0.0, 1.0).is_err());
    }

    #[test]
    fn box_mass_properties() {
        let poly = PolygonShape::new_box(1.0, 0.5).unwrap();
        let md = poly.compute_mass(2.0);
        assert!((md.mass - 4.0).abs() < 1e-12);
        assert!(md.center.mag() < 1e-12);
        // m * (w^2 + h^2) / 12 with w = 2, h = 1
        assert!((md.inertia - 4.0 * 5.0 / 12.0).abs() < 1e-12);

        let offset = PolygonShape::new_oriented_box(1.0, 0.5, Vec2::new(3.0, 0.0), 0.0).unwrap();
        let md = offset.compute_mass(2.0);
        assert!((md.center - Vec2::new(3.0, 0.0)).mag() < 1e-12);
        assert!((md.inertia - (4.0 * 5.0 / 12.0 + 4.0 * 9.0)).abs() < 1e-9);
    }

    #[test]
    fn point_and_ray_queries() {
        let poly = PolygonShape::new_box(1.0, 1.0).unwrap();
        let xf = Transform::from_angle(Vec2::new(0.0, 5.0), std::f64::consts::FRAC_PI_4);
        assert!(poly.test_point(&xf, Vec2::new(0.0, 6.3)));
        assert!(!poly.test_point(&xf, Vec2::new(1.2, 6.3)));

        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(0.0, 10.0),
            max_fraction: 1.0,
        };
        let out = poly.ray_cast(&input, &xf).unwrap();
        let hit_y = 10.0 * out.fraction;
        assert!((hit_y - (5.0 - 2f64.sqrt())).abs() < 1e-9);
        assert!(out.normal.y < 0.0);

        let aabb = poly.compute_aabb(&xf);
        assert!((aabb.upper.y - (5.0 + 2f64.sqrt() + POLYGON_RADIUS)).abs() < 1e-9);
    }
}
