//! Closest points between convex shapes with the GJK algorithm.

use super::Shape;
use crate::{
    math::{self as m, Transform, Vec2},
    settings::MAX_POLYGON_VERTICES,
};

/// Maximum number of GJK iterations before giving up on exact convergence.
const MAX_ITERATIONS: usize = 20;

/// A convex vertex cloud with a radius, the form GJK sees every shape in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceProxy {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
    pub radius: f64,
}

impl DistanceProxy {
    /// Proxy for a child of a shape. Chains produce one segment per child.
    pub fn new(shape: &Shape, child_index: usize) -> Self {
        match shape {
            Shape::Circle(c) => Self::from_vertices(&[c.position], c.radius),
            Shape::Polygon(p) => Self::from_vertices(p.vertices(), p.radius),
            Shape::Edge(e) => Self::from_vertices(&[e.v1, e.v2], e.radius),
            Shape::Chain(c) => {
                let vs = c.vertices();
                Self::from_vertices(&vs[child_index..child_index + 2], c.radius)
            }
        }
    }

    /// Proxy from at most [`MAX_POLYGON_VERTICES`] points. Extra points are ignored.
    pub fn from_vertices(vertices: &[Vec2], radius: f64) -> Self {
        let count = vertices.len().min(MAX_POLYGON_VERTICES);
        let mut buffer = [Vec2::zero(); MAX_POLYGON_VERTICES];
        buffer[..count].copy_from_slice(&vertices[..count]);
        DistanceProxy {
            vertices: buffer,
            count,
            radius,
        }
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    #[inline]
    pub fn vertex(&self, index: usize) -> Vec2 {
        self.vertices[index]
    }

    /// Index of the vertex furthest along `d`.
    pub fn support(&self, d: Vec2) -> usize {
        let mut best_index = 0;
        let mut best_value = self.vertices[0].dot(d);
        for (i, v) in self.vertices().iter().enumerate().skip(1) {
            let value = v.dot(d);
            if value > best_value {
                best_index = i;
                best_value = value;
            }
        }
        best_index
    }
}

/// Simplex state kept between calls to warm start the next query on the same pair.
/// Zero-initialize it for the first call.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimplexCache {
    /// Length or area of the cached simplex.
    pub metric: f64,
    pub count: usize,
    pub index_a: [u8; 3],
    pub index_b: [u8; 3],
}

#[derive(Clone, Copy, Debug)]
pub struct DistanceInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub transform_a: Transform,
    pub transform_b: Transform,
    /// Account for the shape radii. Otherwise only the cores are compared.
    pub use_radii: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DistanceOutput {
    /// Closest point on shape A.
    pub point_a: Vec2,
    /// Closest point on shape B.
    pub point_b: Vec2,
    pub distance: f64,
    /// Number of GJK iterations used.
    pub iterations: usize,
}

//
// Simplex
//

#[derive(Clone, Copy, Debug, Default)]
struct SimplexVertex {
    /// Support point in proxy A.
    w_a: Vec2,
    /// Support point in proxy B.
    w_b: Vec2,
    /// `w_b - w_a`
    w: Vec2,
    /// Barycentric coordinate for the closest point.
    a: f64,
    index_a: usize,
    index_b: usize,
}

impl SimplexVertex {
    fn new(
        proxy_a: &DistanceProxy,
        xf_a: &Transform,
        index_a: usize,
        proxy_b: &DistanceProxy,
        xf_b: &Transform,
        index_b: usize,
    ) -> Self {
        let w_a = xf_a.apply(proxy_a.vertex(index_a));
        let w_b = xf_b.apply(proxy_b.vertex(index_b));
        SimplexVertex {
            w_a,
            w_b,
            w: w_b - w_a,
            a: 1.0,
            index_a,
            index_b,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn from_cache(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        xf_a: &Transform,
        proxy_b: &DistanceProxy,
        xf_b: &Transform,
    ) -> Self {
        debug_assert!(cache.count <= 3);
        let mut simplex = Simplex::default();

        for i in 0..cache.count {
            simplex.v[i] = SimplexVertex::new(
                proxy_a,
                xf_a,
                cache.index_a[i] as usize,
                proxy_b,
                xf_b,
                cache.index_b[i] as usize,
            );
            simplex.v[i].a = 0.0;
        }
        simplex.count = cache.count;

        // flush the cache if the simplex changed shape too much
        if simplex.count > 1 {
            let metric1 = cache.metric;
            let metric2 = simplex.metric();
            if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < f64::EPSILON {
                simplex.count = 0;
            }
        }

        if simplex.count == 0 {
            simplex.v[0] = SimplexVertex::new(proxy_a, xf_a, 0, proxy_b, xf_b, 0);
            simplex.count = 1;
        }
        simplex
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.count = self.count;
        for i in 0..self.count {
            cache.index_a[i] = self.v[i].index_a as u8;
            cache.index_b[i] = self.v[i].index_b as u8;
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = m::cross(e12, -self.v[0].w);
                if sgn > 0.0 {
                    // origin is left of e12
                    m::left_normal(e12)
                } else {
                    m::right_normal(e12)
                }
            }
            _ => Vec2::zero(),
        }
    }

    fn witness_points(&self) -> (Vec2, Vec2) {
        let [v1, v2, v3] = &self.v;
        match self.count {
            1 => (v1.w_a, v1.w_b),
            2 => (
                v1.a * v1.w_a + v2.a * v2.w_a,
                v1.a * v1.w_b + v2.a * v2.w_b,
            ),
            3 => {
                let p = v1.a * v1.w_a + v2.a * v2.w_a + v3.a * v3.w_a;
                (p, p)
            }
            _ => (Vec2::zero(), Vec2::zero()),
        }
    }

    fn metric(&self) -> f64 {
        match self.count {
            2 => m::distance(self.v[0].w, self.v[1].w),
            3 => m::cross(self.v[1].w - self.v[0].w, self.v[2].w - self.v[0].w),
            _ => 0.0,
        }
    }

    /// Closest point on a segment to the origin, in barycentric coordinates.
    ///
    /// The regions are
    /// - `w1`: `dot(-w1, e12) <= 0`
    /// - `w2`: `dot(w2, e12) <= 0`
    /// - the segment interior otherwise.
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        // w1 region
        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // w2 region
        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // must be in e12 region
        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv_d12;
        self.v[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    /// Closest point on a triangle to the origin, checking the vertex,
    /// edge and interior Voronoi regions in turn.
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        // edge12
        let e12 = w2 - w1;
        let d12_1 = w2.dot(e12);
        let d12_2 = -w1.dot(e12);

        // edge13
        let e13 = w3 - w1;
        let d13_1 = w3.dot(e13);
        let d13_2 = -w1.dot(e13);

        // edge23
        let e23 = w3 - w2;
        let d23_1 = w3.dot(e23);
        let d23_2 = -w2.dot(e23);

        // triangle123
        let n123 = m::cross(e12, e13);
        let d123_1 = n123 * m::cross(w2, w3);
        let d123_2 = n123 * m::cross(w3, w1);
        let d123_3 = n123 * m::cross(w1, w2);

        // w1 region
        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // e12
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv_d12 = 1.0 / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv_d12;
            self.v[1].a = d12_2 * inv_d12;
            self.count = 2;
            return;
        }

        // e13
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv_d13 = 1.0 / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv_d13;
            self.v[2].a = d13_2 * inv_d13;
            self.count = 2;
            self.v[1] = self.v[2];
            return;
        }

        // w2 region
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // w3 region
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.v[2].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[2];
            return;
        }

        // e23
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv_d23 = 1.0 / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv_d23;
            self.v[2].a = d23_2 * inv_d23;
            self.count = 2;
            self.v[0] = self.v[2];
            return;
        }

        // must be in triangle123
        let inv_d123 = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v[0].a = d123_1 * inv_d123;
        self.v[1].a = d123_2 * inv_d123;
        self.v[2].a = d123_3 * inv_d123;
        self.count = 3;
    }
}

/// Compute the closest points between two shapes.
///
/// On the first call zero-initialize the cache.
/// Passing the same cache on later calls for the same pair speeds up convergence.
pub fn distance(cache: &mut SimplexCache, input: &DistanceInput) -> DistanceOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let xf_a = &input.transform_a;
    let xf_b = &input.transform_b;

    let mut simplex = Simplex::from_cache(cache, proxy_a, xf_a, proxy_b, xf_b);

    // vertex indices of the last simplex, used to detect cycling
    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];

    let mut iter = 0;
    while iter < MAX_ITERATIONS {
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.v[i].index_a;
            save_b[i] = simplex.v[i].index_b;
        }

        match simplex.count {
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => {}
        }

        // overlap
        if simplex.count == 3 {
            break;
        }

        let d = simplex.search_direction();
        // the origin is probably contained by a line segment
        // or triangle, thus the shapes are overlapped
        if d.mag_sq() < f64::EPSILON * f64::EPSILON {
            break;
        }

        // compute a tentative new simplex vertex using support points
        let index_a = proxy_a.support(xf_a.q.apply_inv(-d));
        let index_b = proxy_b.support(xf_b.q.apply_inv(d));
        let vertex = SimplexVertex::new(proxy_a, xf_a, index_a, proxy_b, xf_b, index_b);

        iter += 1;

        // a repeated support point means no progress, exit with the current simplex
        let duplicate =
            (0..save_count).any(|i| vertex.index_a == save_a[i] && vertex.index_b == save_b[i]);
        if duplicate {
            break;
        }

        simplex.v[simplex.count] = vertex;
        simplex.count += 1;
    }

    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut dist = m::distance(point_a, point_b);
    simplex.write_cache(cache);

    if input.use_radii {
        let r_a = proxy_a.radius;
        let r_b = proxy_b.radius;

        if dist > r_a + r_b && dist > f64::EPSILON {
            // shapes are still not overlapped,
            // move the witness points to the outer surface
            dist -= r_a + r_b;
            let normal = (point_b - point_a).normalized();
            point_a += r_a * normal;
            point_b -= r_b * normal;
        } else {
            // shapes are overlapped when radii are considered,
            // move the witness points to the middle
            let p = 0.5 * (point_a + point_b);
            point_a = p;
            point_b = p;
            dist = 0.0;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance: dist,
        iterations: iter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CircleShape, PolygonShape};

    fn input(a: &Shape, xf_a: Transform, b: &Shape, xf_b: Transform) -> DistanceInput {
        DistanceInput {
            proxy_a: DistanceProxy::new(a, 0),
            proxy_b: DistanceProxy::new(b, 0),
            transform_a: xf_a,
            transform_b: xf_b,
            use_radii: true,
        }
    }

    #[test]
    fn box_to_box_distance() {
        let b: Shape = PolygonShape::new_box(1.0, 1.0).unwrap().into();
        let xf_a = Transform::identity();
        let xf_b = Transform::from_angle(Vec2::new(5.0, 0.5), 0.0);
        let mut cache = SimplexCache::default();
        let out = distance(&mut cache, &input(&b, xf_a, &b, xf_b));
        // gap of 3 minus the two polygon skins
        let expected = 3.0 - 2.0 * b.radius();
        assert!((out.distance - expected).abs() < 1e-9, "{}", out.distance);
        assert!((out.point_a.x - (1.0 + b.radius())).abs() < 1e-9);
        assert!(cache.count > 0);

        // warm started query on the same configuration converges immediately
        let again = distance(&mut cache, &input(&b, xf_a, &b, xf_b));
        assert!((again.distance - out.distance).abs() < 1e-12);
        assert!(again.iterations <= out.iterations);
    }

    #[test]
    fn rotated_box_corner_to_circle() {
        let b: Shape = PolygonShape::new_box(1.0, 1.0).unwrap().into();
        let c: Shape = CircleShape::new(0.5).unwrap().into();
        let xf_a = Transform::from_angle(Vec2::zero(), std::f64::consts::FRAC_PI_4);
        let xf_b = Transform::from_angle(Vec2::new(4.0, 0.0), 0.0);
        let mut cache = SimplexCache::default();
        let out = distance(&mut cache, &input(&b, xf_a, &c, xf_b));
        let expected = 4.0 - 2f64.sqrt() - b.radius() - 0.5;
        assert!((out.distance - expected).abs() < 1e-9);
    }

    #[test]
    fn overlapping_shapes_have_zero_distance() {
        let b: Shape = PolygonShape::new_box(1.0, 1.0).unwrap().into();
        let c: Shape = CircleShape::new(0.5).unwrap().into();
        let mut cache = SimplexCache::default();
        let out = distance(
            &mut cache,
            &input(
                &b,
                Transform::identity(),
                &c,
                Transform::from_angle(Vec2::new(0.5, 0.2), 0.0),
            ),
        );
        assert_eq!(out.distance, 0.0);
    }
}
