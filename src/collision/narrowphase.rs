//! Contact manifold generation for each supported pair of shapes.
//!
//! Pairs are ordered: the first shape is always the "higher" kind
//! (polygon before circle, edge/chain before polygon and circle).
//! [`pair_order`] tells callers whether a pair has to be swapped first.

use super::{
    clip_segment_to_line, ChainShape, CircleShape, ClipVertex, ContactFeatureType, ContactId,
    EdgeShape, Manifold, ManifoldType, PolygonShape, Shape, ShapeType,
};
use crate::{
    math::{self as m, Transform, Vec2},
    settings::{ANGULAR_SLOP, LINEAR_SLOP, MAX_MANIFOLD_POINTS, MAX_POLYGON_VERTICES},
};

/// How a pair of shape types has to be arranged to produce a manifold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairOrder {
    /// The pair can be collided as is.
    AsIs,
    /// The shapes have to be swapped.
    Flipped,
    /// The pair never collides (e.g. edge against edge).
    Never,
}

/// Look up the dispatch table for a pair of shape types.
pub fn pair_order(type_a: ShapeType, type_b: ShapeType) -> PairOrder {
    use ShapeType::*;
    match (type_a, type_b) {
        (Circle, Circle)
        | (Polygon, Circle)
        | (Polygon, Polygon)
        | (Edge, Circle)
        | (Edge, Polygon)
        | (Chain, Circle)
        | (Chain, Polygon) => PairOrder::AsIs,
        (Circle, Polygon)
        | (Circle, Edge)
        | (Polygon, Edge)
        | (Circle, Chain)
        | (Polygon, Chain) => PairOrder::Flipped,
        _ => PairOrder::Never,
    }
}

/// Compute the manifold of two shape children. The pair must be ordered
/// according to [`pair_order`]; unsupported pairs give an empty manifold.
pub fn evaluate(
    shape_a: &Shape,
    child_a: usize,
    xf_a: &Transform,
    shape_b: &Shape,
    xf_b: &Transform,
) -> Manifold {
    match (shape_a, shape_b) {
        (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Circle(b)) => collide_polygon_and_circle(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Polygon(b)) => collide_polygons(a, xf_a, b, xf_b),
        (Shape::Edge(a), Shape::Circle(b)) => collide_edge_and_circle(a, xf_a, b, xf_b),
        (Shape::Edge(a), Shape::Polygon(b)) => collide_edge_and_polygon(a, xf_a, b, xf_b),
        (Shape::Chain(a), Shape::Circle(b)) => {
            collide_edge_and_circle(&a.child_edge(child_a), xf_a, b, xf_b)
        }
        (Shape::Chain(a), Shape::Polygon(b)) => {
            collide_edge_and_polygon(&a.child_edge(child_a), xf_a, b, xf_b)
        }
        _ => Manifold::default(),
    }
}

//
// CIRCLE <-> CIRCLE
//

pub fn collide_circles(
    circle_a: &CircleShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    let p_a = xf_a.apply(circle_a.position);
    let p_b = xf_b.apply(circle_b.position);
    let radius = circle_a.radius + circle_b.radius;
    if m::distance_sq(p_a, p_b) > radius * radius {
        return manifold;
    }

    manifold.manifold_type = ManifoldType::Circles;
    manifold.local_point = circle_a.position;
    manifold.local_normal = Vec2::zero();
    manifold.point_count = 1;
    manifold.points[0].local_point = circle_b.position;
    manifold.points[0].id = ContactId::default();
    manifold
}

//
// POLYGON <-> CIRCLE
//

pub fn collide_polygon_and_circle(
    polygon_a: &PolygonShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // circle position in the frame of the polygon
    let c = xf_b.apply(circle_b.position);
    let c_local = xf_a.apply_inv(c);

    // find the min separating edge
    let radius = polygon_a.radius + circle_b.radius;
    let mut normal_index = 0;
    let mut separation = -f64::MAX;
    for (i, (&v, &n)) in polygon_a
        .vertices()
        .iter()
        .zip(polygon_a.normals())
        .enumerate()
    {
        let s = n.dot(c_local - v);
        if s > radius {
            // early out
            return manifold;
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    let count = polygon_a.count;
    let v1 = polygon_a.vertices[normal_index];
    let v2 = polygon_a.vertices[(normal_index + 1) % count];

    let mut set_face = |local_normal: Vec2, local_point: Vec2| {
        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::FaceA;
        manifold.local_normal = local_normal;
        manifold.local_point = local_point;
        manifold.points[0].local_point = circle_b.position;
        manifold.points[0].id = ContactId::default();
    };

    // center is inside the polygon
    if separation < f64::EPSILON {
        set_face(polygon_a.normals[normal_index], 0.5 * (v1 + v2));
        return manifold;
    }

    // compute barycentric coordinates
    let u1 = (c_local - v1).dot(v2 - v1);
    let u2 = (c_local - v2).dot(v1 - v2);
    if u1 <= 0.0 {
        if m::distance_sq(c_local, v1) > radius * radius {
            return manifold;
        }
        set_face((c_local - v1).normalized(), v1);
    } else if u2 <= 0.0 {
        if m::distance_sq(c_local, v2) > radius * radius {
            return manifold;
        }
        set_face((c_local - v2).normalized(), v2);
    } else {
        let face_center = 0.5 * (v1 + v2);
        let s = (c_local - face_center).dot(polygon_a.normals[normal_index]);
        if s > radius {
            return manifold;
        }
        set_face(polygon_a.normals[normal_index], face_center);
    }
    manifold
}

//
// POLYGON <-> POLYGON
//

/// Find the edge normal of `poly1` with the largest separation from `poly2`.
fn find_max_separation(
    poly1: &PolygonShape,
    xf1: &Transform,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> (usize, f64) {
    let xf = xf2.mul_inv(xf1);

    let mut best_index = 0;
    let mut max_separation = -f64::MAX;
    for (i, (&v1, &n1)) in poly1.vertices().iter().zip(poly1.normals()).enumerate() {
        // poly1 normal and vertex in the frame of poly2
        let n = xf.q.apply(n1);
        let v1 = xf.apply(v1);

        let si = poly2
            .vertices()
            .iter()
            .map(|&v2| n.dot(v2 - v1))
            .fold(f64::MAX, f64::min);

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }
    (best_index, max_separation)
}

/// The edge of `poly2` most anti-parallel to the reference edge `edge1` of `poly1`,
/// in world coordinates.
fn find_incident_edge(
    poly1: &PolygonShape,
    xf1: &Transform,
    edge1: usize,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> [ClipVertex; 2] {
    // reference edge normal in the frame of poly2
    let normal1 = xf2.q.apply_inv(xf1.q.apply(poly1.normals[edge1]));

    let mut index = 0;
    let mut min_dot = f64::MAX;
    for (i, n2) in poly2.normals().iter().enumerate() {
        let dot = normal1.dot(*n2);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let i1 = index;
    let i2 = (i1 + 1) % poly2.count;
    let clip_vertex = |i: usize| ClipVertex {
        v: xf2.apply(poly2.vertices[i]),
        id: ContactId {
            index_a: edge1 as u8,
            index_b: i as u8,
            type_a: ContactFeatureType::Face,
            type_b: ContactFeatureType::Vertex,
        },
    };
    [clip_vertex(i1), clip_vertex(i2)]
}

/// Separating axis test followed by clipping of the incident edge
/// against the side planes of the reference face.
///
/// - Find the edge normal of max separation on A, and on B.
/// - Choose the reference edge as `min(min_a, min_b)`.
/// - Find the incident edge and clip it.
///
/// The normal points from A to B.
pub fn collide_polygons(
    poly_a: &PolygonShape,
    xf_a: &Transform,
    poly_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();
    let total_radius = poly_a.radius + poly_b.radius;

    let (edge_a, separation_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > total_radius {
        return manifold;
    }

    let (edge_b, separation_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > total_radius {
        return manifold;
    }

    // prefer face A unless B is clearly better, to avoid flip-flopping
    const RELATIVE_TOL: f64 = 0.98;
    const ABSOLUTE_TOL: f64 = 0.1 * LINEAR_SLOP;

    let (poly1, xf1, poly2, xf2, edge1, flip) =
        if separation_b > RELATIVE_TOL * separation_a + ABSOLUTE_TOL {
            manifold.manifold_type = ManifoldType::FaceB;
            (poly_b, xf_b, poly_a, xf_a, edge_b, true)
        } else {
            manifold.manifold_type = ManifoldType::FaceA;
            (poly_a, xf_a, poly_b, xf_b, edge_a, false)
        };

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let iv1 = edge1;
    let iv2 = (edge1 + 1) % poly1.count;

    let mut v11 = poly1.vertices[iv1];
    let mut v12 = poly1.vertices[iv2];

    let local_tangent = (v12 - v11).normalized();
    let local_normal = m::right_normal(local_tangent);
    let plane_point = 0.5 * (v11 + v12);

    let tangent = xf1.q.apply(local_tangent);
    let normal = m::right_normal(tangent);

    v11 = xf1.apply(v11);
    v12 = xf1.apply(v12);

    // face offset
    let front_offset = normal.dot(v11);

    // side offsets, extended by polytope skin thickness
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    // clip incident edge against extruded edge1 side edges
    let (clip_points1, np) =
        clip_segment_to_line(&incident_edge, -tangent, side_offset1, iv1 as u8);
    if np < 2 {
        return manifold;
    }
    let (clip_points2, np) = clip_segment_to_line(&clip_points1, tangent, side_offset2, iv2 as u8);
    if np < 2 {
        return manifold;
    }

    manifold.local_normal = local_normal;
    manifold.local_point = plane_point;

    let mut point_count = 0;
    for cp in &clip_points2 {
        let separation = normal.dot(cp.v) - front_offset;
        if separation <= total_radius {
            let mp = &mut manifold.points[point_count];
            mp.local_point = xf2.apply_inv(cp.v);
            mp.id = if flip { cp.id.flipped() } else { cp.id };
            point_count += 1;
        }
    }
    manifold.point_count = point_count;
    manifold
}

//
// EDGE <-> CIRCLE
//

/// Collide an edge with a circle, using the ghost vertices of the edge
/// to give corner regions to the neighboring edges.
pub fn collide_edge_and_circle(
    edge_a: &EdgeShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // circle in the frame of the edge
    let q = xf_a.apply_inv(xf_b.apply(circle_b.position));

    let a = edge_a.v1;
    let b = edge_a.v2;
    let e = b - a;

    // barycentric coordinates
    let u = e.dot(b - q);
    let v = e.dot(q - a);

    let radius = edge_a.radius + circle_b.radius;

    let mut set_vertex = |p: Vec2, index_a: u8| {
        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::Circles;
        manifold.local_normal = Vec2::zero();
        manifold.local_point = p;
        manifold.points[0].id = ContactId {
            index_a,
            index_b: 0,
            type_a: ContactFeatureType::Vertex,
            type_b: ContactFeatureType::Vertex,
        };
        manifold.points[0].local_point = circle_b.position;
    };

    // region A
    if v <= 0.0 {
        if m::distance_sq(q, a) > radius * radius {
            return manifold;
        }
        // is the circle in region AB of the previous edge?
        if let Some(a1) = edge_a.v0 {
            let e1 = a - a1;
            if e1.dot(a - q) > 0.0 {
                return manifold;
            }
        }
        set_vertex(a, 0);
        return manifold;
    }

    // region B
    if u <= 0.0 {
        if m::distance_sq(q, b) > radius * radius {
            return manifold;
        }
        // is the circle in region AB of the next edge?
        if let Some(b2) = edge_a.v3 {
            let e2 = b2 - b;
            if e2.dot(q - b) > 0.0 {
                return manifold;
            }
        }
        set_vertex(b, 1);
        return manifold;
    }

    // region AB
    let den = e.dot(e);
    let p = (1.0 / den) * (u * a + v * b);
    if m::distance_sq(q, p) > radius * radius {
        return manifold;
    }

    let mut n = m::left_normal(e);
    if n.dot(q - a) < 0.0 {
        n = -n;
    }
    n.normalize();

    manifold.point_count = 1;
    manifold.manifold_type = ManifoldType::FaceA;
    manifold.local_normal = n;
    manifold.local_point = a;
    manifold.points[0].id = ContactId {
        index_a: 0,
        index_b: 0,
        type_a: ContactFeatureType::Face,
        type_b: ContactFeatureType::Vertex,
    };
    manifold.points[0].local_point = circle_b.position;
    manifold
}

//
// EDGE <-> POLYGON
//

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AxisKind {
    Unknown,
    EdgeA,
    EdgeB,
}

#[derive(Clone, Copy, Debug)]
struct EpAxis {
    kind: AxisKind,
    index: usize,
    separation: f64,
}

/// Polygon B expressed in the frame of the edge.
struct TempPolygon {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
}

/// Reference face used for clipping.
struct ReferenceFace {
    i1: usize,
    i2: usize,
    v1: Vec2,
    normal: Vec2,
    side_normal1: Vec2,
    side_offset1: f64,
    side_normal2: Vec2,
    side_offset2: f64,
}

/// State of the edge-polygon collision. The edge may have ghost vertices
/// which restrict the range of admissible collision normals,
/// so that polygons don't catch on the internal corners of a chain.
struct EpCollider {
    polygon_b: TempPolygon,
    xf: Transform,
    v1: Vec2,
    v2: Vec2,
    normal: Vec2,
    lower_limit: Vec2,
    upper_limit: Vec2,
    radius: f64,
    front: bool,
}

impl EpCollider {
    fn new(edge_a: &EdgeShape, xf_a: &Transform, polygon_b: &PolygonShape, xf_b: &Transform) -> Self {
        let xf = xf_a.mul_inv(xf_b);
        let centroid_b = xf.apply(polygon_b.centroid);

        let v1 = edge_a.v1;
        let v2 = edge_a.v2;

        let edge1 = (v2 - v1).normalized();
        let normal1 = m::right_normal(edge1);
        let offset1 = normal1.dot(centroid_b - v1);

        // (normal, offset, convex) of the neighboring edges
        let prev = edge_a.v0.map(|v0| {
            let edge0 = (v1 - v0).normalized();
            let normal0 = m::right_normal(edge0);
            (normal0, normal0.dot(centroid_b - v0), m::cross(edge0, edge1) >= 0.0)
        });
        let next = edge_a.v3.map(|v3| {
            let edge2 = (v3 - v2).normalized();
            let normal2 = m::right_normal(edge2);
            (normal2, normal2.dot(centroid_b - v2), m::cross(edge1, edge2) > 0.0)
        });

        // determine front or back collision and the limits of the collision normal
        let (front, lower_limit, upper_limit) = match (prev, next) {
            (Some((normal0, offset0, convex1)), Some((normal2, offset2, convex2))) => {
                match (convex1, convex2) {
                    (true, true) => {
                        let front = offset0 >= 0.0 || offset1 >= 0.0 || offset2 >= 0.0;
                        if front {
                            (front, normal0, normal2)
                        } else {
                            (front, -normal1, -normal1)
                        }
                    }
                    (true, false) => {
                        let front = offset0 >= 0.0 || (offset1 >= 0.0 && offset2 >= 0.0);
                        if front {
                            (front, normal0, normal1)
                        } else {
                            (front, -normal2, -normal1)
                        }
                    }
                    (false, true) => {
                        let front = offset2 >= 0.0 || (offset0 >= 0.0 && offset1 >= 0.0);
                        if front {
                            (front, normal1, normal2)
                        } else {
                            (front, -normal1, -normal0)
                        }
                    }
                    (false, false) => {
                        let front = offset0 >= 0.0 && offset1 >= 0.0 && offset2 >= 0.0;
                        if front {
                            (front, normal1, normal1)
                        } else {
                            (front, -normal2, -normal0)
                        }
                    }
                }
            }
            (Some((normal0, offset0, convex1)), None) => {
                if convex1 {
                    let front = offset0 >= 0.0 || offset1 >= 0.0;
                    if front {
                        (front, normal0, -normal1)
                    } else {
                        (front, normal1, -normal1)
                    }
                } else {
                    let front = offset0 >= 0.0 && offset1 >= 0.0;
                    if front {
                        (front, normal1, -normal1)
                    } else {
                        (front, normal1, -normal0)
                    }
                }
            }
            (None, Some((normal2, offset2, convex2))) => {
                if convex2 {
                    let front = offset1 >= 0.0 || offset2 >= 0.0;
                    if front {
                        (front, -normal1, normal2)
                    } else {
                        (front, -normal1, normal1)
                    }
                } else {
                    let front = offset1 >= 0.0 && offset2 >= 0.0;
                    if front {
                        (front, -normal1, normal1)
                    } else {
                        (front, -normal2, normal1)
                    }
                }
            }
            (None, None) => {
                let front = offset1 >= 0.0;
                if front {
                    (front, -normal1, -normal1)
                } else {
                    (front, normal1, normal1)
                }
            }
        };

        let mut temp = TempPolygon {
            vertices: [Vec2::zero(); MAX_POLYGON_VERTICES],
            normals: [Vec2::zero(); MAX_POLYGON_VERTICES],
            count: polygon_b.count,
        };
        for i in 0..polygon_b.count {
            temp.vertices[i] = xf.apply(polygon_b.vertices[i]);
            temp.normals[i] = xf.q.apply(polygon_b.normals[i]);
        }

        EpCollider {
            polygon_b: temp,
            xf,
            v1,
            v2,
            normal: if front { normal1 } else { -normal1 },
            lower_limit,
            upper_limit,
            radius: polygon_b.radius + edge_a.radius,
            front,
        }
    }

    fn compute_edge_separation(&self) -> EpAxis {
        let separation = self.polygon_b.vertices[..self.polygon_b.count]
            .iter()
            .map(|&v| self.normal.dot(v - self.v1))
            .fold(f64::MAX, f64::min);
        EpAxis {
            kind: AxisKind::EdgeA,
            index: if self.front { 0 } else { 1 },
            separation,
        }
    }

    fn compute_polygon_separation(&self) -> EpAxis {
        let mut axis = EpAxis {
            kind: AxisKind::Unknown,
            index: 0,
            separation: -f64::MAX,
        };

        let perp = m::left_normal(self.normal);

        for i in 0..self.polygon_b.count {
            let n = -self.polygon_b.normals[i];
            let s1 = n.dot(self.polygon_b.vertices[i] - self.v1);
            let s2 = n.dot(self.polygon_b.vertices[i] - self.v2);
            let s = s1.min(s2);

            if s > self.radius {
                // no collision
                return EpAxis {
                    kind: AxisKind::EdgeB,
                    index: i,
                    separation: s,
                };
            }

            // adjacency
            let limit = if n.dot(perp) >= 0.0 {
                self.upper_limit
            } else {
                self.lower_limit
            };
            if (n - limit).dot(self.normal) < -ANGULAR_SLOP {
                continue;
            }

            if s > axis.separation {
                axis = EpAxis {
                    kind: AxisKind::EdgeB,
                    index: i,
                    separation: s,
                };
            }
        }
        axis
    }

    fn collide(&self, polygon_b: &PolygonShape) -> Manifold {
        let mut manifold = Manifold::default();

        let edge_axis = self.compute_edge_separation();
        if edge_axis.kind == AxisKind::Unknown || edge_axis.separation > self.radius {
            return manifold;
        }

        let polygon_axis = self.compute_polygon_separation();
        if polygon_axis.kind != AxisKind::Unknown && polygon_axis.separation > self.radius {
            return manifold;
        }

        // hysteresis for jitter reduction
        const RELATIVE_TOL: f64 = 0.98;
        const ABSOLUTE_TOL: f64 = 0.001;

        let primary_axis = if polygon_axis.kind == AxisKind::Unknown {
            edge_axis
        } else if polygon_axis.separation > RELATIVE_TOL * edge_axis.separation + ABSOLUTE_TOL {
            polygon_axis
        } else {
            edge_axis
        };

        let pb = &self.polygon_b;
        let (incident_edge, rf) = if primary_axis.kind == AxisKind::EdgeA {
            manifold.manifold_type = ManifoldType::FaceA;

            // the polygon normal most anti-parallel to the edge normal
            let mut best_index = 0;
            let mut best_value = self.normal.dot(pb.normals[0]);
            for i in 1..pb.count {
                let value = self.normal.dot(pb.normals[i]);
                if value < best_value {
                    best_value = value;
                    best_index = i;
                }
            }

            let i1 = best_index;
            let i2 = (i1 + 1) % pb.count;
            let clip_vertex = |i: usize| ClipVertex {
                v: pb.vertices[i],
                id: ContactId {
                    index_a: 0,
                    index_b: i as u8,
                    type_a: ContactFeatureType::Face,
                    type_b: ContactFeatureType::Vertex,
                },
            };
            let ie = [clip_vertex(i1), clip_vertex(i2)];

            let (i1, i2, v1, v2) = if self.front {
                (0, 1, self.v1, self.v2)
            } else {
                (1, 0, self.v2, self.v1)
            };
            (ie, (i1, i2, v1, v2, self.normal))
        } else {
            manifold.manifold_type = ManifoldType::FaceB;

            let id = ContactId {
                index_a: 0,
                index_b: primary_axis.index as u8,
                type_a: ContactFeatureType::Vertex,
                type_b: ContactFeatureType::Face,
            };
            let ie = [
                ClipVertex { v: self.v1, id },
                ClipVertex { v: self.v2, id },
            ];

            let i1 = primary_axis.index;
            let i2 = (i1 + 1) % pb.count;
            (ie, (i1, i2, pb.vertices[i1], pb.vertices[i2], pb.normals[i1]))
        };

        let (i1, i2, v1, v2, normal) = rf;
        let side_normal1 = m::right_normal(normal);
        let rf = ReferenceFace {
            i1,
            i2,
            v1,
            normal,
            side_normal1,
            side_offset1: side_normal1.dot(v1),
            side_normal2: -side_normal1,
            side_offset2: -side_normal1.dot(v2),
        };

        // clip incident edge against extruded edge1 side edges
        let (clip_points1, np) =
            clip_segment_to_line(&incident_edge, rf.side_normal1, rf.side_offset1, rf.i1 as u8);
        if np < MAX_MANIFOLD_POINTS {
            return manifold;
        }
        let (clip_points2, np) =
            clip_segment_to_line(&clip_points1, rf.side_normal2, rf.side_offset2, rf.i2 as u8);
        if np < MAX_MANIFOLD_POINTS {
            return manifold;
        }

        // now clip_points2 contains the clipped points
        if primary_axis.kind == AxisKind::EdgeA {
            manifold.local_normal = rf.normal;
            manifold.local_point = rf.v1;
        } else {
            manifold.local_normal = polygon_b.normals[rf.i1];
            manifold.local_point = polygon_b.vertices[rf.i1];
        }

        let mut point_count = 0;
        for cp in &clip_points2 {
            let separation = rf.normal.dot(cp.v - rf.v1);
            if separation <= self.radius {
                let mp = &mut manifold.points[point_count];
                if primary_axis.kind == AxisKind::EdgeA {
                    mp.local_point = self.xf.apply_inv(cp.v);
                    mp.id = cp.id;
                } else {
                    mp.local_point = cp.v;
                    mp.id = cp.id.flipped();
                }
                point_count += 1;
            }
        }
        manifold.point_count = point_count;
        manifold
    }
}

/// Collide an edge with a polygon, using the ghost vertices of the edge
/// to restrict the collision normal for smooth sliding along chains.
pub fn collide_edge_and_polygon(
    edge_a: &EdgeShape,
    xf_a: &Transform,
    polygon_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    EpCollider::new(edge_a, xf_a, polygon_b, xf_b).collide(polygon_b)
}

/// Collide child `index` of a chain with a circle.
pub fn collide_chain_and_circle(
    chain_a: &ChainShape,
    index: usize,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    collide_edge_and_circle(&chain_a.child_edge(index), xf_a, circle_b, xf_b)
}

/// Collide child `index` of a chain with a polygon.
pub fn collide_chain_and_polygon(
    chain_a: &ChainShape,
    index: usize,
    xf_a: &Transform,
    polygon_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    collide_edge_and_polygon(&chain_a.child_edge(index), xf_a, polygon_b, xf_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::WorldManifold;

    fn boxed(hw: f64, hh: f64) -> PolygonShape {
        PolygonShape::new_box(hw, hh).unwrap()
    }

    #[test]
    fn dispatch_table_orders_pairs() {
        use ShapeType::*;
        assert_eq!(pair_order(Polygon, Circle), PairOrder::AsIs);
        assert_eq!(pair_order(Circle, Polygon), PairOrder::Flipped);
        assert_eq!(pair_order(Polygon, Chain), PairOrder::Flipped);
        assert_eq!(pair_order(Edge, Edge), PairOrder::Never);
        assert_eq!(pair_order(Chain, Edge), PairOrder::Never);
    }

    #[test]
    fn circles_touching_and_apart() {
        let a = CircleShape::new(1.0).unwrap();
        let b = CircleShape::new(0.5).unwrap();
        let xf_a = Transform::identity();
        let near = Transform::from_angle(Vec2::new(1.4, 0.0), 0.0);
        let far = Transform::from_angle(Vec2::new(1.6, 0.0), 0.0);

        let manifold = collide_circles(&a, &xf_a, &b, &near);
        assert_eq!(manifold.point_count, 1);
        let wm = WorldManifold::new(&manifold, &xf_a, 1.0, &near, 0.5);
        assert!((wm.normal - Vec2::unit_x()).mag() < 1e-12);
        assert!((wm.separations[0] + 0.1).abs() < 1e-12);

        assert_eq!(collide_circles(&a, &xf_a, &b, &far).point_count, 0);
    }

    #[test]
    fn circle_on_polygon_face_and_corner() {
        let poly = boxed(1.0, 1.0);
        let circle = CircleShape::new(0.5).unwrap();
        let xf_a = Transform::identity();

        let on_top = Transform::from_angle(Vec2::new(0.2, 1.45), 0.0);
        let manifold = collide_polygon_and_circle(&poly, &xf_a, &circle, &on_top);
        assert_eq!(manifold.manifold_type, ManifoldType::FaceA);
        assert_eq!(manifold.local_normal, Vec2::unit_y());

        let corner = Transform::from_angle(Vec2::new(1.3, 1.3), 0.0);
        let manifold = collide_polygon_and_circle(&poly, &xf_a, &circle, &corner);
        assert_eq!(manifold.point_count, 1);
        let expected = Vec2::new(1.0, 1.0).normalized();
        assert!((manifold.local_normal - expected).mag() < 1e-12);

        let away = Transform::from_angle(Vec2::new(1.5, 1.5), 0.0);
        assert_eq!(
            collide_polygon_and_circle(&poly, &xf_a, &circle, &away).point_count,
            0
        );
    }

    #[test]
    fn box_resting_on_box_has_two_points() {
        let ground = boxed(5.0, 0.5);
        let crate_box = boxed(0.5, 0.5);
        let xf_a = Transform::identity();
        let xf_b = Transform::from_angle(Vec2::new(0.3, 0.99), 0.0);

        let manifold = collide_polygons(&ground, &xf_a, &crate_box, &xf_b);
        assert_eq!(manifold.point_count, 2);
        assert_eq!(manifold.manifold_type, ManifoldType::FaceA);

        let wm = WorldManifold::new(&manifold, &xf_a, ground.radius, &xf_b, crate_box.radius);
        assert!((wm.normal - Vec2::unit_y()).mag() < 1e-12);
        // 0.01 of overlap plus the two polygon skins
        let expected = -0.01 - ground.radius - crate_box.radius;
        for i in 0..2 {
            assert!((wm.separations[i] - expected).abs() < 1e-9);
        }

        // ids stay the same under a tiny shift
        let xf_b2 = Transform::from_angle(Vec2::new(0.3001, 0.9899), 1e-5);
        let manifold2 = collide_polygons(&ground, &xf_a, &crate_box, &xf_b2);
        assert_eq!(manifold2.point_count, 2);
        for i in 0..2 {
            assert_eq!(manifold.points[i].id, manifold2.points[i].id);
        }
    }

    #[test]
    fn separated_polygons_have_no_points() {
        let a = boxed(1.0, 1.0);
        let xf_b = Transform::from_angle(Vec2::new(2.5, 0.0), 0.3);
        assert_eq!(
            collide_polygons(&a, &Transform::identity(), &a, &xf_b).point_count,
            0
        );
    }

    #[test]
    fn circle_on_edge_regions() {
        let edge = EdgeShape::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)).unwrap();
        let circle = CircleShape::new(0.5).unwrap();
        let xf_a = Transform::identity();

        let middle = Transform::from_angle(Vec2::new(0.0, 0.45), 0.0);
        let manifold = collide_edge_and_circle(&edge, &xf_a, &circle, &middle);
        assert_eq!(manifold.manifold_type, ManifoldType::FaceA);
        assert_eq!(manifold.local_normal, Vec2::unit_y());

        let past_end = Transform::from_angle(Vec2::new(1.2, 0.3), 0.0);
        let manifold = collide_edge_and_circle(&edge, &xf_a, &circle, &past_end);
        assert_eq!(manifold.manifold_type, ManifoldType::Circles);
        assert_eq!(manifold.points[0].id.index_a, 1);

        // the next edge of a chain owns that corner region
        let chained = edge.with_adjacent(None, Some(Vec2::new(3.0, 0.0)));
        let manifold = collide_edge_and_circle(&chained, &xf_a, &circle, &past_end);
        assert_eq!(manifold.point_count, 0);
    }

    #[test]
    fn box_on_edge_front_side() {
        let edge = EdgeShape::new(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0)).unwrap();
        let b = boxed(0.5, 0.5);
        let xf_a = Transform::identity();
        let xf_b = Transform::from_angle(Vec2::new(0.0, 0.51), 0.0);

        let manifold = collide_edge_and_polygon(&edge, &xf_a, &b, &xf_b);
        assert_eq!(manifold.point_count, 2);
        let wm = WorldManifold::new(&manifold, &xf_a, edge.radius, &xf_b, b.radius);
        assert!((wm.normal - Vec2::unit_y()).mag() < 1e-9);
    }

    #[test]
    fn short_edge_under_wide_box_keeps_both_endpoints() {
        let edge = EdgeShape::new(Vec2::new(-0.1, 0.0), Vec2::new(0.1, 0.0)).unwrap();
        let b = boxed(1.0, 1.0);
        let xf_a = Transform::identity();
        let xf_b = Transform::from_angle(Vec2::new(0.0, 1.01), 0.0);

        let manifold = collide_edge_and_polygon(&edge, &xf_a, &b, &xf_b);
        assert_eq!(manifold.point_count, 2);
        let wm = WorldManifold::new(&manifold, &xf_a, edge.radius, &xf_b, b.radius);
        assert!((wm.normal.y.abs() - 1.0).abs() < 1e-9);
        for point in &wm.points[..2] {
            assert!(point.x.abs() <= 0.1 + 1e-9, "point at {:?}", point);
        }
        assert!((wm.points[0].x - wm.points[1].x).abs() > 0.19);
    }

    #[test]
    fn chain_children_collide_like_edges() {
        let chain = ChainShape::new_chain(&[
            Vec2::new(-4.0, 0.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
        ])
        .unwrap();
        let b = boxed(0.5, 0.5);
        let xf_a = Transform::identity();
        // straddling the internal vertex
        let xf_b = Transform::from_angle(Vec2::new(0.2, 0.51), 0.0);

        for child in 0..2 {
            let manifold = collide_chain_and_polygon(&chain, child, &xf_a, &b, &xf_b);
            if manifold.point_count > 0 {
                let wm = WorldManifold::new(&manifold, &xf_a, chain.radius, &xf_b, b.radius);
                // the ghost vertices keep the normal pointing straight up
                assert!((wm.normal - Vec2::unit_y()).mag() < 1e-9);
            }
        }

        let circle = CircleShape::new(0.5).unwrap();
        let xf_c = Transform::from_angle(Vec2::new(2.0, 0.4), 0.0);
        assert_eq!(
            collide_chain_and_circle(&chain, 1, &xf_a, &circle, &xf_c).point_count,
            1
        );
    }
}
