//! Collision detection: shapes, bounding volumes, the broad phase tree,
//! contact manifolds, distance and time of impact queries.

use crate::{
    math::{self as m, Transform, Vec2},
    settings::MAX_MANIFOLD_POINTS,
};

pub mod shape;
pub use shape::{ChainShape, CircleShape, EdgeShape, MassData, PolygonShape, Shape, ShapeType};

pub mod dynamic_tree;
pub use dynamic_tree::{DynamicTree, ProxyId};

pub mod broad_phase;
pub use broad_phase::BroadPhase;

pub mod distance;
pub use distance::{distance, DistanceInput, DistanceOutput, DistanceProxy, SimplexCache};

pub mod narrowphase;

pub mod time_of_impact;
pub use time_of_impact::{time_of_impact, TOIInput, TOIOutput, TOIState};

//
// Bounding boxes
//

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub lower: Vec2,
    pub upper: Vec2,
}

impl Aabb {
    #[inline]
    pub fn new(lower: Vec2, upper: Vec2) -> Self {
        Aabb { lower, upper }
    }

    /// A box centered at `center` with the given half extents.
    #[inline]
    pub fn from_center(center: Vec2, half_extents: Vec2) -> Self {
        Aabb {
            lower: center - half_extents,
            upper: center + half_extents,
        }
    }

    /// Whether the bounds are sorted and finite.
    pub fn is_valid(&self) -> bool {
        let d = self.upper - self.lower;
        d.x >= 0.0 && d.y >= 0.0 && m::is_valid_vec(self.lower) && m::is_valid_vec(self.upper)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        0.5 * (self.lower + self.upper)
    }

    /// Half-widths of the box.
    #[inline]
    pub fn extents(&self) -> Vec2 {
        0.5 * (self.upper - self.lower)
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.upper.x - self.lower.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.upper.y - self.lower.y
    }

    /// Perimeter length, used as the cost metric in the dynamic tree.
    #[inline]
    pub fn perimeter(&self) -> f64 {
        2.0 * (self.width() + self.height())
    }

    /// Smallest box containing both `self` and `other`.
    #[inline]
    pub fn combine(&self, other: &Aabb) -> Aabb {
        Aabb {
            lower: self.lower.min_by_component(other.lower),
            upper: self.upper.max_by_component(other.upper),
        }
    }

    /// Grow the box by the same amount in every direction.
    #[inline]
    pub fn padded(&self, amount: f64) -> Aabb {
        let r = Vec2::new(amount, amount);
        Aabb {
            lower: self.lower - r,
            upper: self.upper + r,
        }
    }

    /// Whether `other` is entirely inside `self`.
    #[inline]
    pub fn contains(&self, other: &Aabb) -> bool {
        self.lower.x <= other.lower.x
            && self.lower.y <= other.lower.y
            && other.upper.x <= self.upper.x
            && other.upper.y <= self.upper.y
    }

    #[inline]
    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.lower.x && p.x <= self.upper.x && p.y >= self.lower.y && p.y <= self.upper.y
    }

    /// Whether the boxes overlap. Touching counts as overlapping.
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        let d1 = other.lower - self.upper;
        let d2 = self.lower - other.upper;
        !(d1.x > 0.0 || d1.y > 0.0 || d2.x > 0.0 || d2.y > 0.0)
    }

    /// Slab test of a ray segment against the box.
    pub fn ray_cast(&self, input: &RayCastInput) -> Option<RayCastOutput> {
        let mut tmin = -f64::MAX;
        let mut tmax = f64::MAX;

        let p = [input.p1.x, input.p1.y];
        let d_v = input.p2 - input.p1;
        let d = [d_v.x, d_v.y];
        let lower = [self.lower.x, self.lower.y];
        let upper = [self.upper.x, self.upper.y];
        let mut normal = Vec2::zero();

        for i in 0..2 {
            if d[i].abs() < f64::EPSILON {
                // parallel to this slab
                if p[i] < lower[i] || upper[i] < p[i] {
                    return None;
                }
            } else {
                let inv_d = 1.0 / d[i];
                let mut t1 = (lower[i] - p[i]) * inv_d;
                let mut t2 = (upper[i] - p[i]) * inv_d;
                // sign of the normal vector
                let mut s = -1.0;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                    s = 1.0;
                }
                if t1 > tmin {
                    normal = if i == 0 {
                        Vec2::new(s, 0.0)
                    } else {
                        Vec2::new(0.0, s)
                    };
                    tmin = t1;
                }
                tmax = tmax.min(t2);
                if tmin > tmax {
                    return None;
                }
            }
        }

        // does the ray start inside the box or is the box beyond max_fraction?
        if tmin < 0.0 || input.max_fraction < tmin {
            return None;
        }
        Some(RayCastOutput {
            normal,
            fraction: tmin,
        })
    }
}

//
// Ray casts
//

/// A ray segment from `p1` to `p1 + max_fraction * (p2 - p1)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayCastInput {
    pub p1: Vec2,
    pub p2: Vec2,
    pub max_fraction: f64,
}

/// The hit point is `p1 + fraction * (p2 - p1)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayCastOutput {
    pub normal: Vec2,
    pub fraction: f64,
}

//
// Contact ids
//

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContactFeatureType {
    #[default]
    Vertex = 0,
    Face = 1,
}

/// The features that intersect to form a contact point.
/// Used to match contact points between steps for warm starting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ContactId {
    /// Feature index on shape A.
    pub index_a: u8,
    /// Feature index on shape B.
    pub index_b: u8,
    pub type_a: ContactFeatureType,
    pub type_b: ContactFeatureType,
}

impl ContactId {
    /// All four features packed into one integer for fast comparison.
    #[inline]
    pub fn key(&self) -> u32 {
        u32::from(self.index_a)
            | u32::from(self.index_b) << 8
            | (self.type_a as u32) << 16
            | (self.type_b as u32) << 24
    }

    /// Swap the roles of shapes A and B.
    #[inline]
    pub fn flipped(&self) -> Self {
        ContactId {
            index_a: self.index_b,
            index_b: self.index_a,
            type_a: self.type_b,
            type_b: self.type_a,
        }
    }
}

//
// Manifolds
//

/// A contact point belonging to a contact manifold.
///
/// The local point's meaning depends on the manifold type:
/// - `Circles`: the local center of circle B
/// - `FaceA`: the local center of circle B or the clip point of polygon B
/// - `FaceB`: the clip point of polygon A
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ManifoldPoint {
    pub local_point: Vec2,
    /// Non-penetration impulse.
    pub normal_impulse: f64,
    /// Friction impulse.
    pub tangent_impulse: f64,
    /// Uniquely identifies the contact point between two shapes.
    pub id: ContactId,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ManifoldType {
    #[default]
    Circles,
    FaceA,
    FaceB,
}

/// Contact points of two touching convex shapes, stored in local coordinates
/// so that they remain valid when the bodies move slightly.
///
/// - `Circles`: `local_point` is the local center of circle A
/// - `FaceA`: `local_point` is the center of face A, `local_normal` its normal
/// - `FaceB`: `local_point` is the center of face B, `local_normal` its normal
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Manifold {
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    pub local_normal: Vec2,
    pub local_point: Vec2,
    pub manifold_type: ManifoldType,
    pub point_count: usize,
}

impl Manifold {
    #[inline]
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }
}

/// A manifold in world coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WorldManifold {
    /// Points from A to B.
    pub normal: Vec2,
    /// Midpoints between the two surfaces.
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// Negative values mean penetration.
    pub separations: [f64; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    /// Evaluate a manifold with the given transforms and shape radii.
    pub fn new(
        manifold: &Manifold,
        xf_a: &Transform,
        radius_a: f64,
        xf_b: &Transform,
        radius_b: f64,
    ) -> Self {
        let mut wm = WorldManifold::default();
        if manifold.point_count == 0 {
            return wm;
        }

        match manifold.manifold_type {
            ManifoldType::Circles => {
                wm.normal = Vec2::unit_x();
                let point_a = xf_a.apply(manifold.local_point);
                let point_b = xf_b.apply(manifold.points[0].local_point);
                if m::distance_sq(point_a, point_b) > f64::EPSILON * f64::EPSILON {
                    wm.normal = (point_b - point_a).normalized();
                }
                let c_a = point_a + radius_a * wm.normal;
                let c_b = point_b - radius_b * wm.normal;
                wm.points[0] = 0.5 * (c_a + c_b);
                wm.separations[0] = (c_b - c_a).dot(wm.normal);
            }
            ManifoldType::FaceA => {
                wm.normal = xf_a.q.apply(manifold.local_normal);
                let plane_point = xf_a.apply(manifold.local_point);
                for i in 0..manifold.point_count {
                    let clip_point = xf_b.apply(manifold.points[i].local_point);
                    let c_a = clip_point
                        + (radius_a - (clip_point - plane_point).dot(wm.normal)) * wm.normal;
                    let c_b = clip_point - radius_b * wm.normal;
                    wm.points[i] = 0.5 * (c_a + c_b);
                    wm.separations[i] = (c_b - c_a).dot(wm.normal);
                }
            }
            ManifoldType::FaceB => {
                wm.normal = xf_b.q.apply(manifold.local_normal);
                let plane_point = xf_b.apply(manifold.local_point);
                for i in 0..manifold.point_count {
                    let clip_point = xf_a.apply(manifold.points[i].local_point);
                    let c_b = clip_point
                        + (radius_b - (clip_point - plane_point).dot(wm.normal)) * wm.normal;
                    let c_a = clip_point - radius_a * wm.normal;
                    wm.points[i] = 0.5 * (c_a + c_b);
                    wm.separations[i] = (c_a - c_b).dot(wm.normal);
                }
                // ensure normal points from A to B
                wm.normal = -wm.normal;
            }
        }
        wm
    }
}

/// How a contact point changed between two manifolds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PointState {
    /// Point does not exist.
    #[default]
    Null,
    /// Point was added in the update.
    Add,
    /// Point persisted across the update.
    Persist,
    /// Point was removed in the update.
    Remove,
}

/// Compare the points of two manifolds of the same shape pair by their contact ids.
/// Returns the states of the points of `m1` (Persist/Remove)
/// and of the points of `m2` (Add/Persist).
pub fn get_point_states(
    m1: &Manifold,
    m2: &Manifold,
) -> (
    [PointState; MAX_MANIFOLD_POINTS],
    [PointState; MAX_MANIFOLD_POINTS],
) {
    let mut state1 = [PointState::Null; MAX_MANIFOLD_POINTS];
    let mut state2 = [PointState::Null; MAX_MANIFOLD_POINTS];

    for (i, p1) in m1.points().iter().enumerate() {
        state1[i] = if m2.points().iter().any(|p2| p2.id.key() == p1.id.key()) {
            PointState::Persist
        } else {
            PointState::Remove
        };
    }
    for (i, p2) in m2.points().iter().enumerate() {
        state2[i] = if m1.points().iter().any(|p1| p1.id.key() == p2.id.key()) {
            PointState::Persist
        } else {
            PointState::Add
        };
    }
    (state1, state2)
}

//
// Clipping
//

/// A vertex of a clipped edge.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClipVertex {
    pub v: Vec2,
    pub id: ContactId,
}

/// Sutherland-Hodgman clipping of a segment against the half plane
/// `dot(normal, x) <= offset`. Returns the clipped segment and how many
/// of its vertices are valid.
pub fn clip_segment_to_line(
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: f64,
    vertex_index_a: u8,
) -> ([ClipVertex; 2], usize) {
    let mut v_out = [ClipVertex::default(); 2];
    let mut count = 0;

    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    // points behind the plane are kept
    if distance0 <= 0.0 {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        v_out[count] = v_in[1];
        count += 1;
    }

    // points on different sides of the plane
    if distance0 * distance1 < 0.0 {
        let interp = distance0 / (distance0 - distance1);
        v_out[count].v = v_in[0].v + interp * (v_in[1].v - v_in[0].v);
        // vertex A is hitting edge B
        v_out[count].id = ContactId {
            index_a: vertex_index_a,
            index_b: v_in[0].id.index_b,
            type_a: ContactFeatureType::Vertex,
            type_b: ContactFeatureType::Face,
        };
        count += 1;
    }

    (v_out, count)
}

/// Exact overlap test of two shape children using GJK.
pub fn test_overlap(
    shape_a: &Shape,
    index_a: usize,
    shape_b: &Shape,
    index_b: usize,
    xf_a: &Transform,
    xf_b: &Transform,
) -> bool {
    let input = DistanceInput {
        proxy_a: DistanceProxy::new(shape_a, index_a),
        proxy_b: DistanceProxy::new(shape_b, index_b),
        transform_a: *xf_a,
        transform_b: *xf_b,
        use_radii: true,
    };
    let mut cache = SimplexCache::default();
    let output = distance(&mut cache, &input);
    output.distance < 10.0 * f64::EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aabb_overlap_and_containment() {
        let a = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 2.0));
        let b = Aabb::new(Vec2::new(1.0, 1.0), Vec2::new(3.0, 3.0));
        let c = Aabb::new(Vec2::new(2.5, -1.0), Vec2::new(4.0, 0.5));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        let ab = a.combine(&b);
        assert!(ab.contains(&a) && ab.contains(&b));
        assert_eq!(ab.perimeter(), 12.0);
    }

    #[test]
    fn aabb_ray_cast_hits_near_face() {
        let aabb = Aabb::new(Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0));
        let input = RayCastInput {
            p1: Vec2::new(-3.0, 0.0),
            p2: Vec2::new(3.0, 0.0),
            max_fraction: 1.0,
        };
        let out = aabb.ray_cast(&input).expect("ray should hit");
        assert!((out.fraction - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(out.normal, Vec2::new(-1.0, 0.0));

        let short = RayCastInput {
            max_fraction: 0.2,
            ..input
        };
        assert!(aabb.ray_cast(&short).is_none());
    }

    #[test]
    fn clipping_splits_crossing_segment() {
        let v_in = [
            ClipVertex {
                v: Vec2::new(-1.0, 0.0),
                id: ContactId::default(),
            },
            ClipVertex {
                v: Vec2::new(1.0, 0.0),
                id: ContactId::default(),
            },
        ];
        let (out, count) = clip_segment_to_line(&v_in, Vec2::unit_x(), 0.5, 3);
        assert_eq!(count, 2);
        assert_eq!(out[0].v, Vec2::new(-1.0, 0.0));
        assert!((out[1].v - Vec2::new(0.5, 0.0)).mag() < 1e-12);
        assert_eq!(out[1].id.index_a, 3);
        assert_eq!(out[1].id.type_b, ContactFeatureType::Face);
    }

    #[test]
    fn point_states_match_by_id() {
        let mut m1 = Manifold::default();
        m1.point_count = 2;
        m1.points[0].id.index_a = 1;
        m1.points[1].id.index_a = 2;
        let mut m2 = Manifold::default();
        m2.point_count = 1;
        m2.points[0].id.index_a = 2;

        let (s1, s2) = get_point_states(&m1, &m2);
        assert_eq!(s1, [PointState::Remove, PointState::Persist]);
        assert_eq!(s2, [PointState::Persist, PointState::Null]);
    }
}
