//! Sequential impulse solver for contact constraints.

use super::{
    body::Body,
    contact::{Contact, ContactKey},
    fixture::Fixture,
    time_step::{Position, TimeStep, Velocity},
};
use crate::{
    collision::{Manifold, ManifoldType, WorldManifold},
    math::{self as m, Mat22, Rot, Transform, Vec2},
    settings::{
        BAUMGARTE, LINEAR_SLOP, MAX_LINEAR_CORRECTION, MAX_MANIFOLD_POINTS, TOI_BAUMGARTE,
        VELOCITY_THRESHOLD,
    },
};

use thunderdome as td;

/// Above this the two-point block solver is considered ill-conditioned
/// and only one point is solved.
const MAX_CONDITION_NUMBER: f64 = 1000.0;

#[derive(Clone, Copy, Debug, Default)]
struct VelocityConstraintPoint {
    r_a: Vec2,
    r_b: Vec2,
    normal_impulse: f64,
    tangent_impulse: f64,
    normal_mass: f64,
    tangent_mass: f64,
    velocity_bias: f64,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct VelocityConstraint {
    points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    normal: Vec2,
    /// Inverse of `k`, only used by the block solver.
    normal_mass: Mat22,
    k: Mat22,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f64,
    inv_mass_b: f64,
    inv_i_a: f64,
    inv_i_b: f64,
    friction: f64,
    restitution: f64,
    tangent_speed: f64,
    point_count: usize,
}

#[derive(Clone, Copy, Debug)]
struct PositionConstraint {
    manifold: Manifold,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f64,
    inv_mass_b: f64,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_i_a: f64,
    inv_i_b: f64,
    radius_a: f64,
    radius_b: f64,
}

impl PositionConstraint {
    /// World normal, contact point and separation of the given manifold point.
    fn evaluate(&self, xf_a: &Transform, xf_b: &Transform, index: usize) -> (Vec2, Vec2, f64) {
        let mf = &self.manifold;
        let radii = self.radius_a + self.radius_b;
        match mf.manifold_type {
            ManifoldType::Circles => {
                let point_a = xf_a.apply(mf.local_point);
                let point_b = xf_b.apply(mf.points[0].local_point);
                let mut normal = point_b - point_a;
                m::normalize(&mut normal);
                let point = 0.5 * (point_a + point_b);
                let separation = (point_b - point_a).dot(normal) - radii;
                (normal, point, separation)
            }
            ManifoldType::FaceA => {
                let normal = xf_a.q.apply(mf.local_normal);
                let plane_point = xf_a.apply(mf.local_point);
                let clip_point = xf_b.apply(mf.points[index].local_point);
                let separation = (clip_point - plane_point).dot(normal) - radii;
                (normal, clip_point, separation)
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q.apply(mf.local_normal);
                let plane_point = xf_b.apply(mf.local_point);
                let clip_point = xf_a.apply(mf.points[index].local_point);
                let separation = (clip_point - plane_point).dot(normal) - radii;
                // ensure the normal points from A to B
                (-normal, clip_point, separation)
            }
        }
    }
}

#[inline]
fn transform_at(pos: &Position, local_center: Vec2) -> Transform {
    let q = Rot::from_angle(pos.a);
    Transform::new(pos.c - q.apply(local_center), q)
}

pub(crate) struct ContactSolver {
    contacts: Vec<ContactKey>,
    pub(crate) velocity_constraints: Vec<VelocityConstraint>,
    position_constraints: Vec<PositionConstraint>,
}

impl ContactSolver {
    /// Gather the constraint data of the given touching contacts.
    /// Bodies must already have their island indices assigned.
    pub fn new(
        step: TimeStep,
        contact_keys: &[ContactKey],
        contacts: &td::Arena<Contact>,
        fixtures: &td::Arena<Fixture>,
        bodies: &td::Arena<Body>,
    ) -> Self {
        let mut velocity_constraints = Vec::with_capacity(contact_keys.len());
        let mut position_constraints = Vec::with_capacity(contact_keys.len());
        let mut keys = Vec::with_capacity(contact_keys.len());

        for &key in contact_keys {
            let Some(contact) = contacts.get(key.0) else {
                continue;
            };
            let (Some(fixture_a), Some(fixture_b)) = (
                fixtures.get(contact.fixture_a.0),
                fixtures.get(contact.fixture_b.0),
            ) else {
                continue;
            };
            let (Some(body_a), Some(body_b)) = (
                bodies.get(contact.body_a.0),
                bodies.get(contact.body_b.0),
            ) else {
                continue;
            };
            let manifold = contact.manifold;
            debug_assert!(manifold.point_count > 0);

            let mut vc = VelocityConstraint {
                points: [VelocityConstraintPoint::default(); MAX_MANIFOLD_POINTS],
                normal: Vec2::zero(),
                normal_mass: Mat22::zero(),
                k: Mat22::zero(),
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                inv_i_a: body_a.inv_i,
                inv_i_b: body_b.inv_i,
                friction: contact.friction,
                restitution: contact.restitution,
                tangent_speed: contact.tangent_speed,
                point_count: manifold.point_count,
            };
            for (vcp, mp) in vc.points.iter_mut().zip(manifold.points()) {
                if step.warm_starting {
                    vcp.normal_impulse = step.dt_ratio * mp.normal_impulse;
                    vcp.tangent_impulse = step.dt_ratio * mp.tangent_impulse;
                }
            }
            velocity_constraints.push(vc);

            position_constraints.push(PositionConstraint {
                manifold,
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                local_center_a: body_a.sweep.local_center,
                local_center_b: body_b.sweep.local_center,
                inv_i_a: body_a.inv_i,
                inv_i_b: body_b.inv_i,
                radius_a: fixture_a.shape.radius(),
                radius_b: fixture_b.shape.radius(),
            });
            keys.push(key);
        }

        Self {
            contacts: keys,
            velocity_constraints,
            position_constraints,
        }
    }

    /// Keys of the solved contacts, in constraint order.
    #[inline]
    pub fn contacts(&self) -> &[ContactKey] {
        &self.contacts
    }

    pub fn initialize_velocity_constraints(
        &mut self,
        positions: &[Position],
        velocities: &[Velocity],
    ) {
        for (vc, pc) in self
            .velocity_constraints
            .iter_mut()
            .zip(&self.position_constraints)
        {
            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);

            let c_a = positions[vc.index_a].c;
            let c_b = positions[vc.index_b].c;
            let Velocity { v: v_a, w: w_a } = velocities[vc.index_a];
            let Velocity { v: v_b, w: w_b } = velocities[vc.index_b];

            let xf_a = transform_at(&positions[vc.index_a], pc.local_center_a);
            let xf_b = transform_at(&positions[vc.index_b], pc.local_center_b);

            let world_manifold =
                WorldManifold::new(&pc.manifold, &xf_a, pc.radius_a, &xf_b, pc.radius_b);

            vc.normal = world_manifold.normal;
            let tangent = m::cross_vs(vc.normal, 1.0);

            for (vcp, &point) in vc.points[..vc.point_count]
                .iter_mut()
                .zip(&world_manifold.points)
            {
                vcp.r_a = point - c_a;
                vcp.r_b = point - c_b;

                let rn_a = m::cross(vcp.r_a, vc.normal);
                let rn_b = m::cross(vcp.r_b, vc.normal);
                let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                vcp.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let rt_a = m::cross(vcp.r_a, tangent);
                let rt_b = m::cross(vcp.r_b, tangent);
                let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
                vcp.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                // restitution only kicks in above a threshold to let things come to rest
                vcp.velocity_bias = 0.0;
                let v_rel = vc.normal.dot(
                    v_b + m::cross_sv(w_b, vcp.r_b) - v_a - m::cross_sv(w_a, vcp.r_a),
                );
                if v_rel < -VELOCITY_THRESHOLD {
                    vcp.velocity_bias = -vc.restitution * v_rel;
                }
            }

            if vc.point_count == 2 {
                let [p1, p2] = vc.points;
                let rn1_a = m::cross(p1.r_a, vc.normal);
                let rn1_b = m::cross(p1.r_b, vc.normal);
                let rn2_a = m::cross(p2.r_a, vc.normal);
                let rn2_b = m::cross(p2.r_b, vc.normal);

                let k11 = m_a + m_b + i_a * rn1_a * rn1_a + i_b * rn1_b * rn1_b;
                let k22 = m_a + m_b + i_a * rn2_a * rn2_a + i_b * rn2_b * rn2_b;
                let k12 = m_a + m_b + i_a * rn1_a * rn2_a + i_b * rn1_b * rn2_b;

                if k11 * k11 < MAX_CONDITION_NUMBER * (k11 * k22 - k12 * k12) {
                    vc.k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
                    vc.normal_mass = vc.k.inverse();
                } else {
                    // the points are redundant, solve just one
                    vc.point_count = 1;
                }
            }
        }
    }

    pub fn warm_start(&self, velocities: &mut [Velocity]) {
        for vc in &self.velocity_constraints {
            let tangent = m::cross_vs(vc.normal, 1.0);
            let Velocity { v: mut v_a, w: mut w_a } = velocities[vc.index_a];
            let Velocity { v: mut v_b, w: mut w_b } = velocities[vc.index_b];

            for vcp in &vc.points[..vc.point_count] {
                let p = vcp.normal_impulse * vc.normal + vcp.tangent_impulse * tangent;
                w_a -= vc.inv_i_a * m::cross(vcp.r_a, p);
                v_a -= vc.inv_mass_a * p;
                w_b += vc.inv_i_b * m::cross(vcp.r_b, p);
                v_b += vc.inv_mass_b * p;
            }

            velocities[vc.index_a] = Velocity { v: v_a, w: w_a };
            velocities[vc.index_b] = Velocity { v: v_b, w: w_b };
        }
    }

    pub fn solve_velocity_constraints(&mut self, velocities: &mut [Velocity]) {
        for vc in &mut self.velocity_constraints {
            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);
            let normal = vc.normal;
            let tangent = m::cross_vs(normal, 1.0);
            let friction = vc.friction;

            let Velocity { v: mut v_a, w: mut w_a } = velocities[vc.index_a];
            let Velocity { v: mut v_b, w: mut w_b } = velocities[vc.index_b];

            // friction first, non-penetration is more important
            for vcp in &mut vc.points[..vc.point_count] {
                let dv = v_b + m::cross_sv(w_b, vcp.r_b) - v_a - m::cross_sv(w_a, vcp.r_a);
                let vt = dv.dot(tangent) - vc.tangent_speed;
                let lambda = vcp.tangent_mass * -vt;

                let max_friction = friction * vcp.normal_impulse;
                let new_impulse = (vcp.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                let lambda = new_impulse - vcp.tangent_impulse;
                vcp.tangent_impulse = new_impulse;

                let p = lambda * tangent;
                v_a -= m_a * p;
                w_a -= i_a * m::cross(vcp.r_a, p);
                v_b += m_b * p;
                w_b += i_b * m::cross(vcp.r_b, p);
            }

            if vc.point_count == 1 {
                let vcp = &mut vc.points[0];
                let dv = v_b + m::cross_sv(w_b, vcp.r_b) - v_a - m::cross_sv(w_a, vcp.r_a);
                let vn = dv.dot(normal);
                let lambda = -vcp.normal_mass * (vn - vcp.velocity_bias);

                let new_impulse = (vcp.normal_impulse + lambda).max(0.0);
                let lambda = new_impulse - vcp.normal_impulse;
                vcp.normal_impulse = new_impulse;

                let p = lambda * normal;
                v_a -= m_a * p;
                w_a -= i_a * m::cross(vcp.r_a, p);
                v_b += m_b * p;
                w_b += i_b * m::cross(vcp.r_b, p);
            } else {
                // Block solver for both points at once, solving the linear
                // complementarity problem
                //   vn = A * x + b, vn >= 0, x >= 0, vn_i * x_i = 0
                // by enumerating the four cases of which points are active.
                // The accumulated impulse `a` is used as the starting point:
                //   vn = A * (x - a) + b', with b = b' - A * a.
                let (cp1, cp2) = (vc.points[0], vc.points[1]);
                let a = Vec2::new(cp1.normal_impulse, cp2.normal_impulse);
                debug_assert!(a.x >= 0.0 && a.y >= 0.0);

                let dv1 = v_b + m::cross_sv(w_b, cp1.r_b) - v_a - m::cross_sv(w_a, cp1.r_a);
                let dv2 = v_b + m::cross_sv(w_b, cp2.r_b) - v_a - m::cross_sv(w_a, cp2.r_a);
                let vn1 = dv1.dot(normal);
                let vn2 = dv2.dot(normal);

                let mut b = Vec2::new(vn1 - cp1.velocity_bias, vn2 - cp2.velocity_bias);
                b -= vc.k.mul_vec(a);

                let k = vc.k;
                let solution = 'cases: {
                    // both points active
                    let x = -vc.normal_mass.mul_vec(b);
                    if x.x >= 0.0 && x.y >= 0.0 {
                        break 'cases Some(x);
                    }

                    // only the first point active
                    let x = Vec2::new(-cp1.normal_mass * b.x, 0.0);
                    let vn2 = k.ex.y * x.x + b.y;
                    if x.x >= 0.0 && vn2 >= 0.0 {
                        break 'cases Some(x);
                    }

                    // only the second point active
                    let x = Vec2::new(0.0, -cp2.normal_mass * b.y);
                    let vn1 = k.ey.x * x.y + b.x;
                    if x.y >= 0.0 && vn1 >= 0.0 {
                        break 'cases Some(x);
                    }

                    // neither point active
                    if b.x >= 0.0 && b.y >= 0.0 {
                        break 'cases Some(Vec2::zero());
                    }

                    // no solution, leave the impulses as they are
                    None
                };

                if let Some(x) = solution {
                    let d = x - a;
                    let p1 = d.x * normal;
                    let p2 = d.y * normal;
                    v_a -= m_a * (p1 + p2);
                    w_a -= i_a * (m::cross(cp1.r_a, p1) + m::cross(cp2.r_a, p2));
                    v_b += m_b * (p1 + p2);
                    w_b += i_b * (m::cross(cp1.r_b, p1) + m::cross(cp2.r_b, p2));

                    vc.points[0].normal_impulse = x.x;
                    vc.points[1].normal_impulse = x.y;
                }
            }

            velocities[vc.index_a] = Velocity { v: v_a, w: w_a };
            velocities[vc.index_b] = Velocity { v: v_b, w: w_b };
        }
    }

    /// Copy the accumulated impulses back to the contact manifolds for warm starting.
    pub fn store_impulses(&self, contacts: &mut td::Arena<Contact>) {
        for (vc, key) in self.velocity_constraints.iter().zip(&self.contacts) {
            let Some(contact) = contacts.get_mut(key.0) else {
                continue;
            };
            for (mp, vcp) in contact.manifold.points[..vc.point_count]
                .iter_mut()
                .zip(&vc.points)
            {
                mp.normal_impulse = vcp.normal_impulse;
                mp.tangent_impulse = vcp.tangent_impulse;
            }
        }
    }

    /// One iteration of non-linear Gauss-Seidel position correction.
    /// Returns true when every contact is within tolerance.
    pub fn solve_position_constraints(&self, positions: &mut [Position]) -> bool {
        self.solve_positions(positions, BAUMGARTE, |pc| {
            (pc.inv_mass_a, pc.inv_i_a, pc.inv_mass_b, pc.inv_i_b)
        }) >= -3.0 * LINEAR_SLOP
    }

    /// Position correction for a TOI event: only the two bodies of the TOI
    /// contact move, everything else is treated as static.
    pub fn solve_toi_position_constraints(
        &self,
        positions: &mut [Position],
        toi_index_a: usize,
        toi_index_b: usize,
    ) -> bool {
        let is_toi_body = |index: usize| index == toi_index_a || index == toi_index_b;
        self.solve_positions(positions, TOI_BAUMGARTE, |pc| {
            let (m_a, i_a) = if is_toi_body(pc.index_a) {
                (pc.inv_mass_a, pc.inv_i_a)
            } else {
                (0.0, 0.0)
            };
            let (m_b, i_b) = if is_toi_body(pc.index_b) {
                (pc.inv_mass_b, pc.inv_i_b)
            } else {
                (0.0, 0.0)
            };
            (m_a, i_a, m_b, i_b)
        }) >= -1.5 * LINEAR_SLOP
    }

    /// Push penetrating contacts apart, returning the smallest separation found.
    fn solve_positions(
        &self,
        positions: &mut [Position],
        baumgarte: f64,
        masses: impl Fn(&PositionConstraint) -> (f64, f64, f64, f64),
    ) -> f64 {
        let mut min_separation: f64 = 0.0;

        for pc in &self.position_constraints {
            let (m_a, i_a, m_b, i_b) = masses(pc);
            let mut pos_a = positions[pc.index_a];
            let mut pos_b = positions[pc.index_b];

            for j in 0..pc.manifold.point_count {
                let xf_a = transform_at(&pos_a, pc.local_center_a);
                let xf_b = transform_at(&pos_b, pc.local_center_b);
                let (normal, point, separation) = pc.evaluate(&xf_a, &xf_b, j);

                let r_a = point - pos_a.c;
                let r_b = point - pos_b.c;

                min_separation = min_separation.min(separation);

                // allow some slop and avoid big jumps
                let c = (baumgarte * (separation + LINEAR_SLOP)).clamp(-MAX_LINEAR_CORRECTION, 0.0);

                let rn_a = m::cross(r_a, normal);
                let rn_b = m::cross(r_b, normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                let impulse = if k > 0.0 { -c / k } else { 0.0 };

                let p = impulse * normal;
                pos_a.c -= m_a * p;
                pos_a.a -= i_a * m::cross(r_a, p);
                pos_b.c += m_b * p;
                pos_b.a += i_b * m::cross(r_b, p);
            }

            positions[pc.index_a] = pos_a;
            positions[pc.index_b] = pos_b;
        }

        min_separation
    }
}

impl VelocityConstraint {
    /// Impulses of the last solve in the form given to contact listeners.
    pub(crate) fn impulse(&self) -> super::ContactImpulse {
        let mut impulse = super::ContactImpulse {
            count: self.point_count,
            ..Default::default()
        };
        for (j, vcp) in self.points[..self.point_count].iter().enumerate() {
            impulse.normal_impulses[j] = vcp.normal_impulse;
            impulse.tangent_impulses[j] = vcp.tangent_impulse;
        }
        impulse
    }
}
