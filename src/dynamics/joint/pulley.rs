use super::SolverBody;
use crate::{
    dynamics::{
        time_step::{Position, SolverData, Velocity},
        Body, BodyKey, World,
    },
    error::{PhysicsError, Result},
    math::{self as m, Rot, Vec2},
    settings::LINEAR_SLOP,
};

/// An idealized pulley: two bodies hang from fixed ground points and
/// `length_a + ratio * length_b` stays constant.
#[derive(Clone, Copy, Debug)]
pub struct PulleyJointDef {
    pub body_a: BodyKey,
    pub body_b: BodyKey,
    pub collide_connected: bool,
    pub user_data: u64,
    pub ground_anchor_a: Vec2,
    pub ground_anchor_b: Vec2,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Reference length of the segment attached to body A.
    pub length_a: f64,
    pub length_b: f64,
    /// Must be positive.
    pub ratio: f64,
}

impl PulleyJointDef {
    pub fn new(body_a: BodyKey, body_b: BodyKey) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: true,
            user_data: 0,
            ground_anchor_a: Vec2::new(-1.0, 1.0),
            ground_anchor_b: Vec2::new(1.0, 1.0),
            local_anchor_a: Vec2::new(-1.0, 0.0),
            local_anchor_b: Vec2::new(1.0, 0.0),
            length_a: 0.0,
            length_b: 0.0,
            ratio: 1.0,
        }
    }

    /// Set up the pulley from world ground anchors and world body anchors,
    /// taking the current segment lengths as the reference.
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        world: &World,
        body_a: BodyKey,
        body_b: BodyKey,
        ground_anchor_a: Vec2,
        ground_anchor_b: Vec2,
        anchor_a: Vec2,
        anchor_b: Vec2,
        ratio: f64,
    ) -> Result<Self> {
        if ratio <= f64::EPSILON {
            return Err(PhysicsError::InvalidJoint("pulley ratio must be positive"));
        }
        let (a, b) = world.body_pair(body_a, body_b)?;
        Ok(Self {
            ground_anchor_a,
            ground_anchor_b,
            local_anchor_a: a.local_point(anchor_a),
            local_anchor_b: b.local_point(anchor_b),
            length_a: m::distance(anchor_a, ground_anchor_a),
            length_b: m::distance(anchor_b, ground_anchor_b),
            ratio,
            ..Self::new(body_a, body_b)
        })
    }

    pub fn with_collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }
}

#[derive(Clone, Debug)]
pub struct PulleyJoint {
    pub(crate) ground_anchor_a: Vec2,
    pub(crate) ground_anchor_b: Vec2,
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    length_a: f64,
    length_b: f64,
    constant: f64,
    ratio: f64,
    impulse: f64,

    u_a: Vec2,
    u_b: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f64,
}

impl PulleyJoint {
    pub(super) fn new(def: &PulleyJointDef) -> Result<Self> {
        if def.ratio <= f64::EPSILON {
            return Err(PhysicsError::InvalidJoint("pulley ratio must be positive"));
        }
        Ok(Self {
            ground_anchor_a: def.ground_anchor_a,
            ground_anchor_b: def.ground_anchor_b,
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            length_a: def.length_a,
            length_b: def.length_b,
            constant: def.length_a + def.ratio * def.length_b,
            ratio: def.ratio,
            impulse: 0.0,
            u_a: Vec2::zero(),
            u_b: Vec2::zero(),
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            mass: 0.0,
        })
    }

    #[inline]
    pub fn ground_anchor_a(&self) -> Vec2 {
        self.ground_anchor_a
    }

    #[inline]
    pub fn ground_anchor_b(&self) -> Vec2 {
        self.ground_anchor_b
    }

    #[inline]
    pub fn length_a(&self) -> f64 {
        self.length_a
    }

    #[inline]
    pub fn length_b(&self) -> f64 {
        self.length_b
    }

    #[inline]
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn current_length_a(&self, body_a: &Body) -> f64 {
        m::distance(body_a.world_point(self.local_anchor_a), self.ground_anchor_a)
    }

    pub fn current_length_b(&self, body_b: &Body) -> f64 {
        m::distance(body_b.world_point(self.local_anchor_b), self.ground_anchor_b)
    }

    pub(super) fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        (inv_dt * self.impulse) * self.u_b
    }

    pub(super) fn init_velocity_constraints(
        &mut self,
        data: &mut SolverData,
        a: &SolverBody,
        b: &SolverBody,
    ) {
        let pos_a = data.positions[a.index];
        let pos_b = data.positions[b.index];
        let Velocity { v: mut v_a, w: mut w_a } = data.velocities[a.index];
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[b.index];

        let q_a = Rot::from_angle(pos_a.a);
        let q_b = Rot::from_angle(pos_b.a);

        self.r_a = q_a.apply(self.local_anchor_a - a.local_center);
        self.r_b = q_b.apply(self.local_anchor_b - b.local_center);

        self.u_a = pos_a.c + self.r_a - self.ground_anchor_a;
        self.u_b = pos_b.c + self.r_b - self.ground_anchor_b;
        normalize_segment(&mut self.u_a);
        normalize_segment(&mut self.u_b);

        let ru_a = m::cross(self.r_a, self.u_a);
        let ru_b = m::cross(self.r_b, self.u_b);
        let m_a = a.inv_mass + a.inv_i * ru_a * ru_a;
        let m_b = b.inv_mass + b.inv_i * ru_b * ru_b;

        self.mass = m_a + self.ratio * self.ratio * m_b;
        if self.mass > 0.0 {
            self.mass = 1.0 / self.mass;
        }

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;

            let p_a = -self.impulse * self.u_a;
            let p_b = (-self.ratio * self.impulse) * self.u_b;
            v_a += a.inv_mass * p_a;
            w_a += a.inv_i * m::cross(self.r_a, p_a);
            v_b += b.inv_mass * p_b;
            w_b += b.inv_i * m::cross(self.r_b, p_b);
        } else {
            self.impulse = 0.0;
        }

        data.velocities[a.index] = Velocity { v: v_a, w: w_a };
        data.velocities[b.index] = Velocity { v: v_b, w: w_b };
    }

    pub(super) fn solve_velocity_constraints(
        &mut self,
        data: &mut SolverData,
        a: &SolverBody,
        b: &SolverBody,
    ) {
        let Velocity { v: mut v_a, w: mut w_a } = data.velocities[a.index];
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[b.index];

        let vp_a = v_a + m::cross_sv(w_a, self.r_a);
        let vp_b = v_b + m::cross_sv(w_b, self.r_b);

        let cdot = -self.u_a.dot(vp_a) - self.ratio * self.u_b.dot(vp_b);
        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        let p_a = -impulse * self.u_a;
        let p_b = (-self.ratio * impulse) * self.u_b;
        v_a += a.inv_mass * p_a;
        w_a += a.inv_i * m::cross(self.r_a, p_a);
        v_b += b.inv_mass * p_b;
        w_b += b.inv_i * m::cross(self.r_b, p_b);

        data.velocities[a.index] = Velocity { v: v_a, w: w_a };
        data.velocities[b.index] = Velocity { v: v_b, w: w_b };
    }

    pub(super) fn solve_position_constraints(
        &mut self,
        data: &mut SolverData,
        a: &SolverBody,
        b: &SolverBody,
    ) -> bool {
        let Position { c: mut c_a, a: mut a_a } = data.positions[a.index];
        let Position { c: mut c_b, a: mut a_b } = data.positions[b.index];

        let q_a = Rot::from_angle(a_a);
        let q_b = Rot::from_angle(a_b);
        let r_a = q_a.apply(self.local_anchor_a - a.local_center);
        let r_b = q_b.apply(self.local_anchor_b - b.local_center);

        let mut u_a = c_a + r_a - self.ground_anchor_a;
        let mut u_b = c_b + r_b - self.ground_anchor_b;
        let length_a = normalize_segment(&mut u_a);
        let length_b = normalize_segment(&mut u_b);

        let ru_a = m::cross(r_a, u_a);
        let ru_b = m::cross(r_b, u_b);
        let m_a = a.inv_mass + a.inv_i * ru_a * ru_a;
        let m_b = b.inv_mass + b.inv_i * ru_b * ru_b;

        let mut mass = m_a + self.ratio * self.ratio * m_b;
        if mass > 0.0 {
            mass = 1.0 / mass;
        }

        let c = self.constant - length_a - self.ratio * length_b;
        let linear_error = c.abs();

        let impulse = -mass * c;
        let p_a = -impulse * u_a;
        let p_b = (-self.ratio * impulse) * u_b;

        c_a += a.inv_mass * p_a;
        a_a += a.inv_i * m::cross(r_a, p_a);
        c_b += b.inv_mass * p_b;
        a_b += b.inv_i * m::cross(r_b, p_b);

        data.positions[a.index] = Position { c: c_a, a: a_a };
        data.positions[b.index] = Position { c: c_b, a: a_b };

        linear_error < LINEAR_SLOP
    }
}

/// Normalize a rope segment, zeroing it when it is too short to have a direction.
/// Returns the length.
fn normalize_segment(u: &mut Vec2) -> f64 {
    let length = u.mag();
    if length > 10.0 * LINEAR_SLOP {
        *u *= 1.0 / length;
    } else {
        *u = Vec2::zero();
    }
    length
}
