use super::{soft_constraint, SolverBody};
use crate::{
    dynamics::{
        time_step::{SolverData, Velocity},
        BodyKey, World,
    },
    error::Result,
    math::{self as m, Rot, Vec2},
    settings::{LINEAR_SLOP, MAX_LINEAR_CORRECTION},
};

/// Keeps two anchor points at a fixed distance, like a massless rigid rod.
/// Giving it a frequency turns it into a spring.
#[derive(Clone, Copy, Debug)]
pub struct DistanceJointDef {
    pub body_a: BodyKey,
    pub body_b: BodyKey,
    pub collide_connected: bool,
    pub user_data: u64,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Rest length. Should not be close to zero.
    pub length: f64,
    /// Mass-spring-damper frequency in Hz, zero for a rigid rod.
    pub frequency_hz: f64,
    /// 0 = no damping, 1 = critical damping.
    pub damping_ratio: f64,
}

impl DistanceJointDef {
    pub fn new(body_a: BodyKey, body_b: BodyKey) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            local_anchor_a: Vec2::zero(),
            local_anchor_b: Vec2::zero(),
            length: 1.0,
            frequency_hz: 0.0,
            damping_ratio: 0.0,
        }
    }

    /// Connect two world anchor points, using their current distance as the rest length.
    pub fn init(
        world: &World,
        body_a: BodyKey,
        body_b: BodyKey,
        anchor_a: Vec2,
        anchor_b: Vec2,
    ) -> Result<Self> {
        let (a, b) = world.body_pair(body_a, body_b)?;
        Ok(Self {
            local_anchor_a: a.local_point(anchor_a),
            local_anchor_b: b.local_point(anchor_b),
            length: m::distance(anchor_a, anchor_b),
            ..Self::new(body_a, body_b)
        })
    }

    pub fn with_local_anchors(mut self, anchor_a: Vec2, anchor_b: Vec2) -> Self {
        self.local_anchor_a = anchor_a;
        self.local_anchor_b = anchor_b;
        self
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = length;
        self
    }

    pub fn with_spring(mut self, frequency_hz: f64, damping_ratio: f64) -> Self {
        self.frequency_hz = frequency_hz;
        self.damping_ratio = damping_ratio;
        self
    }

    pub fn with_collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }
}

#[derive(Clone, Debug)]
pub struct DistanceJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    length: f64,
    frequency_hz: f64,
    damping_ratio: f64,
    gamma: f64,
    bias: f64,
    impulse: f64,

    // solver temporaries
    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f64,
}

impl DistanceJoint {
    pub(super) fn new(def: &DistanceJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            length: def.length,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            gamma: 0.0,
            bias: 0.0,
            impulse: 0.0,
            u: Vec2::zero(),
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            mass: 0.0,
        }
    }

    #[inline]
    pub fn local_anchor_a(&self) -> Vec2 {
        self.local_anchor_a
    }

    #[inline]
    pub fn local_anchor_b(&self) -> Vec2 {
        self.local_anchor_b
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    #[inline]
    pub fn set_length(&mut self, length: f64) {
        self.length = length;
    }

    #[inline]
    pub fn frequency(&self) -> f64 {
        self.frequency_hz
    }

    #[inline]
    pub fn set_frequency(&mut self, hz: f64) {
        self.frequency_hz = hz;
    }

    #[inline]
    pub fn damping_ratio(&self) -> f64 {
        self.damping_ratio
    }

    #[inline]
    pub fn set_damping_ratio(&mut self, ratio: f64) {
        self.damping_ratio = ratio;
    }

    pub(super) fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        (inv_dt * self.impulse) * self.u
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
        self.u = pos_b.c + self.r_b - pos_a.c - self.r_a;

        // handle singularity
        let length = self.u.mag();
        if length > LINEAR_SLOP {
            self.u *= 1.0 / length;
        } else {
            self.u = Vec2::zero();
        }

        let cr_a = m::cross(self.r_a, self.u);
        let cr_b = m::cross(self.r_b, self.u);
        let mut inv_mass =
            a.inv_mass + a.inv_i * cr_a * cr_a + b.inv_mass + b.inv_i * cr_b * cr_b;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if self.frequency_hz > 0.0 {
            let c = length - self.length;
            let (gamma, bias) = soft_constraint(
                self.mass,
                self.frequency_hz,
                self.damping_ratio,
                c,
                data.step.dt,
            );
            self.gamma = gamma;
            self.bias = bias;

            inv_mass += self.gamma;
            self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if data.step.warm_starting {
            // scale the impulse to support a variable time step
            self.impulse *= data.step.dt_ratio;

            let p = self.impulse * self.u;
            v_a -= a.inv_mass * p;
            w_a -= a.inv_i * m::cross(self.r_a, p);
            v_b += b.inv_mass * p;
            w_b += b.inv_i * m::cross(self.r_b, p);
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

        // Cdot = dot(u, v + cross(w, r))
        let vp_a = v_a + m::cross_sv(w_a, self.r_a);
        let vp_b = v_b + m::cross_sv(w_b, self.r_b);
        let cdot = self.u.dot(vp_b - vp_a);

        let impulse = -self.mass * (cdot + self.bias + self.gamma * self.impulse);
        self.impulse += impulse;

        let p = impulse * self.u;
        v_a -= a.inv_mass * p;
        w_a -= a.inv_i * m::cross(self.r_a, p);
        v_b += b.inv_mass * p;
        w_b += b.inv_i * m::cross(self.r_b, p);

        data.velocities[a.index] = Velocity { v: v_a, w: w_a };
        data.velocities[b.index] = Velocity { v: v_b, w: w_b };
    }

    pub(super) fn solve_position_constraints(
        &mut self,
        data: &mut SolverData,
        a: &SolverBody,
        b: &SolverBody,
    ) -> bool {
        // springs have no position correction
        if self.frequency_hz > 0.0 {
            return true;
        }

        let mut pos_a = data.positions[a.index];
        let mut pos_b = data.positions[b.index];
        let q_a = Rot::from_angle(pos_a.a);
        let q_b = Rot::from_angle(pos_b.a);

        let r_a = q_a.apply(self.local_anchor_a - a.local_center);
        let r_b = q_b.apply(self.local_anchor_b - b.local_center);
        let mut u = pos_b.c + r_b - pos_a.c - r_a;

        let length = m::normalize(&mut u);
        let c = (length - self.length).clamp(-MAX_LINEAR_CORRECTION, MAX_LINEAR_CORRECTION);

        let impulse = -self.mass * c;
        let p = impulse * u;

        pos_a.c -= a.inv_mass * p;
        pos_a.a -= a.inv_i * m::cross(r_a, p);
        pos_b.c += b.inv_mass * p;
        pos_b.a += b.inv_i * m::cross(r_b, p);

        data.positions[a.index] = pos_a;
        data.positions[b.index] = pos_b;

        c.abs() < LINEAR_SLOP
    }
}
