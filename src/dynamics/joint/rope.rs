use super::{LimitState, SolverBody};
use crate::{
    dynamics::{
        time_step::{Position, SolverData, Velocity},
        BodyKey,
    },
    math::{self as m, Rot, Vec2},
    settings::{LINEAR_SLOP, MAX_LINEAR_CORRECTION},
};

/// Caps the distance between two anchor points without resisting compression.
#[derive(Clone, Copy, Debug)]
pub struct RopeJointDef {
    pub body_a: BodyKey,
    pub body_b: BodyKey,
    pub collide_connected: bool,
    pub user_data: u64,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Should be larger than [`LINEAR_SLOP`][crate::settings::LINEAR_SLOP].
    pub max_length: f64,
}

impl RopeJointDef {
    pub fn new(body_a: BodyKey, body_b: BodyKey) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            local_anchor_a: Vec2::new(-1.0, 0.0),
            local_anchor_b: Vec2::new(1.0, 0.0),
            max_length: 0.0,
        }
    }

    pub fn with_local_anchors(mut self, anchor_a: Vec2, anchor_b: Vec2) -> Self {
        self.local_anchor_a = anchor_a;
        self.local_anchor_b = anchor_b;
        self
    }

    pub fn with_max_length(mut self, length: f64) -> Self {
        self.max_length = length;
        self
    }

    pub fn with_collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }
}

#[derive(Clone, Debug)]
pub struct RopeJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    max_length: f64,
    length: f64,
    impulse: f64,
    state: LimitState,

    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f64,
}

impl RopeJoint {
    pub(super) fn new(def: &RopeJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            max_length: def.max_length,
            length: 0.0,
            impulse: 0.0,
            state: LimitState::Inactive,
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
    pub fn max_length(&self) -> f64 {
        self.max_length
    }

    #[inline]
    pub fn set_max_length(&mut self, length: f64) {
        self.max_length = length;
    }

    /// `AtUpper` while the rope is taut.
    #[inline]
    pub fn limit_state(&self) -> LimitState {
        self.state
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

        self.length = self.u.mag();

        let c = self.length - self.max_length;
        self.state = if c > 0.0 {
            LimitState::AtUpper
        } else {
            LimitState::Inactive
        };

        if self.length > LINEAR_SLOP {
            self.u *= 1.0 / self.length;
        } else {
            self.u = Vec2::zero();
            self.mass = 0.0;
            self.impulse = 0.0;
            return;
        }

        let cr_a = m::cross(self.r_a, self.u);
        let cr_b = m::cross(self.r_b, self.u);
        let inv_mass = a.inv_mass + a.inv_i * cr_a * cr_a + b.inv_mass + b.inv_i * cr_b * cr_b;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if data.step.warm_starting {
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

        let vp_a = v_a + m::cross_sv(w_a, self.r_a);
        let vp_b = v_b + m::cross_sv(w_b, self.r_b);
        let c = self.length - self.max_length;
        let mut cdot = self.u.dot(vp_b - vp_a);

        // predictive constraint
        if c < 0.0 {
            cdot += data.step.inv_dt * c;
        }

        let impulse = -self.mass * cdot;
        let old_impulse = self.impulse;
        self.impulse = (self.impulse + impulse).min(0.0);
        let impulse = self.impulse - old_impulse;

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
        let Position { c: mut c_a, a: mut a_a } = data.positions[a.index];
        let Position { c: mut c_b, a: mut a_b } = data.positions[b.index];

        let q_a = Rot::from_angle(a_a);
        let q_b = Rot::from_angle(a_b);
        let r_a = q_a.apply(self.local_anchor_a - a.local_center);
        let r_b = q_b.apply(self.local_anchor_b - b.local_center);
        let mut u = c_b + r_b - c_a - r_a;

        let length = m::normalize(&mut u);
        let c = (length - self.max_length).clamp(0.0, MAX_LINEAR_CORRECTION);

        let impulse = -self.mass * c;
        let p = impulse * u;

        c_a -= a.inv_mass * p;
        a_a -= a.inv_i * m::cross(r_a, p);
        c_b += b.inv_mass * p;
        a_b += b.inv_i * m::cross(r_b, p);

        data.positions[a.index] = Position { c: c_a, a: a_a };
        data.positions[b.index] = Position { c: c_b, a: a_b };

        length - self.max_length < LINEAR_SLOP
    }
}
