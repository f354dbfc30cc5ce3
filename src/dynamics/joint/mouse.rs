use super::{soft_constraint, SolverBody};
use crate::{
    dynamics::{
        time_step::{SolverData, Velocity},
        Body, BodyKey,
    },
    math::{self as m, Mat22, Rot, Vec2},
};

/// Pulls a point on body B towards a world target with a soft spring,
/// for dragging bodies around with the mouse. Body A is not simulated
/// but the joint still needs one, usually a static ground body.
#[derive(Clone, Copy, Debug)]
pub struct MouseJointDef {
    pub body_a: BodyKey,
    pub body_b: BodyKey,
    pub collide_connected: bool,
    pub user_data: u64,
    /// Initial world target. The point on body B under the target
    /// becomes the anchor.
    pub target: Vec2,
    /// Usually a multiple of the weight of body B.
    pub max_force: f64,
    pub frequency_hz: f64,
    pub damping_ratio: f64,
}

impl MouseJointDef {
    pub fn new(body_a: BodyKey, body_b: BodyKey, target: Vec2) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            target,
            max_force: 0.0,
            frequency_hz: 5.0,
            damping_ratio: 0.7,
        }
    }

    pub fn with_max_force(mut self, force: f64) -> Self {
        self.max_force = force;
        self
    }

    pub fn with_spring(mut self, frequency_hz: f64, damping_ratio: f64) -> Self {
        self.frequency_hz = frequency_hz;
        self.damping_ratio = damping_ratio;
        self
    }
}

#[derive(Clone, Debug)]
pub struct MouseJoint {
    pub(crate) local_anchor_b: Vec2,
    pub(crate) target: Vec2,
    frequency_hz: f64,
    damping_ratio: f64,
    beta: f64,
    impulse: Vec2,
    max_force: f64,
    gamma: f64,

    r_b: Vec2,
    mass: Mat22,
    c: Vec2,
}

impl MouseJoint {
    pub(super) fn new(def: &MouseJointDef, body_b: &Body) -> Self {
        debug_assert!(m::is_valid_vec(def.target));
        debug_assert!(def.max_force >= 0.0 && def.frequency_hz >= 0.0);
        Self {
            local_anchor_b: body_b.local_point(def.target),
            target: def.target,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            beta: 0.0,
            impulse: Vec2::zero(),
            max_force: def.max_force,
            gamma: 0.0,
            r_b: Vec2::zero(),
            mass: Mat22::zero(),
            c: Vec2::zero(),
        }
    }

    #[inline]
    pub fn target(&self) -> Vec2 {
        self.target
    }

    /// Move the target. Set through [`World::modify_joint`][crate::World::modify_joint]
    /// so that the dragged body wakes up.
    #[inline]
    pub fn set_target(&mut self, target: Vec2) {
        self.target = target;
    }

    #[inline]
    pub fn max_force(&self) -> f64 {
        self.max_force
    }

    #[inline]
    pub fn set_max_force(&mut self, force: f64) {
        self.max_force = force;
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
        inv_dt * self.impulse
    }

    pub(super) fn init_velocity_constraints(&mut self, data: &mut SolverData, b: &SolverBody) {
        let pos_b = data.positions[b.index];
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[b.index];
        let q_b = Rot::from_angle(pos_b.a);

        let mass = if b.inv_mass > 0.0 {
            1.0 / b.inv_mass
        } else {
            0.0
        };
        let (gamma, beta) =
            soft_constraint(mass, self.frequency_hz, self.damping_ratio, 1.0, data.step.dt);
        self.gamma = gamma;
        self.beta = beta;

        // K = [(1/m_b) * eye(2) - skew(r_b) * inv_i_b * skew(r_b)] + gamma * eye(2)
        self.r_b = q_b.apply(self.local_anchor_b - b.local_center);
        let (r_b, i_b) = (self.r_b, b.inv_i);
        let k = Mat22::new(
            Vec2::new(
                b.inv_mass + i_b * r_b.y * r_b.y + self.gamma,
                -i_b * r_b.x * r_b.y,
            ),
            Vec2::new(
                -i_b * r_b.x * r_b.y,
                b.inv_mass + i_b * r_b.x * r_b.x + self.gamma,
            ),
        );
        self.mass = k.inverse();

        self.c = self.beta * (pos_b.c + self.r_b - self.target);

        // a little extra angular damping keeps dragged bodies from spinning forever
        w_b *= 0.98;

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            v_b += b.inv_mass * self.impulse;
            w_b += b.inv_i * m::cross(self.r_b, self.impulse);
        } else {
            self.impulse = Vec2::zero();
        }

        data.velocities[b.index] = Velocity { v: v_b, w: w_b };
    }

    pub(super) fn solve_velocity_constraints(&mut self, data: &mut SolverData, b: &SolverBody) {
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[b.index];

        // Cdot = v + cross(w, r)
        let cdot = v_b + m::cross_sv(w_b, self.r_b);
        let impulse = self
            .mass
            .mul_vec(-(cdot + self.c + self.gamma * self.impulse));

        let old_impulse = self.impulse;
        self.impulse += impulse;
        let max_impulse = data.step.dt * self.max_force;
        if self.impulse.mag_sq() > max_impulse * max_impulse {
            self.impulse *= max_impulse / self.impulse.mag();
        }
        let impulse = self.impulse - old_impulse;

        v_b += b.inv_mass * impulse;
        w_b += b.inv_i * m::cross(self.r_b, impulse);

        data.velocities[b.index] = Velocity { v: v_b, w: w_b };
    }
}
