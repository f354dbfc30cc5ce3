use super::{point_mass, SolverBody};
use crate::{
    dynamics::{
        time_step::{SolverData, Velocity},
        BodyKey, World,
    },
    error::Result,
    math::{self as m, Mat22, Rot, Vec2},
};

/// Drives body B towards a target offset relative to body A,
/// limited by a maximum force and torque. Typically used to move a body
/// relative to the ground.
#[derive(Clone, Copy, Debug)]
pub struct MotorJointDef {
    pub body_a: BodyKey,
    pub body_b: BodyKey,
    pub collide_connected: bool,
    pub user_data: u64,
    /// Position of body B minus the position of body A, in body A's frame.
    pub linear_offset: Vec2,
    /// Angle of body B minus the angle of body A.
    pub angular_offset: f64,
    pub max_force: f64,
    pub max_torque: f64,
    /// Position correction factor in [0, 1].
    pub correction_factor: f64,
}

impl MotorJointDef {
    pub fn new(body_a: BodyKey, body_b: BodyKey) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            linear_offset: Vec2::zero(),
            angular_offset: 0.0,
            max_force: 1.0,
            max_torque: 1.0,
            correction_factor: 0.3,
        }
    }

    /// Use the current relative placement of the bodies as the target.
    pub fn init(world: &World, body_a: BodyKey, body_b: BodyKey) -> Result<Self> {
        let (a, b) = world.body_pair(body_a, body_b)?;
        Ok(Self {
            linear_offset: a.local_point(b.position()),
            angular_offset: b.angle() - a.angle(),
            ..Self::new(body_a, body_b)
        })
    }

    pub fn with_offsets(mut self, linear: Vec2, angular: f64) -> Self {
        self.linear_offset = linear;
        self.angular_offset = angular;
        self
    }

    pub fn with_max_force(mut self, force: f64) -> Self {
        self.max_force = force;
        self
    }

    pub fn with_max_torque(mut self, torque: f64) -> Self {
        self.max_torque = torque;
        self
    }

    pub fn with_correction_factor(mut self, factor: f64) -> Self {
        self.correction_factor = factor;
        self
    }
}

#[derive(Clone, Debug)]
pub struct MotorJoint {
    linear_offset: Vec2,
    angular_offset: f64,
    linear_impulse: Vec2,
    angular_impulse: f64,
    max_force: f64,
    max_torque: f64,
    correction_factor: f64,

    r_a: Vec2,
    r_b: Vec2,
    linear_error: Vec2,
    angular_error: f64,
    linear_mass: Mat22,
    angular_mass: f64,
}

impl MotorJoint {
    pub(super) fn new(def: &MotorJointDef) -> Self {
        Self {
            linear_offset: def.linear_offset,
            angular_offset: def.angular_offset,
            linear_impulse: Vec2::zero(),
            angular_impulse: 0.0,
            max_force: def.max_force,
            max_torque: def.max_torque,
            correction_factor: def.correction_factor.clamp(0.0, 1.0),
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            linear_error: Vec2::zero(),
            angular_error: 0.0,
            linear_mass: Mat22::zero(),
            angular_mass: 0.0,
        }
    }

    #[inline]
    pub fn linear_offset(&self) -> Vec2 {
        self.linear_offset
    }

    #[inline]
    pub fn set_linear_offset(&mut self, offset: Vec2) {
        self.linear_offset = offset;
    }

    #[inline]
    pub fn angular_offset(&self) -> f64 {
        self.angular_offset
    }

    #[inline]
    pub fn set_angular_offset(&mut self, offset: f64) {
        self.angular_offset = offset;
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
    pub fn max_torque(&self) -> f64 {
        self.max_torque
    }

    #[inline]
    pub fn set_max_torque(&mut self, torque: f64) {
        self.max_torque = torque;
    }

    #[inline]
    pub fn correction_factor(&self) -> f64 {
        self.correction_factor
    }

    /// Clamped to `[0, 1]`.
    #[inline]
    pub fn set_correction_factor(&mut self, factor: f64) {
        self.correction_factor = factor.clamp(0.0, 1.0);
    }

    pub(super) fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        inv_dt * self.linear_impulse
    }

    pub(super) fn reaction_torque(&self, inv_dt: f64) -> f64 {
        inv_dt * self.angular_impulse
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

        // anchors at the body origins
        self.r_a = q_a.apply(-a.local_center);
        self.r_b = q_b.apply(-b.local_center);
        self.linear_mass = point_mass(a, b, self.r_a, self.r_b).inverse();

        self.angular_mass = a.inv_i + b.inv_i;
        if self.angular_mass > 0.0 {
            self.angular_mass = 1.0 / self.angular_mass;
        }

        self.linear_error =
            pos_b.c + self.r_b - pos_a.c - self.r_a - q_a.apply(self.linear_offset);
        self.angular_error = pos_b.a - pos_a.a - self.angular_offset;

        if data.step.warm_starting {
            self.linear_impulse *= data.step.dt_ratio;
            self.angular_impulse *= data.step.dt_ratio;

            let p = self.linear_impulse;
            v_a -= a.inv_mass * p;
            w_a -= a.inv_i * (m::cross(self.r_a, p) + self.angular_impulse);
            v_b += b.inv_mass * p;
            w_b += b.inv_i * (m::cross(self.r_b, p) + self.angular_impulse);
        } else {
            self.linear_impulse = Vec2::zero();
            self.angular_impulse = 0.0;
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

        let h = data.step.dt;
        let inv_h = data.step.inv_dt;

        // angular
        {
            let cdot = w_b - w_a + inv_h * self.correction_factor * self.angular_error;
            let impulse = -self.angular_mass * cdot;

            let old_impulse = self.angular_impulse;
            let max_impulse = h * self.max_torque;
            self.angular_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.angular_impulse - old_impulse;

            w_a -= a.inv_i * impulse;
            w_b += b.inv_i * impulse;
        }

        // linear
        {
            let cdot = v_b + m::cross_sv(w_b, self.r_b)
                - v_a
                - m::cross_sv(w_a, self.r_a)
                + inv_h * self.correction_factor * self.linear_error;
            let impulse = -self.linear_mass.mul_vec(cdot);

            let old_impulse = self.linear_impulse;
            self.linear_impulse += impulse;
            let max_impulse = h * self.max_force;
            if self.linear_impulse.mag_sq() > max_impulse * max_impulse {
                self.linear_impulse = max_impulse * self.linear_impulse.normalized();
            }
            let impulse = self.linear_impulse - old_impulse;

            v_a -= a.inv_mass * impulse;
            w_a -= a.inv_i * m::cross(self.r_a, impulse);
            v_b += b.inv_mass * impulse;
            w_b += b.inv_i * m::cross(self.r_b, impulse);
        }

        data.velocities[a.index] = Velocity { v: v_a, w: w_a };
        data.velocities[b.index] = Velocity { v: v_b, w: w_b };
    }
}
