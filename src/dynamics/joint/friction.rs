use super::{point_mass, SolverBody};
use crate::{
    dynamics::{
        time_step::{SolverData, Velocity},
        BodyKey, World,
    },
    error::Result,
    math::{self as m, Mat22, Rot, Vec2},
};

/// Top-down friction: resists relative translation and rotation
/// up to a maximum force and torque.
#[derive(Clone, Copy, Debug)]
pub struct FrictionJointDef {
    pub body_a: BodyKey,
    pub body_b: BodyKey,
    pub collide_connected: bool,
    pub user_data: u64,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub max_force: f64,
    pub max_torque: f64,
}

impl FrictionJointDef {
    pub fn new(body_a: BodyKey, body_b: BodyKey) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            local_anchor_a: Vec2::zero(),
            local_anchor_b: Vec2::zero(),
            max_force: 0.0,
            max_torque: 0.0,
        }
    }

    /// Anchor both bodies at the same world point.
    pub fn init(world: &World, body_a: BodyKey, body_b: BodyKey, anchor: Vec2) -> Result<Self> {
        let (a, b) = world.body_pair(body_a, body_b)?;
        Ok(Self {
            local_anchor_a: a.local_point(anchor),
            local_anchor_b: b.local_point(anchor),
            ..Self::new(body_a, body_b)
        })
    }

    pub fn with_max_force(mut self, force: f64) -> Self {
        self.max_force = force;
        self
    }

    pub fn with_max_torque(mut self, torque: f64) -> Self {
        self.max_torque = torque;
        self
    }

    pub fn with_collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }
}

#[derive(Clone, Debug)]
pub struct FrictionJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    linear_impulse: Vec2,
    angular_impulse: f64,
    max_force: f64,
    max_torque: f64,

    r_a: Vec2,
    r_b: Vec2,
    linear_mass: Mat22,
    angular_mass: f64,
}

impl FrictionJoint {
    pub(super) fn new(def: &FrictionJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            linear_impulse: Vec2::zero(),
            angular_impulse: 0.0,
            max_force: def.max_force.max(0.0),
            max_torque: def.max_torque.max(0.0),
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            linear_mass: Mat22::zero(),
            angular_mass: 0.0,
        }
    }

    #[inline]
    pub fn max_force(&self) -> f64 {
        self.max_force
    }

    /// Negative values are treated as zero.
    #[inline]
    pub fn set_max_force(&mut self, force: f64) {
        self.max_force = force.max(0.0);
    }

    #[inline]
    pub fn max_torque(&self) -> f64 {
        self.max_torque
    }

    /// Negative values are treated as zero.
    #[inline]
    pub fn set_max_torque(&mut self, torque: f64) {
        self.max_torque = torque.max(0.0);
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
        let Velocity { v: mut v_a, w: mut w_a } = data.velocities[a.index];
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[b.index];
        let q_a = Rot::from_angle(data.positions[a.index].a);
        let q_b = Rot::from_angle(data.positions[b.index].a);

        self.r_a = q_a.apply(self.local_anchor_a - a.local_center);
        self.r_b = q_b.apply(self.local_anchor_b - b.local_center);
        self.linear_mass = point_mass(a, b, self.r_a, self.r_b).inverse();

        self.angular_mass = a.inv_i + b.inv_i;
        if self.angular_mass > 0.0 {
            self.angular_mass = 1.0 / self.angular_mass;
        }

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

        // angular friction
        {
            let cdot = w_b - w_a;
            let impulse = -self.angular_mass * cdot;

            let old_impulse = self.angular_impulse;
            let max_impulse = h * self.max_torque;
            self.angular_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.angular_impulse - old_impulse;

            w_a -= a.inv_i * impulse;
            w_b += b.inv_i * impulse;
        }

        // linear friction
        {
            let cdot = v_b + m::cross_sv(w_b, self.r_b) - v_a - m::cross_sv(w_a, self.r_a);
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
