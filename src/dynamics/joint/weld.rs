use super::{point_angle_mass, soft_constraint, SolverBody};
use crate::{
    dynamics::{
        time_step::{Position, SolverData, Velocity},
        BodyKey, World,
    },
    error::Result,
    math::{self as m, Mat33, Rot, Vec2, Vec3},
    settings::{ANGULAR_SLOP, LINEAR_SLOP},
};

/// Glues two bodies together. A nonzero frequency makes the angular
/// part of the weld springy.
#[derive(Clone, Copy, Debug)]
pub struct WeldJointDef {
    pub body_a: BodyKey,
    pub body_b: BodyKey,
    pub collide_connected: bool,
    pub user_data: u64,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub reference_angle: f64,
    /// Zero for a rigid weld.
    pub frequency_hz: f64,
    pub damping_ratio: f64,
}

impl WeldJointDef {
    pub fn new(body_a: BodyKey, body_b: BodyKey) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            local_anchor_a: Vec2::zero(),
            local_anchor_b: Vec2::zero(),
            reference_angle: 0.0,
            frequency_hz: 0.0,
            damping_ratio: 0.0,
        }
    }

    /// Weld the bodies at a world anchor in their current relative pose.
    pub fn init(world: &World, body_a: BodyKey, body_b: BodyKey, anchor: Vec2) -> Result<Self> {
        let (a, b) = world.body_pair(body_a, body_b)?;
        Ok(Self {
            local_anchor_a: a.local_point(anchor),
            local_anchor_b: b.local_point(anchor),
            reference_angle: b.angle() - a.angle(),
            ..Self::new(body_a, body_b)
        })
    }

    pub fn with_local_anchors(mut self, anchor_a: Vec2, anchor_b: Vec2) -> Self {
        self.local_anchor_a = anchor_a;
        self.local_anchor_b = anchor_b;
        self
    }

    pub fn with_reference_angle(mut self, angle: f64) -> Self {
        self.reference_angle = angle;
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
pub struct WeldJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    reference_angle: f64,
    frequency_hz: f64,
    damping_ratio: f64,
    gamma: f64,
    bias: f64,
    impulse: Vec3,

    r_a: Vec2,
    r_b: Vec2,
    mass: Mat33,
}

impl WeldJoint {
    pub(super) fn new(def: &WeldJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            gamma: 0.0,
            bias: 0.0,
            impulse: Vec3::zero(),
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            mass: Mat33::zero(),
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
    pub fn reference_angle(&self) -> f64 {
        self.reference_angle
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
        inv_dt * self.impulse.xy()
    }

    pub(super) fn reaction_torque(&self, inv_dt: f64) -> f64 {
        inv_dt * self.impulse.z
    }

    pub(super) fn init_velocity_constraints(
        &mut self,
        data: &mut SolverData,
        a: &SolverBody,
        b: &SolverBody,
    ) {
        let a_a = data.positions[a.index].a;
        let a_b = data.positions[b.index].a;
        let Velocity { v: mut v_a, w: mut w_a } = data.velocities[a.index];
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[b.index];
        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);

        let q_a = Rot::from_angle(a_a);
        let q_b = Rot::from_angle(a_b);
        self.r_a = q_a.apply(self.local_anchor_a - a.local_center);
        self.r_b = q_b.apply(self.local_anchor_b - b.local_center);

        let k = point_angle_mass(a, b, self.r_a, self.r_b);

        if self.frequency_hz > 0.0 {
            self.mass = k.get_inverse22();

            let mut inv_m = i_a + i_b;
            let mass = if inv_m > 0.0 { 1.0 / inv_m } else { 0.0 };
            let c = a_b - a_a - self.reference_angle;
            let (gamma, bias) =
                soft_constraint(mass, self.frequency_hz, self.damping_ratio, c, data.step.dt);
            self.gamma = gamma;
            self.bias = bias;

            inv_m += self.gamma;
            self.mass.ez.z = if inv_m != 0.0 { 1.0 / inv_m } else { 0.0 };
        } else {
            self.mass = if k.ez.z == 0.0 {
                k.get_inverse22()
            } else {
                k.get_sym_inverse33()
            };
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if data.step.warm_starting {
            self.impulse = data.step.dt_ratio * self.impulse;

            let p = self.impulse.xy();
            v_a -= m_a * p;
            w_a -= i_a * (m::cross(self.r_a, p) + self.impulse.z);
            v_b += m_b * p;
            w_b += i_b * (m::cross(self.r_b, p) + self.impulse.z);
        } else {
            self.impulse = Vec3::zero();
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
        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);

        if self.frequency_hz > 0.0 {
            let cdot2 = w_b - w_a;
            let impulse2 = -self.mass.ez.z * (cdot2 + self.bias + self.gamma * self.impulse.z);
            self.impulse.z += impulse2;

            w_a -= i_a * impulse2;
            w_b += i_b * impulse2;

            let cdot1 = v_b + m::cross_sv(w_b, self.r_b) - v_a - m::cross_sv(w_a, self.r_a);
            let impulse1 = -self.mass.mul_vec2(cdot1);
            self.impulse.x += impulse1.x;
            self.impulse.y += impulse1.y;

            v_a -= m_a * impulse1;
            w_a -= i_a * m::cross(self.r_a, impulse1);
            v_b += m_b * impulse1;
            w_b += i_b * m::cross(self.r_b, impulse1);
        } else {
            let cdot1 = v_b + m::cross_sv(w_b, self.r_b) - v_a - m::cross_sv(w_a, self.r_a);
            let cdot2 = w_b - w_a;
            let cdot = Vec3::new(cdot1.x, cdot1.y, cdot2);

            let impulse = -self.mass.mul_vec(cdot);
            self.impulse += impulse;

            let p = impulse.xy();
            v_a -= m_a * p;
            w_a -= i_a * (m::cross(self.r_a, p) + impulse.z);
            v_b += m_b * p;
            w_b += i_b * (m::cross(self.r_b, p) + impulse.z);
        }

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
        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);

        let q_a = Rot::from_angle(a_a);
        let q_b = Rot::from_angle(a_b);
        let r_a = q_a.apply(self.local_anchor_a - a.local_center);
        let r_b = q_b.apply(self.local_anchor_b - b.local_center);

        let k = point_angle_mass(a, b, r_a, r_b);
        let c1 = c_b + r_b - c_a - r_a;
        let position_error = c1.mag();
        let angular_error;

        if self.frequency_hz > 0.0 {
            angular_error = 0.0;
            let p = -k.solve22(c1);

            c_a -= m_a * p;
            a_a -= i_a * m::cross(r_a, p);
            c_b += m_b * p;
            a_b += i_b * m::cross(r_b, p);
        } else {
            let c2 = a_b - a_a - self.reference_angle;
            angular_error = c2.abs();

            let impulse = if k.ez.z > 0.0 {
                -k.solve33(Vec3::new(c1.x, c1.y, c2))
            } else {
                let impulse2 = -k.solve22(c1);
                Vec3::new(impulse2.x, impulse2.y, 0.0)
            };

            let p = impulse.xy();
            c_a -= m_a * p;
            a_a -= i_a * (m::cross(r_a, p) + impulse.z);
            c_b += m_b * p;
            a_b += i_b * (m::cross(r_b, p) + impulse.z);
        }

        data.positions[a.index] = Position { c: c_a, a: a_a };
        data.positions[b.index] = Position { c: c_b, a: a_b };

        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}
