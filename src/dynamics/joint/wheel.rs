use super::{soft_constraint, SolverBody};
use crate::{
    dynamics::{
        time_step::{Position, SolverData, Velocity},
        Body, BodyKey, World,
    },
    error::Result,
    math::{self as m, Rot, Vec2},
    settings::LINEAR_SLOP,
};

/// A wheel on a suspension: body B stays on a line fixed in body A,
/// with a spring along the line and an optional rotational motor.
#[derive(Clone, Copy, Debug)]
pub struct WheelJointDef {
    pub body_a: BodyKey,
    pub body_b: BodyKey,
    pub collide_connected: bool,
    pub user_data: u64,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Suspension axis in body A's frame. Normalized on creation.
    pub local_axis_a: Vec2,
    pub enable_motor: bool,
    pub max_motor_torque: f64,
    pub motor_speed: f64,
    /// Suspension frequency, zero disables the spring.
    pub frequency_hz: f64,
    pub damping_ratio: f64,
}

impl WheelJointDef {
    pub fn new(body_a: BodyKey, body_b: BodyKey) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            local_anchor_a: Vec2::zero(),
            local_anchor_b: Vec2::zero(),
            local_axis_a: Vec2::unit_x(),
            enable_motor: false,
            max_motor_torque: 0.0,
            motor_speed: 0.0,
            frequency_hz: 2.0,
            damping_ratio: 0.7,
        }
    }

    /// Attach the wheel at a world anchor with a world suspension axis.
    pub fn init(
        world: &World,
        body_a: BodyKey,
        body_b: BodyKey,
        anchor: Vec2,
        axis: Vec2,
    ) -> Result<Self> {
        let (a, b) = world.body_pair(body_a, body_b)?;
        Ok(Self {
            local_anchor_a: a.local_point(anchor),
            local_anchor_b: b.local_point(anchor),
            local_axis_a: a.local_vector(axis),
            ..Self::new(body_a, body_b)
        })
    }

    pub fn with_local_anchors(mut self, anchor_a: Vec2, anchor_b: Vec2) -> Self {
        self.local_anchor_a = anchor_a;
        self.local_anchor_b = anchor_b;
        self
    }

    pub fn with_local_axis(mut self, axis: Vec2) -> Self {
        self.local_axis_a = axis;
        self
    }

    pub fn with_motor(mut self, speed: f64, max_torque: f64) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_torque = max_torque;
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
pub struct WheelJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    local_x_axis_a: Vec2,
    local_y_axis_a: Vec2,

    impulse: f64,
    motor_impulse: f64,
    spring_impulse: f64,

    max_motor_torque: f64,
    motor_speed: f64,
    enable_motor: bool,
    frequency_hz: f64,
    damping_ratio: f64,

    ax: Vec2,
    ay: Vec2,
    s_ax: f64,
    s_bx: f64,
    s_ay: f64,
    s_by: f64,
    mass: f64,
    motor_mass: f64,
    spring_mass: f64,
    bias: f64,
    gamma: f64,
}

impl WheelJoint {
    pub(super) fn new(def: &WheelJointDef) -> Self {
        let local_x_axis_a = def.local_axis_a.normalized();
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            local_x_axis_a,
            local_y_axis_a: m::cross_sv(1.0, local_x_axis_a),
            impulse: 0.0,
            motor_impulse: 0.0,
            spring_impulse: 0.0,
            max_motor_torque: def.max_motor_torque,
            motor_speed: def.motor_speed,
            enable_motor: def.enable_motor,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            ax: Vec2::zero(),
            ay: Vec2::zero(),
            s_ax: 0.0,
            s_bx: 0.0,
            s_ay: 0.0,
            s_by: 0.0,
            mass: 0.0,
            motor_mass: 0.0,
            spring_mass: 0.0,
            bias: 0.0,
            gamma: 0.0,
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
    pub fn local_axis_a(&self) -> Vec2 {
        self.local_x_axis_a
    }

    /// Current suspension travel along the axis.
    pub fn joint_translation(&self, body_a: &Body, body_b: &Body) -> f64 {
        let p_a = body_a.world_point(self.local_anchor_a);
        let p_b = body_b.world_point(self.local_anchor_b);
        let axis = body_a.world_vector(self.local_x_axis_a);
        (p_b - p_a).dot(axis)
    }

    /// Current relative angular velocity of the wheel.
    pub fn joint_speed(&self, body_a: &Body, body_b: &Body) -> f64 {
        body_b.angular_velocity() - body_a.angular_velocity()
    }

    #[inline]
    pub fn is_motor_enabled(&self) -> bool {
        self.enable_motor
    }

    #[inline]
    pub fn enable_motor(&mut self, flag: bool) {
        self.enable_motor = flag;
    }

    #[inline]
    pub fn motor_speed(&self) -> f64 {
        self.motor_speed
    }

    #[inline]
    pub fn set_motor_speed(&mut self, speed: f64) {
        self.motor_speed = speed;
    }

    #[inline]
    pub fn max_motor_torque(&self) -> f64 {
        self.max_motor_torque
    }

    #[inline]
    pub fn set_max_motor_torque(&mut self, torque: f64) {
        self.max_motor_torque = torque;
    }

    #[inline]
    pub fn motor_torque(&self, inv_dt: f64) -> f64 {
        inv_dt * self.motor_impulse
    }

    #[inline]
    pub fn spring_frequency(&self) -> f64 {
        self.frequency_hz
    }

    #[inline]
    pub fn set_spring_frequency(&mut self, hz: f64) {
        self.frequency_hz = hz;
    }

    #[inline]
    pub fn spring_damping_ratio(&self) -> f64 {
        self.damping_ratio
    }

    #[inline]
    pub fn set_spring_damping_ratio(&mut self, ratio: f64) {
        self.damping_ratio = ratio;
    }

    pub(super) fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        inv_dt * (self.impulse * self.ay + self.spring_impulse * self.ax)
    }

    pub(super) fn reaction_torque(&self, inv_dt: f64) -> f64 {
        inv_dt * self.motor_impulse
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
        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);

        let q_a = Rot::from_angle(pos_a.a);
        let q_b = Rot::from_angle(pos_b.a);

        let r_a = q_a.apply(self.local_anchor_a - a.local_center);
        let r_b = q_b.apply(self.local_anchor_b - b.local_center);
        let d = pos_b.c + r_b - pos_a.c - r_a;

        // point to line constraint
        self.ay = q_a.apply(self.local_y_axis_a);
        self.s_ay = m::cross(d + r_a, self.ay);
        self.s_by = m::cross(r_b, self.ay);

        self.mass = m_a + m_b + i_a * self.s_ay * self.s_ay + i_b * self.s_by * self.s_by;
        if self.mass > 0.0 {
            self.mass = 1.0 / self.mass;
        }

        // spring constraint
        self.ax = q_a.apply(self.local_x_axis_a);
        self.s_ax = m::cross(d + r_a, self.ax);
        self.s_bx = m::cross(r_b, self.ax);
        self.spring_mass = 0.0;
        self.bias = 0.0;
        self.gamma = 0.0;
        if self.frequency_hz > 0.0 {
            let inv_mass = m_a + m_b + i_a * self.s_ax * self.s_ax + i_b * self.s_bx * self.s_bx;
            if inv_mass > 0.0 {
                let c = d.dot(self.ax);
                let (gamma, bias) = soft_constraint(
                    1.0 / inv_mass,
                    self.frequency_hz,
                    self.damping_ratio,
                    c,
                    data.step.dt,
                );
                self.gamma = gamma;
                self.bias = bias;

                self.spring_mass = inv_mass + self.gamma;
                if self.spring_mass > 0.0 {
                    self.spring_mass = 1.0 / self.spring_mass;
                }
            }
        } else {
            self.spring_impulse = 0.0;
        }

        // rotational motor
        if self.enable_motor {
            self.motor_mass = i_a + i_b;
            if self.motor_mass > 0.0 {
                self.motor_mass = 1.0 / self.motor_mass;
            }
        } else {
            self.motor_mass = 0.0;
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            self.spring_impulse *= data.step.dt_ratio;
            self.motor_impulse *= data.step.dt_ratio;

            let p = self.impulse * self.ay + self.spring_impulse * self.ax;
            let l_a =
                self.impulse * self.s_ay + self.spring_impulse * self.s_ax + self.motor_impulse;
            let l_b =
                self.impulse * self.s_by + self.spring_impulse * self.s_bx + self.motor_impulse;

            v_a -= m_a * p;
            w_a -= i_a * l_a;
            v_b += m_b * p;
            w_b += i_b * l_b;
        } else {
            self.impulse = 0.0;
            self.spring_impulse = 0.0;
            self.motor_impulse = 0.0;
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

        // spring
        {
            let cdot = self.ax.dot(v_b - v_a) + self.s_bx * w_b - self.s_ax * w_a;
            let impulse =
                -self.spring_mass * (cdot + self.bias + self.gamma * self.spring_impulse);
            self.spring_impulse += impulse;

            let p = impulse * self.ax;
            v_a -= m_a * p;
            w_a -= i_a * impulse * self.s_ax;
            v_b += m_b * p;
            w_b += i_b * impulse * self.s_bx;
        }

        // motor
        {
            let cdot = w_b - w_a - self.motor_speed;
            let impulse = -self.motor_mass * cdot;

            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_torque;
            self.motor_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // point to line
        {
            let cdot = self.ay.dot(v_b - v_a) + self.s_by * w_b - self.s_ay * w_a;
            let impulse = -self.mass * cdot;
            self.impulse += impulse;

            let p = impulse * self.ay;
            v_a -= m_a * p;
            w_a -= i_a * impulse * self.s_ay;
            v_b += m_b * p;
            w_b += i_b * impulse * self.s_by;
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
        let d = c_b - c_a + r_b - r_a;

        let ay = q_a.apply(self.local_y_axis_a);
        let s_ay = m::cross(d + r_a, ay);
        let s_by = m::cross(r_b, ay);

        let c = d.dot(ay);
        let k = m_a + m_b + i_a * s_ay * s_ay + i_b * s_by * s_by;
        let impulse = if k != 0.0 { -c / k } else { 0.0 };

        let p = impulse * ay;
        c_a -= m_a * p;
        a_a -= i_a * impulse * s_ay;
        c_b += m_b * p;
        a_b += i_b * impulse * s_by;

        data.positions[a.index] = Position { c: c_a, a: a_a };
        data.positions[b.index] = Position { c: c_b, a: a_b };

        c.abs() <= LINEAR_SLOP
    }
}
