use super::{point_angle_mass, point_mass, LimitState, SolverBody};
use crate::{
    dynamics::{
        time_step::{Position, SolverData, Velocity},
        Body, BodyKey, World,
    },
    error::Result,
    math::{self as m, Mat33, Rot, Vec2, Vec3},
    settings::{ANGULAR_SLOP, LINEAR_SLOP, MAX_ANGULAR_CORRECTION},
};

/// A hinge: two bodies share an anchor point and rotate freely around it,
/// optionally with an angle limit and a motor.
#[derive(Clone, Copy, Debug)]
pub struct RevoluteJointDef {
    pub body_a: BodyKey,
    pub body_b: BodyKey,
    pub collide_connected: bool,
    pub user_data: u64,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Angle of body B minus angle of body A in the reference state.
    pub reference_angle: f64,
    pub enable_limit: bool,
    pub lower_angle: f64,
    pub upper_angle: f64,
    pub enable_motor: bool,
    /// Target relative angular velocity in radians per second.
    pub motor_speed: f64,
    pub max_motor_torque: f64,
}

impl RevoluteJointDef {
    pub fn new(body_a: BodyKey, body_b: BodyKey) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            local_anchor_a: Vec2::zero(),
            local_anchor_b: Vec2::zero(),
            reference_angle: 0.0,
            enable_limit: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
        }
    }

    /// Hinge the bodies at a world point, taking their current angles as the reference.
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

    /// Enable the angle limit with the given bounds.
    pub fn with_limits(mut self, lower: f64, upper: f64) -> Self {
        self.enable_limit = true;
        self.lower_angle = lower;
        self.upper_angle = upper;
        self
    }

    /// Enable the motor with the given speed and maximum torque.
    pub fn with_motor(mut self, speed: f64, max_torque: f64) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_torque = max_torque;
        self
    }

    pub fn with_collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }
}

#[derive(Clone, Debug)]
pub struct RevoluteJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    reference_angle: f64,
    impulse: Vec3,
    motor_impulse: f64,

    enable_motor: bool,
    max_motor_torque: f64,
    motor_speed: f64,

    enable_limit: bool,
    lower_angle: f64,
    upper_angle: f64,
    limit_state: LimitState,

    r_a: Vec2,
    r_b: Vec2,
    // effective mass of the point-to-point and angle constraints
    mass: Mat33,
    motor_mass: f64,
}

impl RevoluteJoint {
    pub(super) fn new(def: &RevoluteJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            impulse: Vec3::zero(),
            motor_impulse: 0.0,
            enable_motor: def.enable_motor,
            max_motor_torque: def.max_motor_torque,
            motor_speed: def.motor_speed,
            enable_limit: def.enable_limit,
            lower_angle: def.lower_angle.min(def.upper_angle),
            upper_angle: def.lower_angle.max(def.upper_angle),
            limit_state: LimitState::Inactive,
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            mass: Mat33::zero(),
            motor_mass: 0.0,
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

    /// Current angle of body B relative to body A, minus the reference angle.
    pub fn joint_angle(&self, body_a: &Body, body_b: &Body) -> f64 {
        body_b.angle() - body_a.angle() - self.reference_angle
    }

    /// Current relative angular velocity.
    pub fn joint_speed(&self, body_a: &Body, body_b: &Body) -> f64 {
        body_b.angular_velocity() - body_a.angular_velocity()
    }

    #[inline]
    pub fn is_limit_enabled(&self) -> bool {
        self.enable_limit
    }

    pub fn enable_limit(&mut self, flag: bool) {
        if flag != self.enable_limit {
            self.enable_limit = flag;
            self.impulse.z = 0.0;
        }
    }

    #[inline]
    pub fn lower_limit(&self) -> f64 {
        self.lower_angle
    }

    #[inline]
    pub fn upper_limit(&self) -> f64 {
        self.upper_angle
    }

    /// Set the angle limits in radians. The bounds are reordered if `lower > upper`.
    pub fn set_limits(&mut self, lower: f64, upper: f64) {
        let (lower, upper) = (lower.min(upper), lower.max(upper));
        if lower != self.lower_angle || upper != self.upper_angle {
            self.impulse.z = 0.0;
            self.lower_angle = lower;
            self.upper_angle = upper;
        }
    }

    #[inline]
    pub fn limit_state(&self) -> LimitState {
        self.limit_state
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

    /// Torque applied by the motor during the last step, given its inverse time step.
    #[inline]
    pub fn motor_torque(&self, inv_dt: f64) -> f64 {
        inv_dt * self.motor_impulse
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

        let q_a = Rot::from_angle(a_a);
        let q_b = Rot::from_angle(a_b);
        self.r_a = q_a.apply(self.local_anchor_a - a.local_center);
        self.r_b = q_b.apply(self.local_anchor_b - b.local_center);

        let (r_a, r_b) = (self.r_a, self.r_b);
        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);
        let fixed_rotation = i_a + i_b == 0.0;
        self.mass = point_angle_mass(a, b, r_a, r_b);

        self.motor_mass = i_a + i_b;
        if self.motor_mass > 0.0 {
            self.motor_mass = 1.0 / self.motor_mass;
        }

        if !self.enable_motor || fixed_rotation {
            self.motor_impulse = 0.0;
        }

        if self.enable_limit && !fixed_rotation {
            let joint_angle = a_b - a_a - self.reference_angle;
            if (self.upper_angle - self.lower_angle).abs() < 2.0 * ANGULAR_SLOP {
                self.limit_state = LimitState::Equal;
            } else if joint_angle <= self.lower_angle {
                if self.limit_state != LimitState::AtLower {
                    self.impulse.z = 0.0;
                }
                self.limit_state = LimitState::AtLower;
            } else if joint_angle >= self.upper_angle {
                if self.limit_state != LimitState::AtUpper {
                    self.impulse.z = 0.0;
                }
                self.limit_state = LimitState::AtUpper;
            } else {
                self.limit_state = LimitState::Inactive;
                self.impulse.z = 0.0;
            }
        } else {
            self.limit_state = LimitState::Inactive;
        }

        if data.step.warm_starting {
            self.impulse = data.step.dt_ratio * self.impulse;
            self.motor_impulse *= data.step.dt_ratio;

            let p = self.impulse.xy();
            v_a -= m_a * p;
            w_a -= i_a * (m::cross(r_a, p) + self.motor_impulse + self.impulse.z);
            v_b += m_b * p;
            w_b += i_b * (m::cross(r_b, p) + self.motor_impulse + self.impulse.z);
        } else {
            self.impulse = Vec3::zero();
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
        let fixed_rotation = i_a + i_b == 0.0;

        if self.enable_motor && self.limit_state != LimitState::Equal && !fixed_rotation {
            let cdot = w_b - w_a - self.motor_speed;
            let impulse = -self.motor_mass * cdot;
            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_torque;
            self.motor_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        if self.enable_limit && self.limit_state != LimitState::Inactive && !fixed_rotation {
            let cdot1 = v_b + m::cross_sv(w_b, self.r_b) - v_a - m::cross_sv(w_a, self.r_a);
            let cdot2 = w_b - w_a;
            let cdot = Vec3::new(cdot1.x, cdot1.y, cdot2);

            let mut impulse = -self.mass.solve33(cdot);

            match self.limit_state {
                LimitState::Equal => self.impulse += impulse,
                LimitState::AtLower | LimitState::AtUpper => {
                    let new_impulse = self.impulse.z + impulse.z;
                    let clamped = match self.limit_state {
                        LimitState::AtLower => new_impulse < 0.0,
                        _ => new_impulse > 0.0,
                    };
                    if clamped {
                        // the limit is pulling; drop it and solve the point constraint alone
                        let rhs = -cdot1
                            + self.impulse.z * Vec2::new(self.mass.ez.x, self.mass.ez.y);
                        let reduced = self.mass.solve22(rhs);
                        impulse.x = reduced.x;
                        impulse.y = reduced.y;
                        impulse.z = -self.impulse.z;
                        self.impulse.x += reduced.x;
                        self.impulse.y += reduced.y;
                        self.impulse.z = 0.0;
                    } else {
                        self.impulse += impulse;
                    }
                }
                LimitState::Inactive => {}
            }

            let p = impulse.xy();
            v_a -= m_a * p;
            w_a -= i_a * (m::cross(self.r_a, p) + impulse.z);
            v_b += m_b * p;
            w_b += i_b * (m::cross(self.r_b, p) + impulse.z);
        } else {
            // point-to-point only
            let cdot = v_b + m::cross_sv(w_b, self.r_b) - v_a - m::cross_sv(w_a, self.r_a);
            let impulse = self.mass.solve22(-cdot);

            self.impulse.x += impulse.x;
            self.impulse.y += impulse.y;

            v_a -= m_a * impulse;
            w_a -= i_a * m::cross(self.r_a, impulse);
            v_b += m_b * impulse;
            w_b += i_b * m::cross(self.r_b, impulse);
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
        let fixed_rotation = i_a + i_b == 0.0;

        let mut angular_error = 0.0;

        // angle limit
        if self.enable_limit && self.limit_state != LimitState::Inactive && !fixed_rotation {
            let angle = a_b - a_a - self.reference_angle;
            let c = match self.limit_state {
                LimitState::Equal => {
                    let c = (angle - self.lower_angle)
                        .clamp(-MAX_ANGULAR_CORRECTION, MAX_ANGULAR_CORRECTION);
                    angular_error = c.abs();
                    c
                }
                LimitState::AtLower => {
                    let c = angle - self.lower_angle;
                    angular_error = -c;
                    (c + ANGULAR_SLOP).clamp(-MAX_ANGULAR_CORRECTION, 0.0)
                }
                LimitState::AtUpper => {
                    let c = angle - self.upper_angle;
                    angular_error = c;
                    (c - ANGULAR_SLOP).clamp(0.0, MAX_ANGULAR_CORRECTION)
                }
                LimitState::Inactive => 0.0,
            };
            let limit_impulse = -self.motor_mass * c;
            a_a -= i_a * limit_impulse;
            a_b += i_b * limit_impulse;
        }

        // point-to-point
        let position_error = {
            let q_a = Rot::from_angle(a_a);
            let q_b = Rot::from_angle(a_b);
            let r_a = q_a.apply(self.local_anchor_a - a.local_center);
            let r_b = q_b.apply(self.local_anchor_b - b.local_center);

            let c = c_b + r_b - c_a - r_a;
            let k = point_mass(a, b, r_a, r_b);
            let impulse = -k.solve(c);

            c_a -= m_a * impulse;
            a_a -= i_a * m::cross(r_a, impulse);
            c_b += m_b * impulse;
            a_b += i_b * m::cross(r_b, impulse);

            c.mag()
        };

        data.positions[a.index] = Position { c: c_a, a: a_a };
        data.positions[b.index] = Position { c: c_b, a: a_b };

        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}
