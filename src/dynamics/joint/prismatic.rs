use super::{LimitState, SolverBody};
use crate::{
    dynamics::{
        time_step::{Position, SolverData, Velocity},
        Body, BodyKey, World,
    },
    error::Result,
    math::{self as m, Mat22, Mat33, Rot, Vec2, Vec3},
    settings::{ANGULAR_SLOP, LINEAR_SLOP, MAX_LINEAR_CORRECTION},
};

/// Lets body B slide along an axis fixed in body A, with no relative rotation.
/// Supports a translation limit and a motor.
#[derive(Clone, Copy, Debug)]
pub struct PrismaticJointDef {
    pub body_a: BodyKey,
    pub body_b: BodyKey,
    pub collide_connected: bool,
    pub user_data: u64,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Translation axis in body A's frame. Normalized on creation.
    pub local_axis_a: Vec2,
    pub reference_angle: f64,
    pub enable_limit: bool,
    pub lower_translation: f64,
    pub upper_translation: f64,
    pub enable_motor: bool,
    pub max_motor_force: f64,
    pub motor_speed: f64,
}

impl PrismaticJointDef {
    pub fn new(body_a: BodyKey, body_b: BodyKey) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            local_anchor_a: Vec2::zero(),
            local_anchor_b: Vec2::zero(),
            local_axis_a: Vec2::unit_x(),
            reference_angle: 0.0,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            max_motor_force: 0.0,
            motor_speed: 0.0,
        }
    }

    /// Connect the bodies at a world anchor, sliding along a world axis.
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
            reference_angle: b.angle() - a.angle(),
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

    pub fn with_reference_angle(mut self, angle: f64) -> Self {
        self.reference_angle = angle;
        self
    }

    pub fn with_limits(mut self, lower: f64, upper: f64) -> Self {
        self.enable_limit = true;
        self.lower_translation = lower;
        self.upper_translation = upper;
        self
    }

    pub fn with_motor(mut self, speed: f64, max_force: f64) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_force = max_force;
        self
    }

    pub fn with_collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }
}

#[derive(Clone, Debug)]
pub struct PrismaticJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    local_x_axis_a: Vec2,
    local_y_axis_a: Vec2,
    reference_angle: f64,
    impulse: Vec3,
    motor_impulse: f64,
    lower_translation: f64,
    upper_translation: f64,
    max_motor_force: f64,
    motor_speed: f64,
    enable_limit: bool,
    enable_motor: bool,
    limit_state: LimitState,

    axis: Vec2,
    perp: Vec2,
    s1: f64,
    s2: f64,
    a1: f64,
    a2: f64,
    k: Mat33,
    motor_mass: f64,
}

impl PrismaticJoint {
    pub(super) fn new(def: &PrismaticJointDef) -> Self {
        let local_x_axis_a = def.local_axis_a.normalized();
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            local_x_axis_a,
            local_y_axis_a: m::cross_sv(1.0, local_x_axis_a),
            reference_angle: def.reference_angle,
            impulse: Vec3::zero(),
            motor_impulse: 0.0,
            lower_translation: def.lower_translation.min(def.upper_translation),
            upper_translation: def.lower_translation.max(def.upper_translation),
            max_motor_force: def.max_motor_force,
            motor_speed: def.motor_speed,
            enable_limit: def.enable_limit,
            enable_motor: def.enable_motor,
            limit_state: LimitState::Inactive,
            axis: Vec2::zero(),
            perp: Vec2::zero(),
            s1: 0.0,
            s2: 0.0,
            a1: 0.0,
            a2: 0.0,
            k: Mat33::zero(),
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
    pub fn local_axis_a(&self) -> Vec2 {
        self.local_x_axis_a
    }

    #[inline]
    pub fn reference_angle(&self) -> f64 {
        self.reference_angle
    }

    /// Current translation of anchor B along the axis, relative to anchor A.
    pub fn joint_translation(&self, body_a: &Body, body_b: &Body) -> f64 {
        let p_a = body_a.world_point(self.local_anchor_a);
        let p_b = body_b.world_point(self.local_anchor_b);
        let axis = body_a.world_vector(self.local_x_axis_a);
        (p_b - p_a).dot(axis)
    }

    /// Current translation speed along the axis.
    pub fn joint_speed(&self, body_a: &Body, body_b: &Body) -> f64 {
        let q_a = body_a.transform().q;
        let q_b = body_b.transform().q;
        let r_a = q_a.apply(self.local_anchor_a - body_a.local_center());
        let r_b = q_b.apply(self.local_anchor_b - body_b.local_center());
        let p_a = body_a.world_center() + r_a;
        let p_b = body_b.world_center() + r_b;
        let d = p_b - p_a;
        let axis = q_a.apply(self.local_x_axis_a);

        let (v_a, v_b) = (body_a.linear_velocity(), body_b.linear_velocity());
        let (w_a, w_b) = (body_a.angular_velocity(), body_b.angular_velocity());

        d.dot(m::cross_sv(w_a, axis))
            + axis.dot(v_b + m::cross_sv(w_b, r_b) - v_a - m::cross_sv(w_a, r_a))
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
        self.lower_translation
    }

    #[inline]
    pub fn upper_limit(&self) -> f64 {
        self.upper_translation
    }

    /// Set the translation limits. The bounds are reordered if `lower > upper`.
    pub fn set_limits(&mut self, lower: f64, upper: f64) {
        let (lower, upper) = (lower.min(upper), lower.max(upper));
        if lower != self.lower_translation || upper != self.upper_translation {
            self.lower_translation = lower;
            self.upper_translation = upper;
            self.impulse.z = 0.0;
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
    pub fn max_motor_force(&self) -> f64 {
        self.max_motor_force
    }

    #[inline]
    pub fn set_max_motor_force(&mut self, force: f64) {
        self.max_motor_force = force;
    }

    #[inline]
    pub fn motor_force(&self, inv_dt: f64) -> f64 {
        inv_dt * self.motor_impulse
    }

    pub(super) fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        inv_dt * (self.impulse.x * self.perp + (self.motor_impulse + self.impulse.z) * self.axis)
    }

    pub(super) fn reaction_torque(&self, inv_dt: f64) -> f64 {
        inv_dt * self.impulse.y
    }

    /// Apply an impulse expressed in the joint's (perp, angle, axis) frame.
    #[inline]
    fn apply(
        &self,
        df: Vec3,
        a: &SolverBody,
        b: &SolverBody,
        vel_a: &mut Velocity,
        vel_b: &mut Velocity,
    ) {
        let p = df.x * self.perp + df.z * self.axis;
        let l_a = df.x * self.s1 + df.y + df.z * self.a1;
        let l_b = df.x * self.s2 + df.y + df.z * self.a2;
        vel_a.v -= a.inv_mass * p;
        vel_a.w -= a.inv_i * l_a;
        vel_b.v += b.inv_mass * p;
        vel_b.w += b.inv_i * l_b;
    }

    pub(super) fn init_velocity_constraints(
        &mut self,
        data: &mut SolverData,
        a: &SolverBody,
        b: &SolverBody,
    ) {
        let pos_a = data.positions[a.index];
        let pos_b = data.positions[b.index];
        let mut vel_a = data.velocities[a.index];
        let mut vel_b = data.velocities[b.index];

        let q_a = Rot::from_angle(pos_a.a);
        let q_b = Rot::from_angle(pos_b.a);

        let r_a = q_a.apply(self.local_anchor_a - a.local_center);
        let r_b = q_b.apply(self.local_anchor_b - b.local_center);
        let d = pos_b.c - pos_a.c + r_b - r_a;

        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);

        // motor
        self.axis = q_a.apply(self.local_x_axis_a);
        self.a1 = m::cross(d + r_a, self.axis);
        self.a2 = m::cross(r_b, self.axis);

        self.motor_mass = m_a + m_b + i_a * self.a1 * self.a1 + i_b * self.a2 * self.a2;
        if self.motor_mass > 0.0 {
            self.motor_mass = 1.0 / self.motor_mass;
        }

        // prismatic constraint
        self.perp = q_a.apply(self.local_y_axis_a);
        self.s1 = m::cross(d + r_a, self.perp);
        self.s2 = m::cross(r_b, self.perp);
        self.k = self.effective_mass(a, b);

        // limit
        if self.enable_limit {
            let translation = self.axis.dot(d);
            if (self.upper_translation - self.lower_translation).abs() < 2.0 * LINEAR_SLOP {
                self.limit_state = LimitState::Equal;
            } else if translation <= self.lower_translation {
                if self.limit_state != LimitState::AtLower {
                    self.limit_state = LimitState::AtLower;
                    self.impulse.z = 0.0;
                }
            } else if translation >= self.upper_translation {
                if self.limit_state != LimitState::AtUpper {
                    self.limit_state = LimitState::AtUpper;
                    self.impulse.z = 0.0;
                }
            } else {
                self.limit_state = LimitState::Inactive;
                self.impulse.z = 0.0;
            }
        } else {
            self.limit_state = LimitState::Inactive;
            self.impulse.z = 0.0;
        }

        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            self.impulse = data.step.dt_ratio * self.impulse;
            self.motor_impulse *= data.step.dt_ratio;

            let mut df = self.impulse;
            df.z += self.motor_impulse;
            self.apply(df, a, b, &mut vel_a, &mut vel_b);
        } else {
            self.impulse = Vec3::zero();
            self.motor_impulse = 0.0;
        }

        data.velocities[a.index] = vel_a;
        data.velocities[b.index] = vel_b;
    }

    /// Effective mass of the perpendicular, angular and axial constraints
    /// using the cached Jacobian terms.
    fn effective_mass(&self, a: &SolverBody, b: &SolverBody) -> Mat33 {
        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);
        let (s1, s2, a1, a2) = (self.s1, self.s2, self.a1, self.a2);

        let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
        let k12 = i_a * s1 + i_b * s2;
        let k13 = i_a * s1 * a1 + i_b * s2 * a2;
        let mut k22 = i_a + i_b;
        if k22 == 0.0 {
            // both bodies have fixed rotation
            k22 = 1.0;
        }
        let k23 = i_a * a1 + i_b * a2;
        let k33 = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;

        Mat33 {
            ex: Vec3::new(k11, k12, k13),
            ey: Vec3::new(k12, k22, k23),
            ez: Vec3::new(k13, k23, k33),
        }
    }

    pub(super) fn solve_velocity_constraints(
        &mut self,
        data: &mut SolverData,
        a: &SolverBody,
        b: &SolverBody,
    ) {
        let mut vel_a = data.velocities[a.index];
        let mut vel_b = data.velocities[b.index];

        // motor
        if self.enable_motor && self.limit_state != LimitState::Equal {
            let cdot = self.axis.dot(vel_b.v - vel_a.v) + self.a2 * vel_b.w - self.a1 * vel_a.w;
            let impulse = self.motor_mass * (self.motor_speed - cdot);
            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_force;
            self.motor_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;

            self.apply(Vec3::new(0.0, 0.0, impulse), a, b, &mut vel_a, &mut vel_b);
        }

        let cdot1 = Vec2::new(
            self.perp.dot(vel_b.v - vel_a.v) + self.s2 * vel_b.w - self.s1 * vel_a.w,
            vel_b.w - vel_a.w,
        );

        if self.enable_limit && self.limit_state != LimitState::Inactive {
            let cdot2 = self.axis.dot(vel_b.v - vel_a.v) + self.a2 * vel_b.w - self.a1 * vel_a.w;
            let cdot = Vec3::new(cdot1.x, cdot1.y, cdot2);

            let f1 = self.impulse;
            self.impulse += self.k.solve33(-cdot);

            match self.limit_state {
                LimitState::AtLower => self.impulse.z = self.impulse.z.max(0.0),
                LimitState::AtUpper => self.impulse.z = self.impulse.z.min(0.0),
                _ => {}
            }

            // f2(1:2) = invK(1:2,1:2) * (-Cdot(1:2) - K(1:2,3) * (f2(3) - f1(3))) + f1(1:2)
            let rhs = -cdot1 - (self.impulse.z - f1.z) * Vec2::new(self.k.ez.x, self.k.ez.y);
            let f2r = self.k.solve22(rhs) + f1.xy();
            self.impulse.x = f2r.x;
            self.impulse.y = f2r.y;

            let df = self.impulse - f1;
            self.apply(df, a, b, &mut vel_a, &mut vel_b);
        } else {
            // limit is inactive, just solve the prismatic constraint in block form
            let df = self.k.solve22(-cdot1);
            self.impulse.x += df.x;
            self.impulse.y += df.y;

            self.apply(Vec3::new(df.x, df.y, 0.0), a, b, &mut vel_a, &mut vel_b);
        }

        data.velocities[a.index] = vel_a;
        data.velocities[b.index] = vel_b;
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
        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);

        let r_a = q_a.apply(self.local_anchor_a - a.local_center);
        let r_b = q_b.apply(self.local_anchor_b - b.local_center);
        let d = c_b + r_b - c_a - r_a;

        let axis = q_a.apply(self.local_x_axis_a);
        let a1 = m::cross(d + r_a, axis);
        let a2 = m::cross(r_b, axis);
        let perp = q_a.apply(self.local_y_axis_a);
        let s1 = m::cross(d + r_a, perp);
        let s2 = m::cross(r_b, perp);

        let c1 = Vec2::new(perp.dot(d), a_b - a_a - self.reference_angle);

        let mut linear_error = c1.x.abs();
        let angular_error = c1.y.abs();

        let mut active = false;
        let mut c2 = 0.0;
        if self.enable_limit {
            let translation = axis.dot(d);
            if (self.upper_translation - self.lower_translation).abs() < 2.0 * LINEAR_SLOP {
                c2 = (translation - self.lower_translation)
                    .clamp(-MAX_LINEAR_CORRECTION, MAX_LINEAR_CORRECTION);
                linear_error = linear_error.max((translation - self.lower_translation).abs());
                active = true;
            } else if translation <= self.lower_translation {
                c2 = (translation - self.lower_translation + LINEAR_SLOP)
                    .clamp(-MAX_LINEAR_CORRECTION, 0.0);
                linear_error = linear_error.max(self.lower_translation - translation);
                active = true;
            } else if translation >= self.upper_translation {
                c2 = (translation - self.upper_translation - LINEAR_SLOP)
                    .clamp(0.0, MAX_LINEAR_CORRECTION);
                linear_error = linear_error.max(translation - self.upper_translation);
                active = true;
            }
        }

        let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
        let k12 = i_a * s1 + i_b * s2;
        let mut k22 = i_a + i_b;
        if k22 == 0.0 {
            k22 = 1.0;
        }

        let impulse = if active {
            let k13 = i_a * s1 * a1 + i_b * s2 * a2;
            let k23 = i_a * a1 + i_b * a2;
            let k33 = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;
            let k = Mat33 {
                ex: Vec3::new(k11, k12, k13),
                ey: Vec3::new(k12, k22, k23),
                ez: Vec3::new(k13, k23, k33),
            };
            k.solve33(-Vec3::new(c1.x, c1.y, c2))
        } else {
            let k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
            let impulse1 = k.solve(-c1);
            Vec3::new(impulse1.x, impulse1.y, 0.0)
        };

        let p = impulse.x * perp + impulse.z * axis;
        let l_a = impulse.x * s1 + impulse.y + impulse.z * a1;
        let l_b = impulse.x * s2 + impulse.y + impulse.z * a2;

        c_a -= m_a * p;
        a_a -= i_a * l_a;
        c_b += m_b * p;
        a_b += i_b * l_b;

        data.positions[a.index] = Position { c: c_a, a: a_a };
        data.positions[b.index] = Position { c: c_b, a: a_b };

        linear_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}
