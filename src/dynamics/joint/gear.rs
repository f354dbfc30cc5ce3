use super::{Joint, JointKey, JointKind, SolverBody};
use crate::{
    dynamics::{
        time_step::{Position, SolverData},
        Body, BodyKey,
    },
    error::{PhysicsError, Result},
    math::{self as m, Rot, Vec2},
};

use thunderdome as td;

/// Couples the coordinates of two revolute or prismatic joints:
/// `coordinate1 + ratio * coordinate2 = constant`.
///
/// Both joints should have a static body as their body A.
/// The gear connects the body B of the first joint to the body B of the second.
#[derive(Clone, Copy, Debug)]
pub struct GearJointDef {
    pub joint1: JointKey,
    pub joint2: JointKey,
    pub collide_connected: bool,
    pub user_data: u64,
    pub ratio: f64,
}

impl GearJointDef {
    pub fn new(joint1: JointKey, joint2: JointKey) -> Self {
        Self {
            joint1,
            joint2,
            collide_connected: false,
            user_data: 0,
            ratio: 1.0,
        }
    }

    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn with_collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GearInput {
    Revolute,
    Prismatic,
}

/// Geometry of one side of the gear, taken from the coupled joint.
#[derive(Clone, Copy, Debug)]
struct GearSide {
    input: GearInput,
    /// Anchor on the ground body of the coupled joint.
    local_anchor_ground: Vec2,
    /// Anchor on the geared body.
    local_anchor: Vec2,
    local_axis_ground: Vec2,
    reference_angle: f64,
}

impl GearSide {
    fn from_joint(joint: &Joint) -> Result<Self> {
        match &joint.kind {
            JointKind::Revolute(r) => Ok(Self {
                input: GearInput::Revolute,
                local_anchor_ground: r.local_anchor_a,
                local_anchor: r.local_anchor_b,
                local_axis_ground: Vec2::zero(),
                reference_angle: r.reference_angle(),
            }),
            JointKind::Prismatic(p) => Ok(Self {
                input: GearInput::Prismatic,
                local_anchor_ground: p.local_anchor_a,
                local_anchor: p.local_anchor_b,
                local_axis_ground: p.local_axis_a(),
                reference_angle: p.reference_angle(),
            }),
            _ => Err(PhysicsError::InvalidJoint(
                "gear joints can only couple revolute and prismatic joints",
            )),
        }
    }

    /// Current joint coordinate, from the poses of the ground body and the geared body.
    fn coordinate(&self, ground: &Body, body: &Body) -> f64 {
        match self.input {
            GearInput::Revolute => body.sweep.a - ground.sweep.a - self.reference_angle,
            GearInput::Prismatic => {
                let (xf_g, xf_b) = (ground.xf, body.xf);
                let p_g = self.local_anchor_ground;
                let p = xf_g
                    .q
                    .apply_inv(xf_b.q.apply(self.local_anchor) + (xf_b.p - xf_g.p));
                (p - p_g).dot(self.local_axis_ground)
            }
        }
    }
}

/// Jacobian of one side of the gear.
#[derive(Clone, Copy, Debug, Default)]
struct GearJacobian {
    jv: Vec2,
    jw: f64,
    jw_ground: f64,
    mass: f64,
}

#[derive(Clone, Debug)]
pub struct GearJoint {
    pub(crate) joint1: JointKey,
    pub(crate) joint2: JointKey,
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    // ground bodies of the coupled joints
    body_c: BodyKey,
    body_d: BodyKey,
    side_a: GearSide,
    side_b: GearSide,
    ratio: f64,
    constant: f64,
    impulse: f64,

    solver_c: SolverBody,
    solver_d: SolverBody,
    jac_ac: GearJacobian,
    jac_bd: GearJacobian,
    mass: f64,
}

impl GearJoint {
    /// Build the gear, returning the two geared bodies along with it.
    pub(super) fn new(
        def: &GearJointDef,
        bodies: &td::Arena<Body>,
        joints: &td::Arena<Joint>,
    ) -> Result<(BodyKey, BodyKey, Self)> {
        let joint1 = joints
            .get(def.joint1.0)
            .ok_or(PhysicsError::InvalidHandle("joint"))?;
        let joint2 = joints
            .get(def.joint2.0)
            .ok_or(PhysicsError::InvalidHandle("joint"))?;

        let side_a = GearSide::from_joint(joint1)?;
        let side_b = GearSide::from_joint(joint2)?;

        let get_body = |key: BodyKey| {
            bodies
                .get(key.0)
                .ok_or(PhysicsError::InvalidHandle("body"))
        };
        let (body_c, body_a) = (joint1.body_a, joint1.body_b);
        let (body_d, body_b) = (joint2.body_a, joint2.body_b);

        let coordinate_a = side_a.coordinate(get_body(body_c)?, get_body(body_a)?);
        let coordinate_b = side_b.coordinate(get_body(body_d)?, get_body(body_b)?);

        let gear = Self {
            joint1: def.joint1,
            joint2: def.joint2,
            local_anchor_a: side_a.local_anchor,
            local_anchor_b: side_b.local_anchor,
            body_c,
            body_d,
            side_a,
            side_b,
            ratio: def.ratio,
            constant: coordinate_a + def.ratio * coordinate_b,
            impulse: 0.0,
            solver_c: SolverBody::default(),
            solver_d: SolverBody::default(),
            jac_ac: GearJacobian::default(),
            jac_bd: GearJacobian::default(),
            mass: 0.0,
        };
        Ok((body_a, body_b, gear))
    }

    #[inline]
    pub fn joint1(&self) -> JointKey {
        self.joint1
    }

    #[inline]
    pub fn joint2(&self) -> JointKey {
        self.joint2
    }

    #[inline]
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    #[inline]
    pub fn set_ratio(&mut self, ratio: f64) {
        debug_assert!(ratio.is_finite());
        self.ratio = ratio;
    }

    pub(super) fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        (inv_dt * self.impulse) * self.jac_ac.jv
    }

    pub(super) fn reaction_torque(&self, inv_dt: f64) -> f64 {
        inv_dt * self.impulse * self.jac_ac.jw
    }

    /// Jacobian of one side, given the body, its ground and their positions.
    fn jacobian(
        side: &GearSide,
        ratio: f64,
        body: (&SolverBody, &Position),
        ground: (&SolverBody, &Position),
    ) -> GearJacobian {
        let (b, pos_b) = body;
        let (g, pos_g) = ground;
        match side.input {
            GearInput::Revolute => GearJacobian {
                jv: Vec2::zero(),
                jw: ratio,
                jw_ground: ratio,
                mass: ratio * ratio * (b.inv_i + g.inv_i),
            },
            GearInput::Prismatic => {
                let q_g = Rot::from_angle(pos_g.a);
                let q_b = Rot::from_angle(pos_b.a);
                let u = q_g.apply(side.local_axis_ground);
                let r_g = q_g.apply(side.local_anchor_ground - g.local_center);
                let r_b = q_b.apply(side.local_anchor - b.local_center);
                let jw_ground = ratio * m::cross(r_g, u);
                let jw = ratio * m::cross(r_b, u);
                GearJacobian {
                    jv: ratio * u,
                    jw,
                    jw_ground,
                    mass: ratio * ratio * (g.inv_mass + b.inv_mass)
                        + g.inv_i * jw_ground * jw_ground
                        + b.inv_i * jw * jw,
                }
            }
        }
    }

    /// Coordinate of one side from solver positions.
    fn solver_coordinate(
        side: &GearSide,
        body: (&SolverBody, &Position),
        ground: (&SolverBody, &Position),
    ) -> f64 {
        let (b, pos_b) = body;
        let (g, pos_g) = ground;
        match side.input {
            GearInput::Revolute => pos_b.a - pos_g.a - side.reference_angle,
            GearInput::Prismatic => {
                let q_g = Rot::from_angle(pos_g.a);
                let q_b = Rot::from_angle(pos_b.a);
                let r_b = q_b.apply(side.local_anchor - b.local_center);
                let p_g = side.local_anchor_ground - g.local_center;
                let p_b = q_g.apply_inv(r_b + (pos_b.c - pos_g.c));
                (p_b - p_g).dot(side.local_axis_ground)
            }
        }
    }

    fn apply_velocity(&self, impulse: f64, a: &SolverBody, b: &SolverBody, data: &mut SolverData) {
        let (c, d) = (&self.solver_c, &self.solver_d);
        let mut vel_a = data.velocities[a.index];
        let mut vel_b = data.velocities[b.index];
        let mut vel_c = data.velocities[c.index];
        let mut vel_d = data.velocities[d.index];

        vel_a.v += (a.inv_mass * impulse) * self.jac_ac.jv;
        vel_a.w += a.inv_i * impulse * self.jac_ac.jw;
        vel_b.v += (b.inv_mass * impulse) * self.jac_bd.jv;
        vel_b.w += b.inv_i * impulse * self.jac_bd.jw;
        vel_c.v -= (c.inv_mass * impulse) * self.jac_ac.jv;
        vel_c.w -= c.inv_i * impulse * self.jac_ac.jw_ground;
        vel_d.v -= (d.inv_mass * impulse) * self.jac_bd.jv;
        vel_d.w -= d.inv_i * impulse * self.jac_bd.jw_ground;

        data.velocities[a.index] = vel_a;
        data.velocities[b.index] = vel_b;
        data.velocities[c.index] = vel_c;
        data.velocities[d.index] = vel_d;
    }

    pub(super) fn init_velocity_constraints(
        &mut self,
        data: &mut SolverData,
        a: &SolverBody,
        b: &SolverBody,
        bodies: &td::Arena<Body>,
    ) {
        self.solver_c = SolverBody::new(&bodies[self.body_c.0]);
        self.solver_d = SolverBody::new(&bodies[self.body_d.0]);
        let (c, d) = (self.solver_c, self.solver_d);

        let pos_a = data.positions[a.index];
        let pos_b = data.positions[b.index];
        let pos_c = data.positions[c.index];
        let pos_d = data.positions[d.index];

        self.jac_ac = Self::jacobian(&self.side_a, 1.0, (a, &pos_a), (&c, &pos_c));
        self.jac_bd = Self::jacobian(&self.side_b, self.ratio, (b, &pos_b), (&d, &pos_d));

        self.mass = self.jac_ac.mass + self.jac_bd.mass;
        self.mass = if self.mass > 0.0 { 1.0 / self.mass } else { 0.0 };

        if data.step.warm_starting {
            self.apply_velocity(self.impulse, a, b, data);
        } else {
            self.impulse = 0.0;
        }
    }

    pub(super) fn solve_velocity_constraints(
        &mut self,
        data: &mut SolverData,
        a: &SolverBody,
        b: &SolverBody,
    ) {
        let (c, d) = (&self.solver_c, &self.solver_d);
        let vel_a = data.velocities[a.index];
        let vel_b = data.velocities[b.index];
        let vel_c = data.velocities[c.index];
        let vel_d = data.velocities[d.index];

        let cdot = self.jac_ac.jv.dot(vel_a.v - vel_c.v)
            + self.jac_bd.jv.dot(vel_b.v - vel_d.v)
            + (self.jac_ac.jw * vel_a.w - self.jac_ac.jw_ground * vel_c.w)
            + (self.jac_bd.jw * vel_b.w - self.jac_bd.jw_ground * vel_d.w);

        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        self.apply_velocity(impulse, a, b, data);
    }

    pub(super) fn solve_position_constraints(
        &mut self,
        data: &mut SolverData,
        a: &SolverBody,
        b: &SolverBody,
    ) -> bool {
        let (c, d) = (self.solver_c, self.solver_d);
        let mut pos_a = data.positions[a.index];
        let mut pos_b = data.positions[b.index];
        let mut pos_c = data.positions[c.index];
        let mut pos_d = data.positions[d.index];

        let jac_ac = Self::jacobian(&self.side_a, 1.0, (a, &pos_a), (&c, &pos_c));
        let jac_bd = Self::jacobian(&self.side_b, self.ratio, (b, &pos_b), (&d, &pos_d));
        let mass = jac_ac.mass + jac_bd.mass;

        let coordinate_a = Self::solver_coordinate(&self.side_a, (a, &pos_a), (&c, &pos_c));
        let coordinate_b = Self::solver_coordinate(&self.side_b, (b, &pos_b), (&d, &pos_d));
        let cerr = coordinate_a + self.ratio * coordinate_b - self.constant;

        let impulse = if mass > 0.0 { -cerr / mass } else { 0.0 };

        pos_a.c += (a.inv_mass * impulse) * jac_ac.jv;
        pos_a.a += a.inv_i * impulse * jac_ac.jw;
        pos_b.c += (b.inv_mass * impulse) * jac_bd.jv;
        pos_b.a += b.inv_i * impulse * jac_bd.jw;
        pos_c.c -= (c.inv_mass * impulse) * jac_ac.jv;
        pos_c.a -= c.inv_i * impulse * jac_ac.jw_ground;
        pos_d.c -= (d.inv_mass * impulse) * jac_bd.jv;
        pos_d.a -= d.inv_i * impulse * jac_bd.jw_ground;

        data.positions[a.index] = pos_a;
        data.positions[b.index] = pos_b;
        data.positions[c.index] = pos_c;
        data.positions[d.index] = pos_d;

        // the gear error is not tracked for the convergence test
        true
    }
}
