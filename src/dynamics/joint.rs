//! Joints constrain the relative motion of two bodies.
//!
//! Every kind of joint has its own definition type for creation
//! and its own state type accessible through [`JointKind`].

use super::{
    body::{Body, BodyKey},
    time_step::SolverData,
};
use crate::{
    error::{PhysicsError, Result},
    math::{Mat22, Mat33, Vec2, Vec3},
};

use thunderdome as td;

mod distance;
pub use distance::{DistanceJoint, DistanceJointDef};
mod friction;
pub use friction::{FrictionJoint, FrictionJointDef};
mod gear;
pub use gear::{GearJoint, GearJointDef};
mod motor;
pub use motor::{MotorJoint, MotorJointDef};
mod mouse;
pub use mouse::{MouseJoint, MouseJointDef};
mod prismatic;
pub use prismatic::{PrismaticJoint, PrismaticJointDef};
mod pulley;
pub use pulley::{PulleyJoint, PulleyJointDef};
mod revolute;
pub use revolute::{RevoluteJoint, RevoluteJointDef};
mod rope;
pub use rope::{RopeJoint, RopeJointDef};
mod weld;
pub use weld::{WeldJoint, WeldJointDef};
mod wheel;
pub use wheel::{WheelJoint, WheelJointDef};

/// Key type to look up a joint stored in the physics world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JointKey(pub(crate) td::Index);

impl JointKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JointType {
    Distance,
    Friction,
    Gear,
    Motor,
    Mouse,
    Prismatic,
    Pulley,
    Revolute,
    Rope,
    Weld,
    Wheel,
}

/// Which side of a joint limit is being enforced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LimitState {
    #[default]
    Inactive,
    AtLower,
    AtUpper,
    /// Lower and upper limits are (nearly) the same.
    Equal,
}

/// Definition of any kind of joint, passed to
/// [`World::create_joint`][crate::World::create_joint].
#[derive(Clone, Copy, Debug)]
pub enum JointDef {
    Distance(DistanceJointDef),
    Friction(FrictionJointDef),
    Gear(GearJointDef),
    Motor(MotorJointDef),
    Mouse(MouseJointDef),
    Prismatic(PrismaticJointDef),
    Pulley(PulleyJointDef),
    Revolute(RevoluteJointDef),
    Rope(RopeJointDef),
    Weld(WeldJointDef),
    Wheel(WheelJointDef),
}

macro_rules! impl_from_def {
    ($($variant:ident($def:ty)),* $(,)?) => {
        $(impl From<$def> for JointDef {
            #[inline]
            fn from(def: $def) -> Self {
                JointDef::$variant(def)
            }
        })*
    };
}

impl_from_def!(
    Distance(DistanceJointDef),
    Friction(FrictionJointDef),
    Gear(GearJointDef),
    Motor(MotorJointDef),
    Mouse(MouseJointDef),
    Prismatic(PrismaticJointDef),
    Pulley(PulleyJointDef),
    Revolute(RevoluteJointDef),
    Rope(RopeJointDef),
    Weld(WeldJointDef),
    Wheel(WheelJointDef),
);

/// The kind-specific state of a joint.
#[derive(Clone, Debug)]
pub enum JointKind {
    Distance(DistanceJoint),
    Friction(FrictionJoint),
    Gear(GearJoint),
    Motor(MotorJoint),
    Mouse(MouseJoint),
    Prismatic(PrismaticJoint),
    Pulley(PulleyJoint),
    Revolute(RevoluteJoint),
    Rope(RopeJoint),
    Weld(WeldJoint),
    Wheel(WheelJoint),
}

/// Mass properties and island index of a body, cached when a joint is initialized.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SolverBody {
    pub index: usize,
    pub local_center: Vec2,
    pub inv_mass: f64,
    pub inv_i: f64,
}

impl SolverBody {
    #[inline]
    pub fn new(body: &Body) -> Self {
        Self {
            index: body.island_index,
            local_center: body.sweep.local_center,
            inv_mass: body.inv_mass,
            inv_i: body.inv_i,
        }
    }
}

/// A joint connecting two bodies.
#[derive(Clone, Debug)]
pub struct Joint {
    pub(crate) body_a: BodyKey,
    pub(crate) body_b: BodyKey,
    pub(crate) collide_connected: bool,
    pub(crate) island_flag: bool,
    pub(crate) user_data: u64,
    pub(crate) kind: JointKind,
    solver_a: SolverBody,
    solver_b: SolverBody,
}

impl Joint {
    pub(crate) fn new(
        def: &JointDef,
        bodies: &td::Arena<Body>,
        joints: &td::Arena<Joint>,
    ) -> Result<Self> {
        let (body_a, body_b, collide_connected, user_data, kind) = match def {
            JointDef::Distance(d) => (
                d.body_a,
                d.body_b,
                d.collide_connected,
                d.user_data,
                JointKind::Distance(DistanceJoint::new(d)),
            ),
            JointDef::Friction(d) => (
                d.body_a,
                d.body_b,
                d.collide_connected,
                d.user_data,
                JointKind::Friction(FrictionJoint::new(d)),
            ),
            JointDef::Gear(d) => {
                let (body_a, body_b, gear) = GearJoint::new(d, bodies, joints)?;
                (
                    body_a,
                    body_b,
                    d.collide_connected,
                    d.user_data,
                    JointKind::Gear(gear),
                )
            }
            JointDef::Motor(d) => (
                d.body_a,
                d.body_b,
                d.collide_connected,
                d.user_data,
                JointKind::Motor(MotorJoint::new(d)),
            ),
            JointDef::Mouse(d) => {
                let body_b = bodies
                    .get(d.body_b.0)
                    .ok_or(PhysicsError::InvalidHandle("body"))?;
                (
                    d.body_a,
                    d.body_b,
                    d.collide_connected,
                    d.user_data,
                    JointKind::Mouse(MouseJoint::new(d, body_b)),
                )
            }
            JointDef::Prismatic(d) => (
                d.body_a,
                d.body_b,
                d.collide_connected,
                d.user_data,
                JointKind::Prismatic(PrismaticJoint::new(d)),
            ),
            JointDef::Pulley(d) => (
                d.body_a,
                d.body_b,
                d.collide_connected,
                d.user_data,
                JointKind::Pulley(PulleyJoint::new(d)?),
            ),
            JointDef::Revolute(d) => (
                d.body_a,
                d.body_b,
                d.collide_connected,
                d.user_data,
                JointKind::Revolute(RevoluteJoint::new(d)),
            ),
            JointDef::Rope(d) => (
                d.body_a,
                d.body_b,
                d.collide_connected,
                d.user_data,
                JointKind::Rope(RopeJoint::new(d)),
            ),
            JointDef::Weld(d) => (
                d.body_a,
                d.body_b,
                d.collide_connected,
                d.user_data,
                JointKind::Weld(WeldJoint::new(d)),
            ),
            JointDef::Wheel(d) => (
                d.body_a,
                d.body_b,
                d.collide_connected,
                d.user_data,
                JointKind::Wheel(WheelJoint::new(d)),
            ),
        };

        if bodies.get(body_a.0).is_none() || bodies.get(body_b.0).is_none() {
            return Err(PhysicsError::InvalidHandle("body"));
        }
        if body_a == body_b {
            return Err(PhysicsError::InvalidJoint(
                "a joint must connect two different bodies",
            ));
        }

        Ok(Self {
            body_a,
            body_b,
            collide_connected,
            island_flag: false,
            user_data,
            kind,
            solver_a: SolverBody::default(),
            solver_b: SolverBody::default(),
        })
    }

    pub fn joint_type(&self) -> JointType {
        match &self.kind {
            JointKind::Distance(_) => JointType::Distance,
            JointKind::Friction(_) => JointType::Friction,
            JointKind::Gear(_) => JointType::Gear,
            JointKind::Motor(_) => JointType::Motor,
            JointKind::Mouse(_) => JointType::Mouse,
            JointKind::Prismatic(_) => JointType::Prismatic,
            JointKind::Pulley(_) => JointType::Pulley,
            JointKind::Revolute(_) => JointType::Revolute,
            JointKind::Rope(_) => JointType::Rope,
            JointKind::Weld(_) => JointType::Weld,
            JointKind::Wheel(_) => JointType::Wheel,
        }
    }

    #[inline]
    pub fn body_a(&self) -> BodyKey {
        self.body_a
    }

    #[inline]
    pub fn body_b(&self) -> BodyKey {
        self.body_b
    }

    /// Whether the connected bodies are allowed to collide with each other.
    #[inline]
    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    #[inline]
    pub fn kind(&self) -> &JointKind {
        &self.kind
    }

    #[inline]
    pub(crate) fn kind_mut(&mut self) -> &mut JointKind {
        &mut self.kind
    }

    #[inline]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    #[inline]
    pub fn set_user_data(&mut self, data: u64) {
        self.user_data = data;
    }

    /// World anchor points on body A and body B.
    pub fn anchors(&self, body_a: &Body, body_b: &Body) -> (Vec2, Vec2) {
        match &self.kind {
            JointKind::Distance(j) => (
                body_a.world_point(j.local_anchor_a),
                body_b.world_point(j.local_anchor_b),
            ),
            JointKind::Friction(j) => (
                body_a.world_point(j.local_anchor_a),
                body_b.world_point(j.local_anchor_b),
            ),
            JointKind::Gear(j) => (
                body_a.world_point(j.local_anchor_a),
                body_b.world_point(j.local_anchor_b),
            ),
            JointKind::Motor(_) => (body_a.position(), body_b.position()),
            JointKind::Mouse(j) => (j.target, body_b.world_point(j.local_anchor_b)),
            JointKind::Prismatic(j) => (
                body_a.world_point(j.local_anchor_a),
                body_b.world_point(j.local_anchor_b),
            ),
            JointKind::Pulley(j) => (
                body_a.world_point(j.local_anchor_a),
                body_b.world_point(j.local_anchor_b),
            ),
            JointKind::Revolute(j) => (
                body_a.world_point(j.local_anchor_a),
                body_b.world_point(j.local_anchor_b),
            ),
            JointKind::Rope(j) => (
                body_a.world_point(j.local_anchor_a),
                body_b.world_point(j.local_anchor_b),
            ),
            JointKind::Weld(j) => (
                body_a.world_point(j.local_anchor_a),
                body_b.world_point(j.local_anchor_b),
            ),
            JointKind::Wheel(j) => (
                body_a.world_point(j.local_anchor_a),
                body_b.world_point(j.local_anchor_b),
            ),
        }
    }

    /// Force applied on body B at the anchor, given the inverse of the last time step.
    pub fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        match &self.kind {
            JointKind::Distance(j) => j.reaction_force(inv_dt),
            JointKind::Friction(j) => j.reaction_force(inv_dt),
            JointKind::Gear(j) => j.reaction_force(inv_dt),
            JointKind::Motor(j) => j.reaction_force(inv_dt),
            JointKind::Mouse(j) => j.reaction_force(inv_dt),
            JointKind::Prismatic(j) => j.reaction_force(inv_dt),
            JointKind::Pulley(j) => j.reaction_force(inv_dt),
            JointKind::Revolute(j) => j.reaction_force(inv_dt),
            JointKind::Rope(j) => j.reaction_force(inv_dt),
            JointKind::Weld(j) => j.reaction_force(inv_dt),
            JointKind::Wheel(j) => j.reaction_force(inv_dt),
        }
    }

    /// Torque applied on body B, given the inverse of the last time step.
    pub fn reaction_torque(&self, inv_dt: f64) -> f64 {
        match &self.kind {
            JointKind::Distance(_) | JointKind::Pulley(_) | JointKind::Rope(_) => 0.0,
            JointKind::Mouse(_) => 0.0,
            JointKind::Friction(j) => j.reaction_torque(inv_dt),
            JointKind::Gear(j) => j.reaction_torque(inv_dt),
            JointKind::Motor(j) => j.reaction_torque(inv_dt),
            JointKind::Prismatic(j) => j.reaction_torque(inv_dt),
            JointKind::Revolute(j) => j.reaction_torque(inv_dt),
            JointKind::Weld(j) => j.reaction_torque(inv_dt),
            JointKind::Wheel(j) => j.reaction_torque(inv_dt),
        }
    }

    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        match &mut self.kind {
            JointKind::Mouse(j) => j.target -= new_origin,
            JointKind::Pulley(j) => {
                j.ground_anchor_a -= new_origin;
                j.ground_anchor_b -= new_origin;
            }
            _ => {}
        }
    }

    /// The joints a gear joint depends on.
    pub(crate) fn gear_dependencies(&self) -> Option<(JointKey, JointKey)> {
        match &self.kind {
            JointKind::Gear(g) => Some((g.joint1, g.joint2)),
            _ => None,
        }
    }

    //
    // solver interface
    //

    pub(crate) fn init_velocity_constraints(
        &mut self,
        data: &mut SolverData,
        bodies: &td::Arena<Body>,
    ) {
        self.solver_a = SolverBody::new(&bodies[self.body_a.0]);
        self.solver_b = SolverBody::new(&bodies[self.body_b.0]);
        let (a, b) = (&self.solver_a, &self.solver_b);
        match &mut self.kind {
            JointKind::Distance(j) => j.init_velocity_constraints(data, a, b),
            JointKind::Friction(j) => j.init_velocity_constraints(data, a, b),
            JointKind::Gear(j) => j.init_velocity_constraints(data, a, b, bodies),
            JointKind::Motor(j) => j.init_velocity_constraints(data, a, b),
            JointKind::Mouse(j) => j.init_velocity_constraints(data, b),
            JointKind::Prismatic(j) => j.init_velocity_constraints(data, a, b),
            JointKind::Pulley(j) => j.init_velocity_constraints(data, a, b),
            JointKind::Revolute(j) => j.init_velocity_constraints(data, a, b),
            JointKind::Rope(j) => j.init_velocity_constraints(data, a, b),
            JointKind::Weld(j) => j.init_velocity_constraints(data, a, b),
            JointKind::Wheel(j) => j.init_velocity_constraints(data, a, b),
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let (a, b) = (&self.solver_a, &self.solver_b);
        match &mut self.kind {
            JointKind::Distance(j) => j.solve_velocity_constraints(data, a, b),
            JointKind::Friction(j) => j.solve_velocity_constraints(data, a, b),
            JointKind::Gear(j) => j.solve_velocity_constraints(data, a, b),
            JointKind::Motor(j) => j.solve_velocity_constraints(data, a, b),
            JointKind::Mouse(j) => j.solve_velocity_constraints(data, b),
            JointKind::Prismatic(j) => j.solve_velocity_constraints(data, a, b),
            JointKind::Pulley(j) => j.solve_velocity_constraints(data, a, b),
            JointKind::Revolute(j) => j.solve_velocity_constraints(data, a, b),
            JointKind::Rope(j) => j.solve_velocity_constraints(data, a, b),
            JointKind::Weld(j) => j.solve_velocity_constraints(data, a, b),
            JointKind::Wheel(j) => j.solve_velocity_constraints(data, a, b),
        }
    }

    /// Returns true when the position error is within tolerance.
    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let (a, b) = (&self.solver_a, &self.solver_b);
        match &mut self.kind {
            JointKind::Distance(j) => j.solve_position_constraints(data, a, b),
            JointKind::Friction(_) | JointKind::Motor(_) | JointKind::Mouse(_) => true,
            JointKind::Gear(j) => j.solve_position_constraints(data, a, b),
            JointKind::Prismatic(j) => j.solve_position_constraints(data, a, b),
            JointKind::Pulley(j) => j.solve_position_constraints(data, a, b),
            JointKind::Revolute(j) => j.solve_position_constraints(data, a, b),
            JointKind::Rope(j) => j.solve_position_constraints(data, a, b),
            JointKind::Weld(j) => j.solve_position_constraints(data, a, b),
            JointKind::Wheel(j) => j.solve_position_constraints(data, a, b),
        }
    }
}

/// Spring stiffness and damping coefficients of a soft constraint
/// with the given effective mass, as `(gamma, bias)` terms for the solver.
pub(crate) fn soft_constraint(
    mass: f64,
    frequency_hz: f64,
    damping_ratio: f64,
    position_error: f64,
    dt: f64,
) -> (f64, f64) {
    let omega = 2.0 * std::f64::consts::PI * frequency_hz;
    let d = 2.0 * mass * damping_ratio * omega;
    let k = mass * omega * omega;

    let gamma = dt * (d + dt * k);
    let gamma = if gamma != 0.0 { 1.0 / gamma } else { 0.0 };
    let bias = position_error * dt * k * gamma;
    (gamma, bias)
}

/// Effective mass matrix of a point-to-point constraint, before inversion.
pub(crate) fn point_mass(a: &SolverBody, b: &SolverBody, r_a: Vec2, r_b: Vec2) -> Mat22 {
    let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);
    let k11 = m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y;
    let k12 = -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y;
    let k22 = m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x;
    Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22))
}

/// Effective mass of a point-to-point constraint combined with an
/// angle constraint, before inversion.
pub(crate) fn point_angle_mass(a: &SolverBody, b: &SolverBody, r_a: Vec2, r_b: Vec2) -> Mat33 {
    // J = [-I -r1_skew I r2_skew]
    //     [ 0       -1 0       1]
    let (i_a, i_b) = (a.inv_i, b.inv_i);
    let k = point_mass(a, b, r_a, r_b);
    let k13 = -r_a.y * i_a - r_b.y * i_b;
    let k23 = r_a.x * i_a + r_b.x * i_b;
    Mat33 {
        ex: Vec3::new(k.ex.x, k.ex.y, k13),
        ey: Vec3::new(k.ey.x, k.ey.y, k23),
        ez: Vec3::new(k13, k23, i_a + i_b),
    }
}
