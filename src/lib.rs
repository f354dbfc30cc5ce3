//! A 2D rigid body physics engine.
//!
//! Bodies live in a [`World`] and carry shapes through [`Fixture`]s.
//! Each [`World::step`] finds potential contacts with a dynamic AABB tree,
//! computes contact manifolds, solves contacts and [`Joint`]s island by island
//! with sequential impulses and finally sweeps fast bodies with time of impact
//! queries so that they don't tunnel through thin geometry.

pub mod math;
pub use math::{uv, Angle, Rot, Sweep, Transform, Vec2};

pub mod settings;

pub mod error;
pub use error::{PhysicsError, Result, ShapeError};

mod profiling;
pub use profiling::Profile;

pub mod collision;
pub use collision::{
    Aabb, ChainShape, CircleShape, EdgeShape, Manifold, ManifoldPoint, ManifoldType, MassData,
    PolygonShape, RayCastInput, RayCastOutput, Shape, ShapeType, WorldManifold,
};

pub mod dynamics;
pub use dynamics::{
    joint::{
        DistanceJoint, DistanceJointDef, FrictionJoint, FrictionJointDef, GearJoint,
        GearJointDef, MotorJoint, MotorJointDef, MouseJoint, MouseJointDef, PrismaticJoint,
        PrismaticJointDef, PulleyJoint, PulleyJointDef, RevoluteJoint, RevoluteJointDef,
        RopeJoint, RopeJointDef, WeldJoint, WeldJointDef, WheelJoint, WheelJointDef,
    },
    Body, BodyDef, BodyKey, BodyType, Contact, ContactEdge, ContactFilter, ContactImpulse,
    ContactKey, ContactListener, DestructionListener, Filter, Fixture, FixtureDef, FixtureKey,
    Joint, JointDef, JointEdge, JointKey, JointKind, JointType, LimitState, World,
    WorldSettings,
};
