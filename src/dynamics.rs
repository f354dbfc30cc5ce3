//! Rigid bodies, their fixtures, contacts and joints,
//! and the world that owns and steps all of them.

pub mod body;
pub use body::{Body, BodyDef, BodyKey, BodyType, ContactEdge, JointEdge};

pub mod fixture;
pub use fixture::{Filter, Fixture, FixtureDef, FixtureKey};

pub mod contact;
pub use contact::{Contact, ContactKey};

pub mod callbacks;
pub use callbacks::{ContactFilter, ContactImpulse, ContactListener, DestructionListener};

pub mod joint;
pub use joint::{Joint, JointDef, JointKey, JointKind, JointType, LimitState};

pub mod world;
pub use world::{World, WorldSettings};

mod contact_manager;
mod contact_solver;
mod island;
mod time_step;
