//! User hooks into the simulation.
//!
//! Listeners are boxed trait objects installed on the [`World`][crate::World].
//! None of them get access to the world itself since it is locked
//! while they run; record what you need and act on it after the step.

use super::{
    contact::Contact,
    fixture::{Fixture, FixtureKey},
    joint::{Joint, JointKey},
};
use crate::{collision::Manifold, settings::MAX_MANIFOLD_POINTS};

/// Notified when joints and fixtures are destroyed implicitly
/// because their body (or a joint they depend on) was destroyed.
pub trait DestructionListener {
    fn say_goodbye_joint(&mut self, key: JointKey, joint: &Joint);
    fn say_goodbye_fixture(&mut self, key: FixtureKey, fixture: &Fixture);
}

/// Decides whether two fixtures may generate a contact.
/// Without a custom filter the world uses [`Filter::should_collide`][super::Filter::should_collide].
pub trait ContactFilter {
    fn should_collide(&mut self, fixture_a: &Fixture, fixture_b: &Fixture) -> bool {
        fixture_a.filter.should_collide(&fixture_b.filter)
    }
}

/// Impulses the solver applied to a contact, reported in
/// [`ContactListener::post_solve`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContactImpulse {
    pub normal_impulses: [f64; MAX_MANIFOLD_POINTS],
    pub tangent_impulses: [f64; MAX_MANIFOLD_POINTS],
    pub count: usize,
}

/// Receives contact events during the time step.
///
/// `begin_contact` and `end_contact` fire when the shapes start and stop touching
/// (sensors included). `pre_solve` runs for every touching non-sensor contact after
/// its manifold is updated and may disable the contact for this step.
/// `post_solve` reports the impulses once the island containing the contact is solved.
#[allow(unused_variables)]
pub trait ContactListener {
    fn begin_contact(&mut self, contact: &Contact) {}
    fn end_contact(&mut self, contact: &Contact) {}
    fn pre_solve(&mut self, contact: &mut Contact, old_manifold: &Manifold) {}
    fn post_solve(&mut self, contact: &Contact, impulse: &ContactImpulse) {}
}
