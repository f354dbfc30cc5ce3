use super::{
    body::BodyKey,
    callbacks::ContactListener,
    fixture::{Fixture, FixtureKey},
};
use crate::{
    collision::{self, narrowphase, Manifold},
    math::Transform,
    settings,
};

use thunderdome as td;

/// Key type to look up a contact stored in the physics world.
/// Contacts are created and destroyed by the world, so these keys go stale quickly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContactKey(pub(crate) td::Index);

impl ContactKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct ContactFlags: u8 {
        /// Used when crawling the contact graph to form islands.
        const ISLAND = 1 << 0;
        const TOUCHING = 1 << 1;
        /// Can be cleared by the user in pre-solve, is set again on every update.
        const ENABLED = 1 << 2;
        /// The contact needs filtering because a fixture filter or a joint changed.
        const FILTER = 1 << 3;
        const BULLET_HIT = 1 << 4;
        /// `toi` holds a valid time of impact.
        const TOI = 1 << 5;
    }
}

/// A potential contact between two fixture children whose fat AABBs overlap.
/// The contact is touching when its manifold has points.
#[derive(Clone, Debug)]
pub struct Contact {
    pub(crate) flags: ContactFlags,
    pub(crate) fixture_a: FixtureKey,
    pub(crate) fixture_b: FixtureKey,
    pub(crate) child_a: usize,
    pub(crate) child_b: usize,
    pub(crate) body_a: BodyKey,
    pub(crate) body_b: BodyKey,
    pub(crate) manifold: Manifold,
    pub(crate) toi_count: u32,
    pub(crate) toi: f64,
    pub(crate) friction: f64,
    pub(crate) restitution: f64,
    pub(crate) tangent_speed: f64,
}

impl Contact {
    /// The fixtures must already be ordered the way the manifold functions expect.
    pub(crate) fn new(
        (key_a, fixture_a, child_a): (FixtureKey, &Fixture, usize),
        (key_b, fixture_b, child_b): (FixtureKey, &Fixture, usize),
    ) -> Self {
        Self {
            flags: ContactFlags::ENABLED,
            fixture_a: key_a,
            fixture_b: key_b,
            child_a,
            child_b,
            body_a: fixture_a.body,
            body_b: fixture_b.body,
            manifold: Manifold::default(),
            toi_count: 0,
            toi: 1.0,
            friction: settings::mix_friction(fixture_a.friction, fixture_b.friction),
            restitution: settings::mix_restitution(fixture_a.restitution, fixture_b.restitution),
            tangent_speed: 0.0,
        }
    }

    /// The contact manifold in local coordinates.
    /// Use [`World::world_manifold`][crate::World::world_manifold] for world coordinates.
    #[inline]
    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    #[inline]
    pub fn is_touching(&self) -> bool {
        self.flags.contains(ContactFlags::TOUCHING)
    }

    /// Disable the contact for the current time step (or sub-step in continuous collision).
    /// Only meaningful inside [`ContactListener::pre_solve`].
    #[inline]
    pub fn set_enabled(&mut self, flag: bool) {
        self.flags.set(ContactFlags::ENABLED, flag);
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.flags.contains(ContactFlags::ENABLED)
    }

    #[inline]
    pub fn fixture_a(&self) -> FixtureKey {
        self.fixture_a
    }

    #[inline]
    pub fn fixture_b(&self) -> FixtureKey {
        self.fixture_b
    }

    /// Index of the shape child of fixture A, nonzero only for chains.
    #[inline]
    pub fn child_index_a(&self) -> usize {
        self.child_a
    }

    #[inline]
    pub fn child_index_b(&self) -> usize {
        self.child_b
    }

    #[inline]
    pub fn body_a(&self) -> BodyKey {
        self.body_a
    }

    #[inline]
    pub fn body_b(&self) -> BodyKey {
        self.body_b
    }

    #[inline]
    pub fn friction(&self) -> f64 {
        self.friction
    }

    /// Override the mixed friction. Persists until the contact is destroyed
    /// or [`World::reset_contact_friction`][crate::World::reset_contact_friction] is called.
    #[inline]
    pub fn set_friction(&mut self, friction: f64) {
        self.friction = friction;
    }

    #[inline]
    pub fn restitution(&self) -> f64 {
        self.restitution
    }

    #[inline]
    pub fn set_restitution(&mut self, restitution: f64) {
        self.restitution = restitution;
    }

    #[inline]
    pub fn tangent_speed(&self) -> f64 {
        self.tangent_speed
    }

    /// Desired tangential surface speed in meters per second, for conveyor belts.
    #[inline]
    pub fn set_tangent_speed(&mut self, speed: f64) {
        self.tangent_speed = speed;
    }

    #[inline]
    pub(crate) fn flag_for_filtering(&mut self) {
        self.flags.insert(ContactFlags::FILTER);
    }

    pub(crate) fn involves(&self, fixture: FixtureKey) -> bool {
        self.fixture_a == fixture || self.fixture_b == fixture
    }

    /// Recompute the manifold and fire listener events.
    ///
    /// Returns true when a non-sensor contact started or stopped touching,
    /// in which case the caller should wake both bodies.
    pub(crate) fn update(
        &mut self,
        fixture_a: &Fixture,
        xf_a: &Transform,
        fixture_b: &Fixture,
        xf_b: &Transform,
        listener: Option<&mut dyn ContactListener>,
    ) -> bool {
        let old_manifold = self.manifold;

        // re-enable this contact, pre-solve may disable it again
        self.flags.insert(ContactFlags::ENABLED);

        let was_touching = self.is_touching();
        let sensor = fixture_a.is_sensor || fixture_b.is_sensor;

        let touching = if sensor {
            self.manifold.point_count = 0;
            collision::test_overlap(
                &fixture_a.shape,
                self.child_a,
                &fixture_b.shape,
                self.child_b,
                xf_a,
                xf_b,
            )
        } else {
            self.manifold =
                narrowphase::evaluate(&fixture_a.shape, self.child_a, xf_a, &fixture_b.shape, xf_b);

            // carry over impulses of persisting points for warm starting
            let count = self.manifold.point_count;
            for new_point in &mut self.manifold.points[..count] {
                new_point.normal_impulse = 0.0;
                new_point.tangent_impulse = 0.0;
                if let Some(old_point) = old_manifold
                    .points()
                    .iter()
                    .find(|old| old.id.key() == new_point.id.key())
                {
                    new_point.normal_impulse = old_point.normal_impulse;
                    new_point.tangent_impulse = old_point.tangent_impulse;
                }
            }
            count > 0
        };

        self.flags.set(ContactFlags::TOUCHING, touching);

        if let Some(listener) = listener {
            if !was_touching && touching {
                listener.begin_contact(self);
            }
            if was_touching && !touching {
                listener.end_contact(self);
            }
            if !sensor && touching {
                listener.pre_solve(self, &old_manifold);
            }
        }

        !sensor && touching != was_touching
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collision::{CircleShape, PolygonShape},
        dynamics::{fixture::FixtureDef, BodyKey},
        math::Vec2,
    };

    fn keys() -> (BodyKey, BodyKey, FixtureKey, FixtureKey) {
        let mut bodies = td::Arena::new();
        let mut fixtures = td::Arena::new();
        (
            BodyKey(bodies.insert(())),
            BodyKey(bodies.insert(())),
            FixtureKey(fixtures.insert(())),
            FixtureKey(fixtures.insert(())),
        )
    }

    #[derive(Default)]
    struct Counter {
        begins: usize,
        ends: usize,
        pre_solves: usize,
    }

    impl ContactListener for Counter {
        fn begin_contact(&mut self, _: &Contact) {
            self.begins += 1;
        }
        fn end_contact(&mut self, _: &Contact) {
            self.ends += 1;
        }
        fn pre_solve(&mut self, _: &mut Contact, _: &Manifold) {
            self.pre_solves += 1;
        }
    }

    #[test]
    fn touching_transitions_fire_events_and_keep_impulses() {
        let (body_a, body_b, key_a, key_b) = keys();
        let ground = Fixture::new(
            body_a,
            &FixtureDef::new(PolygonShape::new_box(5.0, 0.5).unwrap()).with_friction(0.4),
        );
        let ball = Fixture::new(
            body_b,
            &FixtureDef::new(CircleShape::new(0.5).unwrap()).with_friction(0.9),
        );
        let mut contact = Contact::new((key_a, &ground, 0), (key_b, &ball, 0));
        assert!((contact.friction() - (0.4f64 * 0.9).sqrt()).abs() < 1e-12);

        let xf_ground = Transform::identity();
        let mut counter = Counter::default();

        let resting = Transform::from_angle(Vec2::new(0.0, 0.99), 0.0);
        assert!(contact.update(&ground, &xf_ground, &ball, &resting, Some(&mut counter)));
        assert!(contact.is_touching());
        assert_eq!((counter.begins, counter.pre_solves), (1, 1));

        // impulses survive an update with the same feature ids
        contact.manifold.points[0].normal_impulse = 2.5;
        assert!(!contact.update(&ground, &xf_ground, &ball, &resting, Some(&mut counter)));
        assert_eq!(contact.manifold.points[0].normal_impulse, 2.5);

        let flying = Transform::from_angle(Vec2::new(0.0, 3.0), 0.0);
        assert!(contact.update(&ground, &xf_ground, &ball, &flying, Some(&mut counter)));
        assert!(!contact.is_touching());
        assert_eq!(counter.ends, 1);
        assert_eq!(counter.pre_solves, 2);
    }

    #[test]
    fn sensors_report_overlap_without_points() {
        let (body_a, body_b, key_a, key_b) = keys();
        let zone = Fixture::new(
            body_a,
            &FixtureDef::new(PolygonShape::new_box(1.0, 1.0).unwrap()).with_sensor(true),
        );
        let ball = Fixture::new(body_b, &FixtureDef::new(CircleShape::new(0.25).unwrap()));
        let mut contact = Contact::new((key_a, &zone, 0), (key_b, &ball, 0));

        let mut counter = Counter::default();
        let inside = Transform::from_angle(Vec2::new(0.2, 0.0), 0.0);
        let woke = contact.update(&zone, &Transform::identity(), &ball, &inside, Some(&mut counter));
        assert!(!woke);
        assert!(contact.is_touching());
        assert_eq!(contact.manifold().point_count, 0);
        assert_eq!((counter.begins, counter.pre_solves), (1, 0));
    }
}
