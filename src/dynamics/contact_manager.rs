use super::{
    body::{Body, BodyKey, BodyType, ContactEdge},
    callbacks::{ContactFilter, ContactListener},
    contact::{Contact, ContactFlags, ContactKey},
    fixture::{Fixture, FixtureProxyRef},
    joint::Joint,
};
use crate::collision::{
    narrowphase::{pair_order, PairOrder},
    BroadPhase,
};

use thunderdome as td;

/// Owns the broad phase and the contacts it produces.
#[derive(Default)]
pub(crate) struct ContactManager {
    pub broad_phase: BroadPhase<FixtureProxyRef>,
    pub contacts: td::Arena<Contact>,
    pub contact_filter: Option<Box<dyn ContactFilter>>,
    pub contact_listener: Option<Box<dyn ContactListener>>,
    pair_scratch: Vec<(FixtureProxyRef, FixtureProxyRef)>,
}

/// Whether fixtures on these two bodies may collide at all:
/// one of them must be dynamic and no joint between them may forbid it.
pub(crate) fn bodies_should_collide(
    body: &Body,
    other_key: BodyKey,
    other: &Body,
    joints: &td::Arena<Joint>,
) -> bool {
    if body.body_type != BodyType::Dynamic && other.body_type != BodyType::Dynamic {
        return false;
    }
    !body.joints.iter().any(|edge| {
        edge.other == other_key
            && joints
                .get(edge.joint.0)
                .map_or(false, |joint| !joint.collide_connected)
    })
}

/// Borrow the installed contact listener as a plain trait object.
pub(crate) fn listener_mut(
    listener: &mut Option<Box<dyn ContactListener>>,
) -> Option<&mut dyn ContactListener> {
    match listener {
        Some(listener) => Some(listener.as_mut()),
        None => None,
    }
}

fn filter_allows(
    filter: &mut Option<Box<dyn ContactFilter>>,
    fixture_a: &Fixture,
    fixture_b: &Fixture,
) -> bool {
    match filter {
        Some(filter) => filter.should_collide(fixture_a, fixture_b),
        None => fixture_a.filter.should_collide(&fixture_b.filter),
    }
}

impl ContactManager {
    /// Create contacts for all new broad-phase pairs.
    pub fn find_new_contacts(
        &mut self,
        bodies: &mut td::Arena<Body>,
        fixtures: &td::Arena<Fixture>,
        joints: &td::Arena<Joint>,
    ) {
        let mut pairs = std::mem::take(&mut self.pair_scratch);
        pairs.clear();
        self.broad_phase.update_pairs(|a, b| pairs.push((a, b)));
        for &(proxy_a, proxy_b) in &pairs {
            self.add_pair(proxy_a, proxy_b, bodies, fixtures, joints);
        }
        self.pair_scratch = pairs;
    }

    fn add_pair(
        &mut self,
        proxy_a: FixtureProxyRef,
        proxy_b: FixtureProxyRef,
        bodies: &mut td::Arena<Body>,
        fixtures: &td::Arena<Fixture>,
        joints: &td::Arena<Joint>,
    ) {
        let (Some(fixture_a), Some(fixture_b)) = (
            fixtures.get(proxy_a.fixture.0),
            fixtures.get(proxy_b.fixture.0),
        ) else {
            return;
        };

        let (body_key_a, body_key_b) = (fixture_a.body, fixture_b.body);
        // fixtures on the same body never collide
        if body_key_a == body_key_b {
            return;
        }
        let (Some(body_a), Some(body_b)) = (bodies.get(body_key_a.0), bodies.get(body_key_b.0))
        else {
            return;
        };

        // does a contact already exist?
        let contacts = &self.contacts;
        let exists = body_b
            .contacts
            .iter()
            .filter(|edge| edge.other == body_key_a)
            .filter_map(|edge| contacts.get(edge.contact.0))
            .any(|c| {
                let same = (c.fixture_a, c.child_a, c.fixture_b, c.child_b)
                    == (
                        proxy_a.fixture,
                        proxy_a.child_index,
                        proxy_b.fixture,
                        proxy_b.child_index,
                    );
                let swapped = (c.fixture_a, c.child_a, c.fixture_b, c.child_b)
                    == (
                        proxy_b.fixture,
                        proxy_b.child_index,
                        proxy_a.fixture,
                        proxy_a.child_index,
                    );
                same || swapped
            });
        if exists {
            return;
        }

        if !bodies_should_collide(body_b, body_key_a, body_a, joints) {
            return;
        }
        if !filter_allows(&mut self.contact_filter, fixture_a, fixture_b) {
            return;
        }

        let side_a = (proxy_a.fixture, fixture_a, proxy_a.child_index);
        let side_b = (proxy_b.fixture, fixture_b, proxy_b.child_index);
        let contact = match pair_order(fixture_a.shape.shape_type(), fixture_b.shape.shape_type())
        {
            PairOrder::AsIs => Contact::new(side_a, side_b),
            PairOrder::Flipped => Contact::new(side_b, side_a),
            PairOrder::Never => return,
        };

        let (key_a, key_b) = (contact.body_a, contact.body_b);
        let key = ContactKey(self.contacts.insert(contact));

        // connect to the constraint graph
        if let Some(body) = bodies.get_mut(key_a.0) {
            body.contacts.push(ContactEdge {
                other: key_b,
                contact: key,
            });
        }
        if let Some(body) = bodies.get_mut(key_b.0) {
            body.contacts.push(ContactEdge {
                other: key_a,
                contact: key,
            });
        }
    }

    /// Remove a contact, firing `end_contact` if it was touching.
    pub fn destroy(
        &mut self,
        key: ContactKey,
        bodies: &mut td::Arena<Body>,
        fixtures: &td::Arena<Fixture>,
    ) {
        let Some(contact) = self.contacts.remove(key.0) else {
            return;
        };

        if contact.is_touching() {
            if let Some(listener) = &mut self.contact_listener {
                listener.end_contact(&contact);
            }
        }

        for body_key in [contact.body_a, contact.body_b] {
            if let Some(body) = bodies.get_mut(body_key.0) {
                body.contacts.retain(|edge| edge.contact != key);
            }
        }

        // a solid contact vanishing changes the forces on both bodies
        let is_sensor = |k: super::FixtureKey| fixtures.get(k.0).map_or(false, |f| f.is_sensor);
        if contact.manifold.point_count > 0
            && !is_sensor(contact.fixture_a)
            && !is_sensor(contact.fixture_b)
        {
            for body_key in [contact.body_a, contact.body_b] {
                if let Some(body) = bodies.get_mut(body_key.0) {
                    body.set_awake(true);
                }
            }
        }
    }

    /// Update the manifolds of all contacts involving an awake body,
    /// destroying the ones that no longer overlap or are filtered out.
    pub fn collide(
        &mut self,
        bodies: &mut td::Arena<Body>,
        fixtures: &td::Arena<Fixture>,
        joints: &td::Arena<Joint>,
    ) {
        let keys: Vec<ContactKey> = self.contacts.iter().map(|(i, _)| ContactKey(i)).collect();

        for key in keys {
            let Some(contact) = self.contacts.get(key.0) else {
                continue;
            };
            let (Some(fixture_a), Some(fixture_b)) = (
                fixtures.get(contact.fixture_a.0),
                fixtures.get(contact.fixture_b.0),
            ) else {
                self.destroy(key, bodies, fixtures);
                continue;
            };
            let (key_a, key_b) = (contact.body_a, contact.body_b);
            let (Some(body_a), Some(body_b)) = (bodies.get(key_a.0), bodies.get(key_b.0)) else {
                self.destroy(key, bodies, fixtures);
                continue;
            };

            if contact.flags.contains(ContactFlags::FILTER) {
                let allowed = bodies_should_collide(body_b, key_a, body_a, joints)
                    && filter_allows(&mut self.contact_filter, fixture_a, fixture_b);
                if !allowed {
                    self.destroy(key, bodies, fixtures);
                    continue;
                }
                if let Some(contact) = self.contacts.get_mut(key.0) {
                    contact.flags.remove(ContactFlags::FILTER);
                }
            }

            // at least one body must be awake and able to move
            let active_a = body_a.is_awake() && body_a.body_type != BodyType::Static;
            let active_b = body_b.is_awake() && body_b.body_type != BodyType::Static;
            if !active_a && !active_b {
                continue;
            }

            let Some(contact) = self.contacts.get_mut(key.0) else {
                continue;
            };
            let overlap = match (
                fixture_a.proxies.get(contact.child_a),
                fixture_b.proxies.get(contact.child_b),
            ) {
                (Some(pa), Some(pb)) => self.broad_phase.test_overlap(pa.proxy_id, pb.proxy_id),
                _ => false,
            };
            // contacts are destroyed as soon as the fat AABBs stop overlapping
            if !overlap {
                self.destroy(key, bodies, fixtures);
                continue;
            }

            let (xf_a, xf_b) = (body_a.xf, body_b.xf);
            let wake = contact.update(
                fixture_a,
                &xf_a,
                fixture_b,
                &xf_b,
                listener_mut(&mut self.contact_listener),
            );
            if wake {
                for body_key in [key_a, key_b] {
                    if let Some(body) = bodies.get_mut(body_key.0) {
                        body.set_awake(true);
                    }
                }
            }
        }
    }
}
