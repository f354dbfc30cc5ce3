use super::{
    body::{Body, BodyDef, BodyFlags, BodyKey, BodyType, JointEdge},
    callbacks::{ContactFilter, ContactListener, DestructionListener},
    contact::{Contact, ContactFlags, ContactKey},
    contact_manager::{listener_mut, ContactManager},
    fixture::{Filter, Fixture, FixtureDef, FixtureKey},
    island::{Island, IslandStorage},
    joint::{Joint, JointDef, JointKey, JointKind},
    time_step::TimeStep,
};
use crate::{
    collision::{
        time_of_impact, Aabb, DistanceProxy, MassData, RayCastInput, TOIInput, TOIState,
        WorldManifold,
    },
    error::{PhysicsError, Result},
    math::Vec2,
    profiling::{tracy_span, Profile, Timer},
    settings::{self, MAX_SUB_STEPS, MAX_TOI_CONTACTS},
};

use thunderdome as td;

/// Global switches of the simulation.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde-types", serde(default))]
pub struct WorldSettings {
    pub gravity: Vec2,
    /// Let bodies that have come to rest fall asleep.
    pub allow_sleep: bool,
    /// Start each step with the impulses of the previous one.
    pub warm_starting: bool,
    /// Run time of impact solving to prevent tunneling.
    pub continuous_physics: bool,
    /// Solve one time of impact event per step. Mostly useful for debugging.
    pub sub_stepping: bool,
    /// Clear accumulated forces at the end of every step.
    pub auto_clear_forces: bool,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -10.0),
            allow_sleep: true,
            warm_starting: true,
            continuous_physics: true,
            sub_stepping: false,
            auto_clear_forces: true,
        }
    }
}

impl WorldSettings {
    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_allow_sleep(mut self, allow: bool) -> Self {
        self.allow_sleep = allow;
        self
    }

    pub fn with_warm_starting(mut self, flag: bool) -> Self {
        self.warm_starting = flag;
        self
    }

    pub fn with_continuous_physics(mut self, flag: bool) -> Self {
        self.continuous_physics = flag;
        self
    }

    pub fn with_sub_stepping(mut self, flag: bool) -> Self {
        self.sub_stepping = flag;
        self
    }

    pub fn with_auto_clear_forces(mut self, flag: bool) -> Self {
        self.auto_clear_forces = flag;
        self
    }
}

/// Owns all bodies, fixtures, joints and contacts, and steps the simulation.
///
/// Objects are referred to by keys which stay valid until the object is destroyed.
/// A key to a destroyed object never refers to anything else afterwards.
pub struct World {
    bodies: td::Arena<Body>,
    fixtures: td::Arena<Fixture>,
    joints: td::Arena<Joint>,
    contact_manager: ContactManager,
    destruction_listener: Option<Box<dyn DestructionListener>>,
    settings: WorldSettings,

    locked: bool,
    // fixtures were added since the last step and need contacts
    new_fixture: bool,
    // inverse of the previous time step, for warm starting
    inv_dt0: f64,
    step_complete: bool,
    profile: Profile,
    island: Island,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldSettings::default())
    }
}

impl World {
    pub fn new(settings: WorldSettings) -> Self {
        Self {
            bodies: td::Arena::new(),
            fixtures: td::Arena::new(),
            joints: td::Arena::new(),
            contact_manager: ContactManager::default(),
            destruction_listener: None,
            settings,
            locked: false,
            new_fixture: false,
            inv_dt0: 0.0,
            step_complete: true,
            profile: Profile::default(),
            island: Island::default(),
        }
    }

    fn check_unlocked(&self) -> Result<()> {
        if self.locked {
            log::warn!("Attempted to modify the world in the middle of a time step");
            return Err(PhysicsError::Locked);
        }
        Ok(())
    }

    /// True while the world is inside [`step`][Self::step].
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    //
    // listeners
    //

    pub fn set_destruction_listener(&mut self, listener: Option<Box<dyn DestructionListener>>) {
        self.destruction_listener = listener;
    }

    /// Replace the default filtering by [`Filter`] bits.
    pub fn set_contact_filter(&mut self, filter: Option<Box<dyn ContactFilter>>) {
        self.contact_manager.contact_filter = filter;
    }

    pub fn set_contact_listener(&mut self, listener: Option<Box<dyn ContactListener>>) {
        self.contact_manager.contact_listener = listener;
    }

    //
    // bodies
    //

    pub fn create_body(&mut self, def: &BodyDef) -> Result<BodyKey> {
        self.check_unlocked()?;
        let key = BodyKey(self.bodies.insert(Body::new(def)));
        log::debug!("Created {:?} body {:?}", def.body_type, key);
        Ok(key)
    }

    /// Destroy a body along with everything attached to it.
    ///
    /// Joints connected to the body and fixtures on it are reported
    /// to the destruction listener before they are destroyed.
    pub fn destroy_body(&mut self, key: BodyKey) -> Result<()> {
        self.check_unlocked()?;
        let Some(body) = self.bodies.get(key.0) else {
            log::warn!("Attempted to destroy a body that no longer exists");
            return Err(PhysicsError::InvalidHandle("body"));
        };

        let joint_keys: Vec<JointKey> = body.joints.iter().map(|edge| edge.joint).collect();
        let contact_keys: Vec<ContactKey> =
            body.contacts.iter().map(|edge| edge.contact).collect();
        let fixture_keys = body.fixtures.clone();

        // a joint may already be gone if it was a gear depending on an earlier one
        for joint_key in &joint_keys {
            if let (Some(listener), Some(joint)) = (
                self.destruction_listener.as_mut(),
                self.joints.get(joint_key.0),
            ) {
                listener.say_goodbye_joint(*joint_key, joint);
            }
            self.remove_joint(*joint_key);
        }

        for contact_key in &contact_keys {
            self.contact_manager
                .destroy(*contact_key, &mut self.bodies, &self.fixtures);
        }

        for fixture_key in &fixture_keys {
            let Some(mut fixture) = self.fixtures.remove(fixture_key.0) else {
                continue;
            };
            if let Some(listener) = self.destruction_listener.as_mut() {
                listener.say_goodbye_fixture(*fixture_key, &fixture);
            }
            fixture.destroy_proxies(&mut self.contact_manager.broad_phase);
        }

        self.bodies.remove(key.0);
        log::debug!(
            "Destroyed body {:?} with {} joints, {} contacts and {} fixtures",
            key,
            joint_keys.len(),
            contact_keys.len(),
            fixture_keys.len(),
        );
        Ok(())
    }

    #[inline]
    pub fn body(&self, key: BodyKey) -> Option<&Body> {
        self.bodies.get(key.0)
    }

    /// Mutable access for operations that only concern the body itself,
    /// such as applying forces or setting velocities.
    #[inline]
    pub fn body_mut(&mut self, key: BodyKey) -> Option<&mut Body> {
        self.bodies.get_mut(key.0)
    }

    /// Look up two bodies at once.
    pub fn body_pair(&self, a: BodyKey, b: BodyKey) -> Result<(&Body, &Body)> {
        match (self.bodies.get(a.0), self.bodies.get(b.0)) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(PhysicsError::InvalidHandle("body")),
        }
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyKey, &Body)> {
        self.bodies.iter().map(|(i, b)| (BodyKey(i), b))
    }

    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn get_body_mut(&mut self, key: BodyKey) -> Result<&mut Body> {
        self.bodies
            .get_mut(key.0)
            .ok_or(PhysicsError::InvalidHandle("body"))
    }

    /// Teleport a body. Contacts are updated during the next step.
    pub fn set_transform(&mut self, key: BodyKey, position: Vec2, angle: f64) -> Result<()> {
        self.check_unlocked()?;
        let body = self
            .bodies
            .get_mut(key.0)
            .ok_or(PhysicsError::InvalidHandle("body"))?;
        body.set_transform_unsynced(position, angle);

        let xf = body.xf;
        for fixture_key in &body.fixtures {
            if let Some(fixture) = self.fixtures.get_mut(fixture_key.0) {
                fixture.synchronize(&mut self.contact_manager.broad_phase, &xf, &xf);
            }
        }
        Ok(())
    }

    /// Change the type of a body, recomputing its mass and dropping its contacts.
    pub fn set_body_type(&mut self, key: BodyKey, body_type: BodyType) -> Result<()> {
        self.check_unlocked()?;
        let body = self
            .bodies
            .get_mut(key.0)
            .ok_or(PhysicsError::InvalidHandle("body"))?;
        if body.body_type == body_type {
            return Ok(());
        }

        body.body_type = body_type;
        body.reset_mass_data(&self.fixtures);

        if body_type == BodyType::Static {
            body.linear_velocity = Vec2::zero();
            body.angular_velocity = 0.0;
            body.sweep.a0 = body.sweep.a;
            body.sweep.c0 = body.sweep.c;
            body.synchronize_fixtures(&mut self.fixtures, &mut self.contact_manager.broad_phase);
        }

        body.set_awake(true);
        body.force = Vec2::zero();
        body.torque = 0.0;

        self.destroy_body_contacts(key);

        // touch the proxies so that new contacts get created where appropriate
        let body = &self.bodies[key.0];
        for fixture in body.fixtures.iter().filter_map(|k| self.fixtures.get(k.0)) {
            fixture.touch_proxies(&mut self.contact_manager.broad_phase);
        }
        Ok(())
    }

    /// Inactive bodies are not simulated and cannot be collided with.
    pub fn set_active(&mut self, key: BodyKey, flag: bool) -> Result<()> {
        self.check_unlocked()?;
        let body = self
            .bodies
            .get_mut(key.0)
            .ok_or(PhysicsError::InvalidHandle("body"))?;
        if body.is_active() == flag {
            return Ok(());
        }

        body.flags.set(BodyFlags::ACTIVE, flag);
        let xf = body.xf;
        let broad_phase = &mut self.contact_manager.broad_phase;
        for fixture_key in &body.fixtures {
            let Some(fixture) = self.fixtures.get_mut(fixture_key.0) else {
                continue;
            };
            if flag {
                fixture.create_proxies(broad_phase, &xf, *fixture_key);
            } else {
                fixture.destroy_proxies(broad_phase);
            }
        }

        if flag {
            // contacts are created on the next step
            self.new_fixture = true;
        } else {
            self.destroy_body_contacts(key);
        }
        Ok(())
    }

    pub fn set_fixed_rotation(&mut self, key: BodyKey, flag: bool) -> Result<()> {
        let body = self
            .bodies
            .get_mut(key.0)
            .ok_or(PhysicsError::InvalidHandle("body"))?;
        body.set_fixed_rotation(flag, &self.fixtures);
        Ok(())
    }

    /// Recompute the mass of a body from its fixtures,
    /// e.g. after changing their density.
    pub fn reset_mass_data(&mut self, key: BodyKey) -> Result<()> {
        self.check_unlocked()?;
        let body = self
            .bodies
            .get_mut(key.0)
            .ok_or(PhysicsError::InvalidHandle("body"))?;
        body.reset_mass_data(&self.fixtures);
        Ok(())
    }

    /// Override the mass computed from fixtures. Ignored for non-dynamic bodies.
    ///
    /// `mass_data.inertia` is about the body origin. A nonzero value that does not
    /// exceed `mass * center.mag_sq()` fails with [`PhysicsError::InvalidMassData`].
    pub fn set_mass_data(&mut self, key: BodyKey, mass_data: &MassData) -> Result<()> {
        self.check_unlocked()?;
        self.get_body_mut(key)?.set_mass_data(mass_data)
    }

    fn destroy_body_contacts(&mut self, key: BodyKey) {
        let Some(body) = self.bodies.get(key.0) else {
            return;
        };
        let contact_keys: Vec<ContactKey> =
            body.contacts.iter().map(|edge| edge.contact).collect();
        for contact_key in contact_keys {
            self.contact_manager
                .destroy(contact_key, &mut self.bodies, &self.fixtures);
        }
    }

    //
    // fixtures
    //

    /// Attach a shape to a body. Updates the mass of the body
    /// if the fixture has a positive density.
    pub fn create_fixture(&mut self, body_key: BodyKey, def: &FixtureDef) -> Result<FixtureKey> {
        self.check_unlocked()?;
        let body = self
            .bodies
            .get_mut(body_key.0)
            .ok_or(PhysicsError::InvalidHandle("body"))?;

        let key = FixtureKey(self.fixtures.insert(Fixture::new(body_key, def)));
        if body.is_active() {
            self.fixtures[key.0].create_proxies(
                &mut self.contact_manager.broad_phase,
                &body.xf,
                key,
            );
        }
        body.fixtures.push(key);

        if def.density > 0.0 {
            body.reset_mass_data(&self.fixtures);
        }

        // new contacts are found at the start of the next step
        self.new_fixture = true;
        Ok(key)
    }

    /// Destroy a fixture and the contacts it participates in.
    /// The mass of the body is recomputed.
    pub fn destroy_fixture(&mut self, key: FixtureKey) -> Result<()> {
        self.check_unlocked()?;
        let Some(fixture) = self.fixtures.get(key.0) else {
            log::warn!("Attempted to destroy a fixture that no longer exists");
            return Err(PhysicsError::InvalidHandle("fixture"));
        };
        let body_key = fixture.body;

        if let Some(body) = self.bodies.get(body_key.0) {
            let contacts = &self.contact_manager.contacts;
            let contact_keys: Vec<ContactKey> = body
                .contacts
                .iter()
                .map(|edge| edge.contact)
                .filter(|ck| contacts.get(ck.0).map_or(false, |c| c.involves(key)))
                .collect();
            for contact_key in contact_keys {
                self.contact_manager
                    .destroy(contact_key, &mut self.bodies, &self.fixtures);
            }
        }

        if let Some(mut fixture) = self.fixtures.remove(key.0) {
            fixture.destroy_proxies(&mut self.contact_manager.broad_phase);
        }

        if let Some(body) = self.bodies.get_mut(body_key.0) {
            body.fixtures.retain(|k| *k != key);
            body.reset_mass_data(&self.fixtures);
        }
        Ok(())
    }

    #[inline]
    pub fn fixture(&self, key: FixtureKey) -> Option<&Fixture> {
        self.fixtures.get(key.0)
    }

    /// Mutable access to material properties and user data.
    #[inline]
    pub fn fixture_mut(&mut self, key: FixtureKey) -> Option<&mut Fixture> {
        self.fixtures.get_mut(key.0)
    }

    pub fn fixtures(&self) -> impl Iterator<Item = (FixtureKey, &Fixture)> {
        self.fixtures.iter().map(|(i, f)| (FixtureKey(i), f))
    }

    /// Turn a fixture into a sensor or back. Sensors detect overlap
    /// but generate no collision response.
    pub fn set_sensor(&mut self, key: FixtureKey, flag: bool) -> Result<()> {
        let fixture = self
            .fixtures
            .get_mut(key.0)
            .ok_or(PhysicsError::InvalidHandle("fixture"))?;
        if fixture.is_sensor == flag {
            return Ok(());
        }
        fixture.is_sensor = flag;
        if let Some(body) = self.bodies.get_mut(fixture.body.0) {
            body.set_awake(true);
        }
        Ok(())
    }

    /// Change the collision filter of a fixture.
    /// Existing contacts are re-evaluated on the next step.
    pub fn set_filter_data(&mut self, key: FixtureKey, filter: Filter) -> Result<()> {
        let fixture = self
            .fixtures
            .get_mut(key.0)
            .ok_or(PhysicsError::InvalidHandle("fixture"))?;
        fixture.filter = filter;

        let Some(body) = self.bodies.get(fixture.body.0) else {
            return Ok(());
        };
        for edge in &body.contacts {
            if let Some(contact) = self.contact_manager.contacts.get_mut(edge.contact.0) {
                if contact.involves(key) {
                    contact.flag_for_filtering();
                }
            }
        }
        fixture.touch_proxies(&mut self.contact_manager.broad_phase);
        Ok(())
    }

    //
    // joints
    //

    /// Connect two bodies with a joint. This doesn't wake the bodies.
    pub fn create_joint(&mut self, def: &JointDef) -> Result<JointKey> {
        self.check_unlocked()?;
        let joint = Joint::new(def, &self.bodies, &self.joints)?;
        let (body_a, body_b, collide_connected) =
            (joint.body_a, joint.body_b, joint.collide_connected);
        let joint_type = joint.joint_type();

        let key = JointKey(self.joints.insert(joint));
        self.bodies[body_a.0].joints.push(JointEdge {
            other: body_b,
            joint: key,
        });
        self.bodies[body_b.0].joints.push(JointEdge {
            other: body_a,
            joint: key,
        });

        // existing contacts between the bodies may now be forbidden
        if !collide_connected {
            self.flag_contacts_between(body_a, body_b);
        }

        log::debug!("Created {:?} joint {:?}", joint_type, key);
        Ok(key)
    }

    /// Destroy a joint, waking up the bodies it connected.
    /// Gear joints built on top of this joint are destroyed first
    /// and reported to the destruction listener.
    pub fn destroy_joint(&mut self, key: JointKey) -> Result<()> {
        self.check_unlocked()?;
        if !self.joints.contains(key.0) {
            log::warn!("Attempted to destroy a joint that no longer exists");
            return Err(PhysicsError::InvalidHandle("joint"));
        }
        self.remove_joint(key);
        Ok(())
    }

    fn remove_joint(&mut self, key: JointKey) {
        let dependents: Vec<JointKey> = self
            .joints
            .iter()
            .filter(|(_, joint)| {
                matches!(joint.gear_dependencies(), Some((j1, j2)) if j1 == key || j2 == key)
            })
            .map(|(i, _)| JointKey(i))
            .collect();
        for gear_key in dependents {
            if let (Some(listener), Some(gear)) = (
                self.destruction_listener.as_mut(),
                self.joints.get(gear_key.0),
            ) {
                listener.say_goodbye_joint(gear_key, gear);
            }
            self.remove_joint(gear_key);
        }

        let Some(joint) = self.joints.remove(key.0) else {
            return;
        };
        for body_key in [joint.body_a, joint.body_b] {
            if let Some(body) = self.bodies.get_mut(body_key.0) {
                body.joints.retain(|edge| edge.joint != key);
                body.set_awake(true);
            }
        }

        // contacts the joint was suppressing may come back
        if !joint.collide_connected {
            self.flag_contacts_between(joint.body_a, joint.body_b);
        }
        log::debug!("Destroyed {:?} joint {:?}", joint.joint_type(), key);
    }

    fn flag_contacts_between(&mut self, a: BodyKey, b: BodyKey) {
        let Some(body) = self.bodies.get(b.0) else {
            return;
        };
        for edge in body.contacts.iter().filter(|edge| edge.other == a) {
            if let Some(contact) = self.contact_manager.contacts.get_mut(edge.contact.0) {
                contact.flag_for_filtering();
            }
        }
    }

    #[inline]
    pub fn joint(&self, key: JointKey) -> Option<&Joint> {
        self.joints.get(key.0)
    }

    /// Change the parameters of a joint, waking up the bodies it connects.
    pub fn modify_joint<R>(
        &mut self,
        key: JointKey,
        f: impl FnOnce(&mut JointKind) -> R,
    ) -> Result<R> {
        let joint = self
            .joints
            .get_mut(key.0)
            .ok_or(PhysicsError::InvalidHandle("joint"))?;
        let ret = f(joint.kind_mut());
        for body_key in [joint.body_a, joint.body_b] {
            if let Some(body) = self.bodies.get_mut(body_key.0) {
                body.set_awake(true);
            }
        }
        Ok(ret)
    }

    /// Set the user data of a joint without waking anything up.
    pub fn set_joint_user_data(&mut self, key: JointKey, data: u64) -> Result<()> {
        let joint = self
            .joints
            .get_mut(key.0)
            .ok_or(PhysicsError::InvalidHandle("joint"))?;
        joint.set_user_data(data);
        Ok(())
    }

    /// A joint is active when both of its bodies are.
    pub fn is_joint_active(&self, key: JointKey) -> bool {
        self.joints.get(key.0).map_or(false, |joint| {
            self.body_pair(joint.body_a, joint.body_b)
                .map_or(false, |(a, b)| a.is_active() && b.is_active())
        })
    }

    /// World anchor points of a joint on its two bodies.
    pub fn joint_anchors(&self, key: JointKey) -> Option<(Vec2, Vec2)> {
        let joint = self.joints.get(key.0)?;
        let (a, b) = self.body_pair(joint.body_a, joint.body_b).ok()?;
        Some(joint.anchors(a, b))
    }

    pub fn joints(&self) -> impl Iterator<Item = (JointKey, &Joint)> {
        self.joints.iter().map(|(i, j)| (JointKey(i), j))
    }

    #[inline]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    //
    // contacts
    //

    #[inline]
    pub fn contact(&self, key: ContactKey) -> Option<&Contact> {
        self.contact_manager.contacts.get(key.0)
    }

    /// Mutable access to per-contact overrides such as friction and tangent speed.
    #[inline]
    pub fn contact_mut(&mut self, key: ContactKey) -> Option<&mut Contact> {
        self.contact_manager.contacts.get_mut(key.0)
    }

    pub fn contacts(&self) -> impl Iterator<Item = (ContactKey, &Contact)> {
        self.contact_manager
            .contacts
            .iter()
            .map(|(i, c)| (ContactKey(i), c))
    }

    #[inline]
    pub fn contact_count(&self) -> usize {
        self.contact_manager.contacts.len()
    }

    /// The manifold of a contact in world coordinates.
    pub fn world_manifold(&self, key: ContactKey) -> Option<WorldManifold> {
        let contact = self.contact_manager.contacts.get(key.0)?;
        let fixture_a = self.fixtures.get(contact.fixture_a.0)?;
        let fixture_b = self.fixtures.get(contact.fixture_b.0)?;
        let (body_a, body_b) = self.body_pair(contact.body_a, contact.body_b).ok()?;
        Some(WorldManifold::new(
            &contact.manifold,
            &body_a.xf,
            fixture_a.shape.radius(),
            &body_b.xf,
            fixture_b.shape.radius(),
        ))
    }

    /// Restore the friction of a contact to the mix of its fixtures' friction.
    pub fn reset_contact_friction(&mut self, key: ContactKey) -> Result<()> {
        let contact = self
            .contact_manager
            .contacts
            .get_mut(key.0)
            .ok_or(PhysicsError::InvalidHandle("contact"))?;
        let (fixture_a, fixture_b) = fixture_pair(&self.fixtures, contact)?;
        contact.friction = settings::mix_friction(fixture_a.friction, fixture_b.friction);
        Ok(())
    }

    /// Restore the restitution of a contact to the mix of its fixtures' restitution.
    pub fn reset_contact_restitution(&mut self, key: ContactKey) -> Result<()> {
        let contact = self
            .contact_manager
            .contacts
            .get_mut(key.0)
            .ok_or(PhysicsError::InvalidHandle("contact"))?;
        let (fixture_a, fixture_b) = fixture_pair(&self.fixtures, contact)?;
        contact.restitution =
            settings::mix_restitution(fixture_a.restitution, fixture_b.restitution);
        Ok(())
    }

    //
    // global state
    //

    #[inline]
    pub fn gravity(&self) -> Vec2 {
        self.settings.gravity
    }

    #[inline]
    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.settings.gravity = gravity;
    }

    #[inline]
    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// Disallowing sleep wakes up every body.
    pub fn set_allow_sleeping(&mut self, flag: bool) {
        if flag == self.settings.allow_sleep {
            return;
        }
        self.settings.allow_sleep = flag;
        if !flag {
            for (_, body) in self.bodies.iter_mut() {
                body.set_awake(true);
            }
        }
    }

    #[inline]
    pub fn set_warm_starting(&mut self, flag: bool) {
        self.settings.warm_starting = flag;
    }

    #[inline]
    pub fn set_continuous_physics(&mut self, flag: bool) {
        self.settings.continuous_physics = flag;
    }

    #[inline]
    pub fn set_sub_stepping(&mut self, flag: bool) {
        self.settings.sub_stepping = flag;
    }

    #[inline]
    pub fn set_auto_clear_forces(&mut self, flag: bool) {
        self.settings.auto_clear_forces = flag;
    }

    /// Timings of the last step.
    #[inline]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    #[inline]
    pub fn proxy_count(&self) -> usize {
        self.contact_manager.broad_phase.proxy_count()
    }

    #[inline]
    pub fn tree_height(&self) -> i32 {
        self.contact_manager.broad_phase.tree_height()
    }

    #[inline]
    pub fn tree_balance(&self) -> i32 {
        self.contact_manager.broad_phase.tree_balance()
    }

    /// Ratio of the total node area to the root area of the broad-phase tree.
    #[inline]
    pub fn tree_quality(&self) -> f64 {
        self.contact_manager.broad_phase.tree_quality()
    }

    /// Zero the accumulated forces and torques of every body.
    /// Done automatically after each step unless `auto_clear_forces` is off.
    pub fn clear_forces(&mut self) {
        for (_, body) in self.bodies.iter_mut() {
            body.force = Vec2::zero();
            body.torque = 0.0;
        }
    }

    /// Move the world origin. Useful in large worlds to keep coordinates small.
    /// `new_origin` is the position of the new origin in the old coordinates.
    pub fn shift_origin(&mut self, new_origin: Vec2) -> Result<()> {
        self.check_unlocked()?;
        for (_, body) in self.bodies.iter_mut() {
            body.xf.p -= new_origin;
            body.sweep.c0 -= new_origin;
            body.sweep.c -= new_origin;
        }
        for (_, fixture) in self.fixtures.iter_mut() {
            for proxy in &mut fixture.proxies {
                proxy.aabb.lower -= new_origin;
                proxy.aabb.upper -= new_origin;
            }
        }
        for (_, joint) in self.joints.iter_mut() {
            joint.shift_origin(new_origin);
        }
        self.contact_manager.broad_phase.shift_origin(new_origin);
        Ok(())
    }

    //
    // queries
    //

    /// Call `callback` for every fixture whose broad-phase AABB overlaps `aabb`.
    /// Return false from the callback to stop the query.
    pub fn query_aabb(&self, aabb: &Aabb, mut callback: impl FnMut(FixtureKey) -> bool) {
        let broad_phase = &self.contact_manager.broad_phase;
        broad_phase.query(aabb, |proxy| callback(broad_phase.user_data(proxy).fixture));
    }

    /// Cast a ray from `p1` to `p2` against every fixture in its path.
    ///
    /// The callback receives the fixture, the hit point, the surface normal
    /// and the fraction along the ray, and controls how the cast continues:
    /// return -1 to ignore the hit, 0 to stop, the fraction to clip the ray
    /// to this hit or 1 to continue without clipping.
    /// Hits are not reported in any particular order.
    pub fn ray_cast(
        &self,
        p1: Vec2,
        p2: Vec2,
        mut callback: impl FnMut(FixtureKey, Vec2, Vec2, f64) -> f64,
    ) {
        let input = RayCastInput {
            p1,
            p2,
            max_fraction: 1.0,
        };
        let broad_phase = &self.contact_manager.broad_phase;
        broad_phase.ray_cast(&input, |sub_input, proxy| {
            let proxy = broad_phase.user_data(proxy);
            let hit = self.fixtures.get(proxy.fixture.0).and_then(|fixture| {
                let body = self.bodies.get(fixture.body.0)?;
                fixture.ray_cast(sub_input, &body.xf, proxy.child_index)
            });
            match hit {
                Some(output) => {
                    let fraction = output.fraction;
                    let point = (1.0 - fraction) * sub_input.p1 + fraction * sub_input.p2;
                    callback(proxy.fixture, point, output.normal, fraction)
                }
                None => sub_input.max_fraction,
            }
        });
    }

    //
    // stepping
    //

    /// Advance the simulation by `dt` seconds.
    ///
    /// More iterations give more accurate constraint solving at a higher cost.
    /// Typical values are 8 velocity and 3 position iterations.
    /// The world is locked for the duration of the step.
    pub fn step(
        &mut self,
        dt: f64,
        velocity_iterations: usize,
        position_iterations: usize,
    ) -> Result<()> {
        self.check_unlocked()?;
        let _span = tracy_span!("step", "step");
        let step_timer = Timer::start();
        self.profile = Profile::default();

        // fixtures were added, find their contacts before collision
        if self.new_fixture {
            self.contact_manager
                .find_new_contacts(&mut self.bodies, &self.fixtures, &self.joints);
            self.new_fixture = false;
        }

        self.locked = true;

        let step = TimeStep {
            dt,
            inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
            dt_ratio: self.inv_dt0 * dt,
            velocity_iterations,
            position_iterations,
            warm_starting: self.settings.warm_starting,
        };

        {
            let _span = tracy_span!("collide", "step");
            let timer = Timer::start();
            self.contact_manager
                .collide(&mut self.bodies, &self.fixtures, &self.joints);
            self.profile.collide = timer.millis();
        }

        if self.step_complete && step.dt > 0.0 {
            let timer = Timer::start();
            self.solve(step);
            self.profile.solve = timer.millis();
        }

        if self.settings.continuous_physics && step.dt > 0.0 {
            let timer = Timer::start();
            self.solve_toi(step);
            self.profile.solve_toi = timer.millis();
        }

        if step.dt > 0.0 {
            self.inv_dt0 = step.inv_dt;
        }

        if self.settings.auto_clear_forces {
            self.clear_forces();
        }

        self.locked = false;
        self.profile.step = step_timer.millis();
        Ok(())
    }

    /// Find islands of connected awake bodies and solve each of them.
    fn solve(&mut self, step: TimeStep) {
        let _span = tracy_span!("solve", "solve");

        for (_, body) in self.bodies.iter_mut() {
            body.flags.remove(BodyFlags::ISLAND);
        }
        for (_, contact) in self.contact_manager.contacts.iter_mut() {
            contact.flags.remove(ContactFlags::ISLAND);
        }
        for (_, joint) in self.joints.iter_mut() {
            joint.island_flag = false;
        }

        let seeds: Vec<BodyKey> = self.bodies.iter().map(|(i, _)| BodyKey(i)).collect();
        let mut stack: Vec<BodyKey> = Vec::with_capacity(self.bodies.len());
        let mut island = std::mem::take(&mut self.island);

        for seed_key in seeds {
            let seed = &mut self.bodies[seed_key.0];
            if seed.flags.contains(BodyFlags::ISLAND) || !seed.is_awake() || !seed.is_active() {
                continue;
            }
            // islands grow from dynamic and kinematic bodies only
            if seed.body_type == BodyType::Static {
                continue;
            }

            island.clear();
            stack.clear();
            stack.push(seed_key);
            seed.flags.insert(BodyFlags::ISLAND);

            // depth first search over the constraint graph
            while let Some(key) = stack.pop() {
                let body = &mut self.bodies[key.0];
                debug_assert!(body.is_active());
                island.add_body(key, body);
                // wake without resetting the sleep timer
                body.flags.insert(BodyFlags::AWAKE);

                // islands don't propagate across static bodies
                if body.body_type == BodyType::Static {
                    continue;
                }

                for i in 0..self.bodies[key.0].contacts.len() {
                    let edge = self.bodies[key.0].contacts[i];
                    let Some(contact) = self.contact_manager.contacts.get_mut(edge.contact.0)
                    else {
                        continue;
                    };
                    if contact.flags.contains(ContactFlags::ISLAND)
                        || !contact.is_enabled()
                        || !contact.is_touching()
                    {
                        continue;
                    }
                    let is_sensor =
                        |k: FixtureKey| self.fixtures.get(k.0).map_or(true, |f| f.is_sensor);
                    if is_sensor(contact.fixture_a) || is_sensor(contact.fixture_b) {
                        continue;
                    }

                    contact.flags.insert(ContactFlags::ISLAND);
                    island.add_contact(edge.contact);

                    let other = &mut self.bodies[edge.other.0];
                    if other.flags.contains(BodyFlags::ISLAND) {
                        continue;
                    }
                    other.flags.insert(BodyFlags::ISLAND);
                    stack.push(edge.other);
                }

                for i in 0..self.bodies[key.0].joints.len() {
                    let edge = self.bodies[key.0].joints[i];
                    let Some(joint) = self.joints.get_mut(edge.joint.0) else {
                        continue;
                    };
                    if joint.island_flag {
                        continue;
                    }
                    let other = &mut self.bodies[edge.other.0];
                    // joints to inactive bodies are not simulated
                    if !other.is_active() {
                        continue;
                    }

                    joint.island_flag = true;
                    island.add_joint(edge.joint);

                    if other.flags.contains(BodyFlags::ISLAND) {
                        continue;
                    }
                    other.flags.insert(BodyFlags::ISLAND);
                    stack.push(edge.other);
                }
            }

            island.solve(
                &mut self.profile,
                step,
                self.settings.gravity,
                self.settings.allow_sleep,
                IslandStorage {
                    bodies: &mut self.bodies,
                    fixtures: &self.fixtures,
                    contacts: &mut self.contact_manager.contacts,
                    joints: &mut self.joints,
                    listener: listener_mut(&mut self.contact_manager.contact_listener),
                },
            );

            // static bodies may take part in other islands
            for key in &island.bodies {
                let body = &mut self.bodies[key.0];
                if body.body_type == BodyType::Static {
                    body.flags.remove(BodyFlags::ISLAND);
                }
            }
        }
        self.island = island;

        let _span = tracy_span!("broad phase", "solve");
        let timer = Timer::start();
        for (_, body) in self.bodies.iter() {
            // bodies that weren't in an island didn't move
            if !body.flags.contains(BodyFlags::ISLAND) || body.body_type == BodyType::Static {
                continue;
            }
            body.synchronize_fixtures(&mut self.fixtures, &mut self.contact_manager.broad_phase);
        }
        self.contact_manager
            .find_new_contacts(&mut self.bodies, &self.fixtures, &self.joints);
        self.profile.broadphase = timer.millis();
    }

    /// Find the earliest time of impact among all contacts that need
    /// continuous collision, computing and caching TOIs as needed.
    fn find_min_toi(&mut self) -> Option<(ContactKey, f64)> {
        let mut min_contact = None;
        let mut min_alpha = 1.0;

        for (index, contact) in self.contact_manager.contacts.iter_mut() {
            if !contact.is_enabled() || contact.toi_count > MAX_SUB_STEPS {
                continue;
            }

            let alpha = if contact.flags.contains(ContactFlags::TOI) {
                contact.toi
            } else {
                let (Some(fixture_a), Some(fixture_b)) = (
                    self.fixtures.get(contact.fixture_a.0),
                    self.fixtures.get(contact.fixture_b.0),
                ) else {
                    continue;
                };
                if fixture_a.is_sensor || fixture_b.is_sensor {
                    continue;
                }
                let (Some(body_a), Some(body_b)) =
                    self.bodies.get2_mut(contact.body_a.0, contact.body_b.0)
                else {
                    continue;
                };

                let active_a = body_a.is_awake() && body_a.body_type != BodyType::Static;
                let active_b = body_b.is_awake() && body_b.body_type != BodyType::Static;
                if !active_a && !active_b {
                    continue;
                }

                // non-bullet dynamic bodies don't collide continuously with each other
                let collide_a = body_a.is_bullet() || body_a.body_type != BodyType::Dynamic;
                let collide_b = body_b.is_bullet() || body_b.body_type != BodyType::Dynamic;
                if !collide_a && !collide_b {
                    continue;
                }

                // put the sweeps onto the same time interval
                let mut alpha0 = body_a.sweep.alpha0;
                if body_a.sweep.alpha0 < body_b.sweep.alpha0 {
                    alpha0 = body_b.sweep.alpha0;
                    body_a.sweep.advance(alpha0);
                } else if body_b.sweep.alpha0 < body_a.sweep.alpha0 {
                    alpha0 = body_a.sweep.alpha0;
                    body_b.sweep.advance(alpha0);
                }
                debug_assert!(alpha0 < 1.0);

                let output = time_of_impact(&TOIInput {
                    proxy_a: DistanceProxy::new(&fixture_a.shape, contact.child_a),
                    proxy_b: DistanceProxy::new(&fixture_b.shape, contact.child_b),
                    sweep_a: body_a.sweep,
                    sweep_b: body_b.sweep,
                    t_max: 1.0,
                });

                // beta is the fraction of the remaining portion of the step
                let alpha = if output.state == TOIState::Touching {
                    (alpha0 + (1.0 - alpha0) * output.t).min(1.0)
                } else {
                    1.0
                };
                contact.toi = alpha;
                contact.flags.insert(ContactFlags::TOI);
                alpha
            };

            if alpha < min_alpha {
                min_alpha = alpha;
                min_contact = Some(ContactKey(index));
            }
        }

        min_contact.map(|key| (key, min_alpha))
    }

    /// Update the manifold of one contact outside the regular collide pass.
    fn update_contact(&mut self, key: ContactKey) {
        let Some(contact) = self.contact_manager.contacts.get_mut(key.0) else {
            return;
        };
        let (Some(fixture_a), Some(fixture_b)) = (
            self.fixtures.get(contact.fixture_a.0),
            self.fixtures.get(contact.fixture_b.0),
        ) else {
            return;
        };
        let (Some(body_a), Some(body_b)) = (
            self.bodies.get(contact.body_a.0),
            self.bodies.get(contact.body_b.0),
        ) else {
            return;
        };
        let (xf_a, xf_b) = (body_a.xf, body_b.xf);
        let (key_a, key_b) = (contact.body_a, contact.body_b);

        let wake = contact.update(
            fixture_a,
            &xf_a,
            fixture_b,
            &xf_b,
            listener_mut(&mut self.contact_manager.contact_listener),
        );
        if wake {
            for body_key in [key_a, key_b] {
                if let Some(body) = self.bodies.get_mut(body_key.0) {
                    body.set_awake(true);
                }
            }
        }
    }

    /// Resolve time of impact events in order, moving the bodies involved
    /// to the moment of impact and solving a sub-step from there.
    fn solve_toi(&mut self, step: TimeStep) {
        let _span = tracy_span!("solve TOI", "solve_toi");

        if self.step_complete {
            for (_, body) in self.bodies.iter_mut() {
                body.flags.remove(BodyFlags::ISLAND);
                body.sweep.alpha0 = 0.0;
            }
            for (_, contact) in self.contact_manager.contacts.iter_mut() {
                contact.flags.remove(ContactFlags::TOI | ContactFlags::ISLAND);
                contact.toi_count = 0;
                contact.toi = 1.0;
            }
        }

        let mut island = std::mem::take(&mut self.island);

        loop {
            let Some((min_key, min_alpha)) = self
                .find_min_toi()
                .filter(|&(_, alpha)| alpha < 1.0 - 10.0 * f64::EPSILON)
            else {
                // no more TOI events
                self.step_complete = true;
                break;
            };
            log::trace!("Time of impact at {:.4} on contact {:?}", min_alpha, min_key);

            let contact = &self.contact_manager.contacts[min_key.0];
            let (key_a, key_b) = (contact.body_a, contact.body_b);
            let backup_a = self.bodies[key_a.0].sweep;
            let backup_b = self.bodies[key_b.0].sweep;

            self.bodies[key_a.0].advance(min_alpha);
            self.bodies[key_b.0].advance(min_alpha);

            // the TOI contact likely has some new contact points
            self.update_contact(min_key);
            let contact = &mut self.contact_manager.contacts[min_key.0];
            contact.flags.remove(ContactFlags::TOI);
            contact.toi_count += 1;

            if !contact.is_enabled() || !contact.is_touching() {
                // not solid, restore the sweeps
                contact.set_enabled(false);
                for (key, backup) in [(key_a, backup_a), (key_b, backup_b)] {
                    let body = &mut self.bodies[key.0];
                    body.sweep = backup;
                    body.synchronize_transform();
                }
                continue;
            }
            contact.flags.insert(ContactFlags::ISLAND);

            island.clear();
            for key in [key_a, key_b] {
                let body = &mut self.bodies[key.0];
                body.set_awake(true);
                body.flags.insert(BodyFlags::ISLAND);
                island.add_body(key, body);
            }
            island.add_contact(min_key);

            // pull in the static, kinematic and bullet bodies touching the pair
            for body_key in [key_a, key_b] {
                let body = &self.bodies[body_key.0];
                if body.body_type != BodyType::Dynamic {
                    continue;
                }
                let is_bullet = body.is_bullet();

                for i in 0..self.bodies[body_key.0].contacts.len() {
                    if island.bodies.len() == 2 * MAX_TOI_CONTACTS
                        || island.contacts.len() == MAX_TOI_CONTACTS
                    {
                        break;
                    }

                    let edge = self.bodies[body_key.0].contacts[i];
                    let Some(contact) = self.contact_manager.contacts.get(edge.contact.0) else {
                        continue;
                    };
                    if contact.flags.contains(ContactFlags::ISLAND) {
                        continue;
                    }

                    let other = &self.bodies[edge.other.0];
                    if other.body_type == BodyType::Dynamic && !is_bullet && !other.is_bullet() {
                        continue;
                    }
                    let is_sensor =
                        |k: FixtureKey| self.fixtures.get(k.0).map_or(true, |f| f.is_sensor);
                    if is_sensor(contact.fixture_a) || is_sensor(contact.fixture_b) {
                        continue;
                    }

                    // tentatively advance the other body to the TOI
                    let backup = other.sweep;
                    let other_in_island = other.flags.contains(BodyFlags::ISLAND);
                    if !other_in_island {
                        self.bodies[edge.other.0].advance(min_alpha);
                    }

                    self.update_contact(edge.contact);
                    let contact = &mut self.contact_manager.contacts[edge.contact.0];
                    if !contact.is_enabled() || !contact.is_touching() {
                        let other = &mut self.bodies[edge.other.0];
                        other.sweep = backup;
                        other.synchronize_transform();
                        continue;
                    }

                    contact.flags.insert(ContactFlags::ISLAND);
                    island.add_contact(edge.contact);

                    if other_in_island {
                        continue;
                    }
                    let other = &mut self.bodies[edge.other.0];
                    other.flags.insert(BodyFlags::ISLAND);
                    if other.body_type != BodyType::Static {
                        other.set_awake(true);
                    }
                    island.add_body(edge.other, other);
                }
            }

            let dt = (1.0 - min_alpha) * step.dt;
            let sub_step = TimeStep {
                dt,
                inv_dt: 1.0 / dt,
                dt_ratio: 1.0,
                velocity_iterations: step.velocity_iterations,
                position_iterations: 20,
                warm_starting: false,
            };
            let toi_index_a = self.bodies[key_a.0].island_index;
            let toi_index_b = self.bodies[key_b.0].island_index;
            island.solve_toi(
                sub_step,
                toi_index_a,
                toi_index_b,
                IslandStorage {
                    bodies: &mut self.bodies,
                    fixtures: &self.fixtures,
                    contacts: &mut self.contact_manager.contacts,
                    joints: &mut self.joints,
                    listener: listener_mut(&mut self.contact_manager.contact_listener),
                },
            );

            // reset island flags and synchronize broad-phase proxies
            for key in &island.bodies {
                let body = &mut self.bodies[key.0];
                body.flags.remove(BodyFlags::ISLAND);
                if body.body_type != BodyType::Dynamic {
                    continue;
                }
                body.synchronize_fixtures(&mut self.fixtures, &mut self.contact_manager.broad_phase);

                // the body moved, so its cached TOIs are invalid
                for edge in &body.contacts {
                    if let Some(contact) = self.contact_manager.contacts.get_mut(edge.contact.0) {
                        contact.flags.remove(ContactFlags::TOI | ContactFlags::ISLAND);
                    }
                }
            }

            // commit proxy movements so that new contacts get created
            self.contact_manager
                .find_new_contacts(&mut self.bodies, &self.fixtures, &self.joints);

            if self.settings.sub_stepping {
                self.step_complete = false;
                break;
            }
        }

        self.island = island;
    }
}

fn fixture_pair<'a>(
    fixtures: &'a td::Arena<Fixture>,
    contact: &Contact,
) -> Result<(&'a Fixture, &'a Fixture)> {
    match (
        fixtures.get(contact.fixture_a.0),
        fixtures.get(contact.fixture_b.0),
    ) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(PhysicsError::InvalidHandle("fixture")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collision::{CircleShape, PolygonShape},
        dynamics::joint::{DistanceJointDef, RevoluteJointDef},
    };

    fn ground_and_ball(world: &mut World) -> (BodyKey, BodyKey) {
        let ground = world.create_body(&BodyDef::new_static()).unwrap();
        world
            .create_fixture(
                ground,
                &FixtureDef::new(PolygonShape::new_box(10.0, 0.5).unwrap()),
            )
            .unwrap();
        let ball = world
            .create_body(&BodyDef::new_dynamic().with_position(Vec2::new(0.0, 0.95)))
            .unwrap();
        world
            .create_fixture(
                ball,
                &FixtureDef::new(CircleShape::new(0.5).unwrap()).with_density(1.0),
            )
            .unwrap();
        (ground, ball)
    }

    #[test]
    fn locked_world_rejects_mutation() {
        let mut world = World::default();
        let (ground, ball) = ground_and_ball(&mut world);

        world.locked = true;
        assert_eq!(
            world.create_body(&BodyDef::new_dynamic()),
            Err(PhysicsError::Locked)
        );
        assert_eq!(world.destroy_body(ball), Err(PhysicsError::Locked));
        assert_eq!(
            world.create_fixture(ball, &FixtureDef::new(CircleShape::new(1.0).unwrap())),
            Err(PhysicsError::Locked)
        );
        let def = RevoluteJointDef::new(ground, ball);
        assert_eq!(
            world.create_joint(&def.into()),
            Err(PhysicsError::Locked)
        );
        assert_eq!(
            world.set_transform(ball, Vec2::zero(), 0.0),
            Err(PhysicsError::Locked)
        );
        assert_eq!(world.step(1.0 / 60.0, 8, 3), Err(PhysicsError::Locked));
        assert_eq!(world.body_count(), 2);

        world.locked = false;
        assert!(world.step(1.0 / 60.0, 8, 3).is_ok());
        assert!(!world.is_locked());
    }

    #[test]
    fn stale_keys_are_rejected() {
        let mut world = World::default();
        let (_, ball) = ground_and_ball(&mut world);
        world.destroy_body(ball).unwrap();

        assert!(world.body(ball).is_none());
        assert_eq!(
            world.destroy_body(ball),
            Err(PhysicsError::InvalidHandle("body"))
        );
        let replacement = world.create_body(&BodyDef::new_dynamic()).unwrap();
        assert_ne!(replacement, ball);
        assert!(world.body(ball).is_none());
    }

    #[test]
    fn new_fixtures_produce_contacts_on_step() {
        let mut world = World::default();
        ground_and_ball(&mut world);
        assert_eq!(world.contact_count(), 0);
        world.step(1.0 / 60.0, 8, 3).unwrap();
        assert_eq!(world.contact_count(), 1);
        let (_, contact) = world.contacts().next().unwrap();
        assert!(contact.is_touching());
    }

    #[test]
    fn joint_without_collide_connected_removes_contact() {
        let mut world = World::default();
        let (ground, ball) = ground_and_ball(&mut world);
        world.step(1.0 / 60.0, 8, 3).unwrap();
        assert_eq!(world.contact_count(), 1);

        let def = DistanceJointDef::new(ground, ball);
        let joint = world.create_joint(&def.into()).unwrap();
        assert_eq!(world.body(ball).unwrap().joints().len(), 1);
        world.step(1.0 / 60.0, 8, 3).unwrap();
        assert_eq!(world.contact_count(), 0);

        world.destroy_joint(joint).unwrap();
        assert!(world.body(ground).unwrap().joints().is_empty());
        assert_eq!(
            world.destroy_joint(joint),
            Err(PhysicsError::InvalidHandle("joint"))
        );
    }

    #[test]
    fn destroying_fixture_updates_mass() {
        let mut world = World::default();
        let body = world.create_body(&BodyDef::new_dynamic()).unwrap();
        let small = world
            .create_fixture(
                body,
                &FixtureDef::new(CircleShape::new(0.5).unwrap()).with_density(1.0),
            )
            .unwrap();
        let big = world
            .create_fixture(
                body,
                &FixtureDef::new(CircleShape::new(1.0).unwrap()).with_density(1.0),
            )
            .unwrap();
        let both = world.body(body).unwrap().mass();
        world.destroy_fixture(big).unwrap();
        let mass = world.body(body).unwrap().mass();
        assert!((mass - std::f64::consts::PI * 0.25).abs() < 1e-9);
        assert!(mass < both);
        assert_eq!(world.body(body).unwrap().fixtures(), &[small]);
        assert_eq!(world.proxy_count(), 1);
    }

    #[test]
    fn inactive_bodies_leave_the_broad_phase() {
        let mut world = World::default();
        let (_, ball) = ground_and_ball(&mut world);
        world.step(1.0 / 60.0, 8, 3).unwrap();
        assert_eq!(world.proxy_count(), 2);

        world.set_active(ball, false).unwrap();
        assert_eq!(world.proxy_count(), 1);
        assert_eq!(world.contact_count(), 0);
        let y = world.body(ball).unwrap().position().y;
        world.step(1.0 / 60.0, 8, 3).unwrap();
        assert_eq!(world.body(ball).unwrap().position().y, y);

        world.set_active(ball, true).unwrap();
        world.step(1.0 / 60.0, 8, 3).unwrap();
        assert_eq!(world.proxy_count(), 2);
        assert_eq!(world.contact_count(), 1);
    }

    #[test]
    fn shifting_origin_moves_everything() {
        let mut world = World::default();
        let (ground, ball) = ground_and_ball(&mut world);
        world.shift_origin(Vec2::new(5.0, 1.0)).unwrap();
        assert_eq!(world.body(ground).unwrap().position(), Vec2::new(-5.0, -1.0));
        let p = world.body(ball).unwrap().position();
        assert!((p - Vec2::new(-5.0, -0.05)).mag() < 1e-12);
    }
}
