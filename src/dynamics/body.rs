use super::{
    contact::ContactKey,
    fixture::{Fixture, FixtureKey, FixtureProxyRef},
    joint::JointKey,
};
use crate::{
    collision::{BroadPhase, MassData},
    error::{PhysicsError, Result},
    math::{self as m, Angle, Rot, Sweep, Transform, Vec2},
};

use thunderdome as td;

/// Key type to look up a body stored in the physics world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyKey(pub(crate) td::Index);

impl BodyKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    /// Useful for creating your own mappings from bodies to other things.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// How a body responds to forces and collisions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub enum BodyType {
    /// Zero velocity, infinite mass, moved only by hand.
    #[default]
    Static,
    /// Moves according to its velocity but is not pushed around by anything.
    Kinematic,
    /// Fully simulated.
    Dynamic,
}

/// Everything needed to construct a body.
/// Shapes are attached afterwards as fixtures.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde-types", serde(default))]
pub struct BodyDef {
    pub body_type: BodyType,
    /// World position of the body origin.
    pub position: Vec2,
    /// World angle of the body in radians.
    pub angle: f64,
    /// Linear velocity of the body origin.
    pub linear_velocity: Vec2,
    pub angular_velocity: f64,
    pub linear_damping: f64,
    pub angular_damping: f64,
    /// Set to false if this body should never fall asleep.
    pub allow_sleep: bool,
    pub awake: bool,
    /// Prevents rotation, useful for characters.
    pub fixed_rotation: bool,
    /// Enables continuous collision against other dynamic bodies.
    /// Costly, only use this for small fast things.
    pub bullet: bool,
    pub active: bool,
    pub gravity_scale: f64,
    pub user_data: u64,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vec2::zero(),
            angle: 0.0,
            linear_velocity: Vec2::zero(),
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            active: true,
            gravity_scale: 1.0,
            user_data: 0,
        }
    }
}

impl BodyDef {
    pub fn new_static() -> Self {
        Self::default()
    }

    pub fn new_kinematic() -> Self {
        Self {
            body_type: BodyType::Kinematic,
            ..Default::default()
        }
    }

    pub fn new_dynamic() -> Self {
        Self {
            body_type: BodyType::Dynamic,
            ..Default::default()
        }
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    /// Plain `f64` values are taken as radians.
    pub fn with_angle(mut self, angle: impl Into<Angle>) -> Self {
        self.angle = angle.into().rad();
        self
    }

    pub fn with_linear_velocity(mut self, vel: Vec2) -> Self {
        self.linear_velocity = vel;
        self
    }

    pub fn with_angular_velocity(mut self, vel: f64) -> Self {
        self.angular_velocity = vel;
        self
    }

    pub fn with_damping(mut self, linear: f64, angular: f64) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn with_allow_sleep(mut self, allow: bool) -> Self {
        self.allow_sleep = allow;
        self
    }

    pub fn with_awake(mut self, awake: bool) -> Self {
        self.awake = awake;
        self
    }

    pub fn with_fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self
    }

    pub fn with_bullet(mut self, bullet: bool) -> Self {
        self.bullet = bullet;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_gravity_scale(mut self, scale: f64) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn with_user_data(mut self, data: u64) -> Self {
        self.user_data = data;
        self
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct BodyFlags: u16 {
        const ISLAND = 1 << 0;
        const AWAKE = 1 << 1;
        const AUTO_SLEEP = 1 << 2;
        const BULLET = 1 << 3;
        const FIXED_ROTATION = 1 << 4;
        const ACTIVE = 1 << 5;
        const TOI = 1 << 6;
    }
}

/// Connects a body to a joint in the constraint graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JointEdge {
    pub other: BodyKey,
    pub joint: JointKey,
}

/// Connects a body to a contact in the constraint graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContactEdge {
    pub other: BodyKey,
    pub contact: ContactKey,
}

/// A rigid body.
///
/// Bodies are created and destroyed through the [`World`][crate::World].
/// Operations that only touch the body itself (forces, velocities, sleep state)
/// are available here directly; ones that affect fixtures or contacts
/// (transform, type, activity, mass) go through the world.
#[derive(Clone, Debug)]
pub struct Body {
    pub(crate) body_type: BodyType,
    pub(crate) flags: BodyFlags,
    pub(crate) island_index: usize,

    /// Transform of the body origin.
    pub(crate) xf: Transform,
    pub(crate) sweep: Sweep,

    pub(crate) linear_velocity: Vec2,
    pub(crate) angular_velocity: f64,
    pub(crate) force: Vec2,
    pub(crate) torque: f64,

    pub(crate) fixtures: Vec<FixtureKey>,
    pub(crate) joints: Vec<JointEdge>,
    pub(crate) contacts: Vec<ContactEdge>,

    pub(crate) mass: f64,
    pub(crate) inv_mass: f64,
    /// Rotational inertia about the center of mass.
    pub(crate) inertia: f64,
    pub(crate) inv_i: f64,

    pub(crate) linear_damping: f64,
    pub(crate) angular_damping: f64,
    pub(crate) gravity_scale: f64,
    pub(crate) sleep_time: f64,

    pub(crate) user_data: u64,
}

impl Body {
    pub(crate) fn new(def: &BodyDef) -> Self {
        let mut flags = BodyFlags::empty();
        flags.set(BodyFlags::BULLET, def.bullet);
        flags.set(BodyFlags::FIXED_ROTATION, def.fixed_rotation);
        flags.set(BodyFlags::AUTO_SLEEP, def.allow_sleep);
        flags.set(BodyFlags::AWAKE, def.awake);
        flags.set(BodyFlags::ACTIVE, def.active);

        let xf = Transform::from_angle(def.position, def.angle);
        let sweep = Sweep {
            local_center: Vec2::zero(),
            c0: xf.p,
            c: xf.p,
            a0: def.angle,
            a: def.angle,
            alpha0: 0.0,
        };

        let (mass, inv_mass) = if def.body_type == BodyType::Dynamic {
            (1.0, 1.0)
        } else {
            (0.0, 0.0)
        };

        Self {
            body_type: def.body_type,
            flags,
            island_index: 0,
            xf,
            sweep,
            linear_velocity: def.linear_velocity,
            angular_velocity: def.angular_velocity,
            force: Vec2::zero(),
            torque: 0.0,
            fixtures: Vec::new(),
            joints: Vec::new(),
            contacts: Vec::new(),
            mass,
            inv_mass,
            inertia: 0.0,
            inv_i: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            sleep_time: 0.0,
            user_data: def.user_data,
        }
    }

    //
    // accessors
    //

    #[inline]
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Transform of the body origin.
    #[inline]
    pub fn transform(&self) -> &Transform {
        &self.xf
    }

    /// World position of the body origin.
    #[inline]
    pub fn position(&self) -> Vec2 {
        self.xf.p
    }

    /// Angle of the body in radians.
    #[inline]
    pub fn angle(&self) -> f64 {
        self.sweep.a
    }

    /// World position of the center of mass.
    #[inline]
    pub fn world_center(&self) -> Vec2 {
        self.sweep.c
    }

    /// Center of mass in body coordinates.
    #[inline]
    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    /// Linear velocity of the center of mass.
    #[inline]
    pub fn linear_velocity(&self) -> Vec2 {
        self.linear_velocity
    }

    #[inline]
    pub fn angular_velocity(&self) -> f64 {
        self.angular_velocity
    }

    #[inline]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Rotational inertia about the body origin.
    #[inline]
    pub fn inertia(&self) -> f64 {
        self.inertia + self.mass * self.sweep.local_center.mag_sq()
    }

    /// Mass, center of mass and rotational inertia about the body origin.
    pub fn mass_data(&self) -> MassData {
        MassData {
            mass: self.mass,
            center: self.sweep.local_center,
            inertia: self.inertia(),
        }
    }

    #[inline]
    pub fn linear_damping(&self) -> f64 {
        self.linear_damping
    }

    #[inline]
    pub fn set_linear_damping(&mut self, damping: f64) {
        self.linear_damping = damping;
    }

    #[inline]
    pub fn angular_damping(&self) -> f64 {
        self.angular_damping
    }

    #[inline]
    pub fn set_angular_damping(&mut self, damping: f64) {
        self.angular_damping = damping;
    }

    #[inline]
    pub fn gravity_scale(&self) -> f64 {
        self.gravity_scale
    }

    #[inline]
    pub fn set_gravity_scale(&mut self, scale: f64) {
        self.gravity_scale = scale;
    }

    #[inline]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    #[inline]
    pub fn set_user_data(&mut self, data: u64) {
        self.user_data = data;
    }

    #[inline]
    pub fn fixtures(&self) -> &[FixtureKey] {
        &self.fixtures
    }

    #[inline]
    pub fn joints(&self) -> &[JointEdge] {
        &self.joints
    }

    /// Contacts this body takes part in, touching or not.
    #[inline]
    pub fn contacts(&self) -> &[ContactEdge] {
        &self.contacts
    }

    //
    // flags
    //

    #[inline]
    pub fn is_awake(&self) -> bool {
        self.flags.contains(BodyFlags::AWAKE)
    }

    /// Wake the body up or put it to sleep.
    /// Sleeping bodies lose their velocity and accumulated forces.
    pub fn set_awake(&mut self, flag: bool) {
        if flag {
            if !self.is_awake() {
                self.flags.insert(BodyFlags::AWAKE);
                self.sleep_time = 0.0;
            }
        } else {
            self.flags.remove(BodyFlags::AWAKE);
            self.sleep_time = 0.0;
            self.linear_velocity = Vec2::zero();
            self.angular_velocity = 0.0;
            self.force = Vec2::zero();
            self.torque = 0.0;
        }
    }

    #[inline]
    pub fn is_sleeping_allowed(&self) -> bool {
        self.flags.contains(BodyFlags::AUTO_SLEEP)
    }

    pub fn set_sleeping_allowed(&mut self, flag: bool) {
        if flag {
            self.flags.insert(BodyFlags::AUTO_SLEEP);
        } else {
            self.flags.remove(BodyFlags::AUTO_SLEEP);
            self.set_awake(true);
        }
    }

    #[inline]
    pub fn is_bullet(&self) -> bool {
        self.flags.contains(BodyFlags::BULLET)
    }

    #[inline]
    pub fn set_bullet(&mut self, flag: bool) {
        self.flags.set(BodyFlags::BULLET, flag);
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.flags.contains(BodyFlags::ACTIVE)
    }

    #[inline]
    pub fn is_fixed_rotation(&self) -> bool {
        self.flags.contains(BodyFlags::FIXED_ROTATION)
    }

    //
    // velocities and forces
    //

    /// Does nothing for static bodies. Wakes the body if the velocity is nonzero.
    pub fn set_linear_velocity(&mut self, vel: Vec2) {
        if self.body_type == BodyType::Static {
            return;
        }
        if vel.dot(vel) > 0.0 {
            self.set_awake(true);
        }
        self.linear_velocity = vel;
    }

    /// Does nothing for static bodies. Wakes the body if the velocity is nonzero.
    pub fn set_angular_velocity(&mut self, vel: f64) {
        if self.body_type == BodyType::Static {
            return;
        }
        if vel * vel > 0.0 {
            self.set_awake(true);
        }
        self.angular_velocity = vel;
    }

    /// Apply a force at a world point. A force off the center of mass also
    /// generates torque. Sleeping bodies ignore forces unless `wake` is set.
    pub fn apply_force(&mut self, force: Vec2, point: Vec2, wake: bool) {
        if !self.prepare_for_input(wake) {
            return;
        }
        self.force += force;
        self.torque += m::cross(point - self.sweep.c, force);
    }

    pub fn apply_force_to_center(&mut self, force: Vec2, wake: bool) {
        if !self.prepare_for_input(wake) {
            return;
        }
        self.force += force;
    }

    pub fn apply_torque(&mut self, torque: f64, wake: bool) {
        if !self.prepare_for_input(wake) {
            return;
        }
        self.torque += torque;
    }

    /// Apply an impulse at a world point, changing the velocity immediately.
    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2, wake: bool) {
        if !self.prepare_for_input(wake) {
            return;
        }
        self.linear_velocity += self.inv_mass * impulse;
        self.angular_velocity += self.inv_i * m::cross(point - self.sweep.c, impulse);
    }

    pub fn apply_angular_impulse(&mut self, impulse: f64, wake: bool) {
        if !self.prepare_for_input(wake) {
            return;
        }
        self.angular_velocity += self.inv_i * impulse;
    }

    /// Returns whether the body is dynamic and awake after optionally waking it.
    fn prepare_for_input(&mut self, wake: bool) -> bool {
        if self.body_type != BodyType::Dynamic {
            return false;
        }
        if wake && !self.is_awake() {
            self.set_awake(true);
        }
        self.is_awake()
    }

    //
    // coordinate conversions
    //

    #[inline]
    pub fn world_point(&self, local_point: Vec2) -> Vec2 {
        self.xf.apply(local_point)
    }

    #[inline]
    pub fn world_vector(&self, local_vector: Vec2) -> Vec2 {
        self.xf.q.apply(local_vector)
    }

    #[inline]
    pub fn local_point(&self, world_point: Vec2) -> Vec2 {
        self.xf.apply_inv(world_point)
    }

    #[inline]
    pub fn local_vector(&self, world_vector: Vec2) -> Vec2 {
        self.xf.q.apply_inv(world_vector)
    }

    /// Velocity of a point fixed to the body, given in world coordinates.
    #[inline]
    pub fn linear_velocity_from_world_point(&self, world_point: Vec2) -> Vec2 {
        self.linear_velocity + m::cross_sv(self.angular_velocity, world_point - self.sweep.c)
    }

    #[inline]
    pub fn linear_velocity_from_local_point(&self, local_point: Vec2) -> Vec2 {
        self.linear_velocity_from_world_point(self.world_point(local_point))
    }

    //
    // internals used by the world and the solvers
    //

    pub(crate) fn synchronize_transform(&mut self) {
        self.xf.q = Rot::from_angle(self.sweep.a);
        self.xf.p = self.sweep.c - self.xf.q.apply(self.sweep.local_center);
    }

    /// Move the body to the time `alpha` of its sweep, making that the new start.
    pub(crate) fn advance(&mut self, alpha: f64) {
        self.sweep.advance(alpha);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.synchronize_transform();
    }

    /// Update the broad-phase proxies of the fixtures to cover the motion
    /// from the start of the sweep to the current transform.
    pub(crate) fn synchronize_fixtures(
        &self,
        fixtures: &mut td::Arena<Fixture>,
        broad_phase: &mut BroadPhase<FixtureProxyRef>,
    ) {
        let q1 = Rot::from_angle(self.sweep.a0);
        let xf1 = Transform::new(self.sweep.c0 - q1.apply(self.sweep.local_center), q1);
        for key in &self.fixtures {
            if let Some(fixture) = fixtures.get_mut(key.0) {
                fixture.synchronize(broad_phase, &xf1, &self.xf);
            }
        }
    }

    /// Recompute mass properties from the densities and shapes of the fixtures.
    pub(crate) fn reset_mass_data(&mut self, fixtures: &td::Arena<Fixture>) {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_i = 0.0;
        self.sweep.local_center = Vec2::zero();

        // static and kinematic bodies have zero mass
        if self.body_type != BodyType::Dynamic {
            self.sweep.c0 = self.xf.p;
            self.sweep.c = self.xf.p;
            self.sweep.a0 = self.sweep.a;
            return;
        }

        let mut local_center = Vec2::zero();
        for fixture in self.fixtures.iter().filter_map(|k| fixtures.get(k.0)) {
            if fixture.density == 0.0 {
                continue;
            }
            let mass_data = fixture.mass_data();
            self.mass += mass_data.mass;
            local_center += mass_data.mass * mass_data.center;
            self.inertia += mass_data.inertia;
        }

        if self.mass > 0.0 {
            self.inv_mass = 1.0 / self.mass;
            local_center *= self.inv_mass;
        } else {
            // dynamic bodies always have positive mass
            self.mass = 1.0;
            self.inv_mass = 1.0;
        }

        if self.inertia > 0.0 && !self.is_fixed_rotation() {
            // shift the inertia to the center of mass
            self.inertia -= self.mass * local_center.mag_sq();
            debug_assert!(self.inertia > 0.0);
            self.inv_i = 1.0 / self.inertia;
        } else {
            self.inertia = 0.0;
            self.inv_i = 0.0;
        }

        self.move_center(local_center);
    }

    /// Override the mass properties computed from fixtures.
    /// Ignored for non-dynamic bodies.
    ///
    /// `inertia` is taken about the body origin, so it must exceed
    /// `mass * center.mag_sq()` unless it is zero (no rotation).
    /// The body is left untouched if it does not.
    pub(crate) fn set_mass_data(&mut self, mass_data: &MassData) -> Result<()> {
        if self.body_type != BodyType::Dynamic {
            return Ok(());
        }

        let mass = if mass_data.mass > 0.0 {
            mass_data.mass
        } else {
            1.0
        };

        let mut inertia = 0.0;
        if mass_data.inertia > 0.0 && !self.is_fixed_rotation() {
            inertia = mass_data.inertia - mass * mass_data.center.mag_sq();
            if inertia <= 0.0 || inertia.is_nan() {
                return Err(PhysicsError::InvalidMassData(
                    "inertia about the origin is smaller than mass times the squared center offset",
                ));
            }
        }

        self.mass = mass;
        self.inv_mass = 1.0 / mass;
        self.inertia = inertia;
        self.inv_i = if inertia > 0.0 { 1.0 / inertia } else { 0.0 };

        self.move_center(mass_data.center);
        Ok(())
    }

    /// Move the center of mass, keeping the velocity of the body origin.
    fn move_center(&mut self, local_center: Vec2) {
        let old_center = self.sweep.c;
        self.sweep.local_center = local_center;
        self.sweep.c = self.xf.apply(local_center);
        self.sweep.c0 = self.sweep.c;

        self.linear_velocity += m::cross_sv(self.angular_velocity, self.sweep.c - old_center);
    }

    pub(crate) fn set_fixed_rotation(&mut self, flag: bool, fixtures: &td::Arena<Fixture>) {
        if self.is_fixed_rotation() == flag {
            return;
        }
        self.flags.set(BodyFlags::FIXED_ROTATION, flag);
        self.angular_velocity = 0.0;
        self.reset_mass_data(fixtures);
    }

    pub(crate) fn set_transform_unsynced(&mut self, position: Vec2, angle: f64) {
        self.xf = Transform::from_angle(position, angle);
        self.sweep.c = self.xf.apply(self.sweep.local_center);
        self.sweep.a = angle;
        self.sweep.c0 = self.sweep.c;
        self.sweep.a0 = angle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dynamic_body() -> Body {
        let mut body = Body::new(&BodyDef::new_dynamic().with_position(Vec2::new(1.0, 2.0)));
        body.set_mass_data(&MassData {
            mass: 2.0,
            center: Vec2::zero(),
            inertia: 0.5,
        })
        .unwrap();
        body
    }

    #[test]
    fn static_bodies_ignore_velocity_and_forces() {
        let mut body = Body::new(&BodyDef::new_static());
        body.set_linear_velocity(Vec2::new(1.0, 0.0));
        body.set_angular_velocity(3.0);
        body.apply_force_to_center(Vec2::new(0.0, 10.0), true);
        assert_eq!(body.linear_velocity(), Vec2::zero());
        assert_eq!(body.angular_velocity(), 0.0);
        assert_eq!(body.force, Vec2::zero());
        assert_eq!(body.mass(), 0.0);
    }

    #[test]
    fn sleeping_body_ignores_forces_without_wake() {
        let mut body = dynamic_body();
        body.set_awake(false);
        body.apply_force_to_center(Vec2::new(1.0, 0.0), false);
        assert!(!body.is_awake());
        assert_eq!(body.force, Vec2::zero());

        body.apply_force_to_center(Vec2::new(1.0, 0.0), true);
        assert!(body.is_awake());
        assert_eq!(body.force, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn off_center_impulse_spins() {
        let mut body = dynamic_body();
        let point = body.world_center() + Vec2::new(0.0, 1.0);
        body.apply_linear_impulse(Vec2::new(1.0, 0.0), point, true);
        assert!((body.linear_velocity().x - 0.5).abs() < 1e-12);
        // cross((0, 1), (1, 0)) = -1, scaled by the inverse inertia of 2
        assert!((body.angular_velocity() + 2.0).abs() < 1e-12);
    }

    #[test]
    fn falling_asleep_clears_motion() {
        let mut body = dynamic_body();
        body.set_linear_velocity(Vec2::new(3.0, 0.0));
        body.apply_torque(1.0, true);
        body.set_awake(false);
        assert_eq!(body.linear_velocity(), Vec2::zero());
        assert_eq!(body.torque, 0.0);

        body.set_sleeping_allowed(false);
        assert!(body.is_awake());
    }

    #[test]
    fn coordinate_conversions_invert() {
        let body = Body::new(
            &BodyDef::new_dynamic()
                .with_position(Vec2::new(3.0, -1.0))
                .with_angle(0.7),
        );
        let p = Vec2::new(0.25, 2.0);
        let back = body.local_point(body.world_point(p));
        assert!((back - p).mag() < 1e-12);
        let v = Vec2::new(-1.0, 0.5);
        let back = body.local_vector(body.world_vector(v));
        assert!((back - v).mag() < 1e-12);
    }

    #[test]
    fn offset_center_changes_origin_inertia() {
        let mut body = Body::new(&BodyDef::new_dynamic());
        body.set_mass_data(&MassData {
            mass: 2.0,
            center: Vec2::new(1.0, 0.0),
            inertia: 3.0,
        })
        .unwrap();
        assert!((body.inertia() - 3.0).abs() < 1e-12);
        assert!((body.inertia - 1.0).abs() < 1e-12);
        assert!((body.world_center() - Vec2::new(1.0, 0.0)).mag() < 1e-12);
    }

    #[test]
    fn origin_inertia_below_offset_term_is_rejected() {
        let mut body = dynamic_body();
        let err = body.set_mass_data(&MassData {
            mass: 1.0,
            center: Vec2::new(2.0, 0.0),
            inertia: 1.0,
        });
        assert!(matches!(err, Err(PhysicsError::InvalidMassData(_))));
        // previous mass properties survive
        assert_eq!(body.mass(), 2.0);
        assert!((body.inertia() - 0.5).abs() < 1e-12);
        assert_eq!(body.local_center(), Vec2::zero());

        // zero inertia is a valid way to lock rotation at any offset
        body.set_mass_data(&MassData {
            mass: 1.0,
            center: Vec2::new(2.0, 0.0),
            inertia: 0.0,
        })
        .unwrap();
        assert_eq!(body.inv_i, 0.0);
        assert!((body.inertia() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn angle_given_in_degrees() {
        let body = Body::new(&BodyDef::new_dynamic().with_angle(Angle::Deg(90.0)));
        assert!((body.angle() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!(body.world_vector(Vec2::unit_x()).x.abs() < 1e-12);
    }
}
