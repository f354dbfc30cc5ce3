use super::body::BodyKey;
use crate::{
    collision::{Aabb, BroadPhase, MassData, ProxyId, RayCastInput, RayCastOutput, Shape},
    math::{Transform, Vec2},
};

use thunderdome as td;

/// Key type to look up a fixture stored in the physics world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FixtureKey(pub(crate) td::Index);

impl FixtureKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// Collision filtering data.
///
/// Two fixtures with the same nonzero `group_index` always collide if the index is
/// positive and never if it is negative. Otherwise each fixture's category must be
/// in the other's mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub struct Filter {
    pub category_bits: u16,
    pub mask_bits: u16,
    pub group_index: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            category_bits: 0x0001,
            mask_bits: 0xFFFF,
            group_index: 0,
        }
    }
}

impl Filter {
    /// The default filtering rule.
    pub fn should_collide(&self, other: &Filter) -> bool {
        if self.group_index == other.group_index && self.group_index != 0 {
            return self.group_index > 0;
        }
        (self.mask_bits & other.category_bits) != 0 && (self.category_bits & other.mask_bits) != 0
    }
}

/// Everything needed to attach a shape to a body.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub struct FixtureDef {
    pub shape: Shape,
    /// Density in kg/m^2.
    pub density: f64,
    pub friction: f64,
    pub restitution: f64,
    /// Sensors detect overlaps but never generate a collision response.
    pub is_sensor: bool,
    pub filter: Filter,
    pub user_data: u64,
}

impl FixtureDef {
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            density: 0.0,
            friction: 0.2,
            restitution: 0.0,
            is_sensor: false,
            filter: Filter::default(),
            user_data: 0,
        }
    }

    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_user_data(mut self, data: u64) -> Self {
        self.user_data = data;
        self
    }
}

/// What the broad phase stores for each proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FixtureProxyRef {
    pub fixture: FixtureKey,
    pub child_index: usize,
}

/// Broad-phase registration of one child of a fixture's shape.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FixtureProxy {
    pub aabb: Aabb,
    pub proxy_id: ProxyId,
}

/// A shape attached to a body, with material and filtering properties.
#[derive(Clone, Debug)]
pub struct Fixture {
    pub(crate) body: BodyKey,
    pub(crate) shape: Shape,
    pub(crate) density: f64,
    pub(crate) friction: f64,
    pub(crate) restitution: f64,
    pub(crate) is_sensor: bool,
    pub(crate) filter: Filter,
    /// One per shape child while the body is active, empty otherwise.
    pub(crate) proxies: Vec<FixtureProxy>,
    pub(crate) user_data: u64,
}

impl Fixture {
    pub(crate) fn new(body: BodyKey, def: &FixtureDef) -> Self {
        Self {
            body,
            shape: def.shape.clone(),
            density: def.density,
            friction: def.friction,
            restitution: def.restitution,
            is_sensor: def.is_sensor,
            filter: def.filter,
            proxies: Vec::new(),
            user_data: def.user_data,
        }
    }

    #[inline]
    pub fn body(&self) -> BodyKey {
        self.body
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    #[inline]
    pub fn filter(&self) -> Filter {
        self.filter
    }

    #[inline]
    pub fn density(&self) -> f64 {
        self.density
    }

    /// Set the density. Call [`World::reset_mass_data`][crate::World::reset_mass_data]
    /// afterwards to update the mass of the body.
    #[inline]
    pub fn set_density(&mut self, density: f64) {
        debug_assert!(density.is_finite() && density >= 0.0);
        self.density = density;
    }

    #[inline]
    pub fn friction(&self) -> f64 {
        self.friction
    }

    /// Existing contacts keep their mixed friction until reset.
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
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    #[inline]
    pub fn set_user_data(&mut self, data: u64) {
        self.user_data = data;
    }

    /// Mass properties of the shape with this fixture's density.
    pub fn mass_data(&self) -> MassData {
        self.shape.compute_mass(self.density)
    }

    /// The fat AABB of a child as stored in the broad phase.
    /// `None` if the body is inactive or the child doesn't exist.
    pub fn aabb(&self, child_index: usize) -> Option<Aabb> {
        self.proxies.get(child_index).map(|p| p.aabb)
    }

    /// Test a world point for containment, given the transform of the body.
    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        self.shape.test_point(xf, p)
    }

    /// Cast a ray against a child shape, given the transform of the body.
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: &Transform,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        self.shape.ray_cast(input, xf, child_index)
    }

    //
    // broad phase
    //

    pub(crate) fn create_proxies(
        &mut self,
        broad_phase: &mut BroadPhase<FixtureProxyRef>,
        xf: &Transform,
        key: FixtureKey,
    ) {
        debug_assert!(self.proxies.is_empty());
        for child_index in 0..self.shape.child_count() {
            let aabb = self.shape.compute_aabb(xf, child_index);
            let proxy_id = broad_phase.create_proxy(
                aabb,
                FixtureProxyRef {
                    fixture: key,
                    child_index,
                },
            );
            self.proxies.push(FixtureProxy { aabb, proxy_id });
        }
    }

    pub(crate) fn destroy_proxies(&mut self, broad_phase: &mut BroadPhase<FixtureProxyRef>) {
        for proxy in self.proxies.drain(..) {
            broad_phase.destroy_proxy(proxy.proxy_id);
        }
    }

    /// Cover the swept motion from `xf1` to `xf2` in the broad phase.
    pub(crate) fn synchronize(
        &mut self,
        broad_phase: &mut BroadPhase<FixtureProxyRef>,
        xf1: &Transform,
        xf2: &Transform,
    ) {
        for (child_index, proxy) in self.proxies.iter_mut().enumerate() {
            let aabb1 = self.shape.compute_aabb(xf1, child_index);
            let aabb2 = self.shape.compute_aabb(xf2, child_index);
            proxy.aabb = aabb1.combine(&aabb2);

            let displacement = xf2.p - xf1.p;
            broad_phase.move_proxy(proxy.proxy_id, proxy.aabb, displacement);
        }
    }

    pub(crate) fn touch_proxies(&self, broad_phase: &mut BroadPhase<FixtureProxyRef>) {
        for proxy in &self.proxies {
            broad_phase.touch_proxy(proxy.proxy_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_index_overrides_bits() {
        let friends = Filter {
            group_index: 3,
            mask_bits: 0,
            ..Default::default()
        };
        assert!(friends.should_collide(&friends));

        let loners = Filter {
            group_index: -2,
            ..Default::default()
        };
        assert!(!loners.should_collide(&loners));
    }

    #[test]
    fn category_must_be_in_both_masks() {
        let player = Filter {
            category_bits: 0x0002,
            mask_bits: 0x0001,
            group_index: 0,
        };
        let ground = Filter::default();
        let other_player = player;
        assert!(player.should_collide(&ground));
        assert!(ground.should_collide(&player));
        assert!(!player.should_collide(&other_player));
    }
}
