//! Broad phase pair management on top of the dynamic tree.

use super::{dynamic_tree::DynamicTree, Aabb, ProxyId, RayCastInput};
use crate::math::Vec2;

use itertools::Itertools;

/// Tracks which proxies moved since the last update
/// and finds the potentially overlapping pairs involving them.
#[derive(Clone, Debug)]
pub struct BroadPhase<T> {
    tree: DynamicTree<T>,
    move_buffer: Vec<ProxyId>,
    pair_buffer: Vec<(ProxyId, ProxyId)>,
}

impl<T: Copy> Default for BroadPhase<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> BroadPhase<T> {
    pub fn new() -> Self {
        BroadPhase {
            tree: DynamicTree::new(),
            move_buffer: Vec::with_capacity(16),
            pair_buffer: Vec::with_capacity(16),
        }
    }

    /// Create a proxy with an initial AABB.
    /// Pairs are not reported until [`update_pairs`][Self::update_pairs] is called.
    pub fn create_proxy(&mut self, aabb: Aabb, user_data: T) -> ProxyId {
        let id = self.tree.create_proxy(aabb, user_data);
        self.buffer_move(id);
        id
    }

    pub fn destroy_proxy(&mut self, proxy: ProxyId) {
        self.unbuffer_move(proxy);
        self.tree.destroy_proxy(proxy);
    }

    /// Call as many times as you like,
    /// pairs are only reported on the next [`update_pairs`][Self::update_pairs].
    pub fn move_proxy(&mut self, proxy: ProxyId, aabb: Aabb, displacement: Vec2) {
        if self.tree.move_proxy(proxy, aabb, displacement) {
            self.buffer_move(proxy);
        }
    }

    /// Make the proxy report its pairs again on the next update.
    pub fn touch_proxy(&mut self, proxy: ProxyId) {
        self.buffer_move(proxy);
    }

    #[inline]
    pub fn fat_aabb(&self, proxy: ProxyId) -> Aabb {
        self.tree.fat_aabb(proxy)
    }

    #[inline]
    pub fn user_data(&self, proxy: ProxyId) -> T {
        self.tree.user_data(proxy)
    }

    /// Whether the fat AABBs of two proxies overlap.
    #[inline]
    pub fn test_overlap(&self, proxy_a: ProxyId, proxy_b: ProxyId) -> bool {
        self.tree
            .fat_aabb(proxy_a)
            .overlaps(&self.tree.fat_aabb(proxy_b))
    }

    #[inline]
    pub fn proxy_count(&self) -> usize {
        self.tree.proxy_count()
    }

    /// Report every new potentially overlapping pair exactly once
    /// and clear the move buffer.
    pub fn update_pairs(&mut self, mut callback: impl FnMut(T, T)) {
        self.pair_buffer.clear();

        for &query_proxy in &self.move_buffer {
            let fat_aabb = self.tree.fat_aabb(query_proxy);
            let pair_buffer = &mut self.pair_buffer;
            self.tree.query(&fat_aabb, |proxy| {
                // a proxy cannot form a pair with itself
                if proxy != query_proxy {
                    pair_buffer.push((proxy.min(query_proxy), proxy.max(query_proxy)));
                }
                true
            });
        }
        self.move_buffer.clear();

        // both proxies of a pair may have moved, report them once
        self.pair_buffer.sort_unstable();
        for (a, b) in self.pair_buffer.iter().copied().dedup() {
            callback(self.tree.user_data(a), self.tree.user_data(b));
        }
    }

    /// Call `callback` for every proxy whose fat AABB overlaps `aabb`.
    /// Returning false from the callback ends the query.
    pub fn query(&self, aabb: &Aabb, callback: impl FnMut(ProxyId) -> bool) {
        self.tree.query(aabb, callback);
    }

    /// See [`DynamicTree::ray_cast`].
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        callback: impl FnMut(&RayCastInput, ProxyId) -> f64,
    ) {
        self.tree.ray_cast(input, callback);
    }

    pub fn tree_height(&self) -> i32 {
        self.tree.height()
    }

    pub fn tree_balance(&self) -> i32 {
        self.tree.max_balance()
    }

    pub fn tree_quality(&self) -> f64 {
        self.tree.area_ratio()
    }

    pub fn shift_origin(&mut self, new_origin: Vec2) {
        self.tree.shift_origin(new_origin);
    }

    fn buffer_move(&mut self, proxy: ProxyId) {
        self.move_buffer.push(proxy);
    }

    fn unbuffer_move(&mut self, proxy: ProxyId) {
        self.move_buffer.retain(|&p| p != proxy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(x: f64, y: f64) -> Aabb {
        Aabb::from_center(Vec2::new(x, y), Vec2::new(0.5, 0.5))
    }

    #[test]
    fn new_pairs_are_reported_once() {
        let mut bp: BroadPhase<u32> = BroadPhase::new();
        bp.create_proxy(unit_box(0.0, 0.0), 0);
        bp.create_proxy(unit_box(0.8, 0.0), 1);
        bp.create_proxy(unit_box(10.0, 0.0), 2);

        let mut pairs = Vec::new();
        bp.update_pairs(|a, b| pairs.push((a.min(b), a.max(b))));
        assert_eq!(pairs, vec![(0, 1)]);

        // nothing moved, nothing reported
        pairs.clear();
        bp.update_pairs(|a, b| pairs.push((a, b)));
        assert!(pairs.is_empty());
    }

    #[test]
    fn moving_far_reports_new_neighbors() {
        let mut bp: BroadPhase<u32> = BroadPhase::new();
        let a = bp.create_proxy(unit_box(0.0, 0.0), 0);
        bp.create_proxy(unit_box(10.0, 0.0), 1);
        bp.create_proxy(unit_box(10.0, 0.9), 2);
        bp.update_pairs(|_, _| {});

        // small moves stay inside the fat AABB
        bp.move_proxy(a, unit_box(0.05, 0.0), Vec2::new(0.05, 0.0));
        let mut count = 0;
        bp.update_pairs(|_, _| count += 1);
        assert_eq!(count, 0);

        bp.move_proxy(a, unit_box(9.5, 0.4), Vec2::new(9.45, 0.4));
        let mut others = Vec::new();
        bp.update_pairs(|x, y| others.push(if x == 0 { y } else { x }));
        assert_eq!(others.into_iter().sorted().collect_vec(), vec![1, 2]);
    }

    #[test]
    fn destroyed_proxies_are_forgotten() {
        let mut bp: BroadPhase<u32> = BroadPhase::new();
        let a = bp.create_proxy(unit_box(0.0, 0.0), 0);
        bp.create_proxy(unit_box(0.5, 0.0), 1);
        bp.destroy_proxy(a);
        let mut count = 0;
        bp.update_pairs(|_, _| count += 1);
        assert_eq!(count, 0);
        assert_eq!(bp.proxy_count(), 1);
    }
}
