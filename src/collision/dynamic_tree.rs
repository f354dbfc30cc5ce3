//! A dynamic AABB tree for broad phase collision detection.
//!
//! Leaves hold fattened AABBs so that small movements don't require a tree update.
//! Nodes are pooled in a `Vec` with a free list and kept balanced with AVL-style rotations.

use super::{Aabb, RayCastInput};
use crate::{
    math::{self as m, Vec2},
    settings::{AABB_EXTENSION, AABB_MULTIPLIER},
};

/// Handle to a leaf of a [`DynamicTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProxyId(pub(crate) usize);

impl ProxyId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

//
// Internal types
//

#[derive(Clone, Copy, Debug)]
struct Node<T> {
    /// Enlarged AABB for leaves, union of children for branches.
    aabb: Aabb,
    parent: Option<usize>,
    /// Leaves have height 0, free nodes -1.
    height: i32,
    kind: NodeKind<T>,
}

#[derive(Clone, Copy, Debug)]
enum NodeKind<T> {
    Branch { child1: usize, child2: usize },
    Leaf { user_data: T },
    Free { next: Option<usize> },
}

impl<T> Node<T> {
    #[inline]
    fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }
}

//
// Tree itself
//

/// A binary AABB tree storing user data of type `T` in its leaves.
#[derive(Clone, Debug)]
pub struct DynamicTree<T> {
    nodes: Vec<Node<T>>,
    root: Option<usize>,
    free_list: Option<usize>,
    proxy_count: usize,
}

impl<T: Copy> Default for DynamicTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> DynamicTree<T> {
    pub fn new() -> Self {
        DynamicTree {
            nodes: Vec::with_capacity(16),
            root: None,
            free_list: None,
            proxy_count: 0,
        }
    }

    /// Insert a leaf. The stored AABB is fattened by [`AABB_EXTENSION`].
    pub fn create_proxy(&mut self, aabb: Aabb, user_data: T) -> ProxyId {
        let id = self.allocate_node(Node {
            aabb: aabb.padded(AABB_EXTENSION),
            parent: None,
            height: 0,
            kind: NodeKind::Leaf { user_data },
        });
        self.insert_leaf(id);
        self.proxy_count += 1;
        ProxyId(id)
    }

    pub fn destroy_proxy(&mut self, proxy: ProxyId) {
        debug_assert!(self.nodes[proxy.0].is_leaf());
        self.remove_leaf(proxy.0);
        self.free_node(proxy.0);
        self.proxy_count -= 1;
    }

    /// Update a proxy after its shape moved by `displacement`.
    ///
    /// Nothing happens if the fat AABB still contains `aabb`. Otherwise the leaf is
    /// reinserted with an AABB extended in the direction of motion and this returns true.
    pub fn move_proxy(&mut self, proxy: ProxyId, aabb: Aabb, displacement: Vec2) -> bool {
        let id = proxy.0;
        debug_assert!(self.nodes[id].is_leaf());

        if self.nodes[id].aabb.contains(&aabb) {
            return false;
        }

        self.remove_leaf(id);

        let mut b = aabb.padded(AABB_EXTENSION);
        // predict motion
        let d = AABB_MULTIPLIER * displacement;
        if d.x < 0.0 {
            b.lower.x += d.x;
        } else {
            b.upper.x += d.x;
        }
        if d.y < 0.0 {
            b.lower.y += d.y;
        } else {
            b.upper.y += d.y;
        }
        self.nodes[id].aabb = b;

        self.insert_leaf(id);
        true
    }

    /// Get the user data of a leaf.
    #[inline]
    pub fn user_data(&self, proxy: ProxyId) -> T {
        match self.nodes[proxy.0].kind {
            NodeKind::Leaf { user_data } => user_data,
            _ => panic!("Proxy {} is not a leaf", proxy.0),
        }
    }

    /// Get the fattened AABB of a leaf.
    #[inline]
    pub fn fat_aabb(&self, proxy: ProxyId) -> Aabb {
        self.nodes[proxy.0].aabb
    }

    #[inline]
    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    /// Call `callback` for every proxy whose fat AABB overlaps `aabb`.
    /// Returning false from the callback ends the query.
    pub fn query(&self, aabb: &Aabb, mut callback: impl FnMut(ProxyId) -> bool) {
        let mut stack: Vec<usize> = Vec::with_capacity(64);
        stack.extend(self.root);

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if !node.aabb.overlaps(aabb) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { .. } => {
                    if !callback(ProxyId(id)) {
                        return;
                    }
                }
                NodeKind::Branch { child1, child2 } => {
                    stack.push(child1);
                    stack.push(child2);
                }
                NodeKind::Free { .. } => {}
            }
        }
    }

    /// Cast a ray against the proxies in the tree.
    ///
    /// The callback performs the exact ray cast against the proxy's shape and returns
    /// the new max fraction: 0 terminates the cast, a value in (0, 1) clips the ray,
    /// a negative value ignores the proxy, and the input max fraction continues unclipped.
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        mut callback: impl FnMut(&RayCastInput, ProxyId) -> f64,
    ) {
        let p1 = input.p1;
        let p2 = input.p2;
        let mut r = p2 - p1;
        if m::normalize(&mut r) == 0.0 {
            return;
        }

        // v is perpendicular to the segment
        let v = m::cross_sv(1.0, r);
        let abs_v = v.abs();

        // separating axis for the segment: |dot(v, p1 - c)| > dot(|v|, h)

        let mut max_fraction = input.max_fraction;
        let segment_aabb = |max_fraction: f64| {
            let t = p1 + max_fraction * (p2 - p1);
            Aabb::new(p1.min_by_component(t), p1.max_by_component(t))
        };
        let mut seg_aabb = segment_aabb(max_fraction);

        let mut stack: Vec<usize> = Vec::with_capacity(64);
        stack.extend(self.root);

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if !node.aabb.overlaps(&seg_aabb) {
                continue;
            }

            let c = node.aabb.center();
            let h = node.aabb.extents();
            let separation = v.dot(p1 - c).abs() - abs_v.dot(h);
            if separation > 0.0 {
                continue;
            }

            match node.kind {
                NodeKind::Leaf { .. } => {
                    let sub_input = RayCastInput {
                        p1,
                        p2,
                        max_fraction,
                    };
                    let value = callback(&sub_input, ProxyId(id));
                    if value == 0.0 {
                        // the client has terminated the ray cast
                        return;
                    }
                    if value > 0.0 {
                        max_fraction = value;
                        seg_aabb = segment_aabb(max_fraction);
                    }
                }
                NodeKind::Branch { child1, child2 } => {
                    stack.push(child1);
                    stack.push(child2);
                }
                NodeKind::Free { .. } => {}
            }
        }
    }

    //
    // Metrics
    //

    /// Height of the tree. An empty tree or a single leaf has height 0.
    pub fn height(&self) -> i32 {
        self.root.map_or(0, |r| self.nodes[r].height)
    }

    /// Maximum height difference between the two children of any branch.
    pub fn max_balance(&self) -> i32 {
        self.nodes
            .iter()
            .filter_map(|node| match node.kind {
                NodeKind::Branch { child1, child2 } => {
                    Some((self.nodes[child2].height - self.nodes[child1].height).abs())
                }
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Sum of the perimeters of all nodes divided by the perimeter of the root.
    /// Lower is better.
    pub fn area_ratio(&self) -> f64 {
        let Some(root) = self.root else {
            return 0.0;
        };
        let root_area = self.nodes[root].aabb.perimeter();
        let total_area: f64 = self
            .nodes
            .iter()
            .filter(|node| node.height >= 0)
            .map(|node| node.aabb.perimeter())
            .sum();
        total_area / root_area
    }

    /// Check the structural invariants and cached metrics of every node.
    pub fn validate(&self) -> bool {
        if let Some(root) = self.root {
            if self.nodes[root].parent.is_some() {
                return false;
            }
            if !self.validate_node(root) {
                return false;
            }
        }

        let mut free_count = 0;
        let mut free = self.free_list;
        while let Some(id) = free {
            match self.nodes[id].kind {
                NodeKind::Free { next } => free = next,
                _ => return false,
            }
            free_count += 1;
            if free_count > self.nodes.len() {
                return false;
            }
        }
        let leaf_count = self.nodes.iter().filter(|n| n.is_leaf()).count();
        leaf_count == self.proxy_count && self.node_count() + free_count == self.nodes.len()
    }

    fn validate_node(&self, id: usize) -> bool {
        let node = &self.nodes[id];
        match node.kind {
            NodeKind::Leaf { .. } => node.height == 0,
            NodeKind::Free { .. } => false,
            NodeKind::Branch { child1, child2 } => {
                let (c1, c2) = (&self.nodes[child1], &self.nodes[child2]);
                c1.parent == Some(id)
                    && c2.parent == Some(id)
                    && node.height == 1 + c1.height.max(c2.height)
                    && node.aabb == c1.aabb.combine(&c2.aabb)
                    && self.validate_node(child1)
                    && self.validate_node(child2)
            }
        }
    }

    fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.height >= 0).count()
    }

    /// Translate every node when the world origin moves.
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        for node in &mut self.nodes {
            node.aabb.lower -= new_origin;
            node.aabb.upper -= new_origin;
        }
    }

    /// Build an optimal tree from scratch. Very expensive, mostly useful for
    /// measuring how far the incremental tree is from the ideal.
    pub fn rebuild_bottom_up(&mut self) {
        let mut leaves: Vec<usize> = Vec::with_capacity(self.proxy_count);

        for id in 0..self.nodes.len() {
            match self.nodes[id].kind {
                NodeKind::Leaf { .. } => {
                    self.nodes[id].parent = None;
                    leaves.push(id);
                }
                NodeKind::Branch { .. } => self.free_node(id),
                NodeKind::Free { .. } => {}
            }
        }

        while leaves.len() > 1 {
            let mut min_cost = f64::MAX;
            let (mut i_min, mut j_min) = (0, 1);
            for i in 0..leaves.len() {
                let aabb_i = self.nodes[leaves[i]].aabb;
                for j in i + 1..leaves.len() {
                    let cost = aabb_i.combine(&self.nodes[leaves[j]].aabb).perimeter();
                    if cost < min_cost {
                        i_min = i;
                        j_min = j;
                        min_cost = cost;
                    }
                }
            }

            let (child1, child2) = (leaves[i_min], leaves[j_min]);
            let parent = self.allocate_node(Node {
                aabb: self.nodes[child1].aabb.combine(&self.nodes[child2].aabb),
                parent: None,
                height: 1 + self.nodes[child1].height.max(self.nodes[child2].height),
                kind: NodeKind::Branch { child1, child2 },
            });
            self.nodes[child1].parent = Some(parent);
            self.nodes[child2].parent = Some(parent);

            leaves.swap_remove(j_min);
            leaves[i_min] = parent;
        }

        self.root = leaves.first().copied();
    }

    //
    // Node pool
    //

    fn allocate_node(&mut self, node: Node<T>) -> usize {
        match self.free_list {
            Some(id) => {
                if let NodeKind::Free { next } = self.nodes[id].kind {
                    self.free_list = next;
                }
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn free_node(&mut self, id: usize) {
        let node = &mut self.nodes[id];
        node.kind = NodeKind::Free {
            next: self.free_list,
        };
        node.parent = None;
        node.height = -1;
        self.free_list = Some(id);
    }

    #[inline]
    fn children(&self, id: usize) -> (usize, usize) {
        match self.nodes[id].kind {
            NodeKind::Branch { child1, child2 } => (child1, child2),
            _ => panic!("Node {id} is not a branch"),
        }
    }

    #[inline]
    fn set_children(&mut self, id: usize, child1: usize, child2: usize) {
        self.nodes[id].kind = NodeKind::Branch { child1, child2 };
    }

    /// Point `parent` at `new_child` where it pointed at `old_child`,
    /// or make `new_child` the root if there is no parent.
    fn replace_child(&mut self, parent: Option<usize>, old_child: usize, new_child: usize) {
        match parent {
            Some(p) => {
                let (c1, c2) = self.children(p);
                if c1 == old_child {
                    self.set_children(p, new_child, c2);
                } else {
                    self.set_children(p, c1, new_child);
                }
            }
            None => self.root = Some(new_child),
        }
    }

    /// Recompute heights and AABBs from `start` up to the root, rebalancing on the way.
    fn refit_ancestors(&mut self, start: Option<usize>) {
        let mut index = start;
        while let Some(i) = index {
            let i = self.balance(i);
            let (child1, child2) = self.children(i);
            self.nodes[i].height = 1 + self.nodes[child1].height.max(self.nodes[child2].height);
            self.nodes[i].aabb = self.nodes[child1].aabb.combine(&self.nodes[child2].aabb);
            index = self.nodes[i].parent;
        }
    }

    //
    // Insertion and removal
    //

    fn insert_leaf(&mut self, leaf: usize) {
        let Some(root) = self.root else {
            self.root = Some(leaf);
            self.nodes[leaf].parent = None;
            return;
        };

        // find the best sibling by the surface area heuristic
        let leaf_aabb = self.nodes[leaf].aabb;
        let mut index = root;
        while let NodeKind::Branch { child1, child2 } = self.nodes[index].kind {
            let area = self.nodes[index].aabb.perimeter();
            let combined_area = self.nodes[index].aabb.combine(&leaf_aabb).perimeter();

            // cost of creating a new parent for this node and the new leaf
            let cost = 2.0 * combined_area;
            // minimum cost of pushing the leaf further down the tree
            let inheritance_cost = 2.0 * (combined_area - area);

            let descend_cost = |child: &Node<T>| {
                let combined = leaf_aabb.combine(&child.aabb).perimeter();
                if child.is_leaf() {
                    combined + inheritance_cost
                } else {
                    combined - child.aabb.perimeter() + inheritance_cost
                }
            };
            let cost1 = descend_cost(&self.nodes[child1]);
            let cost2 = descend_cost(&self.nodes[child2]);

            if cost < cost1 && cost < cost2 {
                break;
            }
            index = if cost1 < cost2 { child1 } else { child2 };
        }

        let sibling = index;
        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.allocate_node(Node {
            aabb: leaf_aabb.combine(&self.nodes[sibling].aabb),
            parent: old_parent,
            height: self.nodes[sibling].height + 1,
            kind: NodeKind::Branch {
                child1: sibling,
                child2: leaf,
            },
        });
        self.replace_child(old_parent, sibling, new_parent);
        self.nodes[sibling].parent = Some(new_parent);
        self.nodes[leaf].parent = Some(new_parent);

        self.refit_ancestors(self.nodes[leaf].parent);
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }

        let Some(parent) = self.nodes[leaf].parent else {
            return;
        };
        let grand_parent = self.nodes[parent].parent;
        let (c1, c2) = self.children(parent);
        let sibling = if c1 == leaf { c2 } else { c1 };

        // connect the sibling to the grandparent and drop the parent
        self.replace_child(grand_parent, parent, sibling);
        self.nodes[sibling].parent = grand_parent;
        self.nodes[leaf].parent = None;
        self.free_node(parent);

        self.refit_ancestors(grand_parent);
    }

    /// Perform a left or right rotation if node `i_a` is imbalanced.
    /// Returns the index of the node now at the position of `i_a`.
    fn balance(&mut self, i_a: usize) -> usize {
        if self.nodes[i_a].height < 2 {
            return i_a;
        }
        let (i_b, i_c) = self.children(i_a);
        let balance = self.nodes[i_c].height - self.nodes[i_b].height;

        if balance > 1 {
            // rotate C up
            let (i_f, i_g) = self.children(i_c);

            // swap A and C
            let a_parent = self.nodes[i_a].parent;
            self.nodes[i_c].parent = a_parent;
            self.nodes[i_a].parent = Some(i_c);
            self.replace_child(a_parent, i_a, i_c);

            let (keep, give) = if self.nodes[i_f].height > self.nodes[i_g].height {
                (i_f, i_g)
            } else {
                (i_g, i_f)
            };
            self.set_children(i_c, i_a, keep);
            self.set_children(i_a, i_b, give);
            self.nodes[give].parent = Some(i_a);

            self.nodes[i_a].aabb = self.nodes[i_b].aabb.combine(&self.nodes[give].aabb);
            self.nodes[i_c].aabb = self.nodes[i_a].aabb.combine(&self.nodes[keep].aabb);
            self.nodes[i_a].height = 1 + self.nodes[i_b].height.max(self.nodes[give].height);
            self.nodes[i_c].height = 1 + self.nodes[i_a].height.max(self.nodes[keep].height);
            return i_c;
        }

        if balance < -1 {
            // rotate B up
            let (i_d, i_e) = self.children(i_b);

            // swap A and B
            let a_parent = self.nodes[i_a].parent;
            self.nodes[i_b].parent = a_parent;
            self.nodes[i_a].parent = Some(i_b);
            self.replace_child(a_parent, i_a, i_b);

            let (keep, give) = if self.nodes[i_d].height > self.nodes[i_e].height {
                (i_d, i_e)
            } else {
                (i_e, i_d)
            };
            self.set_children(i_b, i_a, keep);
            self.set_children(i_a, give, i_c);
            self.nodes[give].parent = Some(i_a);

            self.nodes[i_a].aabb = self.nodes[i_c].aabb.combine(&self.nodes[give].aabb);
            self.nodes[i_b].aabb = self.nodes[i_a].aabb.combine(&self.nodes[keep].aabb);
            self.nodes[i_a].height = 1 + self.nodes[i_c].height.max(self.nodes[give].height);
            self.nodes[i_b].height = 1 + self.nodes[i_a].height.max(self.nodes[keep].height);
            return i_b;
        }

        i_a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_aabb(rng: &mut StdRng) -> Aabb {
        let c = Vec2::new(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0));
        let h = Vec2::new(rng.gen_range(0.1..2.0), rng.gen_range(0.1..2.0));
        Aabb::from_center(c, h)
    }

    #[test]
    fn random_insert_move_remove_keeps_invariants() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut tree: DynamicTree<usize> = DynamicTree::new();
        let mut proxies: Vec<(ProxyId, Aabb)> = Vec::new();

        for i in 0..200 {
            let aabb = random_aabb(&mut rng);
            proxies.push((tree.create_proxy(aabb, i), aabb));
        }
        assert!(tree.validate());
        assert!(tree.max_balance() <= 1);

        for _ in 0..400 {
            let k = rng.gen_range(0..proxies.len());
            let d = Vec2::new(rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0));
            let (id, aabb) = proxies[k];
            let moved = Aabb::new(aabb.lower + d, aabb.upper + d);
            tree.move_proxy(id, moved, d);
            proxies[k].1 = moved;
            assert!(tree.fat_aabb(id).contains(&moved));
        }
        assert!(tree.validate());
        assert!(tree.max_balance() <= 1);

        for _ in 0..150 {
            let k = rng.gen_range(0..proxies.len());
            let (id, _) = proxies.swap_remove(k);
            tree.destroy_proxy(id);
        }
        assert!(tree.validate());
        assert_eq!(tree.proxy_count(), 50);
        // balanced binary tree over 50 leaves
        assert!(tree.height() <= 12);

        // freed nodes are reused
        let nodes_before = tree.nodes.len();
        for i in 0..20 {
            tree.create_proxy(random_aabb(&mut rng), 1000 + i);
        }
        assert_eq!(tree.nodes.len(), nodes_before);
        assert!(tree.validate());
    }

    #[test]
    fn query_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut tree: DynamicTree<usize> = DynamicTree::new();
        let mut boxes = Vec::new();
        for i in 0..100 {
            let aabb = random_aabb(&mut rng);
            let id = tree.create_proxy(aabb, i);
            boxes.push((id, aabb));
        }

        for _ in 0..20 {
            let query = random_aabb(&mut rng).padded(5.0);
            let mut found = Vec::new();
            tree.query(&query, |id| {
                found.push(tree.user_data(id));
                true
            });
            found.sort_unstable();

            let mut expected: Vec<usize> = boxes
                .iter()
                .filter(|(id, _)| tree.fat_aabb(*id).overlaps(&query))
                .map(|(id, _)| tree.user_data(*id))
                .collect();
            expected.sort_unstable();
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn query_stops_early() {
        let mut tree: DynamicTree<()> = DynamicTree::new();
        for i in 0..10 {
            let c = Vec2::new(i as f64 * 0.1, 0.0);
            tree.create_proxy(Aabb::from_center(c, Vec2::new(1.0, 1.0)), ());
        }
        let mut calls = 0;
        tree.query(&Aabb::from_center(Vec2::zero(), Vec2::one()), |_| {
            calls += 1;
            false
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn ray_cast_clipping_finds_closest() {
        let mut tree: DynamicTree<f64> = DynamicTree::new();
        for x in [3.0, 7.0, 5.0, 9.0] {
            let aabb = Aabb::from_center(Vec2::new(x, 0.0), Vec2::new(0.5, 0.5));
            tree.create_proxy(aabb, x);
        }
        // off the ray
        tree.create_proxy(
            Aabb::from_center(Vec2::new(1.0, 10.0), Vec2::new(0.5, 0.5)),
            1.0,
        );

        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 1.0,
        };
        let mut closest = f64::MAX;
        tree.ray_cast(&input, |sub_input, id| {
            let aabb = tree.fat_aabb(id);
            match aabb.ray_cast(sub_input) {
                Some(out) => {
                    closest = closest.min(tree.user_data(id));
                    out.fraction
                }
                None => -1.0,
            }
        });
        assert_eq!(closest, 3.0);
    }

    #[test]
    fn rebuild_keeps_leaves() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut tree: DynamicTree<usize> = DynamicTree::new();
        for i in 0..40 {
            tree.create_proxy(random_aabb(&mut rng), i);
        }
        tree.rebuild_bottom_up();
        assert!(tree.validate());
        assert_eq!(tree.proxy_count(), 40);

        let mut count = 0;
        tree.query(
            &Aabb::new(Vec2::new(-100.0, -100.0), Vec2::new(100.0, 100.0)),
            |_| {
                count += 1;
                true
            },
        );
        assert_eq!(count, 40);

        tree.shift_origin(Vec2::new(10.0, 0.0));
        assert!(tree.validate());
    }
}
