//! Bounding Volume Hierarchy over world-space triangles.
//!
//! Built with a spatial-median split: each node is cut at the midpoint of
//! its box along the longest axis, and triangles go left or right by
//! centroid. When that leaves one side empty the range is split at its
//! centroid median instead, so every split makes progress.
//!
//! Nodes live in a flat arena with node 0 as the root. Children are
//! appended in pairs, so an interior node's right child is always
//! `left + 1`. Triangles are reordered in place so that every leaf owns a
//! contiguous `[start, start + count)` range.

use bytemuck::{Pod, Zeroable};
use cadre_kernel_math::Aabb3;
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};
use crate::intersect::{intersect_triangle, TriangleHit};
use crate::{Ray, Triangle};

/// Hard ceiling on [`BvhConfig::max_depth`].
pub const MAX_DEPTH_LIMIT: u32 = 64;

/// BVH build parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BvhConfig {
    /// Ranges with at most this many triangles become leaves.
    pub max_leaf_size: usize,
    /// Nodes at this depth become leaves regardless of size (root = 0).
    ///
    /// The cap is inclusive: the deepest node sits exactly at `max_depth`,
    /// so a cap of 3 allows at most 2^3 leaves.
    pub max_depth: u32,
}

impl Default for BvhConfig {
    fn default() -> Self {
        Self {
            max_leaf_size: 4,
            max_depth: 32,
        }
    }
}

impl BvhConfig {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.max_leaf_size == 0 {
            return Err(RenderError::InvalidSettings(
                "bvh.max_leaf_size must be at least 1".into(),
            ));
        }
        if self.max_depth == 0 || self.max_depth > MAX_DEPTH_LIMIT {
            return Err(RenderError::InvalidSettings(format!(
                "bvh.max_depth must be between 1 and {MAX_DEPTH_LIMIT}"
            )));
        }
        Ok(())
    }
}

/// Interior/leaf discriminant of a [`BvhNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BvhNodeKind {
    /// Two children, by arena index.
    Interior {
        /// Left child index.
        left: u32,
        /// Right child index.
        right: u32,
    },
    /// A contiguous range of the reordered triangles.
    Leaf {
        /// First triangle slot.
        start: u32,
        /// Number of triangles.
        count: u32,
    },
}

/// A node in the flat BVH arena.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhNode {
    /// Tight bounds of every triangle below this node.
    pub aabb: Aabb3,
    /// Children or triangle range.
    pub kind: BvhNodeKind,
}

impl BvhNode {
    fn unassigned() -> Self {
        Self {
            aabb: Aabb3::empty(),
            kind: BvhNodeKind::Leaf { start: 0, count: 0 },
        }
    }

    /// True for leaf nodes.
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, BvhNodeKind::Leaf { .. })
    }
}

/// GPU-layout BVH node (32 bytes).
///
/// Interior: `left` and `right` are child indices.
/// Leaf: `left = -(start + 1)`, `right = count`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PackedBvhNode {
    /// Box minimum, rounded down to `f32`.
    pub aabb_min: [f32; 3],
    /// Left child, or encoded leaf start when negative.
    pub left: i32,
    /// Box maximum, rounded up to `f32`.
    pub aabb_max: [f32; 3],
    /// Right child, or leaf triangle count.
    pub right: i32,
}

impl PackedBvhNode {
    /// Recover the tagged form.
    pub fn decode(&self) -> BvhNodeKind {
        if self.left < 0 {
            BvhNodeKind::Leaf {
                start: (-(self.left as i64) - 1) as u32,
                count: self.right as u32,
            }
        } else {
            BvhNodeKind::Interior {
                left: self.left as u32,
                right: self.right as u32,
            }
        }
    }
}

/// Closest hit found by BVH traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhHit {
    /// Original index of the triangle that was hit.
    pub triangle: u32,
    /// Distance and normal.
    pub hit: TriangleHit,
}

/// Shape summary of a built BVH.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BvhStats {
    /// Total triangles.
    pub triangle_count: usize,
    /// Total nodes in the arena.
    pub node_count: usize,
    /// Number of leaves.
    pub leaf_count: usize,
    /// Depth of the deepest node (root = 0).
    pub max_depth: u32,
    /// Largest leaf.
    pub max_leaf_size: usize,
    /// Mean triangles per leaf.
    pub avg_leaf_size: f64,
}

/// Bounding volume hierarchy with its reordered triangles.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    triangles: Vec<Triangle>,
    sorted_indices: Vec<u32>,
}

impl Bvh {
    /// Build a BVH, taking ownership of `triangles` and reordering them.
    ///
    /// Empty input produces an empty hierarchy with no nodes. Out-of-range
    /// config values are clamped rather than rejected; use
    /// [`BvhConfig::validate`] to surface them.
    #[tracing::instrument(skip_all, fields(tri_count = triangles.len()))]
    pub fn build(mut triangles: Vec<Triangle>, config: &BvhConfig) -> Self {
        if triangles.is_empty() {
            return Self::default();
        }

        let limits = Limits {
            leaf_size: config.max_leaf_size.max(1),
            max_depth: config.max_depth.min(MAX_DEPTH_LIMIT),
        };

        let n = triangles.len();
        let mut nodes = Vec::with_capacity(2 * n);
        nodes.push(BvhNode::unassigned());
        split_node(&mut nodes, &mut triangles, &limits, 0, 0, n, 0);

        let sorted_indices = triangles.iter().map(|t| t.index).collect();
        let bvh = Self {
            nodes,
            triangles,
            sorted_indices,
        };

        let stats = bvh.stats();
        tracing::debug!(
            nodes = stats.node_count,
            leaves = stats.leaf_count,
            depth = stats.max_depth,
            max_leaf = stats.max_leaf_size,
            "bvh built"
        );
        bvh
    }

    /// Node arena; index 0 is the root.
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Triangles in leaf order.
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Original triangle indices in leaf order.
    pub fn sorted_indices(&self) -> &[u32] {
        &self.sorted_indices
    }

    /// True if built from no triangles.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bounds of the whole input, if any.
    pub fn bounds(&self) -> Option<Aabb3> {
        self.nodes.first().map(|n| n.aabb)
    }

    /// Original indices of the triangles in a leaf. Empty for interior nodes.
    pub fn leaf_indices(&self, node: &BvhNode) -> &[u32] {
        match node.kind {
            BvhNodeKind::Leaf { start, count } => {
                &self.sorted_indices[start as usize..(start + count) as usize]
            }
            BvhNodeKind::Interior { .. } => &[],
        }
    }

    /// Closest triangle hit along `ray`.
    pub fn intersect(&self, ray: &Ray) -> Option<BvhHit> {
        let root = self.nodes.first()?;
        let mut closest = None;
        let mut closest_t = f64::INFINITY;
        if ray.intersect_aabb(&root.aabb).is_some() {
            self.intersect_node(ray, 0, &mut closest, &mut closest_t);
        }
        closest
    }

    fn intersect_node(
        &self,
        ray: &Ray,
        node_idx: usize,
        closest: &mut Option<BvhHit>,
        closest_t: &mut f64,
    ) {
        match self.nodes[node_idx].kind {
            BvhNodeKind::Leaf { start, count } => {
                let range = start as usize..(start + count) as usize;
                for tri in &self.triangles[range] {
                    if let Some(hit) = intersect_triangle(ray, &tri.v0, &tri.v1, &tri.v2) {
                        if hit.t < *closest_t {
                            *closest_t = hit.t;
                            *closest = Some(BvhHit {
                                triangle: tri.index,
                                hit,
                            });
                        }
                    }
                }
            }
            BvhNodeKind::Interior { left, right } => {
                let (left, right) = (left as usize, right as usize);
                let left_t = ray
                    .intersect_aabb(&self.nodes[left].aabb)
                    .map(|(t, _)| t);
                let right_t = ray
                    .intersect_aabb(&self.nodes[right].aabb)
                    .map(|(t, _)| t);

                // Near child first; skip a child whose entry is beyond the current hit.
                let mut order = [(left, left_t), (right, right_t)];
                if let (Some(lt), Some(rt)) = (left_t, right_t) {
                    if rt < lt {
                        order.swap(0, 1);
                    }
                }
                for (child, entry) in order {
                    if let Some(t) = entry {
                        if t < *closest_t {
                            self.intersect_node(ray, child, closest, closest_t);
                        }
                    }
                }
            }
        }
    }

    /// Walk the tree and summarize its shape.
    pub fn stats(&self) -> BvhStats {
        let mut stats = BvhStats {
            triangle_count: self.triangles.len(),
            node_count: self.nodes.len(),
            ..Default::default()
        };
        if self.nodes.is_empty() {
            return stats;
        }

        let mut stack = vec![(0usize, 0u32)];
        while let Some((idx, depth)) = stack.pop() {
            stats.max_depth = stats.max_depth.max(depth);
            match self.nodes[idx].kind {
                BvhNodeKind::Leaf { count, .. } => {
                    stats.leaf_count += 1;
                    stats.max_leaf_size = stats.max_leaf_size.max(count as usize);
                }
                BvhNodeKind::Interior { left, right } => {
                    stack.push((left as usize, depth + 1));
                    stack.push((right as usize, depth + 1));
                }
            }
        }
        stats.avg_leaf_size = stats.triangle_count as f64 / stats.leaf_count as f64;
        stats
    }

    /// Nodes in the signed-index layout for GPU upload.
    pub fn packed_nodes(&self) -> Vec<PackedBvhNode> {
        self.nodes
            .iter()
            .map(|node| {
                let (left, right) = match node.kind {
                    BvhNodeKind::Interior { left, right } => (left as i32, right as i32),
                    BvhNodeKind::Leaf { start, count } => (-(start as i32) - 1, count as i32),
                };
                PackedBvhNode {
                    aabb_min: [
                        f32_down(node.aabb.min.x),
                        f32_down(node.aabb.min.y),
                        f32_down(node.aabb.min.z),
                    ],
                    left,
                    aabb_max: [
                        f32_up(node.aabb.max.x),
                        f32_up(node.aabb.max.y),
                        f32_up(node.aabb.max.z),
                    ],
                    right,
                }
            })
            .collect()
    }
}

struct Limits {
    leaf_size: usize,
    max_depth: u32,
}

/// Build the subtree rooted at `nodes[node_idx]` over `triangles[start..end]`.
///
/// `nodes` grows while children are appended, so the current node is always
/// addressed by index and never held by reference across a push.
fn split_node(
    nodes: &mut Vec<BvhNode>,
    triangles: &mut [Triangle],
    limits: &Limits,
    node_idx: usize,
    start: usize,
    end: usize,
    depth: u32,
) {
    let mut aabb = Aabb3::empty();
    for tri in &triangles[start..end] {
        tri.grow(&mut aabb);
    }
    nodes[node_idx].aabb = aabb;

    let count = end - start;
    if count <= limits.leaf_size || depth >= limits.max_depth {
        nodes[node_idx].kind = BvhNodeKind::Leaf {
            start: start as u32,
            count: count as u32,
        };
        return;
    }

    let axis = aabb.longest_axis();
    let split_pos = aabb.center()[axis];

    let range = &mut triangles[start..end];
    let mut mid = start + partition(range, |t| t.centroid[axis] < split_pos);

    if mid == start || mid == end {
        let half = count / 2;
        range.select_nth_unstable_by(half, |a, b| a.centroid[axis].total_cmp(&b.centroid[axis]));
        mid = start + half;
    }

    let left = nodes.len();
    nodes.push(BvhNode::unassigned());
    nodes.push(BvhNode::unassigned());
    nodes[node_idx].kind = BvhNodeKind::Interior {
        left: left as u32,
        right: (left + 1) as u32,
    };

    split_node(nodes, triangles, limits, left, start, mid, depth + 1);
    split_node(nodes, triangles, limits, left + 1, mid, end, depth + 1);
}

/// Move every element satisfying `pred` to the front; return how many there are.
fn partition<T>(items: &mut [T], pred: impl Fn(&T) -> bool) -> usize {
    let mut left = 0;
    let mut right = items.len();

    while left < right {
        if pred(&items[left]) {
            left += 1;
        } else {
            right -= 1;
            items.swap(left, right);
        }
    }

    left
}

/// Largest `f32` not greater than `x`.
fn f32_down(x: f64) -> f32 {
    let f = x as f32;
    if f as f64 > x {
        step_f32(f, false)
    } else {
        f
    }
}

/// Smallest `f32` not less than `x`.
fn f32_up(x: f64) -> f32 {
    let f = x as f32;
    if (f as f64) < x {
        step_f32(f, true)
    } else {
        f
    }
}

fn step_f32(f: f32, up: bool) -> f32 {
    if f.is_nan() || f.is_infinite() {
        return f;
    }
    if f == 0.0 {
        let tiny = f32::from_bits(1);
        return if up { tiny } else { -tiny };
    }
    let bits = f.to_bits();
    let away_from_zero = (f > 0.0) == up;
    f32::from_bits(if away_from_zero { bits + 1 } else { bits - 1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadre_kernel_math::{Point3, Vec3};

    /// Deterministic scatter of small triangles.
    fn scatter(n: usize) -> Vec<Triangle> {
        let mut state = 0x2545_f491_4f6c_dd1du64;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        (0..n)
            .map(|i| {
                let c = Point3::new(next() * 20.0 - 10.0, next() * 6.0, next() * 2.0 - 1.0);
                let d = Vec3::new(next(), next(), next()) * 0.5;
                Triangle::new(
                    c,
                    c + Vec3::new(d.x, 0.0, 0.0),
                    c + Vec3::new(0.0, d.y, d.z),
                    i as u32,
                )
            })
            .collect()
    }

    /// Check coverage, tight bounds and depth.
    fn check_invariants(bvh: &Bvh, n: usize, config: &BvhConfig) {
        let mut seen = vec![false; n];
        let mut stack = vec![(0usize, 0u32)];
        while let Some((idx, depth)) = stack.pop() {
            assert!(depth <= config.max_depth);
            let node = bvh.nodes()[idx];
            match node.kind {
                BvhNodeKind::Leaf { start, count } => {
                    assert!(count as usize <= config.max_leaf_size || depth == config.max_depth);
                    let tris = &bvh.triangles()[start as usize..(start + count) as usize];
                    let mut tight = Aabb3::empty();
                    for tri in tris {
                        for v in tri.vertices() {
                            assert!(node.aabb.contains_point(&v, 0.0));
                        }
                        tri.grow(&mut tight);
                    }
                    assert_eq!(tight, node.aabb);
                    for &orig in bvh.leaf_indices(&node) {
                        assert!(!seen[orig as usize], "triangle {orig} in two leaves");
                        seen[orig as usize] = true;
                    }
                }
                BvhNodeKind::Interior { left, right } => {
                    assert_eq!(right, left + 1);
                    for child in [left, right] {
                        let c = bvh.nodes()[child as usize].aabb;
                        assert!(node.aabb.contains_point(&c.min, 0.0));
                        assert!(node.aabb.contains_point(&c.max, 0.0));
                        stack.push((child as usize, depth + 1));
                    }
                }
            }
        }
        assert!(seen.iter().all(|&s| s), "triangle missing from leaves");
    }

    #[test]
    fn test_empty_input() {
        let bvh = Bvh::build(Vec::new(), &BvhConfig::default());
        assert!(bvh.is_empty());
        assert!(bvh.nodes().is_empty());
        assert!(bvh.sorted_indices().is_empty());
        assert!(bvh.bounds().is_none());
        let ray = Ray::new(Point3::origin(), Vec3::z());
        assert!(bvh.intersect(&ray).is_none());
        assert_eq!(bvh.stats().leaf_count, 0);
    }

    #[test]
    fn test_small_input_is_single_leaf() {
        let tris = scatter(4);
        let bvh = Bvh::build(tris, &BvhConfig::default());
        assert_eq!(bvh.nodes().len(), 1);
        assert_eq!(bvh.nodes()[0].kind, BvhNodeKind::Leaf { start: 0, count: 4 });
    }

    #[test]
    fn test_root_bounds_whole_input() {
        let tris = scatter(100);
        let mut expected = Aabb3::empty();
        for t in &tris {
            t.grow(&mut expected);
        }
        let bvh = Bvh::build(tris, &BvhConfig::default());
        assert_eq!(bvh.bounds(), Some(expected));
    }

    #[test]
    fn test_invariants_random() {
        let config = BvhConfig::default();
        for n in [5, 17, 64, 500, 2000] {
            let bvh = Bvh::build(scatter(n), &config);
            check_invariants(&bvh, n, &config);
            let mut sorted = bvh.sorted_indices().to_vec();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..n as u32).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_coincident_centroids_fall_back_to_median() {
        // Every centroid identical: the midpoint split always leaves one side empty.
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            0,
        );
        let tris: Vec<_> = (0..40).map(|i| Triangle { index: i, ..tri }).collect();
        let config = BvhConfig::default();
        let bvh = Bvh::build(tris, &config);
        check_invariants(&bvh, 40, &config);
        let stats = bvh.stats();
        assert!(stats.max_leaf_size <= 4);
        // 40 -> 20 -> 10 -> 5 -> (2, 3)
        assert_eq!(stats.max_depth, 4);
    }

    #[test]
    fn test_depth_cap_forces_leaves() {
        let config = BvhConfig {
            max_leaf_size: 1,
            max_depth: 3,
        };
        let bvh = Bvh::build(scatter(200), &config);
        check_invariants(&bvh, 200, &config);
        let stats = bvh.stats();
        assert_eq!(stats.max_depth, 3);
        assert_eq!(stats.leaf_count, 8);

        // Inclusive at the smallest cap too: root splits once, children stop.
        let shallow = BvhConfig {
            max_leaf_size: 1,
            max_depth: 1,
        };
        let stats = Bvh::build(scatter(200), &shallow).stats();
        assert_eq!(stats.max_depth, 1);
        assert_eq!(stats.leaf_count, 2);
        assert_eq!(stats.node_count, 3);
    }

    #[test]
    fn test_invalid_config_is_clamped() {
        let config = BvhConfig {
            max_leaf_size: 0,
            max_depth: 1000,
        };
        assert!(config.validate().is_err());
        let bvh = Bvh::build(scatter(50), &config);
        let stats = bvh.stats();
        assert_eq!(stats.max_leaf_size, 1);
        assert!(stats.max_depth <= MAX_DEPTH_LIMIT);
    }

    #[test]
    fn test_split_on_longest_axis_midpoint() {
        // Two clusters along x, one tall column in y that is still shorter than x.
        let mut tris = Vec::new();
        for i in 0..5 {
            let x = if i % 2 == 0 { -10.0 } else { 10.0 };
            let c = Point3::new(x, i as f64, 0.0);
            tris.push(Triangle::new(
                c,
                c + Vec3::new(0.1, 0.0, 0.0),
                c + Vec3::new(0.0, 0.1, 0.0),
                i,
            ));
        }
        let bvh = Bvh::build(tris, &BvhConfig::default());
        let BvhNodeKind::Interior { left, right } = bvh.nodes()[0].kind else {
            panic!("root should split");
        };
        let left = bvh.nodes()[left as usize];
        let right = bvh.nodes()[right as usize];
        assert_eq!(bvh.leaf_indices(&left).len(), 3);
        assert_eq!(bvh.leaf_indices(&right).len(), 2);
        assert!(left.aabb.max.x < 0.0);
        assert!(right.aabb.min.x > 0.0);
    }

    #[test]
    fn test_intersect_matches_brute_force() {
        let tris = scatter(300);
        let bvh = Bvh::build(tris.clone(), &BvhConfig::default());
        for i in 0..200 {
            let x = -9.7 + i as f64 * 0.0973;
            let origin = Point3::new(x, 3.1 + (i % 7) as f64 * 0.31, 5.0);
            let ray = Ray::new(origin, Vec3::new(0.013, -0.021, -1.0));

            let brute = tris
                .iter()
                .filter_map(|t| intersect_triangle(&ray, &t.v0, &t.v1, &t.v2).map(|h| (t.index, h)))
                .min_by(|a, b| a.1.t.total_cmp(&b.1.t));
            let fast = bvh.intersect(&ray);
            match (brute, fast) {
                (None, None) => {}
                (Some((_, b)), Some(f)) => assert_eq!(b.t, f.hit.t),
                other => panic!("mismatch for ray {i}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_stats() {
        let bvh = Bvh::build(scatter(64), &BvhConfig::default());
        let stats = bvh.stats();
        assert_eq!(stats.triangle_count, 64);
        assert_eq!(stats.node_count, 2 * stats.leaf_count - 1);
        assert!((stats.avg_leaf_size - 64.0 / stats.leaf_count as f64).abs() < 1e-12);
    }

    #[test]
    fn test_packed_nodes_round_trip_kind() {
        let bvh = Bvh::build(scatter(100), &BvhConfig::default());
        let packed = bvh.packed_nodes();
        assert_eq!(packed.len(), bvh.nodes().len());
        assert_eq!(std::mem::size_of::<PackedBvhNode>(), 32);
        for (p, n) in packed.iter().zip(bvh.nodes()) {
            assert_eq!(p.decode(), n.kind);
            if n.is_leaf() {
                assert!(p.left < 0);
            }
            for axis in 0..3 {
                assert!(p.aabb_min[axis] as f64 <= n.aabb.min[axis]);
                assert!(p.aabb_max[axis] as f64 >= n.aabb.max[axis]);
            }
        }
        let bytes: &[u8] = bytemuck::cast_slice(&packed);
        assert_eq!(bytes.len(), packed.len() * 32);
    }

    #[test]
    fn test_f32_rounding_direction() {
        let x = 0.1f64;
        assert!(f32_down(x) as f64 <= x);
        assert!(f32_up(x) as f64 >= x);
        assert_eq!(f32_down(1.0), 1.0);
        assert_eq!(f32_up(-2.0), -2.0);
        assert!(f32_down(-0.1) as f64 <= -0.1);
        assert!(f32_up(-0.1) as f64 >= -0.1);
    }

    #[test]
    fn test_config_validation() {
        assert!(BvhConfig::default().validate().is_ok());
        let zero_depth = BvhConfig {
            max_depth: 0,
            ..Default::default()
        };
        assert!(zero_depth.validate().is_err());
    }
}
