//! Exact 4D KD-tree.
//!
//! Built in one bulk pass by median split on `axis = depth mod 4`, cycling
//! x, y, z, w. The tree is immutable afterwards; changing the point set means
//! `rebuild()` with the full new set. Nodes live in an arena and refer to
//! their children by index.
//!
//! Both queries are exact. A subtree is skipped only when the distance from
//! the query to its splitting plane already exceeds the current bound, which
//! can never discard a qualifying point.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::constants::DIMS;
use crate::point::{Neighbor, Point4};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KdTreeStats {
    pub num_points: u64,
    pub depth: u32,
}

#[derive(Clone, Debug)]
pub struct KdNode<T> {
    pub point: Point4,
    pub data: T,
    pub left: Option<usize>,
    pub right: Option<usize>,
    pub axis: usize,
}

#[derive(Clone, Debug)]
pub struct KdTree4D<T> {
    nodes: Vec<KdNode<T>>,
    root: Option<usize>,
    depth: usize,
}

impl<T> Default for KdTree4D<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            depth: 0,
        }
    }
}

/// Heap entry ordered by squared distance, node index breaking ties. In the
/// max-heap the top is the current worst of the best `k`.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    dist_sq: f64,
    node: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist_sq
            .total_cmp(&other.dist_sq)
            .then(self.node.cmp(&other.node))
    }
}

impl<T> KdTree4D<T> {
    /// Bulk-build from `(point, data)` pairs. O(n log n).
    pub fn build(points: Vec<(Point4, T)>) -> Self {
        let mut tree = Self::default();
        tree.rebuild(points);
        tree
    }

    /// Discard the current tree and build a new one from the full point set.
    pub fn rebuild(&mut self, points: Vec<(Point4, T)>) {
        self.nodes = Vec::with_capacity(points.len());
        self.depth = 0;
        self.root = self.build_recursive(points, 0);
        tracing::debug!(points = self.nodes.len(), depth = self.depth, "kd-tree built");
    }

    fn build_recursive(&mut self, mut items: Vec<(Point4, T)>, depth: usize) -> Option<usize> {
        if items.is_empty() {
            return None;
        }
        self.depth = self.depth.max(depth + 1);

        let axis = depth % DIMS;
        let mid = items.len() / 2;
        items.select_nth_unstable_by(mid, |a, b| a.0.axis(axis).total_cmp(&b.0.axis(axis)));
        let right_items = items.split_off(mid + 1);
        let (point, data) = items.pop()?;

        let left = self.build_recursive(items, depth + 1);
        let right = self.build_recursive(right_items, depth + 1);

        self.nodes.push(KdNode {
            point,
            data,
            left,
            right,
            axis,
        });
        Some(self.nodes.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of levels on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn stats(&self) -> KdTreeStats {
        KdTreeStats {
            num_points: self.nodes.len() as u64,
            depth: self.depth as u32,
        }
    }

    fn knn_recursive(
        &self,
        node: usize,
        query: Point4,
        k: usize,
        cutoff_sq: f64,
        best: &mut BinaryHeap<Candidate>,
    ) {
        let n = &self.nodes[node];
        let dist_sq = n.point.distance_squared(query);
        if dist_sq <= cutoff_sq {
            if best.len() < k {
                best.push(Candidate { dist_sq, node });
            } else if best.peek().is_some_and(|worst| dist_sq < worst.dist_sq) {
                best.pop();
                best.push(Candidate { dist_sq, node });
            }
        }

        let diff = query.axis(n.axis) - n.point.axis(n.axis);
        let (near, far) = if diff <= 0.0 {
            (n.left, n.right)
        } else {
            (n.right, n.left)
        };

        if let Some(child) = near {
            self.knn_recursive(child, query, k, cutoff_sq, best);
        }

        let bound = match best.peek() {
            Some(worst) if best.len() == k => worst.dist_sq.min(cutoff_sq),
            _ => cutoff_sq,
        };
        if diff * diff <= bound
            && let Some(child) = far
        {
            self.knn_recursive(child, query, k, cutoff_sq, best);
        }
    }

    fn range_recursive(
        &self,
        node: usize,
        center: Point4,
        radius_sq: f64,
        out: &mut Vec<Candidate>,
    ) {
        let n = &self.nodes[node];
        let dist_sq = n.point.distance_squared(center);
        if dist_sq <= radius_sq {
            out.push(Candidate { dist_sq, node });
        }

        let diff = center.axis(n.axis) - n.point.axis(n.axis);
        let (near, far) = if diff <= 0.0 {
            (n.left, n.right)
        } else {
            (n.right, n.left)
        };
        if let Some(child) = near {
            self.range_recursive(child, center, radius_sq, out);
        }
        if diff * diff <= radius_sq
            && let Some(child) = far
        {
            self.range_recursive(child, center, radius_sq, out);
        }
    }
}

impl<T: Clone> KdTree4D<T> {
    /// Exact `k` nearest neighbors, nearest first.
    ///
    /// With `max_distance`, points farther than it are never returned, so the
    /// result may hold fewer than `k` entries.
    pub fn nearest_neighbors(
        &self,
        query: Point4,
        k: usize,
        max_distance: Option<f64>,
    ) -> Vec<Neighbor<T>> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }
        let cutoff_sq = match max_distance {
            Some(d) if d < 0.0 => return Vec::new(),
            Some(d) => d * d,
            None => f64::INFINITY,
        };

        let mut best = BinaryHeap::with_capacity(k.min(self.nodes.len()) + 1);
        self.knn_recursive(root, query, k, cutoff_sq, &mut best);
        self.to_neighbors(best.into_sorted_vec())
    }

    /// Every point within `radius` of `center` (inclusive), nearest first.
    pub fn range_query(&self, center: Point4, radius: f64) -> Vec<Neighbor<T>> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        if radius < 0.0 || radius.is_nan() {
            return Vec::new();
        }

        let mut hits = Vec::new();
        self.range_recursive(root, center, radius * radius, &mut hits);
        hits.sort_unstable();
        self.to_neighbors(hits)
    }

    fn to_neighbors(&self, sorted: Vec<Candidate>) -> Vec<Neighbor<T>> {
        sorted
            .into_iter()
            .map(|c| Neighbor::new(self.nodes[c.node].data.clone(), c.dist_sq.sqrt()))
            .collect()
    }
}
