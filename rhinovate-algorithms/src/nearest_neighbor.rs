//! Nearest neighbor search backed by a k-d tree

use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;
use rhinovate_core::{NearestNeighborSearch, Point3f};

// The immutable tree balances by position rather than by split value, so any
// number of points may share a coordinate (flat patches, duplicated samples).
type Tree = ImmutableKdTree<f32, u64, 3, 32>;

/// KD-Tree implementation for nearest neighbor search
pub struct KdTree {
    /// `None` for an empty point set
    tree: Option<Tree>,
    len: usize,
}

impl KdTree {
    pub fn new(points: &[Point3f]) -> Self {
        let coords: Vec<[f32; 3]> = points.iter().map(|p| [p.x, p.y, p.z]).collect();
        let tree = (!coords.is_empty()).then(|| Tree::new_from_slice(&coords));
        Self {
            tree,
            len: points.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Indices of all points within `radius`, including the query point itself
    pub fn radius_indices(&self, query: &Point3f, radius: f32) -> Vec<usize> {
        let Some(tree) = &self.tree else {
            return Vec::new();
        };
        tree.within_unsorted::<SquaredEuclidean>(&[query.x, query.y, query.z], radius * radius)
            .into_iter()
            .map(|n| n.item as usize)
            .collect()
    }
}

impl NearestNeighborSearch for KdTree {
    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)> {
        let Some(tree) = self.tree.as_ref().filter(|_| k > 0) else {
            return Vec::new();
        };
        tree.nearest_n::<SquaredEuclidean>(&[query.x, query.y, query.z], k.min(self.len))
            .into_iter()
            .map(|n| (n.item as usize, n.distance.sqrt()))
            .collect()
    }

    fn find_radius_neighbors(&self, query: &Point3f, radius: f32) -> Vec<(usize, f32)> {
        let Some(tree) = &self.tree else {
            return Vec::new();
        };
        tree.within::<SquaredEuclidean>(&[query.x, query.y, query.z], radius * radius)
            .into_iter()
            .map(|n| (n.item as usize, n.distance.sqrt()))
            .collect()
    }
}
