//! Core traits shared by the pipeline stages

use crate::{bounds::Aabb, mesh::*, point::*, point_cloud::*};

/// Trait for nearest neighbor search functionality
///
/// Distances in the returned `(index, distance)` pairs are Euclidean, not squared.
pub trait NearestNeighborSearch {
    /// Find the k nearest neighbors to a query point, closest first
    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)>;

    /// Find all neighbors within a given radius
    fn find_radius_neighbors(&self, query: &Point3f, radius: f32) -> Vec<(usize, f32)>;
}

/// Geometry with a spatial extent
pub trait Bounded {
    /// Axis-aligned bounds, `None` for empty geometry
    fn bounding_box(&self) -> Option<Aabb>;

    /// Center of the bounding box, the origin for empty geometry
    fn center(&self) -> Point3f {
        self.bounding_box()
            .map(|bb| bb.center())
            .unwrap_or_else(Point3f::origin)
    }
}

impl Bounded for PointCloud<Point3f> {
    fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(&self.points)
    }
}

impl Bounded for TriangleMesh {
    fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(&self.vertices)
    }
}
