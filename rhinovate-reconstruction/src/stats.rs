//! Topology and volume statistics for triangle meshes

use itertools::Itertools;
use rhinovate_core::TriangleMesh;
use std::collections::HashMap;

/// Undirected edge key with the smaller index first
pub fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Number of faces using each undirected edge
pub fn edge_face_counts(mesh: &TriangleMesh) -> HashMap<(usize, usize), usize> {
    let mut counts = HashMap::with_capacity(mesh.faces.len() * 3 / 2);
    for face in &mesh.faces {
        for (&a, &b) in face.iter().circular_tuple_windows() {
            *counts.entry(edge_key(a, b)).or_insert(0) += 1;
        }
    }
    counts
}

/// Summary of a mesh's shape and connectivity
#[derive(Debug, Clone, PartialEq)]
pub struct MeshStats {
    pub vertex_count: usize,
    pub face_count: usize,
    pub edges: usize,
    /// Edges used by exactly one face
    pub boundary_edges: usize,
    /// Edges used by three or more faces
    pub non_manifold_edges: usize,
    /// Signed enclosed volume, positive for outward winding
    pub signed_volume: f64,
}

impl MeshStats {
    pub fn compute(mesh: &TriangleMesh) -> Self {
        let counts = edge_face_counts(mesh);
        Self {
            vertex_count: mesh.vertex_count(),
            face_count: mesh.face_count(),
            edges: counts.len(),
            boundary_edges: counts.values().filter(|&&c| c == 1).count(),
            non_manifold_edges: counts.values().filter(|&&c| c > 2).count(),
            signed_volume: mesh.signed_volume(),
        }
    }

    /// Every edge is shared by exactly two faces
    pub fn is_closed_manifold(&self) -> bool {
        self.face_count > 0 && self.boundary_edges == 0 && self.non_manifold_edges == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhinovate_core::Point3f;

    #[test]
    fn test_open_triangle() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![Point3f::origin(), Point3f::new(1.0, 0.0, 0.0), Point3f::new(0.0, 1.0, 0.0)],
            vec![[0, 1, 2]],
        );
        let stats = MeshStats::compute(&mesh);
        assert_eq!(stats.edges, 3);
        assert_eq!(stats.boundary_edges, 3);
        assert!(!stats.is_closed_manifold());
    }

    #[test]
    fn test_tetrahedron_is_closed() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        );
        let stats = MeshStats::compute(&mesh);
        assert_eq!(stats.edges, 6);
        assert!(stats.is_closed_manifold());
        assert!(stats.signed_volume > 0.0);
    }

    #[test]
    fn test_fin_is_non_manifold() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(0.0, -1.0, 0.0),
                Point3f::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 1, 2], [1, 0, 3], [0, 1, 4]],
        );
        assert_eq!(MeshStats::compute(&mesh).non_manifold_edges, 1);
    }
}
