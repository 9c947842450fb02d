//! Mesh data structures and functionality

use crate::point::*;
use serde::{Deserialize, Serialize};

/// A triangle mesh with vertices and faces
///
/// Faces index into `vertices`. Nothing here enforces index validity; meshes
/// coming out of repair are guaranteed valid, raw imports are not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3f>,
    pub faces: Vec<[usize; 3]>,
    pub normals: Option<Vec<Vector3f>>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            normals: None,
        }
    }

    /// Create a mesh from vertices and faces
    pub fn from_vertices_and_faces(vertices: Vec<Point3f>, faces: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            faces,
            normals: None,
        }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// True when every face index is below the vertex count
    pub fn indices_in_range(&self) -> bool {
        let n = self.vertices.len();
        self.faces.iter().all(|f| f.iter().all(|&i| i < n))
    }

    /// Unnormalized face normal; its length is twice the triangle area
    pub fn face_cross(&self, face: &[usize; 3]) -> Vector3f {
        let v0 = self.vertices[face[0]];
        let v1 = self.vertices[face[1]];
        let v2 = self.vertices[face[2]];
        (v1 - v0).cross(&(v2 - v0))
    }

    /// Unit face normals; degenerate faces get a zero vector
    pub fn calculate_face_normals(&self) -> Vec<Vector3f> {
        self.faces
            .iter()
            .map(|face| {
                self.face_cross(face)
                    .try_normalize(f32::EPSILON)
                    .unwrap_or_else(Vector3f::zeros)
            })
            .collect()
    }

    /// Area-weighted vertex normals, stored on the mesh
    pub fn compute_vertex_normals(&mut self) {
        let mut normals = vec![Vector3f::zeros(); self.vertices.len()];
        for face in &self.faces {
            let n = self.face_cross(face);
            for &i in face {
                normals[i] += n;
            }
        }
        for n in &mut normals {
            *n = n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3f::z);
        }
        self.normals = Some(normals);
    }

    /// Signed enclosed volume (divergence theorem); positive for outward winding
    pub fn signed_volume(&self) -> f64 {
        self.faces
            .iter()
            .map(|f| {
                let a = self.vertices[f[0]].coords.cast::<f64>();
                let b = self.vertices[f[1]].coords.cast::<f64>();
                let c = self.vertices[f[2]].coords.cast::<f64>();
                a.dot(&b.cross(&c)) / 6.0
            })
            .sum()
    }

    /// Return a copy of the mesh moved by `offset`, normals untouched
    pub fn translated(&self, offset: &Vector3f) -> Self {
        Self {
            vertices: self.vertices.iter().map(|v| v + offset).collect(),
            faces: self.faces.clone(),
            normals: self.normals.clone(),
        }
    }

    /// Reverse the winding of every face
    pub fn flip_faces(&mut self) {
        for face in &mut self.faces {
            face.swap(1, 2);
        }
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_tetrahedron() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        )
    }

    #[test]
    fn test_signed_volume_of_tetrahedron() {
        let mut mesh = unit_tetrahedron();
        assert_relative_eq!(mesh.signed_volume(), 1.0 / 6.0, epsilon = 1e-9);
        mesh.flip_faces();
        assert_relative_eq!(mesh.signed_volume(), -1.0 / 6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_vertex_normals_are_unit() {
        let mut mesh = unit_tetrahedron();
        mesh.compute_vertex_normals();
        let normals = mesh.normals.as_ref().unwrap();
        assert_eq!(normals.len(), 4);
        for n in normals {
            assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-5);
        }
        // The origin corner points away from the solid
        assert!(normals[0].x < 0.0 && normals[0].y < 0.0 && normals[0].z < 0.0);
    }

    #[test]
    fn test_degenerate_face_normal_is_zero() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![Point3f::origin(), Point3f::new(1.0, 0.0, 0.0), Point3f::new(2.0, 0.0, 0.0)],
            vec![[0, 1, 2]],
        );
        assert_eq!(mesh.calculate_face_normals()[0], Vector3f::zeros());
    }

    #[test]
    fn test_indices_in_range() {
        let mut mesh = unit_tetrahedron();
        assert!(mesh.indices_in_range());
        mesh.faces.push([0, 1, 4]);
        assert!(!mesh.indices_in_range());
    }
}
