//! Connected component selection

use crate::stats::edge_key;
use itertools::Itertools;
use rhinovate_algorithms::remove_unreferenced_vertices;
use rhinovate_core::TriangleMesh;
use std::collections::HashMap;

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Component id of every face, faces joined when they share an edge
///
/// Ids are dense and numbered by first face in each component.
pub fn face_components(mesh: &TriangleMesh) -> Vec<usize> {
    let mut parent: Vec<usize> = (0..mesh.faces.len()).collect();
    let mut first_face: HashMap<(usize, usize), usize> = HashMap::new();

    for (fi, face) in mesh.faces.iter().enumerate() {
        for (&a, &b) in face.iter().circular_tuple_windows() {
            match first_face.get(&edge_key(a, b)) {
                Some(&other) => {
                    let ra = find(&mut parent, fi);
                    let rb = find(&mut parent, other);
                    if ra != rb {
                        parent[ra.max(rb)] = ra.min(rb);
                    }
                }
                None => {
                    first_face.insert(edge_key(a, b), fi);
                }
            }
        }
    }

    let mut ids: HashMap<usize, usize> = HashMap::new();
    (0..mesh.faces.len())
        .map(|fi| {
            let root = find(&mut parent, fi);
            let next = ids.len();
            *ids.entry(root).or_insert(next)
        })
        .collect()
}

/// Keep only the component with the most faces, dropping orphaned vertices
///
/// Ties go to the component containing the lowest face index.
pub fn keep_largest_component(mesh: &TriangleMesh) -> TriangleMesh {
    if mesh.faces.is_empty() {
        return mesh.clone();
    }
    let labels = face_components(mesh);
    let counts = labels.iter().copied().counts();
    if counts.len() == 1 {
        return mesh.clone();
    }
    let best = counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(&id, _)| id)
        .unwrap_or(0);

    let mut faces: Vec<[usize; 3]> = mesh
        .faces
        .iter()
        .zip(labels.iter())
        .filter(|(_, &label)| label == best)
        .map(|(f, _)| *f)
        .collect();
    let mut vertices = mesh.vertices.clone();
    remove_unreferenced_vertices(&mut vertices, &mut faces);
    TriangleMesh::from_vertices_and_faces(vertices, faces)
}
