//! Adaptive simplification of extracted surfaces
//!
//! Vertex clustering (Rossignac & Borrel) restricted to flat regions and
//! carried out as a sequence of edge collapses. Two flat vertices of the same
//! grid cell merge only when their edge passes the link condition, so a
//! manifold surface stays manifold. Curved regions and open borders keep
//! full detail.

use rhinovate_algorithms::remove_unreferenced_vertices;
use rhinovate_core::{Error, Point3f, Result, TriangleMesh, Vector3f};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Largest normal-cone half angle, reached at adaptivity 1
const MAX_FLATNESS_ANGLE_DEG: f32 = 45.0;

/// Smallest triangle area a collapse may leave behind
const MIN_FACE_AREA: f32 = 1e-9;

/// Vertices whose incident faces deviate from their mean normal by at most
/// `max_angle` radians
fn flat_vertices(mesh: &TriangleMesh, max_angle: f32) -> Vec<bool> {
    let face_normals = mesh.calculate_face_normals();
    let mut mean = vec![Vector3f::zeros(); mesh.vertices.len()];
    for (face, n) in mesh.faces.iter().zip(face_normals.iter()) {
        for &i in face {
            mean[i] += n;
        }
    }
    let mean: Vec<Option<Vector3f>> = mean
        .into_iter()
        .map(|n| n.try_normalize(f32::EPSILON))
        .collect();

    let min_cos = max_angle.cos();
    let mut flat: Vec<bool> = mean.iter().map(Option::is_some).collect();
    for (face, n) in mesh.faces.iter().zip(face_normals.iter()) {
        for &i in face {
            if let Some(m) = mean[i] {
                if m.dot(n) < min_cos {
                    flat[i] = false;
                }
            }
        }
    }
    flat
}

fn cross(a: &Point3f, b: &Point3f, c: &Point3f) -> Vector3f {
    (b - a).cross(&(c - a))
}

fn sorted(mut face: [usize; 3]) -> [usize; 3] {
    face.sort_unstable();
    face
}

/// Triangle soup with per-vertex incidence, shrinking by edge collapses
struct Collapser {
    positions: Vec<Point3f>,
    /// Sum and count of the input vertices merged into each vertex
    sums: Vec<(Vector3f, usize)>,
    faces: Vec<Option<[usize; 3]>>,
    incident: Vec<Vec<usize>>,
    /// Smallest cosine between a face normal before and after a collapse
    min_cos: f32,
}

impl Collapser {
    fn new(mesh: &TriangleMesh, min_cos: f32) -> Self {
        let mut incident = vec![Vec::new(); mesh.vertices.len()];
        for (fi, face) in mesh.faces.iter().enumerate() {
            for &v in face {
                incident[v].push(fi);
            }
        }
        Self {
            positions: mesh.vertices.clone(),
            sums: mesh.vertices.iter().map(|v| (v.coords, 1)).collect(),
            faces: mesh.faces.iter().copied().map(Some).collect(),
            incident,
            min_cos,
        }
    }

    fn live_faces(&self, v: usize) -> impl Iterator<Item = (usize, [usize; 3])> + '_ {
        self.incident[v]
            .iter()
            .filter_map(move |&fi| self.faces[fi].map(|f| (fi, f)))
    }

    fn neighbors(&self, v: usize) -> HashSet<usize> {
        self.live_faces(v)
            .flat_map(|(_, f)| f)
            .filter(|&x| x != v)
            .collect()
    }

    /// The faces around `v` form one closed, consistently wound fan
    fn is_disk(&self, v: usize) -> bool {
        let mut next: HashMap<usize, usize> = HashMap::new();
        for (_, f) in self.live_faces(v) {
            let Some(k) = f.iter().position(|&x| x == v) else {
                return false;
            };
            if next.insert(f[(k + 1) % 3], f[(k + 2) % 3]).is_some() {
                return false;
            }
        }
        let Some(&start) = next.keys().next() else {
            return false;
        };
        if next.len() < 3 {
            return false;
        }
        let mut current = start;
        for step in 1..=next.len() {
            match next.get(&current) {
                Some(&n) => current = n,
                None => return false,
            }
            if current == start {
                return step == next.len();
            }
        }
        false
    }

    /// Merge `v` into `u` if the surface stays manifold and no face flips
    fn try_collapse(&mut self, u: usize, v: usize) -> bool {
        if u == v || !self.is_disk(u) || !self.is_disk(v) {
            return false;
        }

        let shared: Vec<(usize, [usize; 3])> =
            self.live_faces(u).filter(|(_, f)| f.contains(&v)).collect();
        if shared.len() != 2 {
            return false;
        }
        let opposite: HashSet<usize> = shared
            .iter()
            .flat_map(|(_, f)| *f)
            .filter(|&x| x != u && x != v)
            .collect();

        // Link condition: the only common neighbors are the two apexes
        let common: HashSet<usize> = self
            .neighbors(u)
            .intersection(&self.neighbors(v))
            .copied()
            .collect();
        if opposite.len() != 2 || common != opposite {
            return false;
        }

        let shared_ids: Vec<usize> = shared.iter().map(|(fi, _)| *fi).collect();
        let (sum_u, count_u) = self.sums[u];
        let (sum_v, count_v) = self.sums[v];
        let merged = Point3f::from((sum_u + sum_v) / (count_u + count_v) as f32);

        // A fan of u and a fan of v must not close onto the same triangle
        let mut seen: HashSet<[usize; 3]> = self
            .live_faces(u)
            .filter(|(fi, _)| !shared_ids.contains(fi))
            .map(|(_, f)| sorted(f))
            .collect();
        for (fi, f) in self.live_faces(v) {
            if shared_ids.contains(&fi) {
                continue;
            }
            let renamed = f.map(|x| if x == v { u } else { x });
            if !seen.insert(sorted(renamed)) {
                return false;
            }
        }

        for (fi, f) in self.live_faces(u).chain(self.live_faces(v)) {
            if shared_ids.contains(&fi) {
                continue;
            }
            let before = cross(
                &self.positions[f[0]],
                &self.positions[f[1]],
                &self.positions[f[2]],
            );
            let moved = f.map(|x| if x == u || x == v { merged } else { self.positions[x] });
            let after = cross(&moved[0], &moved[1], &moved[2]);
            if 0.5 * after.norm() <= MIN_FACE_AREA {
                return false;
            }
            match (before.try_normalize(f32::EPSILON), after.try_normalize(f32::EPSILON)) {
                (Some(b), Some(a)) if a.dot(&b) >= self.min_cos => {}
                _ => return false,
            }
        }

        for fi in shared_ids {
            self.faces[fi] = None;
        }
        for fi in std::mem::take(&mut self.incident[v]) {
            if let Some(face) = self.faces[fi].as_mut() {
                for x in face.iter_mut() {
                    if *x == v {
                        *x = u;
                    }
                }
                self.incident[u].push(fi);
            }
        }
        let faces = &self.faces;
        self.incident[u].retain(|&fi| faces[fi].is_some());
        self.positions[u] = merged;
        self.sums[u] = (sum_u + sum_v, count_u + count_v);
        true
    }
}

/// Merge near-coplanar geometry
///
/// `adaptivity` 0 returns the mesh unchanged; 1 merges flat vertices on a
/// grid four voxels wide whose normals agree within 45 degrees. Merged
/// vertices move to the centroid of the input vertices they absorb. Merges
/// that would pinch, tear or fold the surface are skipped, so a closed
/// manifold input stays a closed manifold.
pub fn simplify_adaptive(mesh: &TriangleMesh, adaptivity: f32, voxel_size: f32) -> Result<TriangleMesh> {
    if !(0.0..=1.0).contains(&adaptivity) {
        return Err(Error::InvalidData(format!(
            "adaptivity must be within [0, 1], got {}",
            adaptivity
        )));
    }
    if adaptivity == 0.0 || mesh.faces.is_empty() {
        return Ok(mesh.clone());
    }
    if voxel_size <= 0.0 {
        return Err(Error::InvalidData("voxel_size must be positive".to_string()));
    }

    let max_angle = (adaptivity * MAX_FLATNESS_ANGLE_DEG).to_radians();
    let cell_size = voxel_size * (1.0 + 3.0 * adaptivity);
    let flat = flat_vertices(mesh, max_angle);
    let cells: Vec<(i64, i64, i64)> = mesh
        .vertices
        .iter()
        .map(|v| {
            (
                (v.x / cell_size).floor() as i64,
                (v.y / cell_size).floor() as i64,
                (v.z / cell_size).floor() as i64,
            )
        })
        .collect();

    let mut collapser = Collapser::new(mesh, max_angle.cos());
    let mut collapses = 0;
    loop {
        let mut changed = false;
        for fi in 0..collapser.faces.len() {
            let Some(face) = collapser.faces[fi] else {
                continue;
            };
            for k in 0..3 {
                let (a, b) = (face[k], face[(k + 1) % 3]);
                if flat[a] && flat[b] && cells[a] == cells[b] && collapser.try_collapse(a, b) {
                    collapses += 1;
                    changed = true;
                    break;
                }
            }
        }
        if !changed {
            break;
        }
    }

    let mut vertices = collapser.positions;
    let mut faces: Vec<[usize; 3]> = collapser.faces.into_iter().flatten().collect();
    remove_unreferenced_vertices(&mut vertices, &mut faces);

    debug!(
        before = mesh.face_count(),
        after = faces.len(),
        collapses,
        adaptivity,
        "adaptive simplification"
    );
    Ok(TriangleMesh::from_vertices_and_faces(vertices, faces))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::MeshStats;

    /// Flat square grid of `n` x `n` cells in the z = 0 plane
    fn plane_grid(n: usize, spacing: f32) -> TriangleMesh {
        let mut vertices = Vec::new();
        for i in 0..=n {
            for j in 0..=n {
                vertices.push(Point3f::new(i as f32 * spacing, j as f32 * spacing, 0.0));
            }
        }
        let mut faces = Vec::new();
        let w = n + 1;
        for i in 0..n {
            for j in 0..n {
                let a = i * w + j;
                faces.push([a, a + w, a + w + 1]);
                faces.push([a, a + w + 1, a + 1]);
            }
        }
        TriangleMesh::from_vertices_and_faces(vertices, faces)
    }

    #[test]
    fn test_zero_adaptivity_is_identity() {
        let mesh = plane_grid(6, 0.1);
        assert_eq!(simplify_adaptive(&mesh, 0.0, 0.1).unwrap(), mesh);
    }

    #[test]
    fn test_flat_grid_is_reduced() {
        let mesh = plane_grid(16, 0.1);
        let simplified = simplify_adaptive(&mesh, 1.0, 0.1).unwrap();
        assert!(simplified.face_count() < mesh.face_count() * 3 / 4);
        assert!(simplified.face_count() > 0);
        assert!(simplified.indices_in_range());
        assert!(simplified.vertices.iter().all(|v| v.z.abs() < 1e-6));
    }

    #[test]
    fn test_sharp_fold_is_kept() {
        // Two faces meeting at a right angle: the shared edge vertices are not flat
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(0.01, 0.0, 0.0),
                Point3f::new(0.0, 0.01, 0.0),
                Point3f::new(0.0, 0.0, 0.01),
            ],
            vec![[0, 1, 2], [0, 3, 1]],
        );
        let simplified = simplify_adaptive(&mesh, 0.5, 0.001).unwrap();
        assert_eq!(simplified.face_count(), 2);
    }

    /// Closed box of `n` x `n` grid cells per side, wound outward
    fn box_grid(n: usize, spacing: f32) -> TriangleMesh {
        let mut index: HashMap<[usize; 3], usize> = HashMap::new();
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        let mut vertex = |c: [usize; 3]| {
            *index.entry(c).or_insert_with(|| {
                vertices.push(Point3f::new(
                    c[0] as f32 * spacing,
                    c[1] as f32 * spacing,
                    c[2] as f32 * spacing,
                ));
                vertices.len() - 1
            })
        };
        let center = Vector3f::repeat(n as f32 * spacing / 2.0);
        let mut quads = Vec::new();
        for axis in 0..3 {
            let (u, w) = ((axis + 1) % 3, (axis + 2) % 3);
            for side in [0, n] {
                for i in 0..n {
                    for j in 0..n {
                        let corner = |di: usize, dj: usize| {
                            let mut c = [0; 3];
                            c[axis] = side;
                            c[u] = i + di;
                            c[w] = j + dj;
                            c
                        };
                        quads.push([corner(0, 0), corner(1, 0), corner(1, 1), corner(0, 1)]);
                    }
                }
            }
        }
        for q in quads {
            let q = q.map(&mut vertex);
            faces.push([q[0], q[1], q[2]]);
            faces.push([q[0], q[2], q[3]]);
        }
        // Orient each triangle away from the box center
        for f in faces.iter_mut() {
            let n = cross(&vertices[f[0]], &vertices[f[1]], &vertices[f[2]]);
            if n.dot(&(vertices[f[0]].coords - center)) < 0.0 {
                f.swap(1, 2);
            }
        }
        TriangleMesh::from_vertices_and_faces(vertices, faces)
    }

    #[test]
    fn test_closed_box_stays_closed() {
        let mesh = box_grid(12, 0.1);
        assert!(MeshStats::compute(&mesh).is_closed_manifold());
        for adaptivity in [0.1, 0.5, 1.0] {
            let simplified = simplify_adaptive(&mesh, adaptivity, 0.1).unwrap();
            let stats = MeshStats::compute(&simplified);
            assert!(stats.is_closed_manifold(), "adaptivity {}: {:?}", adaptivity, stats);
            assert!(stats.signed_volume > 0.0);
        }
        let coarse = simplify_adaptive(&mesh, 1.0, 0.1).unwrap();
        assert!(coarse.face_count() < mesh.face_count());
    }

    #[test]
    fn test_tetrahedron_is_not_collapsed() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(0.01, 0.0, 0.0),
                Point3f::new(0.0, 0.01, 0.0),
                Point3f::new(0.0, 0.0, 0.01),
            ],
            vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        );
        let mut collapser = Collapser::new(&mesh, -1.0);
        assert!(collapser.is_disk(0));
        assert!(!collapser.try_collapse(0, 1));
    }

    #[test]
    fn test_rejects_out_of_range_adaptivity() {
        let mesh = plane_grid(2, 0.1);
        assert!(simplify_adaptive(&mesh, 1.5, 0.1).is_err());
        assert!(simplify_adaptive(&mesh, -0.1, 0.1).is_err());
    }
}
