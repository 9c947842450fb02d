//! Mesh connectivity repair
//!
//! Repair runs a fixed sequence of passes and is idempotent: repairing an
//! already repaired mesh returns it unchanged.

use rhinovate_core::{Error, Point3f, Result, TriangleMesh};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Thresholds used by [`repair_with_params`]
#[derive(Debug, Clone, PartialEq)]
pub struct RepairParams {
    /// Vertices closer than this are merged into one
    pub weld_epsilon: f32,
    /// Triangles with area at or below this are removed
    pub degenerate_area_threshold: f64,
}

impl Default for RepairParams {
    fn default() -> Self {
        Self {
            weld_epsilon: 1e-6,
            degenerate_area_threshold: 1e-10,
        }
    }
}

/// What each repair pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub out_of_range_faces: usize,
    pub degenerate_faces: usize,
    pub unreferenced_vertices: usize,
    pub welded_vertices: usize,
    pub duplicate_faces: usize,
}

impl RepairReport {
    pub fn had_changes(&self) -> bool {
        *self != Self::default()
    }
}

/// Repair a mesh with default thresholds
///
/// Fails with `UnrecoverableMesh` when no vertex survives.
pub fn repair(mesh: &TriangleMesh) -> Result<TriangleMesh> {
    repair_with_params(mesh, &RepairParams::default()).map(|(m, _)| m)
}

/// Repair a mesh
///
/// Passes, in order:
/// 1. drop faces with an index outside `[0, vertex_count)`
/// 2. drop degenerate faces (repeated index or near-zero area)
/// 3. drop unreferenced vertices, compacting in original order
/// 4. weld vertices closer than `weld_epsilon`, then clean up the
///    degenerate, duplicate and unreferenced leftovers welding produces
///
/// Normals are not carried over since vertex indices change.
pub fn repair_with_params(
    mesh: &TriangleMesh,
    params: &RepairParams,
) -> Result<(TriangleMesh, RepairReport)> {
    if params.weld_epsilon < 0.0 {
        return Err(Error::InvalidData(
            "weld_epsilon must not be negative".to_string(),
        ));
    }

    let mut report = RepairReport::default();
    let vertex_count = mesh.vertices.len();

    let mut faces: Vec<[usize; 3]> = mesh
        .faces
        .iter()
        .filter(|f| f.iter().all(|&i| i < vertex_count))
        .copied()
        .collect();
    report.out_of_range_faces = mesh.faces.len() - faces.len();

    let mut vertices = mesh.vertices.clone();
    report.degenerate_faces += remove_degenerate_faces(&vertices, &mut faces, params.degenerate_area_threshold);
    report.unreferenced_vertices += remove_unreferenced_vertices(&mut vertices, &mut faces);

    if params.weld_epsilon > 0.0 {
        report.welded_vertices = weld_vertices(&vertices, &mut faces, params.weld_epsilon);
        if report.welded_vertices > 0 {
            report.degenerate_faces +=
                remove_degenerate_faces(&vertices, &mut faces, params.degenerate_area_threshold);
            report.duplicate_faces = remove_duplicate_faces(&mut faces);
            report.unreferenced_vertices += remove_unreferenced_vertices(&mut vertices, &mut faces);
        }
    }
    // Duplicates may also come straight from the input
    let duplicates = remove_duplicate_faces(&mut faces);
    if duplicates > 0 {
        report.duplicate_faces += duplicates;
        report.unreferenced_vertices += remove_unreferenced_vertices(&mut vertices, &mut faces);
    }

    if vertices.is_empty() {
        return Err(Error::UnrecoverableMesh(format!(
            "no vertices survived repair ({} vertices, {} faces in input)",
            mesh.vertices.len(),
            mesh.faces.len()
        )));
    }

    if report.had_changes() {
        debug!(?report, "mesh repaired");
    }
    Ok((TriangleMesh::from_vertices_and_faces(vertices, faces), report))
}

fn triangle_area(vertices: &[Point3f], face: &[usize; 3]) -> f64 {
    let a = vertices[face[0]].coords.cast::<f64>();
    let b = vertices[face[1]].coords.cast::<f64>();
    let c = vertices[face[2]].coords.cast::<f64>();
    0.5 * (b - a).cross(&(c - a)).norm()
}

/// Remove faces with repeated indices or area at or below `area_threshold`
pub fn remove_degenerate_faces(
    vertices: &[Point3f],
    faces: &mut Vec<[usize; 3]>,
    area_threshold: f64,
) -> usize {
    let before = faces.len();
    faces.retain(|f| {
        f[0] != f[1]
            && f[1] != f[2]
            && f[0] != f[2]
            && triangle_area(vertices, f) > area_threshold
    });
    before - faces.len()
}

/// Drop vertices no face references and re-index faces; order is preserved
pub fn remove_unreferenced_vertices(
    vertices: &mut Vec<Point3f>,
    faces: &mut [[usize; 3]],
) -> usize {
    let mut referenced = vec![false; vertices.len()];
    for face in faces.iter() {
        for &i in face {
            referenced[i] = true;
        }
    }

    let mut remap = vec![usize::MAX; vertices.len()];
    let mut next = 0;
    for (old, keep) in referenced.iter().enumerate() {
        if *keep {
            remap[old] = next;
            next += 1;
        }
    }

    let removed = vertices.len() - next;
    if removed == 0 {
        return 0;
    }

    let mut idx = 0;
    vertices.retain(|_| {
        let keep = referenced[idx];
        idx += 1;
        keep
    });
    for face in faces.iter_mut() {
        for i in face.iter_mut() {
            *i = remap[*i];
        }
    }
    removed
}

fn pos_to_cell(p: &Point3f, cell_size: f32) -> (i64, i64, i64) {
    (
        (p.x / cell_size).floor() as i64,
        (p.y / cell_size).floor() as i64,
        (p.z / cell_size).floor() as i64,
    )
}

/// Redirect faces from near-coincident vertices to a single representative
///
/// The lowest-index vertex of each group is the representative and keeps its
/// position. Representatives end up at least `epsilon` apart, so a second
/// pass finds nothing to merge. Merged vertices stay in `vertices` until the
/// unreferenced pass drops them. Returns the number of merged vertices.
pub fn weld_vertices(vertices: &[Point3f], faces: &mut [[usize; 3]], epsilon: f32) -> usize {
    if vertices.is_empty() {
        return 0;
    }

    let cell_size = epsilon * 2.0;
    let mut spatial_hash: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
    for (idx, v) in vertices.iter().enumerate() {
        spatial_hash.entry(pos_to_cell(v, cell_size)).or_default().push(idx);
    }

    let mut remap: Vec<usize> = (0..vertices.len()).collect();
    let mut merged = 0;

    for (idx, v) in vertices.iter().enumerate() {
        if remap[idx] != idx {
            continue;
        }
        let cell = pos_to_cell(v, cell_size);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = spatial_hash.get(&(cell.0 + dx, cell.1 + dy, cell.2 + dz))
                    else {
                        continue;
                    };
                    for &other in candidates {
                        if other <= idx || remap[other] != other {
                            continue;
                        }
                        if (vertices[other] - v).norm() < epsilon {
                            remap[other] = idx;
                            merged += 1;
                        }
                    }
                }
            }
        }
    }

    if merged > 0 {
        for face in faces.iter_mut() {
            for i in face.iter_mut() {
                *i = remap[*i];
            }
        }
    }
    merged
}

/// Remove faces that use the same three vertices as an earlier face, in any order
pub fn remove_duplicate_faces(faces: &mut Vec<[usize; 3]>) -> usize {
    let before = faces.len();
    let mut seen: HashSet<[usize; 3]> = HashSet::with_capacity(faces.len());
    faces.retain(|f| {
        let mut key = *f;
        key.sort_unstable();
        seen.insert(key)
    });
    before - faces.len()
}
