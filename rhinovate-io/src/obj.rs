//! OBJ format support

use crate::{
    checked_faces, checked_points, triangulate_fan, write_atomically, MeshWriter, RawScan,
    ScanReader,
};
use ::obj::ObjData;
use rhinovate_core::{Error, Point3f, Result, TriangleMesh};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use tracing::debug;

pub struct ObjReader;
pub struct ObjWriter;

impl ScanReader for ObjReader {
    fn read_scan<P: AsRef<Path>>(path: P) -> Result<RawScan> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::Load(format!("{}: {}", path.display(), e)))?;
        let data = ObjData::load_buf(BufReader::new(file))
            .map_err(|e| Error::Load(format!("{}: malformed OBJ: {}", path.display(), e)))?;

        let points: Vec<Point3f> = data
            .position
            .iter()
            .map(|p| Point3f::new(p[0], p[1], p[2]))
            .collect();

        // Indices arrive zero-based with relative indices already resolved
        let mut faces = Vec::new();
        for group in data.objects.iter().flat_map(|o| o.groups.iter()) {
            for poly in &group.polys {
                let corners: Vec<usize> = poly.0.iter().map(|tuple| tuple.0).collect();
                faces.extend(triangulate_fan(&corners));
            }
        }

        let faces = checked_faces(faces, points.len(), path)?;
        let points = checked_points(points, path)?;
        debug!(
            file = %path.display(),
            vertices = points.len(),
            faces = faces.len(),
            "Read OBJ scan"
        );
        Ok(RawScan {
            points,
            faces,
            colors: None,
        })
    }
}

impl MeshWriter for ObjWriter {
    /// `v x y z` per vertex and 1-indexed `f i j k` per face
    fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
        let path = path.as_ref();
        if !mesh.indices_in_range() {
            return Err(Error::Export(format!(
                "{}: mesh has out-of-range face indices",
                path.display()
            )));
        }
        write_atomically(path, |writer| {
            for v in &mesh.vertices {
                writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
            }
            for f in &mesh.faces {
                writeln!(writer, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1)?;
            }
            Ok(())
        })?;
        debug!(file = %path.display(), faces = mesh.face_count(), "Wrote OBJ");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rhinovate_obj_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_writer_format() {
        let path = temp_path("tri.obj");
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.5, 0.0, 0.0),
                Point3f::new(0.0, -2.0, 0.25),
            ],
            vec![[0, 1, 2]],
        );
        ObjWriter::write_mesh(&mesh, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "v 0 0 0\nv 1.5 0 0\nv 0 -2 0.25\nf 1 2 3\n");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_reader_triangulates_polygons() {
        let path = temp_path("quad.obj");
        std::fs::write(
            &path,
            "# quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1 4//1\n",
        )
        .unwrap();
        let scan = ObjReader::read_scan(&path).unwrap();
        assert_eq!(scan.points.len(), 4);
        assert_eq!(scan.faces, vec![[0, 1, 2], [0, 2, 3]]);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_written_file_reads_back() {
        let path = temp_path("roundtrip.obj");
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        );
        ObjWriter::write_mesh(&mesh, &path).unwrap();
        let scan = ObjReader::read_scan(&path).unwrap();
        assert_eq!(scan.points.points, mesh.vertices);
        assert_eq!(scan.faces, mesh.faces);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_out_of_range_mesh_is_not_written() {
        let path = temp_path("bad.obj");
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![Point3f::new(0.0, 0.0, 0.0)],
            vec![[0, 1, 2]],
        );
        assert!(matches!(
            ObjWriter::write_mesh(&mesh, &path),
            Err(Error::Export(_))
        ));
        assert!(!path.exists());
    }
}
