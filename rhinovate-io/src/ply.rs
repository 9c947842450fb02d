//! PLY scan support

use crate::{checked_faces, checked_points, triangulate_fan, RawScan, ScanReader};
use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};
use rhinovate_core::{Error, Point3f, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};

pub struct PlyReader;

impl ScanReader for PlyReader {
    fn read_scan<P: AsRef<Path>>(path: P) -> Result<RawScan> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::Load(format!("{}: {}", path.display(), e)))?;
        let mut reader = BufReader::new(file);

        let parser = Parser::<DefaultElement>::new();
        let ply = parser
            .read_ply(&mut reader)
            .map_err(|e| Error::Load(format!("{}: malformed PLY: {}", path.display(), e)))?;

        let empty = Vec::new();
        let vertex_elements = ply.payload.get("vertex").unwrap_or(&empty);
        let mut points = Vec::with_capacity(vertex_elements.len());
        for (index, vertex) in vertex_elements.iter().enumerate() {
            let coordinate = |name: &str| {
                vertex.get(name).and_then(scalar_value).ok_or_else(|| {
                    Error::Load(format!(
                        "{}: vertex {} has no numeric '{}'",
                        path.display(),
                        index,
                        name
                    ))
                })
            };
            points.push(Point3f::new(
                coordinate("x")? as f32,
                coordinate("y")? as f32,
                coordinate("z")? as f32,
            ));
        }

        let mut faces = Vec::new();
        if let Some(face_elements) = ply.payload.get("face") {
            for (index, face) in face_elements.iter().enumerate() {
                let indices = extract_face_indices(face).ok_or_else(|| {
                    Error::Load(format!(
                        "{}: face {} has invalid vertex indices",
                        path.display(),
                        index
                    ))
                })?;
                faces.extend(triangulate_fan(&indices));
            }
        }

        let colors = extract_colors(vertex_elements);
        if colors.is_none() && vertex_elements.first().is_some_and(|v| v.contains_key("red")) {
            warn!(file = %path.display(), "Ignoring inconsistent vertex colors");
        }

        let faces = checked_faces(faces, points.len(), path)?;
        let points = checked_points(points, path)?;
        debug!(
            file = %path.display(),
            vertices = points.len(),
            faces = faces.len(),
            "Read PLY scan"
        );
        Ok(RawScan {
            points,
            faces,
            colors,
        })
    }
}

/// Numeric value of a scalar property
fn scalar_value(property: &Property) -> Option<f64> {
    match *property {
        Property::Char(v) => Some(v as f64),
        Property::UChar(v) => Some(v as f64),
        Property::Short(v) => Some(v as f64),
        Property::UShort(v) => Some(v as f64),
        Property::Int(v) => Some(v as f64),
        Property::UInt(v) => Some(v as f64),
        Property::Float(v) => Some(v as f64),
        Property::Double(v) => Some(v),
        _ => None,
    }
}

/// Face indices as `usize`; `None` for a missing list or a negative index
fn extract_face_indices(element: &DefaultElement) -> Option<Vec<usize>> {
    fn convert<T: Copy + TryInto<usize>>(values: &[T]) -> Option<Vec<usize>> {
        values.iter().map(|&v| v.try_into().ok()).collect()
    }
    match element.get("vertex_indices").or_else(|| element.get("vertex_index"))? {
        Property::ListChar(v) => convert(v),
        Property::ListUChar(v) => convert(v),
        Property::ListShort(v) => convert(v),
        Property::ListUShort(v) => convert(v),
        Property::ListInt(v) => convert(v),
        Property::ListUInt(v) => convert(v),
        _ => None,
    }
}

/// Per-vertex RGB, or `None` unless every vertex has all three channels
fn extract_colors(vertices: &[DefaultElement]) -> Option<Vec<[u8; 3]>> {
    if vertices.is_empty() {
        return None;
    }
    vertices
        .iter()
        .map(|vertex| {
            let channel = |name: &str| match vertex.get(name)? {
                Property::UChar(v) => Some(*v),
                Property::Float(v) => Some((v.clamp(0.0, 1.0) * 255.0).round() as u8),
                Property::Double(v) => Some((v.clamp(0.0, 1.0) * 255.0).round() as u8),
                _ => None,
            };
            Some([channel("red")?, channel("green")?, channel("blue")?])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "rhinovate_ply_{}_{}",
            std::process::id(),
            name
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_ascii_mesh_with_colors() {
        let path = temp_file(
            "quad.ply",
            b"ply
format ascii 1.0
comment colored quad
element vertex 4
property float x
property float y
property float z
property uchar red
property uchar green
property uchar blue
element face 1
property list uchar int vertex_indices
end_header
0 0 0 255 0 0
1 0 0 0 255 0
1 1 0 0 0 255
0 1 0 255 255 255
4 0 1 2 3
",
        );
        let scan = PlyReader::read_scan(&path).unwrap();
        assert_eq!(scan.points.len(), 4);
        assert_eq!(scan.faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(scan.colors.as_ref().unwrap()[1], [0, 255, 0]);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_point_cloud_without_faces() {
        let path = temp_file(
            "cloud.ply",
            b"ply
format ascii 1.0
element vertex 2
property double x
property double y
property double z
end_header
0.5 1.5 -2.0
3 4 5
",
        );
        let scan = PlyReader::read_scan(&path).unwrap();
        assert!(!scan.has_faces());
        assert!(scan.colors.is_none());
        assert_eq!(scan.points[0], Point3f::new(0.5, 1.5, -2.0));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_non_finite_coordinate_is_load_error() {
        let path = temp_file(
            "nan.ply",
            b"ply
format ascii 1.0
element vertex 1
property float x
property float y
property float z
end_header
nan 0 0
",
        );
        assert!(matches!(PlyReader::read_scan(&path), Err(Error::Load(_))));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_negative_index_is_load_error() {
        let path = temp_file(
            "negative.ply",
            b"ply
format ascii 1.0
element vertex 3
property float x
property float y
property float z
element face 1
property list uchar int vertex_indices
end_header
0 0 0
1 0 0
0 1 0
3 0 -1 2
",
        );
        assert!(matches!(PlyReader::read_scan(&path), Err(Error::Load(_))));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_garbage_is_load_error() {
        let path = temp_file("garbage.ply", b"not a ply file\n");
        assert!(matches!(PlyReader::read_scan(&path), Err(Error::Load(_))));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let path = std::env::temp_dir().join("rhinovate_ply_does_not_exist.ply");
        assert!(matches!(PlyReader::read_scan(path), Err(Error::Load(_))));
    }
}
