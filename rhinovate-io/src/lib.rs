//! Scan loading and mesh export
//!
//! Raw scans are read from PLY or OBJ into a [`RawScan`]. Meshes leave the
//! pipeline as a plain-text OBJ hand-off file and a binary glTF artifact.

pub mod ply;
pub mod obj;
pub mod glb;

pub use glb::GlbWriter;
pub use self::obj::{ObjReader, ObjWriter};
pub use ply::PlyReader;

use rhinovate_core::{Error, Point3f, PointCloud, Result, TriangleMesh};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Trait for reading raw scans from files
pub trait ScanReader {
    fn read_scan<P: AsRef<Path>>(path: P) -> Result<RawScan>;
}

/// Trait for writing meshes to files
pub trait MeshWriter {
    fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()>;
}

/// Scan contents as read from disk
///
/// Colors are carried only so that a scan with odd color channels still
/// loads; nothing downstream consumes them.
#[derive(Debug, Clone, PartialEq)]
pub struct RawScan {
    pub points: PointCloud<Point3f>,
    pub faces: Vec<[usize; 3]>,
    pub colors: Option<Vec<[u8; 3]>>,
}

/// Geometry of a scan with colors stripped
#[derive(Debug, Clone, PartialEq)]
pub enum ScanGeometry {
    /// Unstructured points, reconstruction required
    Points(PointCloud<Point3f>),
    /// Imported connectivity, possibly broken
    Mesh(TriangleMesh),
}

impl RawScan {
    pub fn has_faces(&self) -> bool {
        !self.faces.is_empty()
    }

    /// Drop colors and classify the scan as a point cloud or a mesh import
    pub fn into_geometry(self) -> ScanGeometry {
        if self.faces.is_empty() {
            ScanGeometry::Points(self.points)
        } else {
            ScanGeometry::Mesh(TriangleMesh::from_vertices_and_faces(
                self.points.points,
                self.faces,
            ))
        }
    }
}

/// Scan file formats that can be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFormat {
    Ply,
    Obj,
}

impl ScanFormat {
    /// Format named by the file extension, ignoring case
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "ply" => Some(ScanFormat::Ply),
            "obj" => Some(ScanFormat::Obj),
            _ => None,
        }
    }

    /// Read `path` as this format regardless of its name
    pub fn read<P: AsRef<Path>>(self, path: P) -> Result<RawScan> {
        match self {
            ScanFormat::Ply => PlyReader::read_scan(path),
            ScanFormat::Obj => ObjReader::read_scan(path),
        }
    }
}

/// Auto-detect format and read a scan
pub fn load_scan<P: AsRef<Path>>(path: P) -> Result<RawScan> {
    let path = path.as_ref();
    let format = ScanFormat::from_path(path).ok_or_else(|| {
        Error::Load(format!("unsupported scan format: {}", path.display()))
    })?;
    format.read(path)
}

/// Write the plain-text OBJ hand-off file
pub fn write_obj<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
    ObjWriter::write_mesh(mesh, path)
}

/// Write the binary glTF artifact
pub fn write_glb<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
    GlbWriter::write_mesh(mesh, path)
}

/// Fan-triangulate a polygon; fewer than three corners yields nothing
pub(crate) fn triangulate_fan(polygon: &[usize]) -> impl Iterator<Item = [usize; 3]> + '_ {
    let first = polygon.first().copied().unwrap_or_default();
    polygon
        .windows(2)
        .skip(1)
        .map(move |pair| [first, pair[0], pair[1]])
}

/// Reject non-finite coordinates at ingestion
pub(crate) fn checked_points(points: Vec<Point3f>, path: &Path) -> Result<PointCloud<Point3f>> {
    PointCloud::from_points_checked(points)
        .map_err(|e| Error::Load(format!("{}: {}", path.display(), e)))
}

/// Reject faces pointing past the vertex array
pub(crate) fn checked_faces(
    faces: Vec<[usize; 3]>,
    vertex_count: usize,
    path: &Path,
) -> Result<Vec<[usize; 3]>> {
    if let Some(face) = faces.iter().find(|f| f.iter().any(|&i| i >= vertex_count)) {
        return Err(Error::Load(format!(
            "{}: face {:?} references a vertex beyond {}",
            path.display(),
            face,
            vertex_count
        )));
    }
    Ok(faces)
}

/// Write through a sibling temporary file and rename it into place
///
/// A failed write removes the temporary file and leaves `path` untouched.
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let temp = temporary_path(path);
    let result = File::create(&temp).and_then(|file| {
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    });
    let result = result.and_then(|()| fs::rename(&temp, path));
    if let Err(e) = result {
        let _ = fs::remove_file(&temp);
        return Err(Error::Export(format!("{}: {}", path.display(), e)));
    }
    Ok(())
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
