//! Binary glTF 2.0 export
//!
//! A single node holding a single triangle primitive. The BIN chunk packs
//! positions, then normals when the mesh carries them, then `u32` indices.

use crate::{write_atomically, MeshWriter};
use byteorder::{LittleEndian, WriteBytesExt};
use rhinovate_core::{Aabb, Error, Result, TriangleMesh};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::debug;

const GLB_MAGIC: u32 = 0x4654_6C67;
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;
const MODE_TRIANGLES: u32 = 4;

pub struct GlbWriter;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    asset: Asset,
    scene: usize,
    scenes: Vec<Scene>,
    nodes: Vec<Node>,
    meshes: Vec<MeshDef>,
    accessors: Vec<Accessor>,
    buffer_views: Vec<BufferView>,
    buffers: Vec<Buffer>,
}

#[derive(Serialize)]
struct Asset {
    version: &'static str,
    generator: &'static str,
}

#[derive(Serialize)]
struct Scene {
    nodes: Vec<usize>,
}

#[derive(Serialize)]
struct Node {
    mesh: usize,
    name: String,
}

#[derive(Serialize)]
struct MeshDef {
    primitives: Vec<Primitive>,
}

#[derive(Serialize)]
struct Primitive {
    attributes: Attributes,
    indices: usize,
    mode: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct Attributes {
    position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    normal: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Accessor {
    buffer_view: usize,
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<[f32; 3]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BufferView {
    buffer: usize,
    byte_offset: usize,
    byte_length: usize,
    target: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Buffer {
    byte_length: usize,
}

impl MeshWriter for GlbWriter {
    fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = encode_glb(mesh, &node_name(path))?;
        write_atomically(path, |writer| writer.write_all(&bytes))?;
        debug!(
            file = %path.display(),
            bytes = bytes.len(),
            faces = mesh.face_count(),
            "Wrote GLB"
        );
        Ok(())
    }
}

fn node_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("scan")
        .to_string()
}

/// Encode `mesh` as a complete GLB file in memory
pub fn encode_glb(mesh: &TriangleMesh, name: &str) -> Result<Vec<u8>> {
    if mesh.is_empty() {
        return Err(Error::Export("mesh has no triangles to export".to_string()));
    }
    if !mesh.indices_in_range() {
        return Err(Error::Export("mesh has out-of-range face indices".to_string()));
    }
    if u32::try_from(mesh.vertex_count()).is_err() {
        return Err(Error::Export(format!(
            "{} vertices exceed 32-bit indices",
            mesh.vertex_count()
        )));
    }
    let normals = mesh
        .normals
        .as_ref()
        .filter(|n| n.len() == mesh.vertex_count());
    let bounds = Aabb::from_points(&mesh.vertices)
        .ok_or_else(|| Error::Export("mesh has no vertices".to_string()))?;

    let mut bin = Vec::new();
    let mut buffer_views = Vec::new();
    let mut accessors = Vec::new();

    let position_bytes = mesh.vertex_count() * 12;
    buffer_views.push(BufferView {
        buffer: 0,
        byte_offset: bin.len(),
        byte_length: position_bytes,
        target: TARGET_ARRAY_BUFFER,
    });
    for v in &mesh.vertices {
        for c in [v.x, v.y, v.z] {
            bin.write_f32::<LittleEndian>(c)?;
        }
    }
    accessors.push(Accessor {
        buffer_view: 0,
        component_type: COMPONENT_FLOAT,
        count: mesh.vertex_count(),
        kind: "VEC3",
        min: Some([bounds.min.x, bounds.min.y, bounds.min.z]),
        max: Some([bounds.max.x, bounds.max.y, bounds.max.z]),
    });

    let normal_accessor = match normals {
        Some(normals) => {
            buffer_views.push(BufferView {
                buffer: 0,
                byte_offset: bin.len(),
                byte_length: normals.len() * 12,
                target: TARGET_ARRAY_BUFFER,
            });
            for n in normals {
                for c in [n.x, n.y, n.z] {
                    bin.write_f32::<LittleEndian>(c)?;
                }
            }
            accessors.push(Accessor {
                buffer_view: buffer_views.len() - 1,
                component_type: COMPONENT_FLOAT,
                count: normals.len(),
                kind: "VEC3",
                min: None,
                max: None,
            });
            Some(accessors.len() - 1)
        }
        None => None,
    };

    buffer_views.push(BufferView {
        buffer: 0,
        byte_offset: bin.len(),
        byte_length: mesh.face_count() * 12,
        target: TARGET_ELEMENT_ARRAY_BUFFER,
    });
    for face in &mesh.faces {
        for &i in face {
            // Range checked above
            bin.write_u32::<LittleEndian>(i as u32)?;
        }
    }
    accessors.push(Accessor {
        buffer_view: buffer_views.len() - 1,
        component_type: COMPONENT_UNSIGNED_INT,
        count: mesh.face_count() * 3,
        kind: "SCALAR",
        min: None,
        max: None,
    });
    let index_accessor = accessors.len() - 1;

    let document = Document {
        asset: Asset {
            version: "2.0",
            generator: concat!("rhinovate-io ", env!("CARGO_PKG_VERSION")),
        },
        scene: 0,
        scenes: vec![Scene { nodes: vec![0] }],
        nodes: vec![Node {
            mesh: 0,
            name: name.to_string(),
        }],
        meshes: vec![MeshDef {
            primitives: vec![Primitive {
                attributes: Attributes {
                    position: 0,
                    normal: normal_accessor,
                },
                indices: index_accessor,
                mode: MODE_TRIANGLES,
            }],
        }],
        accessors,
        buffer_views,
        buffers: vec![Buffer {
            byte_length: bin.len(),
        }],
    };

    let mut json = serde_json::to_vec(&document)
        .map_err(|e| Error::Export(format!("glTF JSON encoding failed: {}", e)))?;
    pad_to_four(&mut json, b' ');
    pad_to_four(&mut bin, 0);

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let total = u32::try_from(total)
        .map_err(|_| Error::Export(format!("GLB of {} bytes is too large", total)))?;

    let mut out = Vec::with_capacity(total as usize);
    out.write_u32::<LittleEndian>(GLB_MAGIC)?;
    out.write_u32::<LittleEndian>(GLB_VERSION)?;
    out.write_u32::<LittleEndian>(total)?;
    out.write_u32::<LittleEndian>(json.len() as u32)?;
    out.write_u32::<LittleEndian>(CHUNK_JSON)?;
    out.extend_from_slice(&json);
    out.write_u32::<LittleEndian>(bin.len() as u32)?;
    out.write_u32::<LittleEndian>(CHUNK_BIN)?;
    out.extend_from_slice(&bin);
    Ok(out)
}

fn pad_to_four(bytes: &mut Vec<u8>, fill: u8) {
    while bytes.len() % 4 != 0 {
        bytes.push(fill);
    }
}
