//! Localized lattice deformation of a mesh

use crate::falloff::FalloffCurve;
use crate::lattice::{Axis, LatticeCage};
use rayon::prelude::*;
use rhinovate_core::{Aabb, Error, Point3f, Result, TriangleMesh, Vector3f};
use tracing::{debug, info};

/// Parameters for [`deform`]
#[derive(Debug, Clone, PartialEq)]
pub struct MorphConfig {
    /// Control points per axis, odd and at least 3
    pub lattice_resolution: usize,
    /// Cage size relative to the mesh bounds, greater than 1
    pub padding_factor: f32,
    /// Scale applied to the selected band about the cage center
    pub axis_scale: Vector3f,
    /// World-space reach of the band's motion into unselected points
    pub falloff_radius: f32,
    pub falloff_curve: FalloffCurve,
    /// Axis whose middle third is selected
    pub primary_axis: Axis,
}

impl Default for MorphConfig {
    fn default() -> Self {
        Self {
            lattice_resolution: 9,
            padding_factor: 1.1,
            axis_scale: Vector3f::new(0.8, 1.0, 1.0),
            falloff_radius: 0.25,
            falloff_curve: FalloffCurve::Smooth,
            primary_axis: Axis::X,
        }
    }
}

impl MorphConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lattice_resolution < 3 || self.lattice_resolution % 2 == 0 {
            return Err(Error::InvalidData(format!(
                "lattice_resolution must be odd and at least 3, got {}",
                self.lattice_resolution
            )));
        }
        if !self.padding_factor.is_finite() || self.padding_factor <= 1.0 {
            return Err(Error::InvalidData(
                "padding_factor must be greater than 1".to_string(),
            ));
        }
        if self.axis_scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(Error::InvalidData(format!(
                "axis_scale components must be positive, got {:?}",
                self.axis_scale
            )));
        }
        if !self.falloff_radius.is_finite() || self.falloff_radius <= 0.0 {
            return Err(Error::InvalidData(
                "falloff_radius must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a deformation touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeformReport {
    pub selected_points: usize,
    pub influenced_points: usize,
    pub moved_vertices: usize,
}

/// Deform the middle of a mesh with a scaled control lattice
///
/// Faces are kept as they are. Vertices the lattice does not move come back
/// bit-identical, so an identity `axis_scale` returns an equal mesh.
pub fn deform(mesh: &TriangleMesh, config: &MorphConfig) -> Result<TriangleMesh> {
    deform_with_report(mesh, config).map(|(mesh, _)| mesh)
}

/// [`deform`], also returning counts of what moved
pub fn deform_with_report(
    mesh: &TriangleMesh,
    config: &MorphConfig,
) -> Result<(TriangleMesh, DeformReport)> {
    config.validate()?;
    let bounds = Aabb::from_points(&mesh.vertices)
        .ok_or_else(|| Error::EmptyInput("mesh has no vertices to deform".to_string()))?;

    let mut cage = LatticeCage::new(&bounds, config.lattice_resolution, config.padding_factor)?;
    let selected_points = cage.select_middle_third(config.primary_axis);
    let influenced_points =
        cage.apply_scale(&config.axis_scale, config.falloff_radius, config.falloff_curve);
    debug!(
        selected_points,
        influenced_points,
        cage_size = ?cage.size(),
        "Lattice cage prepared"
    );

    let vertices: Vec<Point3f> = mesh
        .vertices
        .par_iter()
        .map(|v| cage.deform_point(v))
        .collect();
    let moved_vertices = vertices
        .iter()
        .zip(&mesh.vertices)
        .filter(|(after, before)| after != before)
        .count();

    info!(
        vertices = mesh.vertex_count(),
        moved_vertices,
        "Lattice deformation applied"
    );

    // Stored normals no longer match once anything moved
    let normals = if moved_vertices == 0 {
        mesh.normals.clone()
    } else {
        None
    };

    Ok((
        TriangleMesh {
            vertices,
            faces: mesh.faces.clone(),
            normals,
        },
        DeformReport {
            selected_points,
            influenced_points,
            moved_vertices,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_strip(length: f32, segments: usize) -> TriangleMesh {
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        for s in 0..=segments {
            let x = -length / 2.0 + length * s as f32 / segments as f32;
            vertices.push(Point3f::new(x, -0.5, 0.0));
            vertices.push(Point3f::new(x, 0.5, 0.2));
        }
        for s in 0..segments {
            let a = 2 * s;
            faces.push([a, a + 2, a + 1]);
            faces.push([a + 1, a + 2, a + 3]);
        }
        TriangleMesh::from_vertices_and_faces(vertices, faces)
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = MorphConfig::default();
        assert!(config.validate().is_ok());
        config.lattice_resolution = 8;
        assert!(config.validate().is_err());

        let config = MorphConfig {
            axis_scale: Vector3f::new(0.0, 1.0, 1.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MorphConfig {
            falloff_radius: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_mesh_is_empty_input() {
        let err = deform(&TriangleMesh::new(), &MorphConfig::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyInput(_)));
    }

    #[test]
    fn test_report_counts() {
        let mesh = quad_strip(4.0, 40);
        let (deformed, report) = deform_with_report(&mesh, &MorphConfig::default()).unwrap();
        assert_eq!(report.selected_points, 3 * 81);
        assert!(report.moved_vertices > 0);
        assert!(report.moved_vertices < mesh.vertex_count());
        assert_eq!(deformed.faces, mesh.faces);
        assert!(deformed.normals.is_none());
    }

    #[test]
    fn test_identity_scale_keeps_normals() {
        let mut mesh = quad_strip(2.0, 10);
        mesh.compute_vertex_normals();
        let config = MorphConfig {
            axis_scale: Vector3f::repeat(1.0),
            ..Default::default()
        };
        let (deformed, report) = deform_with_report(&mesh, &config).unwrap();
        assert_eq!(report.moved_vertices, 0);
        assert_eq!(report.influenced_points, 0);
        assert_eq!(deformed, mesh);
    }
}
