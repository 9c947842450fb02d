//! Point set to surface mesh via an implicit density volume

use crate::cavity::shell_midpoint_field;
use crate::components::keep_largest_component;
use crate::marching_cubes::{MarchingCubes, MarchingCubesConfig};
use crate::simplify::simplify_adaptive;
use crate::volume::VolumeGrid;
use rhinovate_core::{Error, Point3f, PointCloud, Result, TriangleMesh};
use tracing::{debug, info};

/// Level of the shell-midpoint field at which the surface is extracted
const SHELL_MIDPOINT_LEVEL: f32 = 0.5;

/// Configuration for [`reconstruct_with_config`]
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructionConfig {
    /// Grid nodes along the longest axis
    pub voxel_resolution: usize,
    /// Kernel support radius of each point
    pub splat_radius: f32,
    /// Density at which the surface is placed
    pub iso_threshold: f32,
    /// 0 keeps all detail, 1 merges flat regions aggressively
    pub adaptivity: f32,
    /// Place the surface mid-shell when the density encloses a cavity
    pub fill_cavities: bool,
    /// Drop every piece but the one with the most triangles
    pub keep_largest_component: bool,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            voxel_resolution: 128,
            splat_radius: 0.05,
            iso_threshold: 0.1,
            adaptivity: 0.1,
            fill_cavities: true,
            keep_largest_component: true,
        }
    }
}

impl ReconstructionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.iso_threshold <= 0.0 {
            return Err(Error::InvalidData(
                "iso_threshold must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.adaptivity) {
            return Err(Error::InvalidData(format!(
                "adaptivity must be within [0, 1], got {}",
                self.adaptivity
            )));
        }
        // Resolution and radius are checked by the grid layout
        Ok(())
    }
}

/// Reconstruct a surface from points
///
/// # Arguments
/// * `points` - Filtered, finite points
/// * `voxel_resolution` - Grid nodes along the longest axis
/// * `splat_radius` - Radius within which each point adds density
/// * `iso_threshold` - Density level of the extracted surface
/// * `adaptivity` - Post-extraction simplification strength in `[0, 1]`
///
/// # Returns
/// * `Result<TriangleMesh>` - Welded, outward-wound surface; a `Reconstruction`
///   error when extraction yields no triangles
pub fn reconstruct(
    points: &PointCloud<Point3f>,
    voxel_resolution: usize,
    splat_radius: f32,
    iso_threshold: f32,
    adaptivity: f32,
) -> Result<TriangleMesh> {
    let config = ReconstructionConfig {
        voxel_resolution,
        splat_radius,
        iso_threshold,
        adaptivity,
        ..Default::default()
    };
    reconstruct_with_config(points, &config)
}

pub fn reconstruct_with_config(
    points: &PointCloud<Point3f>,
    config: &ReconstructionConfig,
) -> Result<TriangleMesh> {
    if points.is_empty() {
        return Err(Error::EmptyInput(
            "no points to reconstruct from".to_string(),
        ));
    }
    config.validate()?;

    let density = VolumeGrid::splat(points, config.voxel_resolution, config.splat_radius)?;
    debug!(
        dims = ?density.dimensions(),
        voxel_size = density.voxel_size,
        "density splatted"
    );

    let filled = if config.fill_cavities {
        shell_midpoint_field(&density.values, config.iso_threshold)
    } else {
        None
    };
    let (grid, level) = match filled {
        Some(field) => (density.with_values(field), SHELL_MIDPOINT_LEVEL),
        None => (density, config.iso_threshold),
    };

    let mc = MarchingCubes::new(MarchingCubesConfig {
        iso_level: level,
        ..Default::default()
    });
    let mut mesh = mc.extract_isosurface(&grid);
    if mesh.faces.is_empty() {
        return Err(Error::Reconstruction(format!(
            "no surface at iso_threshold {} ({} points, splat_radius {})",
            config.iso_threshold,
            points.len(),
            config.splat_radius
        )));
    }

    if config.keep_largest_component {
        mesh = keep_largest_component(&mesh);
    }
    if mesh.signed_volume() < 0.0 {
        mesh.flip_faces();
    }
    let mesh = simplify_adaptive(&mesh, config.adaptivity, grid.voxel_size)?;
    if mesh.faces.is_empty() {
        return Err(Error::Reconstruction(
            "simplification removed every triangle".to_string(),
        ));
    }

    info!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "surface reconstructed"
    );
    Ok(mesh)
}
