//! Typed pipeline configuration
//!
//! `config.json` at the project root holds three sections: `folders`,
//! `filtering` and `pipeline`. Every key has a default and unknown keys are
//! ignored, so older files with extra entries keep loading.

use rhinovate_algorithms::FilterConfig;
use rhinovate_core::{Aabb, Error, Result, TriangleMesh, Vector3f};
use rhinovate_morph::{Axis, FalloffCurve, MorphConfig};
use rhinovate_reconstruction::ReconstructionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the project root
pub const PROJECT_ROOT_ENV: &str = "RHINOVATE_PROJECT_ROOT";

/// Config file name inside the project root
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Folder names, relative to the project root unless absolute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderSettings {
    pub incoming: PathBuf,
    pub processing: PathBuf,
    pub outgoing: PathBuf,
}

impl Default for FolderSettings {
    fn default() -> Self {
        Self {
            incoming: PathBuf::from("1_Incoming"),
            processing: PathBuf::from("2_Processing"),
            outgoing: PathBuf::from("3_Outgoing"),
        }
    }
}

/// Noise filter options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilteringSettings {
    #[serde(rename = "enable")]
    pub enabled: bool,
    pub k_neighbors: usize,
    pub std_ratio: f32,
    pub keep_largest_cluster: bool,
    pub cluster_eps_multiplier: f32,
    pub min_cluster_samples: usize,
    pub min_points_for_clustering: usize,
}

impl Default for FilteringSettings {
    fn default() -> Self {
        let defaults = FilterConfig::default();
        Self {
            enabled: defaults.enabled,
            k_neighbors: defaults.k_neighbors,
            std_ratio: defaults.std_ratio,
            keep_largest_cluster: defaults.keep_largest_cluster,
            cluster_eps_multiplier: defaults.cluster_eps_multiplier,
            min_cluster_samples: defaults.min_cluster_samples,
            min_points_for_clustering: defaults.min_points_for_clustering,
        }
    }
}

/// Reconstruction and lattice options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSettings {
    /// Rebuild imported meshes through the volume as well
    pub use_voxelization: bool,
    pub voxel_radius: f32,
    pub voxel_amount: usize,
    pub volume_threshold: f32,
    pub volume_adaptivity: f32,
    pub lattice_points: usize,
    pub lattice_padding: f32,
    pub lattice_resize_x: f32,
    pub lattice_resize_y: f32,
    pub lattice_resize_z: f32,
    /// Falloff radius as a fraction of the mesh extent along `lattice_axis`
    pub lattice_brush_factor: f32,
    pub lattice_falloff: FalloffCurve,
    pub lattice_axis: Axis,
}

impl Default for StageSettings {
    fn default() -> Self {
        let volume = ReconstructionConfig::default();
        let morph = MorphConfig::default();
        Self {
            use_voxelization: true,
            voxel_radius: volume.splat_radius,
            voxel_amount: volume.voxel_resolution,
            volume_threshold: volume.iso_threshold,
            volume_adaptivity: volume.adaptivity,
            lattice_points: morph.lattice_resolution,
            lattice_padding: morph.padding_factor,
            lattice_resize_x: morph.axis_scale.x,
            lattice_resize_y: morph.axis_scale.y,
            lattice_resize_z: morph.axis_scale.z,
            lattice_brush_factor: 0.25,
            lattice_falloff: morph.falloff_curve,
            lattice_axis: morph.primary_axis,
        }
    }
}

/// Complete contents of `config.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub folders: FolderSettings,
    pub filtering: FilteringSettings,
    pub pipeline: StageSettings,
}

impl PipelineSettings {
    /// Load and validate a config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let settings = Self::from_json_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), config_message(e))))?;
        debug!(file = %path.display(), "Loaded configuration");
        Ok(settings)
    }

    /// Parse and validate configuration text
    pub fn from_json_str(text: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("invalid JSON: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let f = &self.filtering;
        let p = &self.pipeline;
        check(f.k_neighbors > 0, "filtering.k_neighbors", "must be greater than 0")?;
        check(f.std_ratio > 0.0, "filtering.std_ratio", "must be positive")?;
        check(
            f.cluster_eps_multiplier > 0.0,
            "filtering.cluster_eps_multiplier",
            "must be positive",
        )?;
        check(
            f.min_cluster_samples > 0,
            "filtering.min_cluster_samples",
            "must be greater than 0",
        )?;
        check(p.voxel_radius > 0.0, "pipeline.voxel_radius", "must be positive")?;
        check(p.voxel_amount >= 4, "pipeline.voxel_amount", "must be at least 4")?;
        check(p.volume_threshold > 0.0, "pipeline.volume_threshold", "must be positive")?;
        check(
            (0.0..=1.0).contains(&p.volume_adaptivity),
            "pipeline.volume_adaptivity",
            "must be within [0, 1]",
        )?;
        check(
            p.lattice_points >= 3 && p.lattice_points % 2 == 1,
            "pipeline.lattice_points",
            "must be odd and at least 3",
        )?;
        check(p.lattice_padding > 1.0, "pipeline.lattice_padding", "must be greater than 1")?;
        for (key, value) in [
            ("pipeline.lattice_resize_x", p.lattice_resize_x),
            ("pipeline.lattice_resize_y", p.lattice_resize_y),
            ("pipeline.lattice_resize_z", p.lattice_resize_z),
            ("pipeline.lattice_brush_factor", p.lattice_brush_factor),
        ] {
            check(value > 0.0 && value.is_finite(), key, "must be positive")?;
        }
        Ok(())
    }

    pub fn filter_config(&self) -> FilterConfig {
        let f = &self.filtering;
        FilterConfig {
            enabled: f.enabled,
            k_neighbors: f.k_neighbors,
            std_ratio: f.std_ratio,
            keep_largest_cluster: f.keep_largest_cluster,
            cluster_eps_multiplier: f.cluster_eps_multiplier,
            min_cluster_samples: f.min_cluster_samples,
            min_points_for_clustering: f.min_points_for_clustering,
        }
    }

    pub fn reconstruction_config(&self) -> ReconstructionConfig {
        let p = &self.pipeline;
        ReconstructionConfig {
            voxel_resolution: p.voxel_amount,
            splat_radius: p.voxel_radius,
            iso_threshold: p.volume_threshold,
            adaptivity: p.volume_adaptivity,
            ..Default::default()
        }
    }

    /// Lattice parameters for `mesh`; the falloff radius scales with its size
    pub fn morph_config(&self, mesh: &TriangleMesh) -> MorphConfig {
        let p = &self.pipeline;
        let extent = Aabb::from_points(&mesh.vertices)
            .map(|b| b.extents()[p.lattice_axis.index()])
            .unwrap_or(0.0);
        // A flat mesh along the axis still needs a positive radius
        let falloff_radius = (extent * p.lattice_brush_factor).max(f32::EPSILON);
        MorphConfig {
            lattice_resolution: p.lattice_points,
            padding_factor: p.lattice_padding,
            axis_scale: Vector3f::new(p.lattice_resize_x, p.lattice_resize_y, p.lattice_resize_z),
            falloff_radius,
            falloff_curve: p.lattice_falloff,
            primary_axis: p.lattice_axis,
        }
    }
}

fn check(ok: bool, key: &str, message: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Error::Config(format!("{} {}", key, message)))
    }
}

/// Inner message of a config error, without the variant prefix
fn config_message(error: Error) -> String {
    match error {
        Error::Config(message) => message,
        other => other.to_string(),
    }
}

/// Project root: `explicit` if given, then `$RHINOVATE_PROJECT_ROOT` when it
/// names a directory, then the current directory
pub fn resolve_project_root(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(root) = explicit {
        return Ok(root.to_path_buf());
    }
    if let Some(root) = std::env::var_os(PROJECT_ROOT_ENV).map(PathBuf::from) {
        if root.is_dir() {
            return Ok(root);
        }
        debug!(root = %root.display(), "Ignoring {} that is not a directory", PROJECT_ROOT_ENV);
    }
    Ok(std::env::current_dir()?)
}

/// Resolved folder locations of one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub incoming: PathBuf,
    pub processing: PathBuf,
    pub outgoing: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: &Path, folders: &FolderSettings) -> Self {
        Self {
            root: root.to_path_buf(),
            incoming: root.join(&folders.incoming),
            processing: root.join(&folders.processing),
            outgoing: root.join(&folders.outgoing),
        }
    }

    /// Create any missing folder
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.incoming, &self.processing, &self.outgoing] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
