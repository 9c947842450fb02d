//! Per-file stage sequencing and batch runs
//!
//! Each file runs load, filter and reconstruct (or repair), hand-off OBJ,
//! deform, then GLB export. Stages of one file are strictly sequential.
//! Files are independent; a failure is recorded against its file and the
//! batch carries on.

use crate::config::{PipelineSettings, ProjectLayout};
use crate::queue::WorkQueue;
use rayon::prelude::*;
use rhinovate_algorithms::{filter, repair};
use rhinovate_core::{Error, Point3f, PointCloud, Result, TriangleMesh};
use rhinovate_io::{write_glb, write_obj, ScanFormat, ScanGeometry};
use rhinovate_morph::{deform_with_report, DeformReport};
use rhinovate_reconstruction::reconstruct_with_config;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, warn};

/// Everything a batch run needs
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub settings: PipelineSettings,
    pub layout: ProjectLayout,
    /// Worker threads for a batch; 0 uses the global rayon pool, 1 runs
    /// files one after another
    pub jobs: usize,
}

impl PipelineConfig {
    pub fn new(settings: PipelineSettings, root: &Path) -> Self {
        let layout = ProjectLayout::new(root, &settings.folders);
        Self {
            settings,
            layout,
            jobs: 1,
        }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }
}

/// Artifacts of one successfully processed file
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedScan {
    pub input: PathBuf,
    pub intermediate: PathBuf,
    pub output: PathBuf,
    pub vertices: usize,
    pub faces: usize,
    pub deform: DeformReport,
}

/// A file whose pipeline failed
#[derive(Debug)]
pub struct FileFailure {
    pub input: PathBuf,
    pub error: Error,
}

/// Outcome of a batch
#[derive(Debug, Default)]
pub struct PipelineResult {
    pub processed: Vec<ProcessedScan>,
    pub failures: Vec<FileFailure>,
    /// Files not started because the run was cancelled or another worker
    /// claimed them
    pub skipped: Vec<PathBuf>,
}

impl PipelineResult {
    /// True when no file failed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.processed.len() + self.failures.len() + self.skipped.len()
    }

    /// Fold another batch into this one
    pub fn merge(&mut self, other: PipelineResult) {
        self.processed.extend(other.processed);
        self.failures.extend(other.failures);
        self.skipped.extend(other.skipped);
    }
}

impl fmt::Display for PipelineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} processed, {} failed, {} skipped",
            self.processed.len(),
            self.failures.len(),
            self.skipped.len()
        )?;
        for scan in &self.processed {
            writeln!(
                f,
                "  [OK]   {} -> {} ({} vertices, {} faces)",
                scan.input.display(),
                scan.output.display(),
                scan.vertices,
                scan.faces
            )?;
        }
        for failure in &self.failures {
            writeln!(
                f,
                "  [FAIL] {}: {} ({})",
                failure.input.display(),
                failure.error,
                failure.error.kind()
            )?;
        }
        Ok(())
    }
}

enum FileOutcome {
    Processed(ProcessedScan),
    Failed(FileFailure),
    Skipped(PathBuf),
}

/// Batch runner with a shared cancellation flag
pub struct Pipeline {
    config: PipelineConfig,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Flag that, once set, stops the run before its next file
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Run the given files
    pub fn run(&self, files: &[PathBuf]) -> Result<PipelineResult> {
        self.config.layout.ensure()?;
        self.run_each(files, |path, stem| {
            Some(stem.and_then(|stem| self.process_source(path, path, &stem)))
        })
    }

    /// Claim and run every pending scan of the incoming folder once
    pub fn run_queue(&self, queue: &WorkQueue) -> Result<PipelineResult> {
        self.config.layout.ensure()?;
        let pending = queue.pending()?;
        info!(pending = pending.len(), folder = %queue.incoming().display(), "Scanning incoming folder");
        self.run_each(&pending, |path, stem| {
            let claim = match queue.claim(path) {
                Ok(Some(claim)) => claim,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };
            let result =
                stem.and_then(|stem| self.process_source(&claim.claimed, &claim.original, &stem));
            match queue.finish(&claim, result.is_ok()) {
                Ok(marked) => info!(file = %marked.display(), "Marked scan"),
                Err(e) => warn!(file = %claim.claimed.display(), error = %e, "Could not mark scan"),
            }
            Some(result)
        })
    }

    /// Poll the incoming folder every `interval` until cancelled or
    /// `max_cycles` polls have completed. A poll that fails as a whole is
    /// logged and retried on the next interval
    pub fn watch(
        &self,
        queue: &WorkQueue,
        interval: Duration,
        max_cycles: Option<usize>,
    ) -> Result<PipelineResult> {
        let mut total = PipelineResult::default();
        let mut cycle = 0;
        while !self.is_cancelled() {
            match self.run_queue(queue) {
                Ok(result) => total.merge(result),
                Err(e) => warn!(
                    folder = %queue.incoming().display(),
                    kind = e.kind(),
                    error = %e,
                    "Polling cycle failed"
                ),
            }
            cycle += 1;
            if max_cycles.is_some_and(|max| cycle >= max) {
                break;
            }
            std::thread::sleep(interval);
        }
        Ok(total)
    }

    fn run_each<F>(&self, files: &[PathBuf], job: F) -> Result<PipelineResult>
    where
        F: Fn(&Path, Result<String>) -> Option<Result<ProcessedScan>> + Sync,
    {
        let stems = output_stems(files);
        let outcome = |(path, stem): (&PathBuf, Result<String>)| {
            if self.is_cancelled() {
                return FileOutcome::Skipped(path.clone());
            }
            match job(path, stem) {
                None => FileOutcome::Skipped(path.clone()),
                Some(Ok(scan)) => FileOutcome::Processed(scan),
                Some(Err(error)) => {
                    error!(file = %path.display(), kind = error.kind(), "{}", error);
                    FileOutcome::Failed(FileFailure {
                        input: path.clone(),
                        error,
                    })
                }
            }
        };

        let outcomes: Vec<FileOutcome> = match self.config.jobs {
            1 => files.iter().zip(stems).map(outcome).collect(),
            0 => files.par_iter().zip(stems).map(outcome).collect(),
            jobs => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .build()
                    .map_err(|e| Error::Config(format!("cannot start {} workers: {}", jobs, e)))?;
                pool.install(|| files.par_iter().zip(stems).map(outcome).collect())
            }
        };

        let mut result = PipelineResult::default();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Processed(scan) => result.processed.push(scan),
                FileOutcome::Failed(failure) => result.failures.push(failure),
                FileOutcome::Skipped(path) => result.skipped.push(path),
            }
        }
        Ok(result)
    }

    /// Run every stage for one file
    pub fn process_file(&self, path: &Path) -> Result<ProcessedScan> {
        let stem = output_stem(path)?;
        self.process_source(path, path, &stem)
    }

    /// Run every stage reading `source`; `name` supplies the format, `stem`
    /// the output file names
    fn process_source(&self, source: &Path, name: &Path, stem: &str) -> Result<ProcessedScan> {
        let span = info_span!("scan", file = %name.display());
        let _enter = span.enter();

        let layout = &self.config.layout;
        let intermediate = layout.processing.join(format!("{}.obj", stem));
        let output = layout.outgoing.join(format!("{}_healed.glb", stem));

        let scan = self.run_stages(source, name, &intermediate, &output)?;
        info!(
            output = %scan.output.display(),
            vertices = scan.vertices,
            faces = scan.faces,
            "Scan healed"
        );
        Ok(scan)
    }

    fn run_stages(
        &self,
        source: &Path,
        name: &Path,
        intermediate: &Path,
        output: &Path,
    ) -> Result<ProcessedScan> {
        let format = ScanFormat::from_path(name)
            .ok_or_else(|| Error::Load(format!("unsupported scan format: {}", name.display())))?;
        let scan = format.read(source)?;
        info!(
            vertices = scan.points.len(),
            faces = scan.faces.len(),
            colors = scan.colors.is_some(),
            "Scan loaded"
        );

        let mesh = self.sanitize(scan.into_geometry())?;
        write_obj(&mesh, intermediate)?;

        // Writes are atomic, so the hand-off is the only artifact a later
        // stage can leave behind
        let (deformed, report) = match self.export(&mesh, output) {
            Ok(exported) => exported,
            Err(e) => {
                let _ = std::fs::remove_file(intermediate);
                return Err(e);
            }
        };

        Ok(ProcessedScan {
            input: name.to_path_buf(),
            intermediate: intermediate.to_path_buf(),
            output: output.to_path_buf(),
            vertices: deformed.vertex_count(),
            faces: deformed.face_count(),
            deform: report,
        })
    }

    fn export(&self, mesh: &TriangleMesh, output: &Path) -> Result<(TriangleMesh, DeformReport)> {
        let morph = self.config.settings.morph_config(mesh);
        let (mut deformed, report) = deform_with_report(mesh, &morph)?;
        deformed.compute_vertex_normals();
        write_glb(&deformed, output)?;
        Ok((deformed, report))
    }

    /// Filter, reconstruct and repair until a clean, centered mesh remains
    fn sanitize(&self, geometry: ScanGeometry) -> Result<TriangleMesh> {
        let settings = &self.config.settings;
        match geometry {
            ScanGeometry::Points(points) => self.rebuild(&points),
            ScanGeometry::Mesh(mesh) => {
                let repaired = repair(&mesh)?;
                if settings.pipeline.use_voxelization {
                    self.rebuild(&PointCloud::from_points(repaired.vertices))
                } else {
                    Ok(centered(&repaired))
                }
            }
        }
    }

    fn rebuild(&self, points: &PointCloud<Point3f>) -> Result<TriangleMesh> {
        let settings = &self.config.settings;
        let filtered = filter(points, &settings.filter_config())?;
        let surface = reconstruct_with_config(&filtered, &settings.reconstruction_config())?;
        repair(&surface)
    }
}

fn output_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_owned)
        .ok_or_else(|| Error::Load(format!("{} has no usable file name", path.display())))
}

/// Output stem of every file in a batch; a stem already taken by an earlier
/// file (ignoring case) is an error for the later one
fn output_stems(files: &[PathBuf]) -> Vec<Result<String>> {
    let mut owners: HashMap<String, &Path> = HashMap::new();
    files
        .iter()
        .map(|path| {
            let stem = output_stem(path)?;
            match owners.entry(stem.to_lowercase()) {
                Entry::Occupied(owner) => Err(Error::InvalidData(format!(
                    "{} has the same output name as {}",
                    path.display(),
                    owner.get().display()
                ))),
                Entry::Vacant(slot) => {
                    slot.insert(path.as_path());
                    Ok(stem)
                }
            }
        })
        .collect()
}

/// Move a mesh so its vertex centroid sits at the origin
fn centered(mesh: &TriangleMesh) -> TriangleMesh {
    let cloud = PointCloud::from_points(mesh.vertices.clone());
    match cloud.centroid() {
        Some(c) => mesh.translated(&-c.coords),
        None => mesh.clone(),
    }
}

/// Run `input_files` through the pipeline with a fresh runner
pub fn run(input_files: &[PathBuf], config: &PipelineConfig) -> Result<PipelineResult> {
    Pipeline::new(config.clone()).run(input_files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "rhinovate_orchestrator_{}_{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_centered_moves_centroid_to_origin() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(10.0, 0.0, 0.0),
                Point3f::new(12.0, 0.0, 0.0),
                Point3f::new(11.0, 3.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let moved = centered(&mesh);
        assert!((moved.vertices[2] - Point3f::new(0.0, 2.0, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn test_cancelled_run_skips_every_file() {
        let root = scratch("cancel");
        let pipeline = Pipeline::new(PipelineConfig::new(PipelineSettings::default(), &root));
        pipeline.cancel_handle().store(true, Ordering::Relaxed);

        let files = vec![root.join("a.ply"), root.join("b.ply")];
        let result = pipeline.run(&files).unwrap();
        assert_eq!(result.skipped, files);
        assert!(result.is_success());
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn test_shared_stems_are_rejected_after_the_first() {
        let files = vec![
            PathBuf::from("in/x.ply"),
            PathBuf::from("in/X.obj"),
            PathBuf::from("other/x.ply"),
            PathBuf::from("in/y.ply"),
        ];
        let stems = output_stems(&files);
        assert_eq!(stems[0].as_deref().unwrap(), "x");
        assert!(matches!(stems[1], Err(Error::InvalidData(_))));
        assert!(matches!(stems[2], Err(Error::InvalidData(_))));
        assert_eq!(stems[3].as_deref().unwrap(), "y");
    }

    #[test]
    fn test_unknown_extension_fails_only_that_file() {
        let root = scratch("extension");
        let config = PipelineConfig::new(PipelineSettings::default(), &root);
        let result = run(&[root.join("scan.stl")], &config).unwrap();
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].error.kind(), "LoadError");
        assert!(result.to_string().contains("[FAIL]"));
        let _ = std::fs::remove_dir_all(root);
    }
}
