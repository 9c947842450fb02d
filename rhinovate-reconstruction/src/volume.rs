//! Implicit density volume sampled on a regular grid

use crate::parallel;
use ndarray::{Array2, Array3, Axis};
use rhinovate_core::{Aabb, Bounded, Error, Point3f, PointCloud, Result};

/// Largest accepted node count along the longest grid axis
pub const MAX_VOXEL_RESOLUTION: usize = 512;

/// Smallest useful node count; padding takes two nodes on each side
pub const MIN_VOXEL_RESOLUTION: usize = 4;

/// Compact smooth kernel `(1 - (d/r)^2)^3`, zero at and beyond `radius`
pub fn kernel_weight(distance_sq: f32, radius: f32) -> f32 {
    let r2 = radius * radius;
    if distance_sq >= r2 {
        return 0.0;
    }
    let t = 1.0 - distance_sq / r2;
    t * t * t
}

/// Scalar field sampled on a regular grid of cubic voxels
///
/// Node `(x, y, z)` sits at `origin + voxel_size * (x, y, z)`.
#[derive(Debug, Clone)]
pub struct VolumeGrid {
    pub values: Array3<f32>,
    pub origin: Point3f,
    pub voxel_size: f32,
}

impl VolumeGrid {
    /// Node counts along x, y, z
    pub fn dimensions(&self) -> [usize; 3] {
        let (nx, ny, nz) = self.values.dim();
        [nx, ny, nz]
    }

    /// Convert grid coordinates to world coordinates
    pub fn grid_to_world(&self, x: usize, y: usize, z: usize) -> Point3f {
        Point3f::new(
            self.origin.x + x as f32 * self.voxel_size,
            self.origin.y + y as f32 * self.voxel_size,
            self.origin.z + z as f32 * self.voxel_size,
        )
    }

    /// Same grid geometry with a different field
    pub fn with_values(&self, values: Array3<f32>) -> Self {
        Self {
            values,
            origin: self.origin,
            voxel_size: self.voxel_size,
        }
    }

    /// Lay out a grid around `bounds`
    ///
    /// The longest padded axis gets exactly `voxel_resolution` nodes; the other
    /// axes share the same spacing and are centered on the bounds. Every point
    /// ends up at least `splat_radius` plus one voxel away from the border.
    pub fn layout(bounds: &Aabb, voxel_resolution: usize, splat_radius: f32) -> Result<Self> {
        if !(MIN_VOXEL_RESOLUTION..=MAX_VOXEL_RESOLUTION).contains(&voxel_resolution) {
            return Err(Error::InvalidData(format!(
                "voxel_resolution must be between {} and {}, got {}",
                MIN_VOXEL_RESOLUTION, MAX_VOXEL_RESOLUTION, voxel_resolution
            )));
        }
        if splat_radius <= 0.0 {
            return Err(Error::InvalidData(
                "splat_radius must be positive".to_string(),
            ));
        }

        let extents = bounds.extents();
        let spans = extents.map(|e| e + 2.0 * splat_radius);
        let voxel_size = spans.max() / (voxel_resolution - 3) as f32;

        let center = bounds.center();
        let mut dims = [0usize; 3];
        let mut origin = Point3f::origin();
        for axis in 0..3 {
            // Tolerance keeps the longest axis from gaining a node to rounding
            let cells = (spans[axis] / voxel_size - 1e-4).ceil().max(0.0) as usize;
            dims[axis] = (cells + 3).min(voxel_resolution);
            origin[axis] = center[axis] - (dims[axis] - 1) as f32 * voxel_size * 0.5;
        }

        Ok(Self {
            values: Array3::zeros((dims[0], dims[1], dims[2])),
            origin,
            voxel_size,
        })
    }

    /// Accumulate kernel density from every point
    ///
    /// Each point adds `kernel_weight` to all nodes within `splat_radius`, so
    /// one point contributes at most 1 to any node.
    pub fn splat(
        points: &PointCloud<Point3f>,
        voxel_resolution: usize,
        splat_radius: f32,
    ) -> Result<Self> {
        let bounds = points
            .bounding_box()
            .ok_or_else(|| Error::EmptyInput("no points to splat".to_string()))?;
        let mut grid = Self::layout(&bounds, voxel_resolution, splat_radius)?;
        let [nx, ny, nz] = grid.dimensions();

        let index_range = |coord: f32, origin: f32, n: usize| -> (usize, usize) {
            let lo = ((coord - splat_radius - origin) / grid.voxel_size).ceil().max(0.0) as usize;
            let hi = ((coord + splat_radius - origin) / grid.voxel_size).floor();
            let hi = if hi < 0.0 { 0 } else { (hi as usize).min(n - 1) };
            (lo, hi)
        };

        // Bucket points by the x-slabs they reach
        let mut slab_points: Vec<Vec<usize>> = vec![Vec::new(); nx];
        for (idx, p) in points.iter().enumerate() {
            let (lo, hi) = index_range(p.x, grid.origin.x, nx);
            for slab in slab_points.iter_mut().take(hi + 1).skip(lo) {
                slab.push(idx);
            }
        }

        let origin = grid.origin;
        let voxel = grid.voxel_size;
        let slabs: Vec<Array2<f32>> = parallel::parallel_map_range(nx, |x| {
            let mut slab = Array2::<f32>::zeros((ny, nz));
            let wx = origin.x + x as f32 * voxel;
            for &idx in &slab_points[x] {
                let p = points[idx];
                let dx = wx - p.x;
                let (ylo, yhi) = index_range(p.y, origin.y, ny);
                let (zlo, zhi) = index_range(p.z, origin.z, nz);
                for y in ylo..=yhi {
                    let dy = origin.y + y as f32 * voxel - p.y;
                    for z in zlo..=zhi {
                        let dz = origin.z + z as f32 * voxel - p.z;
                        slab[[y, z]] += kernel_weight(dx * dx + dy * dy + dz * dz, splat_radius);
                    }
                }
            }
            slab
        });

        for (x, slab) in slabs.into_iter().enumerate() {
            grid.values.index_axis_mut(Axis(0), x).assign(&slab);
        }
        Ok(grid)
    }
}
