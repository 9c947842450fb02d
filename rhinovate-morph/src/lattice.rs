//! Control lattice around a mesh
//!
//! The cage is a regular `n x n x n` grid centered on the mesh bounds. Control
//! points never move in place; each stores a displacement, and a vertex is
//! moved by the trilinear blend of the displacements at its cell corners.

use crate::falloff::FalloffCurve;
use rhinovate_core::{Aabb, Error, Point3f, Result, Vector3f};
use serde::{Deserialize, Serialize};

/// Edge length used when the mesh has no extent at all
const MIN_CAGE_SIZE: f32 = 1e-3;

/// Coordinate axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[default]
    X,
    Y,
    Z,
}

impl Axis {
    /// Component index of the axis
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Regular control grid with per-point selection and displacement
#[derive(Debug, Clone)]
pub struct LatticeCage {
    resolution: usize,
    center: Point3f,
    size: Vector3f,
    positions: Vec<Point3f>,
    selected: Vec<bool>,
    displacements: Vec<Vector3f>,
}

impl LatticeCage {
    /// Build a cage of `resolution` points per axis around `bounds`
    ///
    /// The cage spans `extents * padding_factor`. A flat axis borrows the
    /// padded size of the largest axis so every cell keeps a positive volume.
    pub fn new(bounds: &Aabb, resolution: usize, padding_factor: f32) -> Result<Self> {
        if resolution < 3 || resolution % 2 == 0 {
            return Err(Error::InvalidData(format!(
                "lattice resolution must be odd and at least 3, got {}",
                resolution
            )));
        }
        if !padding_factor.is_finite() || padding_factor <= 1.0 {
            return Err(Error::InvalidData(format!(
                "padding factor must be greater than 1, got {}",
                padding_factor
            )));
        }

        let extents = bounds.extents();
        let largest = extents.max();
        let fallback = if largest > 0.0 {
            largest * padding_factor
        } else {
            MIN_CAGE_SIZE
        };
        let size = extents.map(|e| if e > 0.0 { e * padding_factor } else { fallback });
        let center = bounds.center();
        let min = center - size * 0.5;
        let step = size / (resolution - 1) as f32;

        let count = resolution * resolution * resolution;
        let mut positions = Vec::with_capacity(count);
        for i in 0..resolution {
            for j in 0..resolution {
                for k in 0..resolution {
                    positions.push(Point3f::new(
                        min.x + i as f32 * step.x,
                        min.y + j as f32 * step.y,
                        min.z + k as f32 * step.z,
                    ));
                }
            }
        }

        Ok(Self {
            resolution,
            center,
            size,
            positions,
            selected: vec![false; count],
            displacements: vec![Vector3f::zeros(); count],
        })
    }

    /// Control points per axis
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn center(&self) -> Point3f {
        self.center
    }

    /// Edge lengths of the cage
    pub fn size(&self) -> Vector3f {
        self.size
    }

    /// Distance from the center to a cage corner
    pub fn half_extent(&self) -> f32 {
        self.size.norm() * 0.5
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Flat index of control point `(i, j, k)`
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.resolution + j) * self.resolution + k
    }

    pub fn position(&self, index: usize) -> Point3f {
        self.positions[index]
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected[index]
    }

    pub fn displacement(&self, index: usize) -> Vector3f {
        self.displacements[index]
    }

    pub fn selected_count(&self) -> usize {
        self.selected.iter().filter(|&&s| s).count()
    }

    /// Select every control point whose index along `axis` lies in the
    /// middle third of the resolution
    ///
    /// Returns the number of selected points.
    pub fn select_middle_third(&mut self, axis: Axis) -> usize {
        let n = self.resolution;
        let last = n - 1;
        let a = axis.index();
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    let along = [i, j, k][a];
                    let index = self.index(i, j, k);
                    self.selected[index] = 3 * along >= last && 3 * along <= 2 * last;
                }
            }
        }
        self.selected_count()
    }

    /// Scale the selected points about the cage center
    ///
    /// Each unselected point within `falloff_radius` of a selected point takes
    /// the displacement of the nearest selected point, attenuated by `curve`.
    /// Returns the number of unselected points that received a displacement.
    pub fn apply_scale(
        &mut self,
        scale: &Vector3f,
        falloff_radius: f32,
        curve: FalloffCurve,
    ) -> usize {
        let factor = scale - Vector3f::repeat(1.0);
        let sources: Vec<usize> = (0..self.len()).filter(|&i| self.selected[i]).collect();
        for &s in &sources {
            self.displacements[s] = (self.positions[s] - self.center).component_mul(&factor);
        }

        let mut influenced = 0;
        for index in 0..self.len() {
            if self.selected[index] {
                continue;
            }
            let nearest = sources
                .iter()
                .map(|&s| (s, (self.positions[s] - self.positions[index]).norm_squared()))
                .min_by(|a, b| a.1.total_cmp(&b.1));
            let Some((source, dist_sq)) = nearest else {
                break;
            };
            let weight = curve.weight(dist_sq.sqrt(), falloff_radius);
            let displacement = self.displacements[source] * weight;
            if weight > 0.0 && displacement != Vector3f::zeros() {
                self.displacements[index] = displacement;
                influenced += 1;
            }
        }
        influenced
    }

    /// Position of `point` after the cage deformation
    ///
    /// Points outside the cage, or in a cell whose eight corners carry no
    /// displacement, are returned exactly as given.
    pub fn deform_point(&self, point: &Point3f) -> Point3f {
        let n = self.resolution;
        let cells = (n - 1) as f32;
        let min = self.center - self.size * 0.5;

        let mut cell = [0usize; 3];
        let mut t = [0.0f32; 3];
        for a in 0..3 {
            let u = (point[a] - min[a]) / self.size[a] * cells;
            if !(0.0..=cells).contains(&u) {
                return *point;
            }
            let c = (u.floor() as usize).min(n - 2);
            cell[a] = c;
            t[a] = u - c as f32;
        }

        let mut offset = Vector3f::zeros();
        let mut moved = false;
        for corner in 0..8 {
            let d = [(corner >> 2) & 1, (corner >> 1) & 1, corner & 1];
            let displacement =
                self.displacements[self.index(cell[0] + d[0], cell[1] + d[1], cell[2] + d[2])];
            if displacement == Vector3f::zeros() {
                continue;
            }
            moved = true;
            let weight: f32 = (0..3)
                .map(|a| if d[a] == 1 { t[a] } else { 1.0 - t[a] })
                .product();
            offset += displacement * weight;
        }

        if moved {
            point + offset
        } else {
            *point
        }
    }
}
