//! Point set container

use crate::error::{Error, Result};
use crate::point::*;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// A generic point cloud container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloud<T> {
    pub points: Vec<T>,
}

/// A point cloud with 3D points
pub type PointCloud3f = PointCloud<Point3f>;

impl<T> PointCloud<T> {
    /// Create a new empty point cloud
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Create a new point cloud with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Create a point cloud from a vector of points
    pub fn from_points(points: Vec<T>) -> Self {
        Self { points }
    }

    /// Get the number of points in the cloud
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Add a point to the cloud
    pub fn push(&mut self, point: T) {
        self.points.push(point);
    }

    /// Get an iterator over the points
    pub fn iter(&self) -> std::slice::Iter<T> {
        self.points.iter()
    }
}

impl<T> Default for PointCloud<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for PointCloud<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl<T> IndexMut<usize> for PointCloud<T> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.points[index]
    }
}

impl<T> IntoIterator for PointCloud<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a PointCloud<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl<T> FromIterator<T> for PointCloud<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            points: Vec::from_iter(iter),
        }
    }
}

impl PointCloud<Point3f> {
    /// Create a point cloud, rejecting NaN or infinite coordinates
    ///
    /// This is the ingestion gate: every stage downstream assumes finite input.
    pub fn from_points_checked(points: Vec<Point3f>) -> Result<Self> {
        if let Some(index) = points.iter().position(|p| !is_finite_point(p)) {
            return Err(Error::InvalidData(format!(
                "point {} has a non-finite coordinate",
                index
            )));
        }
        Ok(Self { points })
    }

    /// Arithmetic mean of all points, `None` for an empty cloud
    pub fn centroid(&self) -> Option<Point3f> {
        if self.points.is_empty() {
            return None;
        }
        // Accumulate in f64; scans far from the origin lose precision in f32 sums
        let sum = self
            .points
            .iter()
            .fold(Vector3d::zeros(), |acc, p| acc + p.coords.cast::<f64>());
        Some(Point3f::from((sum / self.points.len() as f64).cast::<f32>()))
    }

    /// Return a copy of the cloud moved by `offset`
    pub fn translated(&self, offset: &Vector3f) -> Self {
        self.points.iter().map(|p| p + offset).collect()
    }

    /// Return a copy of the cloud with its centroid moved to the origin
    pub fn centered(&self) -> Self {
        match self.centroid() {
            Some(c) => self.translated(&-c.coords),
            None => Self::new(),
        }
    }
}
