//! Core data structures and traits for the Rhinovate scan pipeline
//!
//! This crate provides the value types every stage passes along: point sets,
//! triangle meshes, axis-aligned bounds, and the shared error taxonomy.

pub mod point;
pub mod point_cloud;
pub mod mesh;
pub mod bounds;
pub mod traits;
pub mod error;

pub use point::*;
pub use point_cloud::*;
pub use mesh::*;
pub use bounds::*;
pub use traits::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3};

// Type aliases for easier imports
pub type Point = Point3f;
pub type Mesh = TriangleMesh;
pub type PointSet = PointCloud<Point3f>;
