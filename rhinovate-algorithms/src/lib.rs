//! # Rhinovate Algorithms
//!
//! Point set and mesh sanitization for raw depth-sensor scans.
//!
//! This crate provides the noise filter (statistical outlier removal, dominant
//! cluster extraction, centering) and the mesh connectivity repair stage.

pub mod nearest_neighbor;
pub mod filtering;
#[cfg(feature = "clustering")]
pub mod clustering;
pub mod repair;

// Re-export commonly used items
pub use nearest_neighbor::*;
pub use filtering::*;
#[cfg(feature = "clustering")]
pub use clustering::*;
pub use repair::*;
