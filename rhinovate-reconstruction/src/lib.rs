//! # Rhinovate Reconstruction
//!
//! Volumetric surface reconstruction for filtered scans.
//!
//! Points are splatted into a density grid, enclosed cavities are filled,
//! and marching cubes extracts a welded, outward-wound surface which is
//! optionally simplified in flat regions.

pub mod parallel;
pub mod volume;
pub mod cavity;
pub mod marching_cubes;
pub mod components;
pub mod simplify;
pub mod stats;
pub mod reconstruct;

// Re-export commonly used items
pub use parallel::ParallelConfig;
pub use volume::*;
pub use cavity::*;
pub use marching_cubes::*;
pub use components::*;
pub use simplify::*;
pub use stats::*;
pub use reconstruct::*;
