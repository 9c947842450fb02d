//! # Rhinovate Morph
//!
//! Lattice free-form deformation. A control cage is placed around the mesh,
//! a band of control points through the middle of one axis is scaled about
//! the cage center, and every vertex follows the cage by trilinear
//! interpolation.

pub mod falloff;
pub mod lattice;
pub mod deform;

pub use falloff::*;
pub use lattice::*;
pub use deform::*;
