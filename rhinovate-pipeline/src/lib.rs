//! # Rhinovate Pipeline
//!
//! Batch orchestration for the scan pipeline. Raw scans in the incoming
//! folder are sanitized, reconstructed, morphed and exported as binary glTF,
//! with a plain OBJ hand-off left in the processing folder.
//!
//! ```rust,no_run
//! use rhinovate_pipeline::{run, PipelineConfig, PipelineSettings};
//! use std::path::{Path, PathBuf};
//!
//! fn main() -> rhinovate_core::Result<()> {
//!     let config = PipelineConfig::new(PipelineSettings::default(), Path::new("project"));
//!     let result = run(&[PathBuf::from("project/1_Incoming/face.ply")], &config)?;
//!     print!("{}", result);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod queue;
pub mod orchestrator;

pub use config::*;
pub use queue::*;
pub use orchestrator::*;
