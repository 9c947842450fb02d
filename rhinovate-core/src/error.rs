//! Error types for the scan pipeline

use thiserror::Error;

/// Main error type for pipeline operations
///
/// Each stage reports its own variant; the orchestrator records them per file
/// and never lets one propagate across file boundaries.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Load error: {0}")]
    Load(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unrecoverable mesh: {0}")]
    UnrecoverableMesh(String),

    #[error("Reconstruction error: {0}")]
    Reconstruction(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Short, stable name of the error kind, used in batch summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "IoError",
            Error::EmptyInput(_) => "EmptyInputError",
            Error::Load(_) => "LoadError",
            Error::InvalidData(_) => "InvalidDataError",
            Error::UnrecoverableMesh(_) => "UnrecoverableMeshError",
            Error::Reconstruction(_) => "ReconstructionError",
            Error::Export(_) => "ExportError",
            Error::Config(_) => "ConfigError",
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_names() {
        assert_eq!(Error::EmptyInput("x".into()).kind(), "EmptyInputError");
        assert_eq!(Error::Reconstruction("x".into()).kind(), "ReconstructionError");
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(Error::from(io).kind(), "IoError");
    }

    #[test]
    fn test_error_display() {
        let err = Error::UnrecoverableMesh("no vertices survived repair".into());
        assert_eq!(err.to_string(), "Unrecoverable mesh: no vertices survived repair");
    }
}
