//! Error types for the trajdb query engine

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Malformed record in {path}:{line}: {reason}")]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Data corruption: {0}")]
    Corruption(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown similarity measure: {0} (expected DTW, Frechet or Hausdorff)")]
    UnknownMeasure(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl EngineError {
    /// Shorthand for a line-level parse failure in a snapshot file.
    pub fn malformed(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        EngineError::MalformedRecord {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Startup/data-integrity failures. The engine refuses to serve after one of these.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Io(_)
                | EngineError::Serialization(_)
                | EngineError::FileNotFound(_)
                | EngineError::MalformedRecord { .. }
                | EngineError::Corruption(_)
                | EngineError::InvalidConfig(_)
                | EngineError::UnknownMeasure(_)
        )
    }
}

impl From<bincode::Error> for EngineError {
    fn from(err: bincode::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(EngineError::FileNotFound(PathBuf::from("meta")).is_fatal());
        assert!(EngineError::UnknownMeasure("LCSS".into()).is_fatal());
        assert!(EngineError::malformed("traj.txt", 3, "bad id").is_fatal());
        assert!(!EngineError::InvalidArgument("k".into()).is_fatal());
        assert!(!EngineError::Query("wrong handler".into()).is_fatal());
    }

    #[test]
    fn test_malformed_message() {
        let err = EngineError::malformed("edges.txt", 7, "missing latitude list");
        assert_eq!(
            err.to_string(),
            "Malformed record in edges.txt:7: missing latitude list"
        );
    }
}
