//! Error taxonomy for the scoring core.
//!
//! Errors are values handed back to the caller; the transport layer decides
//! how they are surfaced.

use crate::validation::ValidationErrors;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a `score` call
#[derive(Debug, Error)]
pub enum ScoringError {
    /// The submitted features violate the model schema. Always recoverable.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// Unexpected failure during inference or explanation
    #[error("internal error: {0}")]
    Internal(String),
}

impl ScoringError {
    /// Short machine-readable code for the transport layer
    pub fn code(&self) -> &'static str {
        match self {
            ScoringError::Validation(_) => "validation_error",
            ScoringError::Artifact(_) | ScoringError::Internal(_) => "internal_error",
        }
    }
}

/// Failure to load, train or persist the model artifact set
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The historical dataset required for training does not exist
    #[error("historical dataset not found at {}", .0.display())]
    DatasetMissing(PathBuf),

    #[error("invalid dataset: {0}")]
    Dataset(String),

    #[error("failed to read dataset: {0}")]
    Csv(#[from] csv::Error),

    /// Some, but not all, artifact blobs are present
    #[error("artifact set at {} is incomplete, missing: {}", dir.display(), missing.join(", "))]
    Incomplete { dir: PathBuf, missing: Vec<String> },

    #[error("artifact set is inconsistent: {0}")]
    Inconsistent(String),

    #[error("training failed: {0}")]
    Training(String),

    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
