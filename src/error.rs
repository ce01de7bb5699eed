// Error Types - Failures surfaced by the simulation and sweep pipeline
// Collisions and zero-distance attraction are modeled outcomes, not errors.

use thiserror::Error;

/// Result type for sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Reference trajectory mismatch: expected {expected}, found {found}")]
    ReferenceMismatch { expected: String, found: String },

    #[error("Worker failed on chunk {chunk}: {reason}")]
    WorkerFailed { chunk: usize, reason: String },

    #[error("Worker pool error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl SweepError {
    pub fn invalid(message: impl Into<String>) -> Self {
        SweepError::InvalidConfig(message.into())
    }
}
