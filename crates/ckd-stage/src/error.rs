//! Error types for staging.

use thiserror::Error;

use ckd_ingest::IngestError;
use ckd_model::ModelError;

/// Errors that can occur while staging members.
#[derive(Debug, Error)]
pub enum StageError {
    /// Warehouse query failed.
    #[error("warehouse error: {0}")]
    Ingest(#[from] IngestError),

    /// Invalid domain value.
    #[error("{0}")]
    Model(#[from] ModelError),

    /// Stage 3 disambiguation must relabel members, never add or drop them.
    #[error("stage 3 disambiguation changed the member count from {before} to {after}")]
    DisambiguationRowCount { before: usize, after: usize },

    /// Failed DataFrame operation.
    #[error("DataFrame operation failed: {message}")]
    DataFrame { message: String },
}

impl From<polars::prelude::PolarsError> for StageError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::DataFrame {
            message: err.to_string(),
        }
    }
}

/// Result type for staging operations.
pub type Result<T> = std::result::Result<T, StageError>;
