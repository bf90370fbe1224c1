//! Error types for tabulation and report writing.

use std::path::PathBuf;
use thiserror::Error;

use ckd_ingest::IngestError;

/// Errors that can occur while tabulating or writing the report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Warehouse query failed.
    #[error("warehouse error: {0}")]
    Ingest(#[from] IngestError),

    /// The member table lacks a column a table needs.
    #[error("column '{column}' not found in the member table")]
    MissingColumn { column: String },

    /// Report file could not be created or written.
    #[error("failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed DataFrame operation.
    #[error("DataFrame operation failed: {message}")]
    DataFrame { message: String },
}

impl From<polars::prelude::PolarsError> for ReportError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::DataFrame {
            message: err.to_string(),
        }
    }
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;
