//! Error types for warehouse access.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while querying the warehouse.
#[derive(Debug, Error)]
pub enum IngestError {
    // === Query Errors ===
    /// Table names are identifiers only; anything else is rejected.
    #[error("invalid table name '{name}'")]
    InvalidTableName { name: String },

    /// The warehouse has no such table.
    #[error("table '{table}' not found in warehouse {warehouse}")]
    TableNotFound { table: String, warehouse: String },

    /// A query referenced a column the table does not carry.
    #[error("column '{column}' not found in table '{table}'")]
    MissingColumn { column: String, table: String },

    /// The session was used after it was closed.
    #[error("warehouse session is closed")]
    SessionClosed,

    // === File System Errors ===
    /// Warehouse root directory not found.
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Failed to parse CSV with Polars.
    #[error("failed to parse CSV {path}: {message}")]
    CsvParse { path: PathBuf, message: String },

    // === DataFrame Errors ===
    /// Failed DataFrame operation.
    #[error("DataFrame operation failed: {message}")]
    DataFrame { message: String },
}

impl From<polars::prelude::PolarsError> for IngestError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::DataFrame {
            message: err.to_string(),
        }
    }
}

/// Result type for warehouse operations.
pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IngestError::TableNotFound {
            table: "lab_results".to_string(),
            warehouse: "csv:/data".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "table 'lab_results' not found in warehouse csv:/data"
        );
    }

    #[test]
    fn test_error_from_polars() {
        let polars_err = polars::prelude::PolarsError::ColumnNotFound("test".into());
        let ingest_err: IngestError = polars_err.into();
        assert!(matches!(ingest_err, IngestError::DataFrame { .. }));
    }
}
