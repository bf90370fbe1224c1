//! Warehouse backends.
//!
//! A warehouse answers typed queries with DataFrames. Extract tables arrive
//! with every column typed as a string; callers parse the cells they need.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::query::Query;

/// A queryable store of named tables.
pub trait Warehouse {
    /// Human-readable name used in logs and errors.
    fn name(&self) -> String;

    /// Runs `query` and returns the matching rows.
    fn fetch(&mut self, query: &Query) -> Result<DataFrame>;

    /// Releases any resources held by the backend.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A warehouse backed by one CSV extract per table (`<root>/<table>.csv`).
///
/// Tables are loaded on first use and kept until the warehouse is closed.
#[derive(Debug)]
pub struct CsvWarehouse {
    root: PathBuf,
    tables: HashMap<String, DataFrame>,
}

impl CsvWarehouse {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(IngestError::DirectoryNotFound { path: root });
        }
        Ok(Self {
            root,
            tables: HashMap::new(),
        })
    }

    fn table(&mut self, name: &str) -> Result<&DataFrame> {
        if !self.tables.contains_key(name) {
            let path = self.root.join(format!("{name}.csv"));
            if !path.is_file() {
                return Err(IngestError::TableNotFound {
                    table: name.to_string(),
                    warehouse: self.name(),
                });
            }
            let df = read_extract(&path)?;
            debug!(
                table = name,
                rows = df.height(),
                columns = df.width(),
                "loaded extract"
            );
            self.tables.insert(name.to_string(), df);
        }
        self.tables
            .get(name)
            .ok_or_else(|| IngestError::TableNotFound {
                table: name.to_string(),
                warehouse: self.name(),
            })
    }
}

impl Warehouse for CsvWarehouse {
    fn name(&self) -> String {
        format!("csv:{}", self.root.display())
    }

    fn fetch(&mut self, query: &Query) -> Result<DataFrame> {
        let df = self.table(query.table().as_str())?;
        query.apply(df)
    }

    fn close(&mut self) -> Result<()> {
        self.tables.clear();
        Ok(())
    }
}

/// Reads a CSV extract with every column as a string.
fn read_extract(path: &Path) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .finish()
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// A warehouse over DataFrames registered in memory.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    tables: HashMap<String, DataFrame>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `df` under `table`, replacing any previous table of that name.
    pub fn insert(&mut self, table: &str, df: DataFrame) {
        self.tables.insert(table.to_string(), df);
    }

    #[must_use]
    pub fn with_table(mut self, table: &str, df: DataFrame) -> Self {
        self.insert(table, df);
        self
    }
}

impl Warehouse for MemoryWarehouse {
    fn name(&self) -> String {
        "memory".to_string()
    }

    fn fetch(&mut self, query: &Query) -> Result<DataFrame> {
        let table = query.table().as_str();
        let df = self
            .tables
            .get(table)
            .ok_or_else(|| IngestError::TableNotFound {
                table: table.to_string(),
                warehouse: self.name(),
            })?;
        query.apply(df)
    }
}
