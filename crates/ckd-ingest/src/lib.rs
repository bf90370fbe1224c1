//! Warehouse access for the CKD staging pipeline.
//!
//! The pipeline reads its inputs through a [`Warehouse`]: a store of named
//! tables answering typed [`Query`] values with Polars DataFrames.
//!
//! # Features
//!
//! - **Typed queries**: validated table names, bound parameters, no string splicing
//! - **CSV warehouse**: one extract per table under a root directory
//! - **Memory warehouse**: registered DataFrames, used by tests and embedders
//! - **Session**: owns the warehouse for one run and logs every query
//!
//! # Example
//!
//! ```ignore
//! use ckd_ingest::{CsvWarehouse, Query, Session, TableRef};
//!
//! let mut session = Session::open(Box::new(CsvWarehouse::open("warehouse")?));
//! let labs = session.fetch(
//!     &Query::new(TableRef::new("lab_results")?)
//!         .eq("requestcpt", "33914-3")
//!         .year_in("date_servicebegin", &[2022, 2023]),
//! )?;
//! session.close()?;
//! ```

mod error;
mod query;
mod session;
mod warehouse;

// === Error Types ===
pub use error::{IngestError, Result};

// === Queries ===
pub use query::{Param, Predicate, Query, TableRef};

// === Warehouses ===
pub use session::Session;
pub use warehouse::{CsvWarehouse, MemoryWarehouse, Warehouse};
