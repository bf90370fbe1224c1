//! Shared utilities for the CKD staging crates.
//!
//! Polars `AnyValue` conversions, column accessors and the small parsing
//! helpers every extractor needs (numbers, ISO dates, 0/1 flags), plus the
//! redaction switch for row-level log values.
//!
//! # Example
//!
//! ```
//! use ckd_common::{REDACTED_VALUE, parse_flag, redact_value};
//!
//! assert!(parse_flag("1.0"));
//! assert_eq!(redact_value("M1"), REDACTED_VALUE);
//! ```

pub mod frame;
pub mod redact;
pub mod values;

pub use frame::{any_to_i64, any_to_string, column_value_string, column_values, format_numeric};
pub use redact::{REDACTED_VALUE, log_data_enabled, redact_value, set_log_data};
pub use values::{month_key, parse_date, parse_f64, parse_flag, parse_i64};
