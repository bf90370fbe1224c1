//! Tabulation and the text report of a staging run.
//!
//! - [`tabulate`]: frequency and crosstab tables, monthly stage-date counts
//! - [`cost`]: claim preparation and cost per beneficiary year by stage
//! - [`report`]: report assembly for the staging and diagnostics passes
//! - [`writer`]: report file naming and block output

pub mod cost;
pub mod error;
pub mod report;
pub mod table;
pub mod tabulate;
pub mod writer;

pub use cost::{
    CostCategory, CostData, CostFilter, CostTables, FlagFilter, PreparedClaim, cost_by_stage,
    prepare_claims,
};
pub use error::{ReportError, Result};
pub use report::{Report, ReportOptions, ReportSection, build_report};
pub use table::ReportTable;
pub use tabulate::{MemberFilter, frequency, monthly_counts};
pub use writer::{ReportWriter, report_file_name};
