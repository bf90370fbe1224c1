//! CLI library components for the CKD staging runner.

pub mod logging;
pub mod pipeline;

pub use pipeline::{RunOptions, RunResult, load_config, run, run_csv};
