//! CLI argument definitions for the CKD staging runner.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

use ckd_model::AnalysisYear;

#[derive(Parser)]
#[command(
    name = "ckd-staging",
    version,
    about = "CKD staging from labs and claims - write the lab/claims diagnostics report",
    long_about = "Assign each enrolled member one CKD stage from the most recent eGFR lab\n\
                  and the most recent qualifying diagnosis, reconcile the two sources\n\
                  and write a fixed-width tabulation report for the analysis year."
)]
pub struct Cli {
    /// Analysis year (exactly four digits).
    #[arg(value_name = "YEAR", value_parser = AnalysisYear::parse)]
    pub year: AnalysisYear,

    /// Sampling run: limit the cost claims and write an undated test report.
    #[arg(short = 't', long = "test")]
    pub test: bool,

    /// Add the diagnostics pass (adult frequencies, crosstabs, monthly counts, costs).
    #[arg(short = 'd', long = "diag")]
    pub diag: bool,

    /// Warehouse root holding one CSV extract per table.
    #[arg(long = "data-dir", value_name = "DIR", default_value = "warehouse")]
    pub data_dir: PathBuf,

    /// Output directory for the report.
    #[arg(long = "output-dir", value_name = "DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// JSON file overriding the pipeline configuration.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(long = "log-format", value_enum, default_value = "pretty")]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Allow member identifiers in log output.
    #[arg(long = "log-data")]
    pub log_data: bool,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn parses_year_and_flags() {
        let cli = Cli::try_parse_from(["ckd-staging", "2023", "-t", "--diag"]).unwrap();
        assert_eq!(cli.year.value(), 2023);
        assert!(cli.test);
        assert!(cli.diag);
        assert_eq!(cli.output_dir, PathBuf::from("output"));
        assert!(cli.config.is_none());
    }

    #[test]
    fn invalid_year_is_a_usage_error() {
        let err = Cli::try_parse_from(["ckd-staging", "23"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn missing_year_is_a_usage_error() {
        let err = Cli::try_parse_from(["ckd-staging"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(err.exit_code(), 2);
    }
}
