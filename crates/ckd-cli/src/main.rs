//! CKD staging runner.

use std::io::{self, IsTerminal};

use anyhow::Result;
use chrono::Local;
use clap::{ColorChoice, Parser};
use tracing::level_filters::LevelFilter;

use ckd_cli::logging::{LogConfig, LogFormat, init_logging};
use ckd_cli::pipeline::{RunOptions, RunResult, load_config, run_csv};

mod cli;
mod summary;

use crate::cli::{Cli, LogFormatArg, LogLevelArg};
use crate::summary::print_summary;

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let exit_code = match run_cli(&cli) {
        Ok(result) => {
            print_summary(&result);
            0
        }
        Err(error) => {
            tracing::error!("run failed: {error:#}");
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run_cli(cli: &Cli) -> Result<RunResult> {
    let config = load_config(cli.config.as_deref())?;
    let options = RunOptions::new(cli.year, Local::now().date_naive())
        .with_test(cli.test)
        .with_diagnostics(cli.diag)
        .with_output_dir(&cli.output_dir)
        .with_config(config);
    run_csv(&cli.data_dir, &options)
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let level_filter = match cli.log_level {
        Some(LogLevelArg::Error) => LevelFilter::ERROR,
        Some(LogLevelArg::Warn) => LevelFilter::WARN,
        Some(LogLevelArg::Info) => LevelFilter::INFO,
        Some(LogLevelArg::Debug) => LevelFilter::DEBUG,
        Some(LogLevelArg::Trace) => LevelFilter::TRACE,
        None => cli.verbosity.tracing_level_filter(),
    };
    let format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    let with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    let mut config = LogConfig::default()
        .with_level(level_filter)
        .with_format(format)
        .with_ansi(with_ansi)
        .with_log_file(cli.log_file.clone())
        .with_log_data(cli.log_data);
    // Explicit flags win over RUST_LOG.
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    config
}
