//! Run orchestration: open the warehouse, stage members, build and write
//! the report, close the warehouse.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, info_span};

use ckd_ingest::{CsvWarehouse, Session, Warehouse};
use ckd_model::{AnalysisYear, PipelineConfig};
use ckd_report::{ReportOptions, build_report, report_file_name};
use ckd_stage::{StagingSummary, stage_members};

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub year: AnalysisYear,
    /// Sampling mode: limited cost claims and an undated report name.
    pub test: bool,
    pub diagnostics: bool,
    pub output_dir: PathBuf,
    pub config: PipelineConfig,
    /// Date embedded in production report names.
    pub run_date: NaiveDate,
}

impl RunOptions {
    pub fn new(year: AnalysisYear, run_date: NaiveDate) -> Self {
        Self {
            year,
            test: false,
            diagnostics: false,
            output_dir: PathBuf::from("output"),
            config: PipelineConfig::default(),
            run_date,
        }
    }

    #[must_use]
    pub fn with_test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: bool) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub year: AnalysisYear,
    pub test: bool,
    pub diagnostics: bool,
    pub summary: StagingSummary,
    pub report_path: PathBuf,
    pub tables: usize,
}

/// Loads the pipeline configuration, overriding defaults from a JSON file.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse config {}", path.display()))
}

/// Runs the pipeline over the CSV warehouse at `data_dir`.
pub fn run_csv(data_dir: &Path, options: &RunOptions) -> Result<RunResult> {
    let warehouse = CsvWarehouse::open(data_dir)
        .with_context(|| format!("open warehouse {}", data_dir.display()))?;
    run(Box::new(warehouse), options)
}

/// Runs the pipeline over `warehouse`. The session is closed on success and
/// on failure.
pub fn run(warehouse: Box<dyn Warehouse>, options: &RunOptions) -> Result<RunResult> {
    let span = info_span!(
        "run",
        year = %options.year,
        test = options.test,
        diagnostics = options.diagnostics
    );
    let _guard = span.enter();
    let start = Instant::now();

    let mut session = Session::open(warehouse);
    let outcome = run_session(&mut session, options);
    let closed = session.close().context("close warehouse session");
    let result = outcome?;
    closed?;

    info!(
        report = %result.report_path.display(),
        tables = result.tables,
        duration_ms = start.elapsed().as_millis(),
        "run complete"
    );
    Ok(result)
}

fn run_session(session: &mut Session, options: &RunOptions) -> Result<RunResult> {
    let run = stage_members(session, options.year, &options.config).context("stage members")?;

    let report_options = ReportOptions::new(options.year)
        .with_diagnostics(options.diagnostics)
        .with_adult_age(options.config.adult_age)
        .with_sample_rows(options.test.then_some(options.config.sample_rows));
    let report = build_report(session, &run, &report_options).context("build report")?;

    fs::create_dir_all(&options.output_dir).with_context(|| {
        format!("create output directory {}", options.output_dir.display())
    })?;
    let report_path = options.output_dir.join(report_file_name(
        options.year,
        options.test,
        options.run_date,
    ));
    report.write(&report_path).context("write report")?;

    Ok(RunResult {
        year: options.year,
        test: options.test,
        diagnostics: options.diagnostics,
        summary: run.summary,
        report_path,
        tables: report.sections.len(),
    })
}
