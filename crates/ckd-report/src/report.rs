//! Report assembly.
//!
//! Every run reports the lab-CKD-with-ESRD count and the four combined stage
//! tables. The diagnostics pass adds frequencies and crosstabs for adults,
//! monthly stage-date counts and the cost tables.

use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use polars::prelude::DataFrame;
use tracing::{debug, info, info_span};

use ckd_ingest::Session;
use ckd_model::AnalysisYear;
use ckd_stage::{StagingRun, col};

use crate::cost::{CostCategory, CostData, CostFilter, CostTables, FlagFilter, cost_by_stage};
use crate::error::{ReportError, Result};
use crate::table::ReportTable;
use crate::tabulate::{MemberFilter, frequency, monthly_counts};
use crate::writer::ReportWriter;

/// The combined stage schemes every report tabulates.
pub const COMBINED_STAGE_VARS: [&str; 4] = [
    col::CKD_STAGE_COMB_ALL,
    col::CKD_STAGE_COMB_5ANDESRD,
    col::CKD_STAGE_COMB_W3UNSP,
    col::CKD_STAGE_COMB_5CAT,
];

/// Variables tabulated for adults in the diagnostics pass, in report order.
pub const DIAGNOSTIC_VARS: [&str; 9] = [
    col::CKD_LAB_FLAG,
    col::CKD_STAGE_LAB,
    col::CKD_LAB_FLAG_2LABS,
    col::CKD_STAGE_LAB_DETAILED,
    col::CKD_STAGE_COMB_ALL,
    col::CKD_STAGE_COMB_5ANDESRD,
    col::CKD_STAGE_CLAIMS,
    col::CKD_STAGE_COMB_W3UNSP,
    col::CKD_STAGE_COMB_5CAT,
];

const COST_TITLE: &str = "Cost per bene year by stage";

/// Variables crossed with `var` after its frequency table.
fn crosstab_partners(var: &str) -> &'static [&'static [&'static str]] {
    match var {
        col::CKD_LAB_FLAG => &[
            &[col::CKD_CCW_FLAG],
            &[col::CKD_LAB_FLAG_2LABS],
            &[col::AKI_FLAG_CURRENT, col::AKI_FLAG_PRIOR],
        ],
        col::CKD_STAGE_LAB_DETAILED => &[
            &[col::CKD_STAGE_CLAIMS],
            &[col::CKD_STAGE_CLAIMS, col::CKD_STAGE_COMB_ALL],
        ],
        col::CKD_STAGE_CLAIMS => &[&[col::ESRD_FLAG, col::CKD_CCW_FLAG]],
        _ => &[],
    }
}

/// Options for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    pub year: AnalysisYear,
    /// Adds the diagnostics pass.
    pub diagnostics: bool,
    pub adult_age: i64,
    /// Claim limit of the cost tables in sampling runs.
    pub sample_rows: Option<usize>,
}

impl ReportOptions {
    pub fn new(year: AnalysisYear) -> Self {
        Self {
            year,
            diagnostics: false,
            adult_age: 18,
            sample_rows: None,
        }
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: bool) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn with_adult_age(mut self, adult_age: i64) -> Self {
        self.adult_age = adult_age;
        self
    }

    #[must_use]
    pub fn with_sample_rows(mut self, sample_rows: Option<usize>) -> Self {
        self.sample_rows = sample_rows;
        self
    }
}

/// A titled table of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub title: String,
    pub table: ReportTable,
}

impl ReportSection {
    pub fn new(title: impl Into<String>, table: ReportTable) -> Self {
        Self {
            title: title.into(),
            table,
        }
    }
}

/// The full report of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Members flagged as CKD from labs who also have ESRD.
    pub ckd_lab_with_esrd: usize,
    pub sections: Vec<ReportSection>,
}

impl Report {
    pub fn write_to<W: Write>(&self, writer: &mut ReportWriter<W>) -> io::Result<()> {
        writer.write_line(&format!(
            "Beneficiaries flagged as CKD from lab data and ESRD: {}",
            self.ckd_lab_with_esrd
        ))?;
        for section in &self.sections {
            writer.write_table(&section.title, &section.table)?;
        }
        Ok(())
    }

    /// The report text, as [`Report::write`] would put it on disk.
    pub fn render(&self) -> io::Result<String> {
        let mut writer = ReportWriter::new(Vec::new());
        self.write_to(&mut writer)?;
        String::from_utf8(writer.finish()?)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    /// Writes the report to `path`, replacing any existing file.
    pub fn write(&self, path: &Path) -> Result<()> {
        let write_err = |source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = ReportWriter::create(path).map_err(write_err)?;
        self.write_to(&mut writer).map_err(write_err)?;
        writer.finish().map_err(write_err)?;
        Ok(())
    }
}

/// Frequency tables of the combined stage schemes over all members.
pub fn staging_sections(frame: &DataFrame, year: AnalysisYear) -> Result<Vec<ReportSection>> {
    COMBINED_STAGE_VARS
        .into_iter()
        .map(|var| {
            let table = frequency(frame, &[var], MemberFilter::All, 0)?;
            Ok(ReportSection::new(format!("{var} for {year}"), table))
        })
        .collect()
}

/// Frequencies and crosstabs for adults and adults in the denominator,
/// followed by the monthly stage-date counts.
pub fn diagnostic_sections(
    frame: &DataFrame,
    year: AnalysisYear,
    adult_age: i64,
) -> Result<Vec<ReportSection>> {
    let mut sections = Vec::new();
    for filter in [MemberFilter::Adults, MemberFilter::AdultsInDenominator] {
        let cond = filter.label();
        for var in DIAGNOSTIC_VARS {
            let table = frequency(frame, &[var], filter, adult_age)?;
            sections.push(ReportSection::new(format!("{var} for {cond} in {year}"), table));

            for partners in crosstab_partners(var) {
                let mut vars = vec![var];
                vars.extend_from_slice(partners);
                let table = frequency(frame, &vars, filter, adult_age)?;
                sections.push(ReportSection::new(
                    format!(
                        "{var} and {} crosstab for {cond} in {year}",
                        partners.join(", ")
                    ),
                    table,
                ));
            }
        }
    }
    sections.push(ReportSection::new(
        format!("Monthly counts of claims and labs in {year}"),
        monthly_counts(frame)?,
    ));
    Ok(sections)
}

/// Cost tables: all categories, each reported category, medical-only
/// members and dual members.
pub fn cost_sections(
    frame: &DataFrame,
    data: &CostData,
    year: AnalysisYear,
    adult_age: i64,
) -> Result<Vec<ReportSection>> {
    let mut filters = vec![(format!("{COST_TITLE} for {year}"), CostFilter::all())];
    for category in CostCategory::REPORTED {
        filters.push((
            format!("{COST_TITLE} for {category} FASC category for {year}"),
            CostFilter::all().with_category(category),
        ));
    }
    filters.push((
        format!("{COST_TITLE} where med_flag='Y' and dual_flag='N' for {year}"),
        CostFilter::all()
            .with_medical(FlagFilter::Yes)
            .with_dual(FlagFilter::No),
    ));
    filters.push((
        format!("{COST_TITLE} where dual_flag='Y' for {year}"),
        CostFilter::all().with_dual(FlagFilter::Yes),
    ));

    filters
        .into_iter()
        .map(|(title, filter)| {
            let table = cost_by_stage(frame, data, &filter, adult_age)?;
            Ok(ReportSection::new(title, table))
        })
        .collect()
}

/// Builds the report of a staging run. Cost inputs are only fetched for the
/// diagnostics pass.
pub fn build_report(
    session: &mut Session,
    run: &StagingRun,
    options: &ReportOptions,
) -> Result<Report> {
    let span = info_span!("report", year = %options.year, diagnostics = options.diagnostics);
    let _guard = span.enter();
    let start = Instant::now();

    let crosstab = frequency(
        &run.frame,
        &[col::CKD_STAGE_COMB_ALL, col::CKD_STAGE_COMB_W3UNSP],
        MemberFilter::All,
        options.adult_age,
    )?;
    debug!(table = %crosstab.render(), "combined stage crosstab");

    let mut sections = staging_sections(&run.frame, options.year)?;
    if options.diagnostics {
        sections.extend(diagnostic_sections(
            &run.frame,
            options.year,
            options.adult_age,
        )?);
        let data = info_span!("cost_inputs").in_scope(|| -> Result<_> {
            let tables = CostTables::fetch(session, options.year)?;
            Ok(CostData::prepare(&tables, options.sample_rows))
        })?;
        sections.extend(cost_sections(
            &run.frame,
            &data,
            options.year,
            options.adult_age,
        )?);
    }

    info!(
        sections = sections.len(),
        duration_ms = start.elapsed().as_millis(),
        "report built"
    );
    Ok(Report {
        ckd_lab_with_esrd: run.summary.ckd_lab_with_esrd,
        sections,
    })
}
