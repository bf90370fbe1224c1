//! Report file naming and block writing.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::NaiveDate;

use ckd_model::AnalysisYear;

use crate::table::ReportTable;

/// Report file name for a run.
///
/// Sampling runs are prefixed with `test_` and carry no date, so reruns
/// overwrite the same file. Production runs append the run date.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use ckd_model::AnalysisYear;
/// use ckd_report::report_file_name;
///
/// let year = AnalysisYear::parse("2023").unwrap();
/// let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
/// assert_eq!(
///     report_file_name(year, true, date),
///     "test_ckd_lab_claims_diagnostics_2023.txt"
/// );
/// assert_eq!(
///     report_file_name(year, false, date),
///     "ckd_lab_claims_diagnostics_2023_2024-02-01.txt"
/// );
/// ```
pub fn report_file_name(year: AnalysisYear, test_run: bool, run_date: NaiveDate) -> String {
    if test_run {
        format!("test_ckd_lab_claims_diagnostics_{year}.txt")
    } else {
        format!(
            "ckd_lab_claims_diagnostics_{year}_{}.txt",
            run_date.format("%Y-%m-%d")
        )
    }
}

/// Writes report blocks: a title line, the table and a blank line.
pub struct ReportWriter<W: Write> {
    out: W,
    tables: usize,
}

impl ReportWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, tables: 0 }
    }

    /// Writes a free-standing line followed by a blank line.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        write!(self.out, "{line}\n\n")
    }

    pub fn write_table(&mut self, title: &str, table: &ReportTable) -> io::Result<()> {
        write!(self.out, "{title}\n{}\n\n", table.render())?;
        self.tables += 1;
        Ok(())
    }

    pub fn tables_written(&self) -> usize {
        self.tables
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_separated_by_blank_lines() {
        let mut table = ReportTable::new(["CKD_STAGE_COMB_ALL", "N"]);
        table.push_row(vec!["ESRD".to_string(), "4".to_string()]);

        let mut writer = ReportWriter::new(Vec::new());
        writer.write_line("Beneficiaries flagged as CKD from lab data and ESRD: 1").unwrap();
        writer.write_table("ckd_stage_comb_all for 2023", &table).unwrap();
        assert_eq!(writer.tables_written(), 1);

        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(
            text,
            "Beneficiaries flagged as CKD from lab data and ESRD: 1\n\n\
             ckd_stage_comb_all for 2023\n\
             CKD_STAGE_COMB_ALL  N\n\
             \x20             ESRD  4\n\n"
        );
    }
}
