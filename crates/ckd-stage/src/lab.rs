//! Lab extraction, result normalization and the lab stage resolver.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use regex::Regex;
use tracing::debug;

use ckd_common::{column_value_string, parse_date, parse_f64};
use ckd_ingest::{Query, Session, TableRef};
use ckd_model::{AnalysisYear, LabObservation, LabResolution, MemberId, PipelineConfig};

use crate::error::Result;

/// Range-encoded text results such as `>=90`, `>60` or `> 120.00`.
/// The whole text must match.
static RANGE_RESULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^>/?=? ?(60|90|120).?0?0?$").expect("Invalid range result regex")
});

pub const LAB_TABLE: &str = "lab_results";

const LAB_COLUMNS: [&str; 5] = [
    "member_id",
    "requestcpt",
    "numericresult",
    "textresult",
    "date_servicebegin",
];

/// Lab rows for one run, plus the counts of rows that could not be used.
#[derive(Debug, Clone, Default)]
pub struct LabExtract {
    pub observations: Vec<LabObservation>,
    /// Rows without a member id or a parsable service date.
    pub skipped: usize,
    /// Non-null numeric results that did not parse as numbers.
    pub unparsable_numeric: usize,
}

/// Parses the raw numeric result field. The `NULL` sentinel and blanks are null.
pub fn parse_numeric_result(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("NULL") {
        return None;
    }
    parse_f64(trimmed).filter(|value| value.is_finite())
}

/// Folds the numeric and text result fields into one comparable value.
///
/// A text result matching the range pattern wins once `/`, `=` and `>` are
/// stripped; otherwise the numeric field is used.
///
/// ```
/// use ckd_stage::normalize_result;
///
/// assert_eq!(normalize_result(None, Some(">=90")), Some(90.0));
/// assert_eq!(normalize_result(Some(90.0), None), Some(90.0));
/// assert_eq!(normalize_result(Some(75.0), Some("120/80")), Some(75.0));
/// assert_eq!(normalize_result(None, Some("pending")), None);
/// ```
pub fn normalize_result(numeric: Option<f64>, text: Option<&str>) -> Option<f64> {
    text.filter(|text| RANGE_RESULT.is_match(text))
        .and_then(|text| {
            let stripped: String = text
                .chars()
                .filter(|ch| !matches!(ch, '/' | '=' | '>'))
                .collect();
            parse_f64(&stripped)
        })
        .or(numeric)
}

/// Queries the configured lab test for the analysis year and the prior year.
pub fn extract_labs(
    session: &mut Session,
    year: AnalysisYear,
    config: &PipelineConfig,
) -> Result<LabExtract> {
    let query = Query::new(TableRef::new(LAB_TABLE)?)
        .select(&LAB_COLUMNS)
        .eq("requestcpt", config.lab_test_code.as_str())
        .year_in("date_servicebegin", &[year.prior().value(), year.value()]);
    let df = session.fetch(&query)?;
    Ok(observations_from_frame(&df))
}

/// Converts lab rows into normalized observations.
pub fn observations_from_frame(df: &DataFrame) -> LabExtract {
    let mut extract = LabExtract::default();
    for idx in 0..df.height() {
        let Ok(member_id) = MemberId::new(column_value_string(df, "member_id", idx)) else {
            extract.skipped += 1;
            continue;
        };
        let Some(service_date) = parse_date(&column_value_string(df, "date_servicebegin", idx))
        else {
            extract.skipped += 1;
            continue;
        };

        let raw_numeric = column_value_string(df, "numericresult", idx);
        let numeric_result = parse_numeric_result(&raw_numeric);
        if numeric_result.is_none()
            && !raw_numeric.is_empty()
            && !raw_numeric.eq_ignore_ascii_case("NULL")
        {
            extract.unparsable_numeric += 1;
        }

        let text = column_value_string(df, "textresult", idx);
        let text_result = (!text.is_empty()).then_some(text);
        let all_results = normalize_result(numeric_result, text_result.as_deref());

        extract.observations.push(LabObservation {
            member_id,
            test_code: column_value_string(df, "requestcpt", idx),
            service_date,
            numeric_result,
            text_result,
            all_results,
        });
    }
    extract
}

/// Picks each member's representative lab result: the lowest normalized
/// value on the latest date that has one.
pub fn resolve_labs(observations: &[LabObservation]) -> BTreeMap<MemberId, LabResolution> {
    let mut latest: BTreeMap<&MemberId, (NaiveDate, Vec<f64>)> = BTreeMap::new();
    for observation in observations {
        let Some(value) = observation.all_results else {
            continue;
        };
        let entry = latest
            .entry(&observation.member_id)
            .or_insert_with(|| (observation.service_date, Vec::new()));
        if observation.service_date > entry.0 {
            *entry = (observation.service_date, vec![value]);
        } else if observation.service_date == entry.0 {
            entry.1.push(value);
        }
    }

    let mut resolved = BTreeMap::new();
    for (member_id, (date, mut values)) in latest {
        values.sort_by(f64::total_cmp);
        values.dedup();
        let Some(&value) = values.first() else {
            continue;
        };
        resolved.insert(
            member_id.clone(),
            LabResolution {
                date,
                value,
                n_labs: values.len(),
            },
        );
    }

    let multiple = resolved.values().filter(|lab| lab.n_labs > 1).count();
    debug!(
        members = resolved.len(),
        multiple_results = multiple,
        "lab stages resolved"
    );
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use ckd_model::Stage;
    use polars::prelude::*;

    fn observation(member: &str, date: &str, value: Option<f64>) -> LabObservation {
        LabObservation {
            member_id: MemberId::new(member).unwrap(),
            test_code: "33914-3".to_string(),
            service_date: parse_date(date).unwrap(),
            numeric_result: value,
            text_result: None,
            all_results: value,
        }
    }

    #[test]
    fn text_range_results_win_over_numeric() {
        assert_eq!(normalize_result(Some(58.0), Some(">=90")), Some(90.0));
        assert_eq!(normalize_result(None, Some(">60")), Some(60.0));
        assert_eq!(normalize_result(None, Some("> 120.00")), Some(120.0));
        assert_eq!(normalize_result(None, Some(">/=60")), Some(60.0));
    }

    #[test]
    fn unmatched_text_falls_back_to_numeric() {
        assert_eq!(normalize_result(Some(80.0), Some("120/80")), Some(80.0));
        assert_eq!(normalize_result(None, Some("120/80")), None);
        assert_eq!(normalize_result(Some(44.0), Some("=90")), Some(44.0));
        assert_eq!(normalize_result(Some(30.0), Some(">=90 mL/min")), Some(30.0));
    }

    #[test]
    fn stripped_text_that_does_not_parse_falls_through() {
        assert_eq!(normalize_result(Some(12.0), Some(">60a")), Some(12.0));
    }

    #[test]
    fn numeric_sentinel_is_null() {
        assert_eq!(parse_numeric_result("NULL"), None);
        assert_eq!(parse_numeric_result(""), None);
        assert_eq!(parse_numeric_result(" 55.5 "), Some(55.5));
        assert_eq!(parse_numeric_result("abc"), None);
    }

    #[test]
    fn frame_rows_are_normalized() {
        let df = DataFrame::new(vec![
            Series::new("member_id".into(), vec![Some("M1"), Some("M1"), None, Some("M2")]).into(),
            Series::new("requestcpt".into(), vec!["33914-3"; 4]).into(),
            Series::new(
                "numericresult".into(),
                vec![Some("NULL"), Some("abc"), Some("40"), Some("35")],
            )
            .into(),
            Series::new("textresult".into(), vec![Some(">=90"), None, None, None]).into(),
            Series::new(
                "date_servicebegin".into(),
                vec![Some("2023-01-01"), Some("2023-01-02"), Some("2023-01-03"), None],
            )
            .into(),
        ])
        .unwrap();

        let extract = observations_from_frame(&df);
        assert_eq!(extract.observations.len(), 2);
        assert_eq!(extract.skipped, 2);
        assert_eq!(extract.unparsable_numeric, 1);
        assert_eq!(extract.observations[0].all_results, Some(90.0));
        assert_eq!(extract.observations[1].all_results, None);
    }

    #[test]
    fn resolver_takes_lowest_value_on_latest_date() {
        let labs = vec![
            observation("M1", "2023-01-10", Some(20.0)),
            observation("M1", "2023-05-01", Some(70.0)),
            observation("M1", "2023-05-01", Some(55.0)),
            observation("M1", "2023-05-01", Some(55.0)),
            observation("M1", "2023-06-01", None),
        ];
        let resolved = resolve_labs(&labs);
        let lab = resolved[&MemberId::new("M1").unwrap()];
        assert_eq!(lab.date, parse_date("2023-05-01").unwrap());
        assert!((lab.value - 55.0).abs() < f64::EPSILON);
        assert_eq!(lab.n_labs, 2);
        assert_eq!(lab.stage(), Some(Stage::Stage3a));
    }

    #[test]
    fn members_without_results_are_not_resolved() {
        let labs = vec![observation("M2", "2023-02-01", None)];
        assert!(resolve_labs(&labs).is_empty());
    }
}
