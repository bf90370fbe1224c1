//! Frequency and crosstab tables over the member table.

use std::collections::BTreeMap;

use polars::prelude::*;

use ckd_common::{any_to_i64, any_to_string, month_key, parse_date};
use ckd_stage::col;

use crate::error::{ReportError, Result};
use crate::table::ReportTable;

/// Which members a table counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberFilter {
    All,
    Adults,
    AdultsInDenominator,
}

impl MemberFilter {
    pub fn label(self) -> &'static str {
        match self {
            MemberFilter::All => "all members",
            MemberFilter::Adults => "adults",
            MemberFilter::AdultsInDenominator => "adults in denominator",
        }
    }

    fn keeps(self, age: Option<i64>, in_denominator: bool, adult_age: i64) -> bool {
        let adult = age.is_some_and(|age| age >= adult_age);
        match self {
            MemberFilter::All => true,
            MemberFilter::Adults => adult,
            MemberFilter::AdultsInDenominator => adult && in_denominator,
        }
    }
}

/// Grouping key with integers ordered numerically and nulls last.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum GroupKey {
    Int(i64),
    Text(String),
    Missing,
}

impl GroupKey {
    pub(crate) fn from_any(value: AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => GroupKey::Missing,
            AnyValue::String(_)
            | AnyValue::StringOwned(_)
            | AnyValue::Float32(_)
            | AnyValue::Float64(_) => GroupKey::Text(any_to_string(value)),
            other => any_to_i64(other.clone())
                .map_or_else(|| GroupKey::Text(any_to_string(other)), GroupKey::Int),
        }
    }

    pub(crate) fn render(&self) -> String {
        match self {
            GroupKey::Int(value) => value.to_string(),
            GroupKey::Text(value) => value.clone(),
            GroupKey::Missing => String::new(),
        }
    }
}

fn column<'a>(frame: &'a DataFrame, name: &str) -> Result<&'a Column> {
    frame.column(name).map_err(|_| ReportError::MissingColumn {
        column: name.to_string(),
    })
}

/// Row indices of the members `filter` keeps.
pub(crate) fn filtered_rows(
    frame: &DataFrame,
    filter: MemberFilter,
    adult_age: i64,
) -> Result<Vec<usize>> {
    if filter == MemberFilter::All {
        return Ok((0..frame.height()).collect());
    }
    let ages = column(frame, col::AGE)?;
    let denominator = column(frame, col::DENOM_FLAG)?;
    let mut rows = Vec::new();
    for idx in 0..frame.height() {
        let age = any_to_i64(ages.get(idx)?);
        let in_denominator = any_to_i64(denominator.get(idx)?) == Some(1);
        if filter.keeps(age, in_denominator, adult_age) {
            rows.push(idx);
        }
    }
    Ok(rows)
}

/// Counts members per distinct combination of `vars`, ordered by value.
///
/// Headers are the upper-cased variable names followed by `N`.
pub fn frequency(
    frame: &DataFrame,
    vars: &[&str],
    filter: MemberFilter,
    adult_age: i64,
) -> Result<ReportTable> {
    let columns = vars
        .iter()
        .map(|name| column(frame, name))
        .collect::<Result<Vec<_>>>()?;

    let mut counts: BTreeMap<Vec<GroupKey>, usize> = BTreeMap::new();
    for idx in filtered_rows(frame, filter, adult_age)? {
        let key = columns
            .iter()
            .map(|column| column.get(idx).map(GroupKey::from_any))
            .collect::<PolarsResult<Vec<_>>>()?;
        *counts.entry(key).or_default() += 1;
    }

    let mut headers: Vec<String> = vars.iter().map(|v| v.to_ascii_uppercase()).collect();
    headers.push("N".to_string());
    let mut table = ReportTable::new(headers);
    for (key, count) in counts {
        let mut row: Vec<String> = key.iter().map(GroupKey::render).collect();
        row.push(count.to_string());
        table.push_row(row);
    }
    Ok(table)
}

fn month_counts(frame: &DataFrame, date_column: &str) -> Result<BTreeMap<GroupKey, usize>> {
    let dates = column(frame, date_column)?;
    let mut counts = BTreeMap::new();
    for idx in 0..frame.height() {
        let key = match parse_date(&any_to_string(dates.get(idx)?)) {
            Some(date) => GroupKey::Text(month_key(date)),
            None => GroupKey::Missing,
        };
        *counts.entry(key).or_default() += 1;
    }
    Ok(counts)
}

/// Members per `yyyyMM` of their claims and lab stage dates, outer-merged on
/// the month. Members without a date count in the trailing blank month.
pub fn monthly_counts(frame: &DataFrame) -> Result<ReportTable> {
    let claims = month_counts(frame, col::CKD_STAGE_CLAIMS_DATE)?;
    let labs = month_counts(frame, col::CKD_STAGE_LAB_DATE)?;

    let mut merged: BTreeMap<&GroupKey, [Option<usize>; 2]> = BTreeMap::new();
    for (month, count) in &claims {
        merged.entry(month).or_default()[0] = Some(*count);
    }
    for (month, count) in &labs {
        merged.entry(month).or_default()[1] = Some(*count);
    }

    let mut table = ReportTable::new(["MONTH", col::CKD_STAGE_CLAIMS_DATE, col::CKD_STAGE_LAB_DATE]);
    for (month, [claims, labs]) in merged {
        let count = |value: Option<usize>| value.map(|n| n.to_string()).unwrap_or_default();
        table.push_row(vec![month.render(), count(claims), count(labs)]);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df! {
            col::MEMBER_ID => ["M1", "M2", "M3", "M4"],
            col::AGE => [Some(70i64), Some(12), None, Some(40)],
            col::DENOM_FLAG => [1i32, 1, 0, 0],
            col::CKD_LAB_FLAG => [1i32, 0, 0, 1],
            col::CKD_STAGE_LAB => ["stage 3", "0", "0", "stage 3"],
            col::CKD_STAGE_CLAIMS_DATE => [Some("2023-01-05"), None, Some("2023-01-20"), None],
            col::CKD_STAGE_LAB_DATE => [Some("2023-03-01"), None, None, Some("2022-11-30")],
        }
        .unwrap()
    }

    #[test]
    fn frequency_orders_values_and_counts() {
        let table = frequency(&frame(), &[col::CKD_STAGE_LAB], MemberFilter::All, 18).unwrap();
        assert_eq!(table.headers(), ["CKD_STAGE_LAB", "N"]);
        assert_eq!(table.height(), 2);
        assert_eq!(table.cell(0, "CKD_STAGE_LAB"), Some("0"));
        assert_eq!(table.cell(0, "N"), Some("2"));
        assert_eq!(table.cell(1, "N"), Some("2"));
    }

    #[test]
    fn adult_filters_drop_minors_and_missing_ages() {
        let adults = frequency(&frame(), &[col::CKD_LAB_FLAG], MemberFilter::Adults, 18).unwrap();
        assert_eq!(adults.height(), 1);
        assert_eq!(adults.cell(0, "CKD_LAB_FLAG"), Some("1"));
        assert_eq!(adults.cell(0, "N"), Some("2"));

        let denominator = frequency(
            &frame(),
            &[col::CKD_LAB_FLAG],
            MemberFilter::AdultsInDenominator,
            18,
        )
        .unwrap();
        assert_eq!(denominator.height(), 1);
        assert_eq!(denominator.cell(0, "N"), Some("1"));
    }

    #[test]
    fn crosstab_keys_on_every_variable() {
        let table = frequency(
            &frame(),
            &[col::CKD_LAB_FLAG, col::DENOM_FLAG],
            MemberFilter::All,
            18,
        )
        .unwrap();
        let rows: Vec<Vec<String>> = table.rows().to_vec();
        assert_eq!(
            rows,
            vec![
                vec!["0".to_string(), "0".to_string(), "1".to_string()],
                vec!["0".to_string(), "1".to_string(), "1".to_string()],
                vec!["1".to_string(), "0".to_string(), "1".to_string()],
                vec!["1".to_string(), "1".to_string(), "1".to_string()],
            ]
        );
    }

    #[test]
    fn missing_column_is_reported() {
        let err = frequency(&frame(), &["nope"], MemberFilter::All, 18).unwrap_err();
        assert!(matches!(err, ReportError::MissingColumn { column } if column == "nope"));
    }

    #[test]
    fn monthly_counts_outer_merge_with_blank_month_last() {
        let table = monthly_counts(&frame()).unwrap();
        assert_eq!(
            table.render(),
            " MONTH  ckd_stage_claims_date  ckd_stage_lab_date\n202211                                          1\n202301                      2\n202303                                          1\n                            2                   2"
        );
    }

    #[test]
    fn integer_keys_sort_numerically() {
        let frame = df! { col::N_LABS => [Some(10u32), Some(2), None, Some(2)] }.unwrap();
        let table = frequency(&frame, &[col::N_LABS], MemberFilter::All, 18).unwrap();
        let keys: Vec<&str> = (0..table.height())
            .filter_map(|row| table.cell(row, "N_LABS"))
            .collect();
        assert_eq!(keys, ["2", "10", ""]);
    }
}
