//! The member universe: one row per enrolled member with enrollment,
//! condition and lab flags.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use tracing::{debug, warn};

use ckd_common::{column_value_string, parse_f64, parse_flag, parse_i64};
use ckd_ingest::{Query, Session, TableRef};
use ckd_model::{AnalysisYear, LabObservation, MemberFlags, MemberId, PipelineConfig};

use crate::error::Result;

pub const ENROLL_TABLE_PREFIX: &str = "enroll";
pub const CONDITION_TABLE_PREFIX: &str = "condition_flags";
pub const MEMBER_TABLE_PREFIX: &str = "member";

/// Condition indicators of one member in one year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConditionFlags {
    pub ckd: bool,
    pub esrd: bool,
    pub aki: bool,
}

/// Raw member-level tables of one run.
#[derive(Debug, Clone)]
pub struct MemberTables {
    pub enrollment: DataFrame,
    pub conditions: DataFrame,
    pub prior_conditions: DataFrame,
    pub demographics: DataFrame,
}

impl MemberTables {
    pub fn fetch(session: &mut Session, year: AnalysisYear) -> Result<Self> {
        let current = year.value();
        let prior = year.prior().value();
        Ok(Self {
            enrollment: session.fetch(
                &Query::new(TableRef::for_year(ENROLL_TABLE_PREFIX, current)?)
                    .select(&["member_id", "mhp"]),
            )?,
            conditions: session.fetch(
                &Query::new(TableRef::for_year(CONDITION_TABLE_PREFIX, current)?)
                    .select(&["member_id", "ckd", "esrd", "aki"]),
            )?,
            prior_conditions: session.fetch(
                &Query::new(TableRef::for_year(CONDITION_TABLE_PREFIX, prior)?)
                    .select(&["member_id", "aki"]),
            )?,
            demographics: session.fetch(
                &Query::new(TableRef::for_year(MEMBER_TABLE_PREFIX, current)?)
                    .select(&["member_id", "age"]),
            )?,
        })
    }
}

/// Lab-derived CKD flags: members with any numeric result below the
/// threshold, mapped to whether those results span at least the configured
/// number of days.
pub fn lab_flags(labs: &[LabObservation], config: &PipelineConfig) -> BTreeMap<MemberId, bool> {
    let mut spans: BTreeMap<&MemberId, (NaiveDate, NaiveDate)> = BTreeMap::new();
    for lab in labs {
        let below = lab
            .numeric_result
            .is_some_and(|value| value < config.ckd_lab_threshold);
        if !below {
            continue;
        }
        let date = lab.service_date;
        spans
            .entry(&lab.member_id)
            .and_modify(|(first, last)| {
                *first = (*first).min(date);
                *last = (*last).max(date);
            })
            .or_insert((date, date));
    }
    spans
        .into_iter()
        .map(|(member_id, (first, last))| {
            let two_labs = (last - first).num_days() >= config.two_lab_span_days;
            (member_id.clone(), two_labs)
        })
        .collect()
}

/// Per-member condition flags, OR-ed across duplicate rows.
fn condition_flags(df: &DataFrame) -> BTreeMap<String, ConditionFlags> {
    let mut flags: BTreeMap<String, ConditionFlags> = BTreeMap::new();
    for idx in 0..df.height() {
        let member = column_value_string(df, "member_id", idx);
        if member.is_empty() {
            continue;
        }
        let entry = flags.entry(member).or_default();
        entry.ckd |= parse_flag(&column_value_string(df, "ckd", idx));
        entry.esrd |= parse_flag(&column_value_string(df, "esrd", idx));
        entry.aki |= parse_flag(&column_value_string(df, "aki", idx));
    }
    flags
}

/// Per-member maximum age.
fn ages(df: &DataFrame) -> BTreeMap<String, i64> {
    let mut ages: BTreeMap<String, i64> = BTreeMap::new();
    for idx in 0..df.height() {
        let member = column_value_string(df, "member_id", idx);
        let Some(age) = parse_age(&column_value_string(df, "age", idx)) else {
            continue;
        };
        ages.entry(member)
            .and_modify(|current| *current = (*current).max(age))
            .or_insert(age);
    }
    ages
}

/// Whole years of an age cell. Extracts may store ages as decimals (`64.0`).
fn parse_age(raw: &str) -> Option<i64> {
    parse_i64(raw).or_else(|| {
        parse_f64(raw)
            .filter(|age| age.is_finite())
            .map(|age| age.trunc() as i64)
    })
}

/// Builds the member universe from the enrollment table, left joining
/// condition flags, ages and lab flags. Members are ordered by id.
pub fn build_members(
    tables: &MemberTables,
    labs: &[LabObservation],
    config: &PipelineConfig,
) -> Vec<MemberFlags> {
    let mut members: BTreeMap<MemberId, MemberFlags> = BTreeMap::new();
    let mut skipped = 0usize;
    for idx in 0..tables.enrollment.height() {
        let Ok(member_id) = MemberId::new(column_value_string(&tables.enrollment, "member_id", idx))
        else {
            skipped += 1;
            continue;
        };
        let in_denominator =
            config.is_denominator_plan(&column_value_string(&tables.enrollment, "mhp", idx));
        let flags = members
            .entry(member_id.clone())
            .or_insert_with(|| MemberFlags::new(member_id));
        flags.denom_flag |= in_denominator;
    }
    if skipped > 0 {
        warn!(rows = skipped, "enrollment rows without a member id skipped");
    }

    let conditions = condition_flags(&tables.conditions);
    let prior_conditions = condition_flags(&tables.prior_conditions);
    let ages = ages(&tables.demographics);
    let lab_flags = lab_flags(labs, config);

    for (member_id, flags) in &mut members {
        let current = conditions
            .get(member_id.as_str())
            .copied()
            .unwrap_or_default();
        let prior = prior_conditions
            .get(member_id.as_str())
            .copied()
            .unwrap_or_default();
        let lab_flag = lab_flags.get(member_id);

        flags.ckd_ccw_flag = current.ckd;
        flags.esrd_flag = current.esrd;
        flags.aki_flag_current = current.aki;
        flags.aki_flag_prior = prior.aki;
        flags.ckd_lab_flag = lab_flag.is_some();
        flags.ckd_lab_flag_2labs = lab_flag.copied().unwrap_or(false);
        flags.ckd_no_esrd_lab_flag = flags.ckd_lab_flag && !flags.esrd_flag;
        flags.ckd_no_esrd_flag = flags.ckd_ccw_flag && !flags.esrd_flag;
        flags.age = ages.get(member_id.as_str()).copied();
    }

    debug!(
        members = members.len(),
        denominator = members.values().filter(|m| m.denom_flag).count(),
        ckd_lab = members.values().filter(|m| m.ckd_lab_flag).count(),
        "member universe built"
    );
    members.into_values().collect()
}

/// Members flagged as CKD from labs who are excluded from the no-ESRD lab
/// flag because of ESRD.
pub fn ckd_lab_with_esrd(members: &[MemberFlags]) -> usize {
    let ckd_lab = members.iter().filter(|m| m.ckd_lab_flag).count();
    let no_esrd = members.iter().filter(|m| m.ckd_no_esrd_lab_flag).count();
    ckd_lab - no_esrd
}

#[cfg(test)]
mod tests {
    use super::*;
    use ckd_common::parse_date;
    use polars::prelude::*;

    fn lab(member: &str, date: &str, numeric: Option<f64>) -> LabObservation {
        LabObservation {
            member_id: MemberId::new(member).unwrap(),
            test_code: "33914-3".to_string(),
            service_date: parse_date(date).unwrap(),
            numeric_result: numeric,
            text_result: None,
            all_results: numeric,
        }
    }

    fn tables() -> MemberTables {
        MemberTables {
            enrollment: DataFrame::new(vec![
                Series::new("member_id".into(), vec!["M2", "M1", "M1", "M3", ""]).into(),
                Series::new("mhp".into(), vec!["ZZZ", "ZZZ", "aet", "MER", "AET"]).into(),
            ])
            .unwrap(),
            conditions: DataFrame::new(vec![
                Series::new("member_id".into(), vec!["M1", "M2"]).into(),
                Series::new("ckd".into(), vec!["1", "1"]).into(),
                Series::new("esrd".into(), vec!["0", "1"]).into(),
                Series::new("aki".into(), vec![Some("1"), None]).into(),
            ])
            .unwrap(),
            prior_conditions: DataFrame::new(vec![
                Series::new("member_id".into(), vec!["M2"]).into(),
                Series::new("aki".into(), vec!["1"]).into(),
            ])
            .unwrap(),
            demographics: DataFrame::new(vec![
                Series::new("member_id".into(), vec!["M1", "M2"]).into(),
                Series::new("age".into(), vec!["64", "17"]).into(),
            ])
            .unwrap(),
        }
    }

    #[test]
    fn decimal_ages_are_whole_years() {
        let demographics = DataFrame::new(vec![
            Series::new("member_id".into(), vec!["M1", "M2", "M2", "M3", "M4"]).into(),
            Series::new("age".into(), vec!["64.0", "17", "18.7", "", "NaN"]).into(),
        ])
        .unwrap();
        let ages = ages(&demographics);
        assert_eq!(ages.get("M1"), Some(&64));
        assert_eq!(ages.get("M2"), Some(&18));
        assert!(!ages.contains_key("M3"));
        assert!(!ages.contains_key("M4"));
    }

    #[test]
    fn two_lab_flag_needs_the_configured_span() {
        let config = PipelineConfig::default();
        let labs = vec![
            lab("M1", "2022-01-01", Some(50.0)),
            lab("M1", "2022-04-01", Some(45.0)),
            lab("M2", "2022-01-01", Some(50.0)),
            lab("M2", "2022-03-01", Some(50.0)),
            lab("M2", "2022-05-01", Some(75.0)),
            lab("M3", "2022-01-01", None),
        ];
        let flags = lab_flags(&labs, &config);
        assert_eq!(flags.get(&MemberId::new("M1").unwrap()), Some(&true));
        assert_eq!(flags.get(&MemberId::new("M2").unwrap()), Some(&false));
        assert!(!flags.contains_key(&MemberId::new("M3").unwrap()));
    }

    #[test]
    fn one_row_per_enrolled_member() {
        let config = PipelineConfig::default();
        let labs = vec![
            lab("M2", "2023-01-01", Some(40.0)),
            lab("M9", "2023-01-01", Some(40.0)),
        ];
        let members = build_members(&tables(), &labs, &config);
        let ids: Vec<&str> = members.iter().map(|m| m.member_id.as_str()).collect();
        assert_eq!(ids, vec!["M1", "M2", "M3"]);

        let m1 = &members[0];
        assert!(m1.denom_flag);
        assert!(m1.ckd_ccw_flag && m1.ckd_no_esrd_flag);
        assert!(m1.aki_flag_current && !m1.aki_flag_prior);
        assert_eq!(m1.age, Some(64));

        let m2 = &members[1];
        assert!(!m2.denom_flag);
        assert!(m2.esrd_flag);
        assert!(m2.ckd_lab_flag && !m2.ckd_no_esrd_lab_flag);
        assert!(!m2.ckd_no_esrd_flag);
        assert!(m2.aki_flag_prior);

        let m3 = &members[2];
        assert!(m3.denom_flag);
        assert!(!m3.ckd_ccw_flag && !m3.esrd_flag);
        assert_eq!(m3.age, None);

        assert_eq!(ckd_lab_with_esrd(&members), 1);
    }
}
