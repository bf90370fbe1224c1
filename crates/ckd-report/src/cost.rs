//! Cost per beneficiary year by stage.
//!
//! Claims are first collapsed to one row per (claim, member, facility
//! category). Adult enrollment months are then matched to those claims by
//! member and `yyyyMM`, and the per-member totals are summed per stage.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::debug;

use ckd_common::{any_to_i64, column_value_string, column_values, month_key, parse_date, parse_f64};
use ckd_ingest::{Query, Session, TableRef};
use ckd_model::AnalysisYear;
use ckd_stage::col;
use ckd_stage::members::ENROLL_TABLE_PREFIX;

use crate::error::{ReportError, Result};
use crate::table::ReportTable;
use crate::tabulate::{GroupKey, MemberFilter, filtered_rows};

pub const CLAIMS_TABLE_PREFIX: &str = "claims";
pub const FACILITY_TABLE_PREFIX: &str = "facility_categories";
pub const INPATIENT_TABLE_PREFIX: &str = "inpatient_imputed";

/// Stage variables the cost tables break down by.
pub const COST_STAGE_VARS: [&str; 6] = [
    col::CKD_STAGE_LAB_DETAILED,
    col::CKD_STAGE_CLAIMS,
    col::CKD_STAGE_COMB_ALL,
    col::CKD_STAGE_COMB_5ANDESRD,
    col::CKD_STAGE_COMB_W3UNSP,
    col::CKD_STAGE_COMB_5CAT,
];

/// Adjusted facility category of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CostCategory {
    Inpatient,
    Clinic,
    Drug,
    OpFacility,
    Nf,
    Other,
}

impl CostCategory {
    /// Categories reported on their own, in report order.
    pub const REPORTED: [CostCategory; 5] = [
        CostCategory::Inpatient,
        CostCategory::Clinic,
        CostCategory::OpFacility,
        CostCategory::Nf,
        CostCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CostCategory::Inpatient => "inpatient",
            CostCategory::Clinic => "clinic",
            CostCategory::Drug => "drug",
            CostCategory::OpFacility => "op facility",
            CostCategory::Nf => "nf",
            CostCategory::Other => "other",
        }
    }

    /// Maps a raw facility category; unknown categories become `Other`.
    pub fn from_facility(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "inpatient" => CostCategory::Inpatient,
            "clinic" => CostCategory::Clinic,
            "drug" => CostCategory::Drug,
            "op facility" => CostCategory::OpFacility,
            "nf" => CostCategory::Nf,
            _ => CostCategory::Other,
        }
    }
}

impl fmt::Display for CostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter on a `Y`/`N` enrollment flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagFilter {
    /// `Y` or `N`; other values, including null, never match.
    #[default]
    Both,
    Yes,
    No,
}

impl FlagFilter {
    pub fn matches(self, value: &str) -> bool {
        let value = value.trim();
        match self {
            FlagFilter::Both => value == "Y" || value == "N",
            FlagFilter::Yes => value == "Y",
            FlagFilter::No => value == "N",
        }
    }
}

/// Which enrollment months and claims one cost table covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CostFilter {
    /// `None` covers every category except drugs.
    pub category: Option<CostCategory>,
    pub medical: FlagFilter,
    pub dual: FlagFilter,
}

impl CostFilter {
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_category(mut self, category: CostCategory) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn with_medical(mut self, medical: FlagFilter) -> Self {
        self.medical = medical;
        self
    }

    #[must_use]
    pub fn with_dual(mut self, dual: FlagFilter) -> Self {
        self.dual = dual;
        self
    }

    fn covers(&self, category: CostCategory) -> bool {
        match self.category {
            Some(wanted) => category == wanted,
            None => category != CostCategory::Drug,
        }
    }
}

/// One claim after collapsing its lines.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedClaim {
    pub claim_id: String,
    pub member_id: String,
    /// Latest from-date of the claim's lines.
    pub from_date: Option<NaiveDate>,
    /// Imputed amount for inpatient claims, line total otherwise.
    pub allowed_amt: Option<f64>,
    pub category: CostCategory,
}

/// One enrollment month of a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentMonth {
    pub member_id: String,
    pub month: Option<String>,
    pub medical_flag: String,
    pub dual_flag: String,
}

/// Raw warehouse tables behind the cost tables.
#[derive(Debug, Clone)]
pub struct CostTables {
    pub claims: DataFrame,
    pub facilities: DataFrame,
    pub inpatient: DataFrame,
    pub enrollment: DataFrame,
}

impl CostTables {
    pub fn fetch(session: &mut Session, year: AnalysisYear) -> Result<Self> {
        let year = year.value();
        Ok(Self {
            claims: session.fetch(
                &Query::new(TableRef::for_year(CLAIMS_TABLE_PREFIX, year)?)
                    .select(&["claim_id", "member_id", "from_date", "allowed_amt", "claim_status"])
                    .not_eq("claim_status", 1i64),
            )?,
            facilities: session.fetch(
                &Query::new(TableRef::for_year(FACILITY_TABLE_PREFIX, year)?)
                    .select(&["claim_id", "fasc_cat"]),
            )?,
            inpatient: session.fetch(
                &Query::new(TableRef::for_year(INPATIENT_TABLE_PREFIX, year)?)
                    .select(&["claim_id", "allowed_amount"]),
            )?,
            enrollment: session.fetch(
                &Query::new(TableRef::for_year(ENROLL_TABLE_PREFIX, year)?).select(&[
                    "member_id",
                    "begin_date",
                    "medical_flag",
                    "dual_flag",
                ]),
            )?,
        })
    }
}

/// Prepared claims and enrollment months shared by every cost table.
#[derive(Debug, Clone, Default)]
pub struct CostData {
    pub claims: Vec<PreparedClaim>,
    pub enrollment: Vec<EnrollmentMonth>,
}

impl CostData {
    /// Prepares the fetched tables, keeping at most `sample_rows` claims.
    pub fn prepare(tables: &CostTables, sample_rows: Option<usize>) -> Self {
        let claims = prepare_claims(tables, sample_rows);
        let enrollment = enrollment_months(&tables.enrollment);
        debug!(
            claims = claims.len(),
            enrollment_months = enrollment.len(),
            "cost inputs prepared"
        );
        Self { claims, enrollment }
    }
}

const NO_IMPUTED: &[Option<f64>] = &[None];

#[derive(Default)]
struct ClaimAccumulator {
    from_date: Option<NaiveDate>,
    line_total: Option<f64>,
    imputed_max: Option<f64>,
}

fn add(total: &mut Option<f64>, value: Option<f64>) {
    if let Some(value) = value {
        *total = Some(total.unwrap_or(0.0) + value);
    }
}

fn keep_max(current: &mut Option<f64>, value: Option<f64>) {
    if let Some(value) = value {
        *current = Some(current.map_or(value, |c| c.max(value)));
    }
}

/// Collapses claim lines to one row per (claim, member, facility category).
///
/// Lines are joined to every facility row of their claim and to every
/// imputed inpatient row, so duplicated join rows count the way a relational
/// join would. Claims without a facility row are dropped.
pub fn prepare_claims(tables: &CostTables, sample_rows: Option<usize>) -> Vec<PreparedClaim> {
    let mut facilities: HashMap<String, Vec<String>> = HashMap::new();
    for idx in 0..tables.facilities.height() {
        facilities
            .entry(column_value_string(&tables.facilities, "claim_id", idx))
            .or_default()
            .push(column_value_string(&tables.facilities, "fasc_cat", idx));
    }
    let mut imputed: HashMap<String, Vec<Option<f64>>> = HashMap::new();
    for idx in 0..tables.inpatient.height() {
        imputed
            .entry(column_value_string(&tables.inpatient, "claim_id", idx))
            .or_default()
            .push(parse_f64(&column_value_string(&tables.inpatient, "allowed_amount", idx)));
    }

    let mut grouped: BTreeMap<(String, String, String), ClaimAccumulator> = BTreeMap::new();
    let claims = &tables.claims;
    for idx in 0..claims.height() {
        let claim_id = column_value_string(claims, "claim_id", idx);
        let Some(categories) = facilities.get(&claim_id) else {
            continue;
        };
        let member_id = column_value_string(claims, "member_id", idx);
        let from_date = parse_date(&column_value_string(claims, "from_date", idx));
        let amount = parse_f64(&column_value_string(claims, "allowed_amt", idx));
        let imputed_rows = imputed.get(&claim_id).map_or(NO_IMPUTED, Vec::as_slice);

        for fasc_cat in categories {
            let entry = grouped
                .entry((claim_id.clone(), member_id.clone(), fasc_cat.clone()))
                .or_default();
            entry.from_date = entry.from_date.max(from_date);
            for imputed_amount in imputed_rows {
                add(&mut entry.line_total, amount);
                keep_max(&mut entry.imputed_max, *imputed_amount);
            }
        }
    }

    let limit = sample_rows.unwrap_or(usize::MAX);
    grouped
        .into_iter()
        .take(limit)
        .map(|((claim_id, member_id, fasc_cat), acc)| {
            let category = CostCategory::from_facility(&fasc_cat);
            let allowed_amt = match category {
                CostCategory::Inpatient => acc.imputed_max,
                _ => acc.line_total,
            };
            PreparedClaim {
                claim_id,
                member_id,
                from_date: acc.from_date,
                allowed_amt,
                category,
            }
        })
        .collect()
}

/// Reads enrollment rows as months.
pub fn enrollment_months(df: &DataFrame) -> Vec<EnrollmentMonth> {
    (0..df.height())
        .map(|idx| EnrollmentMonth {
            member_id: column_value_string(df, "member_id", idx),
            month: parse_date(&column_value_string(df, "begin_date", idx)).map(month_key),
            medical_flag: column_value_string(df, "medical_flag", idx),
            dual_flag: column_value_string(df, "dual_flag", idx),
        })
        .collect()
}

/// Cost and enrollment of one member under a filter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MemberCost {
    pub cost: Option<f64>,
    pub months: usize,
}

impl MemberCost {
    pub fn n_year(&self) -> f64 {
        self.months as f64 / 12.0
    }
}

/// Per-member cost over the enrollment months of `members` that pass the
/// flag filters. Every kept month counts towards the member's years, with or
/// without claims.
pub fn member_costs(
    data: &CostData,
    members: &BTreeSet<&str>,
    filter: &CostFilter,
) -> BTreeMap<String, MemberCost> {
    let mut monthly: HashMap<(&str, String), Option<f64>> = HashMap::new();
    for claim in data.claims.iter().filter(|c| filter.covers(c.category)) {
        let Some(date) = claim.from_date else {
            continue;
        };
        let entry = monthly
            .entry((claim.member_id.as_str(), month_key(date)))
            .or_default();
        add(entry, claim.allowed_amt);
    }

    let mut costs: BTreeMap<String, MemberCost> = BTreeMap::new();
    for row in &data.enrollment {
        if !members.contains(row.member_id.as_str())
            || !filter.medical.matches(&row.medical_flag)
            || !filter.dual.matches(&row.dual_flag)
        {
            continue;
        }
        let member = costs.entry(row.member_id.clone()).or_default();
        member.months += 1;
        if let Some(month) = &row.month {
            let amount = monthly
                .get(&(row.member_id.as_str(), month.clone()))
                .copied()
                .flatten();
            add(&mut member.cost, amount);
        }
    }
    costs
}

#[derive(Default)]
struct StageTotals {
    total_cost: Option<f64>,
    n_year: f64,
}

fn money(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

/// Total cost, beneficiary years and cost per beneficiary year for each
/// value of every stage variable, over adult members.
///
/// The claims stage only counts members with CKD and without ESRD.
pub fn cost_by_stage(
    frame: &DataFrame,
    data: &CostData,
    filter: &CostFilter,
    adult_age: i64,
) -> Result<ReportTable> {
    let ids = column_values(frame, col::MEMBER_ID).ok_or_else(|| ReportError::MissingColumn {
        column: col::MEMBER_ID.to_string(),
    })?;
    let adult_rows = filtered_rows(frame, MemberFilter::Adults, adult_age)?;
    let adults: BTreeSet<&str> = adult_rows.iter().map(|&idx| ids[idx].as_str()).collect();
    let rows: HashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(idx, id)| (id.as_str(), idx))
        .collect();
    let costs = member_costs(data, &adults, filter);

    let no_esrd = frame
        .column(col::CKD_NO_ESRD_FLAG)
        .map_err(|_| ReportError::MissingColumn {
            column: col::CKD_NO_ESRD_FLAG.to_string(),
        })?;

    let mut table = ReportTable::new(["STAGE_VAR", "STAGE", "TOTAL_COST", "N_YEAR", "COST_PER_BENE_YR"]);
    for var in COST_STAGE_VARS {
        let stages = frame.column(var).map_err(|_| ReportError::MissingColumn {
            column: var.to_string(),
        })?;
        let mut totals: BTreeMap<GroupKey, StageTotals> = BTreeMap::new();
        for (member, cost) in &costs {
            let Some(&idx) = rows.get(member.as_str()) else {
                continue;
            };
            if var == col::CKD_STAGE_CLAIMS && any_to_i64(no_esrd.get(idx)?) != Some(1) {
                continue;
            }
            let entry = totals.entry(GroupKey::from_any(stages.get(idx)?)).or_default();
            add(&mut entry.total_cost, cost.cost);
            entry.n_year += cost.n_year();
        }
        for (stage, totals) in totals {
            let per_year = totals
                .total_cost
                .filter(|_| totals.n_year > 0.0)
                .map(|total| total / totals.n_year);
            table.push_row(vec![
                var.to_string(),
                stage.render(),
                money(totals.total_cost),
                format!("{:.2}", totals.n_year),
                money(per_year),
            ]);
        }
    }
    Ok(table)
}
