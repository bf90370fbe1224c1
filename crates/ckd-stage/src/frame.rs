//! The reconciled member table (`final_flags`) as a Polars DataFrame.
//!
//! Flags are 0/1 integers, stage and category labels are strings (empty for
//! none) and dates are ISO strings.

use polars::prelude::*;

use ckd_model::{MemberStage, RecentSource, Stage, lab_stage_label};

use crate::error::Result;

/// Column names of the member table.
pub mod col {
    pub const MEMBER_ID: &str = "member_id";
    pub const DENOM_FLAG: &str = "denom_flag";
    pub const CKD_LAB_FLAG: &str = "ckd_lab_flag";
    pub const CKD_LAB_FLAG_2LABS: &str = "ckd_lab_flag_2labs";
    pub const CKD_NO_ESRD_LAB_FLAG: &str = "ckd_no_esrd_lab_flag";
    pub const CKD_NO_ESRD_FLAG: &str = "ckd_no_esrd_flag";
    pub const CKD_CCW_FLAG: &str = "ckd_ccw_flag";
    pub const ESRD_FLAG: &str = "esrd_flag";
    pub const AKI_FLAG_CURRENT: &str = "aki_flag_current";
    pub const AKI_FLAG_PRIOR: &str = "aki_flag_prior";
    pub const AGE: &str = "age";
    pub const CKD_STAGE_LAB: &str = "ckd_stage_lab";
    pub const CKD_STAGE_LAB_DETAILED: &str = "ckd_stage_lab_detailed";
    pub const CKD_STAGE_CLAIMS: &str = "ckd_stage_claims";
    pub const CKD_STAGE_CLAIMS_DATE: &str = "ckd_stage_claims_date";
    pub const CKD_STAGE_LAB_DATE: &str = "ckd_stage_lab_date";
    pub const RECENT_STAGE: &str = "recent_stage";
    pub const CKD_STAGE: &str = "ckd_stage";
    pub const CKD_CCW_LAB_FLAG: &str = "ckd_ccw_lab_flag";
    pub const CKD_STAGE_COMB_ALL: &str = "ckd_stage_comb_all";
    pub const CKD_STAGE_COMB_W3UNSP: &str = "ckd_stage_comb_w3unsp";
    pub const CKD_STAGE_COMB_5ANDESRD: &str = "ckd_stage_comb_5andesrd";
    pub const CKD_STAGE_COMB_5CAT: &str = "ckd_stage_comb_5cat";
    pub const LAB_RESULT: &str = "lab_result";
    pub const N_LABS: &str = "n_labs";
}

fn flag_column(name: &str, members: &[MemberStage], get: impl Fn(&MemberStage) -> bool) -> Column {
    let values: Vec<i32> = members.iter().map(|m| i32::from(get(m))).collect();
    Series::new(name.into(), values).into()
}

fn label_column(
    name: &str,
    members: &[MemberStage],
    get: impl Fn(&MemberStage) -> &'static str,
) -> Column {
    let values: Vec<&str> = members.iter().map(get).collect();
    Series::new(name.into(), values).into()
}

fn date_column(
    name: &str,
    members: &[MemberStage],
    get: impl Fn(&MemberStage) -> Option<chrono::NaiveDate>,
) -> Column {
    let values: Vec<Option<String>> = members
        .iter()
        .map(|m| get(m).map(|date| date.format("%Y-%m-%d").to_string()))
        .collect();
    Series::new(name.into(), values).into()
}

/// Builds the member table, one row per member in the given order.
pub fn member_frame(members: &[MemberStage]) -> Result<DataFrame> {
    let ids: Vec<&str> = members.iter().map(|m| m.member_id().as_str()).collect();
    let ages: Vec<Option<i64>> = members.iter().map(|m| m.flags.age).collect();
    let lab_results: Vec<Option<f64>> = members.iter().map(|m| m.lab.map(|lab| lab.value)).collect();
    let n_labs: Vec<Option<u32>> = members
        .iter()
        .map(|m| m.lab.map(|lab| u32::try_from(lab.n_labs).unwrap_or(u32::MAX)))
        .collect();

    let df = DataFrame::new(vec![
        Series::new(col::MEMBER_ID.into(), ids).into(),
        flag_column(col::DENOM_FLAG, members, |m| m.flags.denom_flag),
        flag_column(col::CKD_LAB_FLAG, members, |m| m.flags.ckd_lab_flag),
        flag_column(col::CKD_LAB_FLAG_2LABS, members, |m| {
            m.flags.ckd_lab_flag_2labs
        }),
        flag_column(col::CKD_NO_ESRD_LAB_FLAG, members, |m| {
            m.flags.ckd_no_esrd_lab_flag
        }),
        flag_column(col::CKD_NO_ESRD_FLAG, members, |m| m.flags.ckd_no_esrd_flag),
        flag_column(col::CKD_CCW_FLAG, members, |m| m.flags.ckd_ccw_flag),
        flag_column(col::ESRD_FLAG, members, |m| m.flags.esrd_flag),
        flag_column(col::AKI_FLAG_CURRENT, members, |m| m.flags.aki_flag_current),
        flag_column(col::AKI_FLAG_PRIOR, members, |m| m.flags.aki_flag_prior),
        Series::new(col::AGE.into(), ages).into(),
        label_column(col::CKD_STAGE_LAB, members, |m| {
            m.lab_stage.map_or("0", Stage::coarse_label)
        }),
        label_column(col::CKD_STAGE_LAB_DETAILED, members, |m| {
            lab_stage_label(m.lab_stage)
        }),
        label_column(col::CKD_STAGE_CLAIMS, members, |m| m.claims_stage.as_str()),
        date_column(col::CKD_STAGE_CLAIMS_DATE, members, MemberStage::claims_date),
        date_column(col::CKD_STAGE_LAB_DATE, members, MemberStage::lab_date),
        label_column(col::RECENT_STAGE, members, |m| {
            RecentSource::label(m.recent_source)
        }),
        label_column(col::CKD_STAGE, members, |m| m.ckd_stage.as_str()),
        flag_column(col::CKD_CCW_LAB_FLAG, members, |m| m.flags.ckd_indicator()),
        label_column(col::CKD_STAGE_COMB_ALL, members, |m| m.comb_all.as_str()),
        label_column(col::CKD_STAGE_COMB_W3UNSP, members, |m| {
            m.comb_w3unsp.as_str()
        }),
        label_column(col::CKD_STAGE_COMB_5ANDESRD, members, |m| {
            m.comb_5andesrd.as_str()
        }),
        label_column(col::CKD_STAGE_COMB_5CAT, members, |m| m.comb_5cat.as_str()),
        Series::new(col::LAB_RESULT.into(), lab_results).into(),
        Series::new(col::N_LABS.into(), n_labs).into(),
    ])?;
    Ok(df)
}
