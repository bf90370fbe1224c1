//! Row-level records passed between pipeline stages.

use chrono::NaiveDate;

use crate::{
    ClaimsStage, CollapsedCategory, DxCode, FiveCategory, MemberId, RecentSource, Stage,
    StageCategory, StageValue,
};

/// One lab observation for the configured test code.
#[derive(Debug, Clone, PartialEq)]
pub struct LabObservation {
    pub member_id: MemberId,
    pub test_code: String,
    pub service_date: NaiveDate,
    /// The numeric result field, `None` for the `NULL` sentinel.
    pub numeric_result: Option<f64>,
    pub text_result: Option<String>,
    /// Normalized comparable result.
    pub all_results: Option<f64>,
}

/// One qualifying diagnosis on a claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisRecord {
    pub member_id: MemberId,
    pub claim_id: String,
    pub dx_code: DxCode,
    /// Claim from-date; `None` when the claim has no header.
    pub claim_date: Option<NaiveDate>,
}

/// Representative lab result of a member.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabResolution {
    pub date: NaiveDate,
    /// Lowest result on `date`.
    pub value: f64,
    /// Distinct results on `date`.
    pub n_labs: usize,
}

impl LabResolution {
    pub fn stage(&self) -> Option<Stage> {
        Stage::from_lab_value(self.value)
    }
}

/// Representative diagnosis of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimsResolution {
    pub date: NaiveDate,
    pub dx_code: DxCode,
    /// Set when an unspecified stage 3 was replaced by a 3a/3b sub-code.
    pub disambiguated: bool,
}

/// Enrollment, condition and lab flags of one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberFlags {
    pub member_id: MemberId,
    pub denom_flag: bool,
    pub ckd_lab_flag: bool,
    pub ckd_lab_flag_2labs: bool,
    pub ckd_no_esrd_lab_flag: bool,
    pub ckd_no_esrd_flag: bool,
    pub ckd_ccw_flag: bool,
    pub esrd_flag: bool,
    pub aki_flag_current: bool,
    pub aki_flag_prior: bool,
    pub age: Option<i64>,
}

impl MemberFlags {
    /// A member with every flag cleared.
    pub fn new(member_id: MemberId) -> Self {
        Self {
            member_id,
            denom_flag: false,
            ckd_lab_flag: false,
            ckd_lab_flag_2labs: false,
            ckd_no_esrd_lab_flag: false,
            ckd_no_esrd_flag: false,
            ckd_ccw_flag: false,
            esrd_flag: false,
            aki_flag_current: false,
            aki_flag_prior: false,
            age: None,
        }
    }

    /// CKD from either the condition flag or labs.
    pub fn ckd_indicator(&self) -> bool {
        self.ckd_ccw_flag || self.ckd_lab_flag
    }
}

/// Fully reconciled member row.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberStage {
    pub flags: MemberFlags,
    pub lab: Option<LabResolution>,
    pub claims: Option<ClaimsResolution>,
    pub lab_stage: Option<Stage>,
    pub claims_stage: ClaimsStage,
    pub recent_source: Option<RecentSource>,
    pub ckd_stage: StageValue,
    pub comb_all: StageCategory,
    pub comb_w3unsp: FiveCategory,
    pub comb_5andesrd: CollapsedCategory,
    pub comb_5cat: CollapsedCategory,
}

impl MemberStage {
    pub fn member_id(&self) -> &MemberId {
        &self.flags.member_id
    }

    pub fn lab_date(&self) -> Option<NaiveDate> {
        self.lab.map(|lab| lab.date)
    }

    pub fn claims_date(&self) -> Option<NaiveDate> {
        self.claims.map(|claims| claims.date)
    }
}
