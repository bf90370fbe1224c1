//! Stage reconciliation: picks one authoritative stage per member from the
//! lab and claims stages, then buckets it into the reported taxonomies.
//!
//! Source precedence, evaluated in order:
//!
//! 1. lab, when the lab date is later than the claims date, or when the
//!    claims carry no specific stage (absent, no code, unspecified stage 3)
//!    while a lab stage exists;
//! 2. claim, when the claims date is on or after the lab date, or when the
//!    claims carry a stage (unspecified included) and there is no lab stage;
//! 3. no source.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use ckd_model::{
    ClaimsResolution, ClaimsStage, CollapsedCategory, FiveCategory, LabResolution, MemberFlags,
    MemberId, MemberStage, RecentSource, Stage, StageCategory, StageValue,
};

/// Chooses the source whose stage is authoritative.
pub fn recent_source(
    lab_date: Option<NaiveDate>,
    lab_stage: Option<Stage>,
    claims_date: Option<NaiveDate>,
    claims_stage: ClaimsStage,
) -> Option<RecentSource> {
    let claims_unstaged = matches!(
        claims_stage,
        ClaimsStage::Absent | ClaimsStage::NoCode | ClaimsStage::Stage3Unspecified
    );
    let lab_later = matches!((lab_date, claims_date), (Some(lab), Some(claims)) if lab > claims);
    if lab_later || (claims_unstaged && lab_stage.is_some()) {
        return Some(RecentSource::Lab);
    }

    let claims_later =
        matches!((lab_date, claims_date), (Some(lab), Some(claims)) if claims >= lab);
    if claims_later || (claims_stage.is_present() && lab_stage.is_none()) {
        return Some(RecentSource::Claim);
    }
    None
}

/// The winning source's detailed stage.
pub fn reconciled_stage(
    source: Option<RecentSource>,
    lab_stage: Option<Stage>,
    claims_stage: ClaimsStage,
) -> StageValue {
    match source {
        Some(RecentSource::Lab) => lab_stage.map_or(StageValue::Unknown, StageValue::Staged),
        Some(RecentSource::Claim) => StageValue::from(claims_stage),
        None => StageValue::Unknown,
    }
}

/// Claims stage label of a member, distinguishing condition history
/// without a dated diagnosis from no history at all.
pub fn claims_stage(claims: Option<&ClaimsResolution>, ckd_ccw_flag: bool) -> ClaimsStage {
    match claims {
        Some(claims) => claims.dx_code.claims_stage(),
        None if ckd_ccw_flag => ClaimsStage::NoCode,
        None => ClaimsStage::Absent,
    }
}

/// All-categories view. The first matching rule wins.
pub fn categorize_all(
    flags: &MemberFlags,
    lab_stage: Option<Stage>,
    claims_stage: ClaimsStage,
    ckd_stage: StageValue,
) -> StageCategory {
    let ckd = flags.ckd_indicator();
    if flags.esrd_flag {
        return StageCategory::Esrd;
    }
    if ckd && !claims_stage.is_present() && lab_stage.is_none() {
        return StageCategory::StageUnknown;
    }
    match ckd_stage.stage() {
        Some(stage @ (Stage::Stage5 | Stage::Stage4 | Stage::Stage3b | Stage::Stage3a)) if ckd => {
            return StageCategory::Staged(stage);
        }
        Some(stage @ (Stage::Stage2 | Stage::Stage1)) => return StageCategory::Staged(stage),
        _ => {}
    }
    if ckd && claims_stage == ClaimsStage::Stage3Unspecified {
        return StageCategory::Stage3Unspecified;
    }
    match (ckd, flags.denom_flag) {
        (false, false) => StageCategory::NoCkdOutsideDenominator,
        (false, true) => StageCategory::NoCkdInDenominator,
        _ => StageCategory::Unclassified,
    }
}

/// Five-category view keeping unspecified stage 3 apart. Stages 1 and 2
/// only count when the claims source won.
pub fn categorize_w3unsp(
    flags: &MemberFlags,
    lab_stage: Option<Stage>,
    claims_stage: ClaimsStage,
    source: Option<RecentSource>,
    ckd_stage: StageValue,
) -> FiveCategory {
    let ckd = flags.ckd_indicator();
    if flags.esrd_flag || (ckd && ckd_stage == StageValue::Staged(Stage::Stage5)) {
        return FiveCategory::Stage5OrEsrd;
    }
    let lab_low_or_none = matches!(lab_stage, None | Some(Stage::Stage1 | Stage::Stage2));
    if ckd && !claims_stage.is_present() && lab_low_or_none {
        return FiveCategory::StageUnknown;
    }
    match ckd_stage.stage() {
        Some(stage @ (Stage::Stage4 | Stage::Stage3b | Stage::Stage3a)) if ckd => {
            return FiveCategory::Staged(stage);
        }
        Some(stage @ (Stage::Stage2 | Stage::Stage1)) if source == Some(RecentSource::Claim) => {
            return FiveCategory::Staged(stage);
        }
        _ => {}
    }
    if ckd && claims_stage == ClaimsStage::Stage3Unspecified && lab_stage.is_none() {
        return FiveCategory::Stage3Unspecified;
    }
    FiveCategory::NoCkd
}

/// Collapses the all-categories view: ESRD with stage 5, unknown with
/// unspecified, and both no-CKD variants.
pub fn collapse_5andesrd(category: StageCategory) -> CollapsedCategory {
    match category {
        StageCategory::Esrd | StageCategory::Staged(Stage::Stage5) => {
            CollapsedCategory::Stage5OrEsrd
        }
        StageCategory::StageUnknown | StageCategory::Stage3Unspecified => {
            CollapsedCategory::UnknownOrUnspecified
        }
        StageCategory::NoCkdOutsideDenominator | StageCategory::NoCkdInDenominator => {
            CollapsedCategory::NoCkd
        }
        StageCategory::Staged(stage) => CollapsedCategory::Staged(stage),
        StageCategory::Unclassified => CollapsedCategory::Unclassified,
    }
}

/// Collapses the five-category view: no CKD with stages 1 and 2, unknown
/// with unspecified.
pub fn collapse_5cat(category: FiveCategory) -> CollapsedCategory {
    match category {
        FiveCategory::NoCkd | FiveCategory::Staged(Stage::Stage1 | Stage::Stage2) => {
            CollapsedCategory::LowSeverityOrNoCkd
        }
        FiveCategory::Stage3Unspecified | FiveCategory::StageUnknown => {
            CollapsedCategory::UnknownOrUnspecified
        }
        FiveCategory::Stage5OrEsrd => CollapsedCategory::Stage5OrEsrd,
        FiveCategory::Staged(stage) => CollapsedCategory::Staged(stage),
    }
}

/// Reconciles one member.
pub fn reconcile_member(
    flags: MemberFlags,
    lab: Option<LabResolution>,
    claims: Option<ClaimsResolution>,
) -> MemberStage {
    let lab_stage = lab.as_ref().and_then(LabResolution::stage);
    let claims_stage = claims_stage(claims.as_ref(), flags.ckd_ccw_flag);
    let source = recent_source(
        lab.map(|lab| lab.date),
        lab_stage,
        claims.map(|claims| claims.date),
        claims_stage,
    );
    let ckd_stage = reconciled_stage(source, lab_stage, claims_stage);
    let comb_all = categorize_all(&flags, lab_stage, claims_stage, ckd_stage);
    let comb_w3unsp = categorize_w3unsp(&flags, lab_stage, claims_stage, source, ckd_stage);

    MemberStage {
        flags,
        lab,
        claims,
        lab_stage,
        claims_stage,
        recent_source: source,
        ckd_stage,
        comb_all,
        comb_w3unsp,
        comb_5andesrd: collapse_5andesrd(comb_all),
        comb_5cat: collapse_5cat(comb_w3unsp),
    }
}

/// Reconciles every member of the universe. Resolutions for members
/// outside the universe are dropped.
pub fn reconcile_members(
    members: Vec<MemberFlags>,
    labs: &BTreeMap<MemberId, LabResolution>,
    claims: &BTreeMap<MemberId, ClaimsResolution>,
) -> Vec<MemberStage> {
    members
        .into_iter()
        .map(|flags| {
            let lab = labs.get(&flags.member_id).copied();
            let claims = claims.get(&flags.member_id).copied();
            reconcile_member(flags, lab, claims)
        })
        .collect()
}
