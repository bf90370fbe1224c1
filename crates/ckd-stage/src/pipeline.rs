//! Staging run: member universe, both resolvers and the reconciler.

use std::time::Instant;

use polars::prelude::DataFrame;
use tracing::{debug, info, info_span, warn};

use ckd_common::redact_value;
use ckd_ingest::Session;
use ckd_model::{AnalysisYear, CollapsedCategory, MemberStage, PipelineConfig, StageCategory};

use crate::claims::{extract_diagnoses, resolve_claims};
use crate::error::Result;
use crate::frame::member_frame;
use crate::lab::{extract_labs, resolve_labs};
use crate::members::{MemberTables, build_members, ckd_lab_with_esrd};
use crate::reconcile::reconcile_members;

/// Counts describing one staging run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingSummary {
    pub members: usize,
    pub lab_staged: usize,
    pub claims_staged: usize,
    pub disambiguated: usize,
    pub unclassified: usize,
    /// Members flagged as CKD from labs who also have ESRD.
    pub ckd_lab_with_esrd: usize,
}

/// Output of a staging run.
#[derive(Debug, Clone)]
pub struct StagingRun {
    pub members: Vec<MemberStage>,
    /// The member table, in member order.
    pub frame: DataFrame,
    pub summary: StagingSummary,
}

/// Stages every enrolled member for `year`.
pub fn stage_members(
    session: &mut Session,
    year: AnalysisYear,
    config: &PipelineConfig,
) -> Result<StagingRun> {
    let span = info_span!("staging", year = %year);
    let _guard = span.enter();
    let start = Instant::now();

    let labs = info_span!("lab_extract").in_scope(|| -> Result<_> {
        let extract = extract_labs(session, year, config)?;
        info!(
            rows = extract.observations.len(),
            skipped = extract.skipped,
            unparsable_numeric = extract.unparsable_numeric,
            "labs extracted"
        );
        Ok(extract)
    })?;

    let tables = info_span!("member_universe").in_scope(|| MemberTables::fetch(session, year))?;
    let members = build_members(&tables, &labs.observations, config);
    let ckd_lab_with_esrd = ckd_lab_with_esrd(&members);

    let lab_stages = info_span!("lab_resolve").in_scope(|| resolve_labs(&labs.observations));

    let claims = info_span!("claims").in_scope(|| -> Result<_> {
        let extract = extract_diagnoses(session, year)?;
        if extract.undated > 0 {
            warn!(rows = extract.undated, "diagnoses without a claim header date");
        }
        resolve_claims(&extract.records, config.stage3_fallback)
    })?;

    let staged = info_span!("reconcile")
        .in_scope(|| reconcile_members(members, &lab_stages, &claims.resolutions));
    let frame = member_frame(&staged)?;

    let mut unclassified = 0;
    for member in staged.iter().filter(|m| {
        m.comb_all == StageCategory::Unclassified
            || m.comb_5andesrd == CollapsedCategory::Unclassified
    }) {
        unclassified += 1;
        debug!(
            member_id = redact_value(member.flags.member_id.as_str()),
            ckd_stage = %member.ckd_stage,
            "unclassified member"
        );
    }
    if unclassified > 0 {
        warn!(members = unclassified, "members matched no stage category");
    }

    let summary = StagingSummary {
        members: staged.len(),
        lab_staged: staged.iter().filter(|m| m.lab_stage.is_some()).count(),
        claims_staged: staged.iter().filter(|m| m.claims.is_some()).count(),
        disambiguated: claims.disambiguated,
        unclassified,
        ckd_lab_with_esrd,
    };
    info!(
        members = summary.members,
        lab_staged = summary.lab_staged,
        claims_staged = summary.claims_staged,
        disambiguated = summary.disambiguated,
        duration_ms = start.elapsed().as_millis(),
        "staging complete"
    );

    Ok(StagingRun {
        members: staged,
        frame,
        summary,
    })
}
