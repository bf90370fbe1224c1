//! Claims diagnosis extraction and the claims stage resolver.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use tracing::debug;

use ckd_common::{column_value_string, parse_date};
use ckd_ingest::{Query, Session, TableRef};
use ckd_model::{
    AnalysisYear, ClaimsResolution, DiagnosisRecord, DxCode, MemberId, QUALIFYING_DX_CODES,
    Stage3Fallback,
};

use crate::error::{Result, StageError};

pub const DX_TABLE_PREFIX: &str = "claims_dx_long";
pub const CLAIM_HEADER_TABLE: &str = "claim_headers";

/// Qualifying diagnoses for one run.
#[derive(Debug, Clone, Default)]
pub struct DiagnosisExtract {
    pub records: Vec<DiagnosisRecord>,
    /// Diagnoses whose claim has no header date.
    pub undated: usize,
}

/// Claims stages of every member with a dated qualifying diagnosis.
#[derive(Debug, Clone, Default)]
pub struct ClaimsStages {
    pub resolutions: BTreeMap<MemberId, ClaimsResolution>,
    /// Members whose unspecified stage 3 was replaced by a sub-code.
    pub disambiguated: usize,
}

/// Queries qualifying diagnoses from the analysis and prior year and dates
/// them from the claim headers.
pub fn extract_diagnoses(session: &mut Session, year: AnalysisYear) -> Result<DiagnosisExtract> {
    let mut frames = Vec::with_capacity(2);
    for table_year in [year.value(), year.prior().value()] {
        let query = Query::new(TableRef::for_year(DX_TABLE_PREFIX, table_year)?)
            .select(&["member_id", "claim_id", "dx_code"])
            .is_in("dx_code", QUALIFYING_DX_CODES);
        frames.push(session.fetch(&query)?);
    }
    let headers = session.fetch(
        &Query::new(TableRef::new(CLAIM_HEADER_TABLE)?).select(&["claim_id", "from_date"]),
    )?;
    diagnoses_from_frames(&frames, &headers)
}

/// Unions diagnosis rows (dropping exact duplicates) and left joins each
/// row to its claim header dates.
pub fn diagnoses_from_frames(
    dx_frames: &[DataFrame],
    headers: &DataFrame,
) -> Result<DiagnosisExtract> {
    let mut header_dates: HashMap<String, Vec<Option<NaiveDate>>> = HashMap::new();
    for idx in 0..headers.height() {
        let claim_id = column_value_string(headers, "claim_id", idx);
        if claim_id.is_empty() {
            continue;
        }
        header_dates
            .entry(claim_id)
            .or_default()
            .push(parse_date(&column_value_string(headers, "from_date", idx)));
    }

    let mut seen: BTreeSet<(String, String, String)> = BTreeSet::new();
    let mut extract = DiagnosisExtract::default();
    for df in dx_frames {
        for idx in 0..df.height() {
            let key = (
                column_value_string(df, "member_id", idx),
                column_value_string(df, "claim_id", idx),
                column_value_string(df, "dx_code", idx),
            );
            if !seen.insert(key.clone()) {
                continue;
            }
            let (member, claim_id, code) = key;
            let Ok(member_id) = MemberId::new(member) else {
                continue;
            };
            let dx_code = DxCode::from_code(&code)?;
            let dates = header_dates
                .get(&claim_id)
                .map_or_else(|| vec![None], Clone::clone);
            for claim_date in dates {
                if claim_date.is_none() {
                    extract.undated += 1;
                }
                extract.records.push(DiagnosisRecord {
                    member_id: member_id.clone(),
                    claim_id: claim_id.clone(),
                    dx_code,
                    claim_date,
                });
            }
        }
    }
    Ok(extract)
}

/// Picks each member's representative diagnosis: the highest code on the
/// latest dated diagnosis, with unspecified stage 3 replaced by a 3a/3b
/// sub-code when one is available under `fallback`.
///
/// Undated diagnoses cannot be ranked and are ignored.
pub fn resolve_claims(records: &[DiagnosisRecord], fallback: Stage3Fallback) -> Result<ClaimsStages> {
    let mut history: BTreeMap<&MemberId, Vec<(NaiveDate, DxCode)>> = BTreeMap::new();
    for record in records {
        if let Some(date) = record.claim_date {
            history
                .entry(&record.member_id)
                .or_default()
                .push((date, record.dx_code));
        }
    }

    let latest: BTreeMap<&MemberId, (NaiveDate, DxCode)> = history
        .iter()
        .filter_map(|(member_id, rows)| latest_highest(rows).map(|row| (*member_id, row)))
        .collect();

    let mut relabeled: Vec<(&MemberId, ClaimsResolution)> = Vec::with_capacity(latest.len());
    let mut disambiguated = 0;
    for (member_id, (date, dx_code)) in &latest {
        let mut resolution = ClaimsResolution {
            date: *date,
            dx_code: *dx_code,
            disambiguated: false,
        };
        if *dx_code == DxCode::Stage3Unspecified {
            let rows = history.get(member_id).map_or(&[][..], Vec::as_slice);
            if let Some((sub_date, sub_code)) = specific_stage3(rows, fallback) {
                resolution = ClaimsResolution {
                    date: sub_date,
                    dx_code: sub_code,
                    disambiguated: true,
                };
                disambiguated += 1;
            }
        }
        relabeled.push((*member_id, resolution));
    }

    let resolutions: BTreeMap<MemberId, ClaimsResolution> = relabeled
        .into_iter()
        .map(|(member_id, resolution)| (member_id.clone(), resolution))
        .collect();
    ensure_same_members(
        records
            .iter()
            .filter(|record| record.claim_date.is_some())
            .map(|record| &record.member_id),
        &resolutions,
    )?;

    debug!(
        members = resolutions.len(),
        disambiguated, "claims stages resolved"
    );
    Ok(ClaimsStages {
        resolutions,
        disambiguated,
    })
}

/// Latest date, then the highest code on that date.
fn latest_highest(rows: &[(NaiveDate, DxCode)]) -> Option<(NaiveDate, DxCode)> {
    rows.iter().copied().max()
}

/// The 3a/3b sub-code replacing an unspecified stage 3 representative.
///
/// Sub-codes on the representative's own date would have outranked it, so
/// only earlier diagnoses are candidates.
fn specific_stage3(
    rows: &[(NaiveDate, DxCode)],
    fallback: Stage3Fallback,
) -> Option<(NaiveDate, DxCode)> {
    match fallback {
        Stage3Fallback::SameDayOnly => None,
        Stage3Fallback::MostRecentSpecific => rows
            .iter()
            .copied()
            .filter(|(_, code)| code.is_specific_stage3())
            .max(),
    }
}

/// Every member with a dated diagnosis keeps exactly one claims stage.
pub fn ensure_same_members<'a>(
    dated: impl IntoIterator<Item = &'a MemberId>,
    resolutions: &BTreeMap<MemberId, ClaimsResolution>,
) -> Result<()> {
    let dated: BTreeSet<&MemberId> = dated.into_iter().collect();
    let same = dated.len() == resolutions.len()
        && dated.iter().all(|member_id| resolutions.contains_key(*member_id));
    if same {
        Ok(())
    } else {
        Err(StageError::DisambiguationRowCount {
            before: dated.len(),
            after: resolutions.len(),
        })
    }
}
