//! End-to-end staging over an in-memory warehouse.

use std::collections::BTreeSet;

use polars::prelude::*;
use proptest::prelude::*;

use ckd_common::{column_value_string, column_values, parse_date};
use ckd_ingest::{MemoryWarehouse, Session};
use ckd_model::{
    AnalysisYear, DiagnosisRecord, DxCode, MemberId, PipelineConfig, QUALIFYING_DX_CODES,
    Stage3Fallback,
};
use ckd_stage::{col, resolve_claims, stage_members};

fn frame(columns: &[(&str, Vec<&str>)]) -> DataFrame {
    let columns: Vec<Column> = columns
        .iter()
        .map(|(name, values)| Series::new((*name).into(), values.clone()).into())
        .collect();
    DataFrame::new(columns).expect("build frame")
}

fn warehouse() -> MemoryWarehouse {
    MemoryWarehouse::new()
        .with_table(
            "lab_results",
            frame(&[
                ("member_id", vec!["M1", "M1", "M9", "M7"]),
                ("requestcpt", vec!["33914-3", "33914-3", "33914-3", "2160-0"]),
                ("numericresult", vec!["50", "NULL", "20", "10"]),
                ("textresult", vec!["", ">=90", "", ""]),
                (
                    "date_servicebegin",
                    vec!["2023-05-01", "2022-01-01", "2023-01-01", "2023-01-01"],
                ),
            ]),
        )
        .with_table(
            "enroll_2023",
            frame(&[
                ("member_id", vec!["M1", "M2", "M3", "M4", "M5", "M6", "M7", "M1"]),
                ("mhp", vec!["AET", "XXX", "XXX", "BCC", "XXX", "XXX", "XXX", "AET"]),
            ]),
        )
        .with_table(
            "condition_flags_2023",
            frame(&[
                ("member_id", vec!["M1", "M2", "M5", "M6"]),
                ("ckd", vec!["1", "1", "1", "1"]),
                ("esrd", vec!["0", "1", "0", "0"]),
                ("aki", vec!["0", "0", "1", "0"]),
            ]),
        )
        .with_table(
            "condition_flags_2022",
            frame(&[("member_id", vec!["M5"]), ("aki", vec!["1"])]),
        )
        .with_table(
            "member_2023",
            frame(&[
                ("member_id", vec!["M1", "M2", "M3", "M4", "M5", "M6"]),
                ("age", vec!["70", "55", "30", "12", "81", "66"]),
            ]),
        )
        .with_table(
            "claims_dx_long_2023",
            frame(&[
                ("member_id", vec!["M2", "M5", "M5", "M6", "M3"]),
                ("claim_id", vec!["C2", "C5", "C5", "C6", "C3"]),
                ("dx_code", vec!["N185", "N1830", "N1832", "N183", "I10"]),
            ]),
        )
        .with_table(
            "claims_dx_long_2022",
            frame(&[
                ("member_id", vec!["M6"]),
                ("claim_id", vec!["C60"]),
                ("dx_code", vec!["N1831"]),
            ]),
        )
        .with_table(
            "claim_headers",
            frame(&[
                ("claim_id", vec!["C2", "C5", "C6", "C60", "C3"]),
                (
                    "from_date",
                    vec!["2023-02-01", "2023-06-01", "2023-06-01", "2022-03-01", "2023-01-01"],
                ),
            ]),
        )
}

fn run() -> ckd_stage::StagingRun {
    let mut session = Session::open(Box::new(warehouse()));
    let year = AnalysisYear::parse("2023").expect("year");
    let run = stage_members(&mut session, year, &PipelineConfig::default()).expect("stage");
    session.close().expect("close");
    run
}

fn row(df: &DataFrame, member: &str) -> usize {
    column_values(df, col::MEMBER_ID)
        .expect("member ids")
        .iter()
        .position(|id| id == member)
        .expect("member row")
}

#[test]
fn one_row_per_enrolled_member() {
    let run = run();
    let ids = column_values(&run.frame, col::MEMBER_ID).expect("member ids");
    assert_eq!(ids, vec!["M1", "M2", "M3", "M4", "M5", "M6", "M7"]);
    let unique: BTreeSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), run.frame.height());
    assert_eq!(run.summary.members, 7);
}

#[test]
fn categories_per_member() {
    let run = run();
    let df = &run.frame;
    let comb_all = |member: &str| column_value_string(df, col::CKD_STAGE_COMB_ALL, row(df, member));

    assert_eq!(comb_all("M1"), "stage 3a");
    assert_eq!(comb_all("M2"), "ESRD");
    assert_eq!(comb_all("M3"), "No lab or claim for CKD, not in denominator");
    assert_eq!(comb_all("M4"), "No lab or claim for CKD, in denominator");
    assert_eq!(comb_all("M5"), "stage 3b");
    assert_eq!(comb_all("M6"), "stage 3a");
    assert_eq!(comb_all("M7"), "No lab or claim for CKD, not in denominator");

    let m2 = row(df, "M2");
    assert_eq!(column_value_string(df, col::CKD_STAGE_COMB_5ANDESRD, m2), "stage 5/ESRD");
    assert_eq!(column_value_string(df, col::CKD_STAGE_COMB_W3UNSP, m2), "stage 5/ESRD");

    let m6 = row(df, "M6");
    assert_eq!(column_value_string(df, col::CKD_STAGE_CLAIMS, m6), "stage 3a");
    assert_eq!(column_value_string(df, col::CKD_STAGE_CLAIMS_DATE, m6), "2022-03-01");
    assert_eq!(run.summary.disambiguated, 1);
}

#[test]
fn lab_flags_and_stage_dates() {
    let run = run();
    let df = &run.frame;
    let m1 = row(df, "M1");
    assert_eq!(column_value_string(df, col::CKD_LAB_FLAG, m1), "1");
    assert_eq!(column_value_string(df, col::CKD_LAB_FLAG_2LABS, m1), "0");
    assert_eq!(column_value_string(df, col::CKD_STAGE_LAB_DETAILED, m1), "stage 3a");
    assert_eq!(column_value_string(df, col::CKD_STAGE_LAB_DATE, m1), "2023-05-01");
    assert_eq!(column_value_string(df, col::RECENT_STAGE, m1), "lab");
    assert_eq!(column_value_string(df, col::DENOM_FLAG, m1), "1");

    let m7 = row(df, "M7");
    assert_eq!(column_value_string(df, col::CKD_LAB_FLAG, m7), "0");

    let m5 = row(df, "M5");
    assert_eq!(column_value_string(df, col::AKI_FLAG_CURRENT, m5), "1");
    assert_eq!(column_value_string(df, col::AKI_FLAG_PRIOR, m5), "1");
    assert_eq!(run.summary.lab_staged, 1);
    assert_eq!(run.summary.claims_staged, 3);
    assert_eq!(run.summary.unclassified, 0);
}

fn diagnosis_strategy() -> impl Strategy<Value = DiagnosisRecord> {
    (
        0u8..12,
        0usize..QUALIFYING_DX_CODES.len(),
        prop::option::weighted(0.9, 0u32..730),
    )
        .prop_map(|(member, code, day)| {
            let base = parse_date("2022-01-01").expect("base date");
            DiagnosisRecord {
                member_id: MemberId::new(format!("M{member}")).expect("member id"),
                claim_id: format!("C{member}-{code}"),
                dx_code: DxCode::from_code(QUALIFYING_DX_CODES[code]).expect("qualifying code"),
                claim_date: day.map(|day| base + chrono::Days::new(u64::from(day))),
            }
        })
}

proptest! {
    #[test]
    fn disambiguation_preserves_members(records in prop::collection::vec(diagnosis_strategy(), 0..60)) {
        let dated: BTreeSet<&MemberId> = records
            .iter()
            .filter(|record| record.claim_date.is_some())
            .map(|record| &record.member_id)
            .collect();
        for fallback in [Stage3Fallback::MostRecentSpecific, Stage3Fallback::SameDayOnly] {
            let stages = resolve_claims(&records, fallback).expect("resolve claims");
            prop_assert_eq!(stages.resolutions.len(), dated.len());
            for claims in stages.resolutions.values() {
                if claims.disambiguated {
                    prop_assert!(claims.dx_code.is_specific_stage3());
                }
            }
            if fallback == Stage3Fallback::SameDayOnly {
                prop_assert_eq!(stages.disambiguated, 0);
            }
        }
    }
}
