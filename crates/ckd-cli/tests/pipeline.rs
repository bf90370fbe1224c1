//! End-to-end runs over a CSV warehouse.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;

use ckd_cli::pipeline::{RunOptions, load_config, run_csv};
use ckd_model::{AnalysisYear, Stage3Fallback};

const EXTRACTS: [(&str, &str); 11] = [
    (
        "lab_results",
        "member_id,requestcpt,numericresult,textresult,date_servicebegin\n\
         A1,33914-3,50,,2023-04-02\n\
         A1,33914-3,52,,2023-09-10\n\
         A2,1234-5,40,,2023-01-01\n",
    ),
    (
        "enroll_2023",
        "member_id,mhp,begin_date,medical_flag,dual_flag\n\
         A1,AET,2023-01-01,Y,N\n\
         A1,AET,2023-02-01,Y,N\n\
         A2,XXX,2023-01-01,Y,N\n",
    ),
    ("condition_flags_2023", "member_id,ckd,esrd,aki\nA1,1,0,0\n"),
    ("condition_flags_2022", "member_id,aki\nA2,0\n"),
    ("member_2023", "member_id,age\nA1,64\nA2,45\n"),
    ("claims_dx_long_2023", "member_id,claim_id,dx_code\nA2,C1,N184\n"),
    ("claims_dx_long_2022", "member_id,claim_id,dx_code\nA2,C0,N181\n"),
    ("claim_headers", "claim_id,from_date\nC1,2023-03-03\nC0,2022-05-05\n"),
    (
        "claims_2023",
        "claim_id,member_id,from_date,allowed_amt,claim_status\n\
         K1,A1,2023-02-01,120,0\n",
    ),
    ("facility_categories_2023", "claim_id,fasc_cat\nK1,Clinic\n"),
    ("inpatient_imputed_2023", "claim_id,allowed_amount\nK9,500\n"),
];

fn write_warehouse(dir: &Path, skip: Option<&str>) {
    for (table, text) in EXTRACTS {
        if Some(table) != skip {
            fs::write(dir.join(format!("{table}.csv")), text).unwrap();
        }
    }
}

fn options(output: &Path) -> RunOptions {
    RunOptions::new(
        AnalysisYear::parse("2023").unwrap(),
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
    )
    .with_output_dir(output)
}

#[test]
fn test_run_writes_undated_report_and_reruns_identically() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_warehouse(data.path(), None);
    let options = options(output.path()).with_test(true);

    let first = run_csv(data.path(), &options).unwrap();
    assert_eq!(
        first.report_path,
        output.path().join("test_ckd_lab_claims_diagnostics_2023.txt")
    );
    assert_eq!(first.summary.members, 2);
    assert_eq!(first.summary.lab_staged, 1);
    assert_eq!(first.summary.claims_staged, 1);
    assert_eq!(first.summary.ckd_lab_with_esrd, 0);
    assert_eq!(first.tables, 4);
    let first_text = fs::read_to_string(&first.report_path).unwrap();
    assert!(first_text.starts_with("Beneficiaries flagged as CKD from lab data and ESRD: 0\n\n"));
    assert!(first_text.contains("ckd_stage_comb_all for 2023\n"));

    let second = run_csv(data.path(), &options).unwrap();
    assert_eq!(second.report_path, first.report_path);
    assert_eq!(fs::read_to_string(&second.report_path).unwrap(), first_text);
}

#[test]
fn production_run_embeds_the_run_date() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_warehouse(data.path(), None);

    let result = run_csv(data.path(), &options(&output.path().join("nested"))).unwrap();
    assert_eq!(
        result.report_path,
        output
            .path()
            .join("nested")
            .join("ckd_lab_claims_diagnostics_2023_2024-02-01.txt")
    );
    assert!(result.report_path.is_file());
}

#[test]
fn diagnostics_run_adds_the_diagnostic_and_cost_tables() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_warehouse(data.path(), None);

    let result = run_csv(
        data.path(),
        &options(output.path()).with_test(true).with_diagnostics(true),
    )
    .unwrap();
    assert_eq!(result.tables, 43);
    let text = fs::read_to_string(&result.report_path).unwrap();
    assert!(text.contains("Monthly counts of claims and labs in 2023\n"));
    assert!(text.contains("Cost per bene year by stage for clinic FASC category for 2023\n"));
}

#[test]
fn missing_extract_fails_the_run() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_warehouse(data.path(), Some("claim_headers"));

    let err = run_csv(data.path(), &options(output.path())).unwrap_err();
    assert!(format!("{err:#}").contains("claim_headers"));
    assert!(!output.path().join("ckd_lab_claims_diagnostics_2023_2024-02-01.txt").exists());
}

#[test]
fn missing_warehouse_directory_fails_before_staging() {
    let output = tempfile::tempdir().unwrap();
    let err = run_csv(Path::new("/nonexistent/warehouse"), &options(output.path())).unwrap_err();
    assert!(format!("{err:#}").starts_with("open warehouse /nonexistent/warehouse"));
}

#[test]
fn config_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"adult_age": 21, "stage3_fallback": "same_day_only"}"#).unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.adult_age, 21);
    assert_eq!(config.stage3_fallback, Stage3Fallback::SameDayOnly);
    assert_eq!(config.sample_rows, 10_000);
    assert_eq!(load_config(None).unwrap(), ckd_model::PipelineConfig::default());
}
