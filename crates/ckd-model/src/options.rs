//! Configuration options for a staging run.

use serde::{Deserialize, Serialize};

/// How a member whose representative diagnosis is unspecified stage 3 is
/// relabeled.
///
/// A 3a/3b code on the member's latest date outranks the unspecified code,
/// so an unspecified representative never shares its date with a sub-code.
/// Only earlier sub-codes can relabel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage3Fallback {
    /// Use the most recent earlier 3a/3b diagnosis, adopting its date.
    #[default]
    MostRecentSpecific,
    /// Ignore earlier sub-codes. Members stay at unspecified stage 3, so
    /// this policy never relabels.
    SameDayOnly,
}

/// Options controlling extraction, staging and tabulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Lab test code of the eGFR observation.
    pub lab_test_code: String,

    /// Numeric results below this value flag a member as CKD from labs.
    pub ckd_lab_threshold: f64,

    /// Minimum days between the first and last CKD-range lab for the two-lab flag.
    pub two_lab_span_days: i64,

    /// Plan codes whose members form the monitored denominator.
    pub denominator_plans: Vec<String>,

    /// Resolution of unspecified stage 3 diagnoses.
    pub stage3_fallback: Stage3Fallback,

    /// Claims kept by the cost pass in sampling mode.
    pub sample_rows: usize,

    /// Minimum age of the adult population used by diagnostics and costs.
    pub adult_age: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lab_test_code: "33914-3".to_string(),
            ckd_lab_threshold: 60.0,
            two_lab_span_days: 90,
            denominator_plans: ["AET", "BCC", "HAP", "MCL", "MER"]
                .into_iter()
                .map(String::from)
                .collect(),
            stage3_fallback: Stage3Fallback::default(),
            sample_rows: 10_000,
            adult_age: 18,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_lab_test_code(mut self, code: impl Into<String>) -> Self {
        self.lab_test_code = code.into();
        self
    }

    #[must_use]
    pub fn with_stage3_fallback(mut self, fallback: Stage3Fallback) -> Self {
        self.stage3_fallback = fallback;
        self
    }

    #[must_use]
    pub fn with_denominator_plans(mut self, plans: Vec<String>) -> Self {
        self.denominator_plans = plans;
        self
    }

    #[must_use]
    pub fn with_sample_rows(mut self, rows: usize) -> Self {
        self.sample_rows = rows;
        self
    }

    /// True when `plan` is one of the denominator plan codes (case-insensitive).
    pub fn is_denominator_plan(&self, plan: &str) -> bool {
        let plan = plan.trim();
        self.denominator_plans
            .iter()
            .any(|code| code.eq_ignore_ascii_case(plan))
    }
}
