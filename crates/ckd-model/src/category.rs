//! Reconciled category taxonomies reported per member.
//!
//! Every taxonomy has an explicit unclassified value rendered as the empty
//! string, so unexpected flag combinations surface in the report instead of
//! failing the run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Stage;

/// Which source supplied the reconciled stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecentSource {
    Lab,
    Claim,
}

impl RecentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            RecentSource::Lab => "lab",
            RecentSource::Claim => "claim",
        }
    }

    /// Label of an optional source; no source reads as the empty string.
    pub fn label(source: Option<RecentSource>) -> &'static str {
        source.map_or("", RecentSource::as_str)
    }
}

impl fmt::Display for RecentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All-categories view (`ckd_stage_comb_all`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageCategory {
    Esrd,
    StageUnknown,
    Staged(Stage),
    Stage3Unspecified,
    NoCkdOutsideDenominator,
    NoCkdInDenominator,
    Unclassified,
}

impl StageCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            StageCategory::Esrd => "ESRD",
            StageCategory::StageUnknown => "CKD, stage unknown",
            StageCategory::Staged(stage) => stage.as_str(),
            StageCategory::Stage3Unspecified => "CKD, stage 3 unspecified",
            StageCategory::NoCkdOutsideDenominator => "No lab or claim for CKD, not in denominator",
            StageCategory::NoCkdInDenominator => "No lab or claim for CKD, in denominator",
            StageCategory::Unclassified => "",
        }
    }
}

impl fmt::Display for StageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Five-category view keeping unspecified stage 3 apart (`ckd_stage_comb_w3unsp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FiveCategory {
    Stage5OrEsrd,
    StageUnknown,
    Staged(Stage),
    Stage3Unspecified,
    NoCkd,
}

impl FiveCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FiveCategory::Stage5OrEsrd => "stage 5/ESRD",
            FiveCategory::StageUnknown => "CKD, stage unknown",
            FiveCategory::Staged(stage) => stage.as_str(),
            FiveCategory::Stage3Unspecified => "stage 3 unspecified",
            FiveCategory::NoCkd => "No lab or claim for CKD",
        }
    }
}

impl fmt::Display for FiveCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collapsed views derived from the two taxonomies above
/// (`ckd_stage_comb_5andesrd` and `ckd_stage_comb_5cat`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollapsedCategory {
    Stage5OrEsrd,
    UnknownOrUnspecified,
    Staged(Stage),
    NoCkd,
    LowSeverityOrNoCkd,
    Unclassified,
}

impl CollapsedCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            CollapsedCategory::Stage5OrEsrd => "stage 5/ESRD",
            CollapsedCategory::UnknownOrUnspecified => "CKD, stage unknown/unspecified",
            CollapsedCategory::Staged(stage) => stage.as_str(),
            CollapsedCategory::NoCkd => "No lab or claim for CKD",
            CollapsedCategory::LowSeverityOrNoCkd => "stage 1, stage 2, or no CKD",
            CollapsedCategory::Unclassified => "",
        }
    }
}

impl fmt::Display for CollapsedCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
