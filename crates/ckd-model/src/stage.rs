//! CKD stages and the qualifying diagnosis codes.
//!
//! Variants are declared in severity order, so the derived `Ord` ranks
//! stage 1 lowest and stage 5 highest.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// A specific CKD stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Stage1,
    Stage2,
    Stage3a,
    Stage3b,
    Stage4,
    Stage5,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Stage1,
        Stage::Stage2,
        Stage::Stage3a,
        Stage::Stage3b,
        Stage::Stage4,
        Stage::Stage5,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Stage1 => "stage 1",
            Stage::Stage2 => "stage 2",
            Stage::Stage3a => "stage 3a",
            Stage::Stage3b => "stage 3b",
            Stage::Stage4 => "stage 4",
            Stage::Stage5 => "stage 5",
        }
    }

    /// Detailed stage for an eGFR-like lab value (lower is worse).
    ///
    /// ≥90 stage 1, 60–89 stage 2, 45–59 stage 3a, 30–44 stage 3b,
    /// 15–29 stage 4, below 15 stage 5.
    pub fn from_lab_value(value: f64) -> Option<Stage> {
        if value.is_nan() {
            return None;
        }
        let stage = if value >= 90.0 {
            Stage::Stage1
        } else if value >= 60.0 {
            Stage::Stage2
        } else if value >= 45.0 {
            Stage::Stage3a
        } else if value >= 30.0 {
            Stage::Stage3b
        } else if value >= 15.0 {
            Stage::Stage4
        } else {
            Stage::Stage5
        };
        Some(stage)
    }

    /// Coarse reporting label, which does not separate stages 1 and 2.
    pub fn coarse_label(self) -> &'static str {
        match self {
            Stage::Stage1 | Stage::Stage2 => "stage 1/2",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label of an optional lab stage; members without a lab result read `0`.
pub fn lab_stage_label(stage: Option<Stage>) -> &'static str {
    stage.map_or("0", Stage::as_str)
}

/// The diagnosis codes that mark CKD stages in claims.
pub const QUALIFYING_DX_CODES: [&str; 8] = [
    "N181", "N182", "N183", "N1830", "N1831", "N1832", "N184", "N185",
];

/// A qualifying CKD diagnosis, ordered by its `dx_num`.
///
/// `N183` and `N1830` both collapse to the unspecified stage 3 code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DxCode {
    Stage1,
    Stage2,
    Stage3Unspecified,
    Stage3a,
    Stage3b,
    Stage4,
    Stage5,
}

impl DxCode {
    /// Parses a qualifying code. The ordinal comes from the code's suffix:
    /// four-character codes take their last three characters plus a `0`,
    /// five-character codes their last four.
    pub fn from_code(code: &str) -> Result<DxCode, ModelError> {
        let normalized = code.trim().to_ascii_uppercase();
        if !QUALIFYING_DX_CODES.contains(&normalized.as_str()) {
            return Err(ModelError::UnknownDiagnosisCode(code.to_string()));
        }
        let suffix = match normalized.len() {
            4 => format!("{}0", &normalized[1..]),
            _ => normalized[1..].to_string(),
        };
        let dx_num = suffix
            .parse::<u16>()
            .map_err(|_| ModelError::UnknownDiagnosisCode(code.to_string()))?;
        DxCode::from_dx_num(dx_num).ok_or_else(|| ModelError::UnknownDiagnosisCode(code.to_string()))
    }

    pub fn from_dx_num(dx_num: u16) -> Option<DxCode> {
        match dx_num {
            1810 => Some(DxCode::Stage1),
            1820 => Some(DxCode::Stage2),
            1830 => Some(DxCode::Stage3Unspecified),
            1831 => Some(DxCode::Stage3a),
            1832 => Some(DxCode::Stage3b),
            1840 => Some(DxCode::Stage4),
            1850 => Some(DxCode::Stage5),
            _ => None,
        }
    }

    pub fn dx_num(self) -> u16 {
        match self {
            DxCode::Stage1 => 1810,
            DxCode::Stage2 => 1820,
            DxCode::Stage3Unspecified => 1830,
            DxCode::Stage3a => 1831,
            DxCode::Stage3b => 1832,
            DxCode::Stage4 => 1840,
            DxCode::Stage5 => 1850,
        }
    }

    /// True for the stage 3a/3b sub-codes that can replace an unspecified stage 3.
    pub fn is_specific_stage3(self) -> bool {
        matches!(self, DxCode::Stage3a | DxCode::Stage3b)
    }

    pub fn claims_stage(self) -> ClaimsStage {
        match self {
            DxCode::Stage1 => ClaimsStage::Staged(Stage::Stage1),
            DxCode::Stage2 => ClaimsStage::Staged(Stage::Stage2),
            DxCode::Stage3Unspecified => ClaimsStage::Stage3Unspecified,
            DxCode::Stage3a => ClaimsStage::Staged(Stage::Stage3a),
            DxCode::Stage3b => ClaimsStage::Staged(Stage::Stage3b),
            DxCode::Stage4 => ClaimsStage::Staged(Stage::Stage4),
            DxCode::Stage5 => ClaimsStage::Staged(Stage::Stage5),
        }
    }
}

/// Stage derived from claims diagnoses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimsStage {
    Staged(Stage),
    /// Only the unspecified stage 3 code is available.
    Stage3Unspecified,
    /// CKD condition history but no dated qualifying diagnosis (`0`).
    NoCode,
    /// Never flagged and no qualifying diagnosis (empty).
    Absent,
}

impl ClaimsStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ClaimsStage::Staged(stage) => stage.as_str(),
            ClaimsStage::Stage3Unspecified => "stage 3, unspecified",
            ClaimsStage::NoCode => "0",
            ClaimsStage::Absent => "",
        }
    }

    /// True when the claims carry some stage, unspecified stage 3 included.
    pub fn is_present(self) -> bool {
        matches!(self, ClaimsStage::Staged(_) | ClaimsStage::Stage3Unspecified)
    }
}

impl fmt::Display for ClaimsStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The reconciled stage of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageValue {
    Staged(Stage),
    Stage3Unspecified,
    /// No source reported a stage.
    Unknown,
}

impl StageValue {
    pub fn as_str(self) -> &'static str {
        match self {
            StageValue::Staged(stage) => stage.as_str(),
            StageValue::Stage3Unspecified => "stage 3, unspecified",
            StageValue::Unknown => "",
        }
    }

    pub fn stage(self) -> Option<Stage> {
        match self {
            StageValue::Staged(stage) => Some(stage),
            _ => None,
        }
    }
}

impl From<ClaimsStage> for StageValue {
    fn from(value: ClaimsStage) -> Self {
        match value {
            ClaimsStage::Staged(stage) => StageValue::Staged(stage),
            ClaimsStage::Stage3Unspecified => StageValue::Stage3Unspecified,
            ClaimsStage::NoCode | ClaimsStage::Absent => StageValue::Unknown,
        }
    }
}

impl fmt::Display for StageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_value_thresholds() {
        assert_eq!(Stage::from_lab_value(95.0), Some(Stage::Stage1));
        assert_eq!(Stage::from_lab_value(90.0), Some(Stage::Stage1));
        assert_eq!(Stage::from_lab_value(89.9), Some(Stage::Stage2));
        assert_eq!(Stage::from_lab_value(60.0), Some(Stage::Stage2));
        assert_eq!(Stage::from_lab_value(55.0), Some(Stage::Stage3a));
        assert_eq!(Stage::from_lab_value(45.0), Some(Stage::Stage3a));
        assert_eq!(Stage::from_lab_value(44.0), Some(Stage::Stage3b));
        assert_eq!(Stage::from_lab_value(29.5), Some(Stage::Stage4));
        assert_eq!(Stage::from_lab_value(10.0), Some(Stage::Stage5));
        assert_eq!(Stage::from_lab_value(f64::NAN), None);
    }

    #[test]
    fn coarse_labels_merge_first_two_stages() {
        assert_eq!(Stage::Stage1.coarse_label(), "stage 1/2");
        assert_eq!(Stage::Stage2.coarse_label(), "stage 1/2");
        assert_eq!(Stage::Stage3b.coarse_label(), "stage 3b");
        assert_eq!(lab_stage_label(None), "0");
    }

    #[test]
    fn dx_codes_follow_suffix_rule() {
        assert_eq!(DxCode::from_code("N181").unwrap().dx_num(), 1810);
        assert_eq!(DxCode::from_code("N183").unwrap(), DxCode::Stage3Unspecified);
        assert_eq!(DxCode::from_code("N1830").unwrap(), DxCode::Stage3Unspecified);
        assert_eq!(DxCode::from_code("n1832").unwrap().dx_num(), 1832);
        assert_eq!(DxCode::from_code("N185").unwrap(), DxCode::Stage5);
        assert!(DxCode::from_code("N186").is_err());
        assert!(DxCode::from_code("N189").is_err());
    }

    #[test]
    fn dx_codes_order_by_dx_num() {
        assert!(DxCode::Stage3Unspecified < DxCode::Stage3a);
        assert!(DxCode::Stage3b < DxCode::Stage4);
        let max = [DxCode::Stage2, DxCode::Stage3b, DxCode::Stage3Unspecified]
            .into_iter()
            .max();
        assert_eq!(max, Some(DxCode::Stage3b));
    }

    #[test]
    fn claims_stage_labels() {
        assert_eq!(DxCode::Stage3Unspecified.claims_stage().as_str(), "stage 3, unspecified");
        assert_eq!(ClaimsStage::NoCode.as_str(), "0");
        assert_eq!(ClaimsStage::Absent.as_str(), "");
        assert!(ClaimsStage::Stage3Unspecified.is_present());
        assert!(!ClaimsStage::NoCode.is_present());
    }
}
