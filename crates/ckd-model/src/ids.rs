use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Health-plan member identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(value: impl Into<String>) -> Result<Self, ModelError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ModelError::EmptyMemberId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The analysis year of a run. Extracts always span this year and the one before,
/// so year 0 is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct AnalysisYear(u16);

impl AnalysisYear {
    /// Parses a year given as exactly four ASCII digits, `0001` to `9999`.
    pub fn parse(value: &str) -> Result<Self, ModelError> {
        let trimmed = value.trim();
        if trimmed.len() != 4 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ModelError::InvalidYear(value.to_string()));
        }
        let year = trimmed
            .parse::<u16>()
            .map_err(|_| ModelError::InvalidYear(value.to_string()))?;
        Self::try_from(year).map_err(|_| ModelError::InvalidYear(value.to_string()))
    }

    pub fn value(self) -> i32 {
        i32::from(self.0)
    }

    /// The year before the analysis year.
    pub fn prior(self) -> Self {
        Self(self.0.saturating_sub(1))
    }
}

impl TryFrom<u16> for AnalysisYear {
    type Error = ModelError;

    fn try_from(year: u16) -> Result<Self, Self::Error> {
        if (1..=9999).contains(&year) {
            Ok(Self(year))
        } else {
            Err(ModelError::InvalidYear(year.to_string()))
        }
    }
}

impl From<AnalysisYear> for u16 {
    fn from(year: AnalysisYear) -> Self {
        year.0
    }
}

impl FromStr for AnalysisYear {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AnalysisYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}
