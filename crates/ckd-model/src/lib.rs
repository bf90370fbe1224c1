//! CKD staging data model.
//!
//! Types shared by the extractors, the stage resolvers, the reconciler and
//! the report: stages and their labels, qualifying diagnosis codes, the
//! reconciled category taxonomies, member records and pipeline options.

pub mod category;
pub mod error;
pub mod ids;
pub mod options;
pub mod records;
pub mod stage;

pub use category::{CollapsedCategory, FiveCategory, RecentSource, StageCategory};
pub use error::{ModelError, Result};
pub use ids::{AnalysisYear, MemberId};
pub use options::{PipelineConfig, Stage3Fallback};
pub use records::{
    ClaimsResolution, DiagnosisRecord, LabObservation, LabResolution, MemberFlags, MemberStage,
};
pub use stage::{ClaimsStage, DxCode, QUALIFYING_DX_CODES, Stage, StageValue, lab_stage_label};
