//! CKD stage assignment from labs and claims.
//!
//! Each member gets one authoritative stage from two sources: the most
//! recent lab result and the most recent qualifying diagnosis. The
//! reconciled stage is then bucketed into the reported category schemes.
//!
//! # Stages
//!
//! - [`members`]: the enrolled member universe with its flags
//! - [`lab`]: lab extraction, result normalization and lab stages
//! - [`claims`]: diagnosis extraction and claims stages, including stage 3
//!   disambiguation
//! - [`reconcile`]: source precedence and category bucketing
//! - [`frame`]: the reconciled member table as a DataFrame

pub mod claims;
pub mod error;
pub mod frame;
pub mod lab;
pub mod members;
pub mod pipeline;
pub mod reconcile;

pub use claims::{ClaimsStages, DiagnosisExtract, extract_diagnoses, resolve_claims};
pub use error::{Result, StageError};
pub use frame::{col, member_frame};
pub use lab::{LabExtract, extract_labs, normalize_result, resolve_labs};
pub use members::{MemberTables, build_members};
pub use pipeline::{StagingRun, StagingSummary, stage_members};
pub use reconcile::{reconcile_member, reconcile_members, recent_source};
