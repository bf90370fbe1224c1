use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("the year is not in a valid format (yyyy): '{0}'")]
    InvalidYear(String),
    #[error("member identifier must not be empty")]
    EmptyMemberId,
    #[error("'{0}' is not a qualifying CKD diagnosis code")]
    UnknownDiagnosisCode(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
