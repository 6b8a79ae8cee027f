//! Error types for the survey data layer.

use thiserror::Error;

/// Errors surfaced by the record store, submission pipeline and sessions.
#[derive(Debug, Error)]
pub enum SurveyError {
    /// Persistence read/write failed. Previously stored data is untouched.
    #[error("Storage failure: {0}")]
    Storage(String),

    /// The remote store could not be reached or rejected the request.
    #[error("Network failure: {0}")]
    Network(String),

    /// A consumer touched the data layer without an open session.
    #[error("No active data session: {0}")]
    MissingContext(String),

    /// The submission was rejected before reaching the store.
    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),

    /// A field name that is not part of the survey.
    #[error("Unknown survey field: {0}")]
    UnknownField(String),
}

impl From<std::io::Error> for SurveyError {
    fn from(e: std::io::Error) -> Self {
        SurveyError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for SurveyError {
    fn from(e: serde_json::Error) -> Self {
        SurveyError::Storage(format!("serialization: {}", e))
    }
}

impl From<reqwest::Error> for SurveyError {
    fn from(e: reqwest::Error) -> Self {
        SurveyError::Network(e.to_string())
    }
}

/// Result alias used throughout the data layer.
pub type SurveyResult<T> = Result<T, SurveyError>;
